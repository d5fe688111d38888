//! DHL tracking adapter.
//!
//! Covers DHL Express waybills, eCommerce GlobalMail and lettered
//! eCommerce items, and the two-letter packet format used for
//! cross-border mail.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;
use tracing::debug;

use freightdesk_core::ShipmentStatus;

use crate::adapters::sandbox;
use crate::config::CarrierConfig;
use crate::error::{CarrierError, CarrierResult};
use crate::event::{CarrierTrackingEvent, ShipmentDetails, TrackingEventKind, WebhookEvent};
use crate::retry::{RetryConfig, RetryExecutor};
use crate::traits::CarrierAdapter;
use crate::types::CarrierType;

/// Express waybill: 10 or 11 digits.
static DHL_EXPRESS_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{10,11}$").expect("valid regex"));

/// eCommerce GlobalMail: `GM` followed by 16 to 39 alphanumerics.
static DHL_GLOBALMAIL_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^GM[A-Z0-9]{16,39}$").expect("valid regex"));

/// Packet format: two letters, nine digits, `DE` suffix.
static DHL_PACKET_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z]{2}\d{9}DE$").expect("valid regex"));

/// Broad eCommerce class: three letters, then 4 to 27 alphanumerics.
static DHL_ECOMMERCE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z]{3}[A-Z0-9]{4,27}$").expect("valid regex"));

const DEFAULT_ENDPOINT: &str = "https://api-test.dhl.com/track/shipments";

const HUBS: &[&str] = &[
    "Leipzig, Germany",
    "Cincinnati, OH",
    "East Midlands, UK",
    "Hong Kong",
];

/// Adapter for DHL shipment tracking.
pub struct DhlAdapter {
    config: CarrierConfig,
    retry: RetryExecutor,
}

impl DhlAdapter {
    /// Create an adapter with the given configuration.
    #[must_use]
    pub fn new(config: CarrierConfig) -> Self {
        let retry = RetryExecutor::new(RetryConfig::for_carrier(&config));
        Self { config, retry }
    }

    /// Create an adapter with default configuration.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(CarrierConfig::default())
    }

    fn endpoint(&self) -> &str {
        self.config.endpoint.as_deref().unwrap_or(DEFAULT_ENDPOINT)
    }

    fn describe(status: ShipmentStatus) -> &'static str {
        match status {
            ShipmentStatus::Pending => "Shipment information received",
            ShipmentStatus::InTransit => "Processed at DHL facility",
            ShipmentStatus::OutForDelivery => "With delivery courier",
            ShipmentStatus::Delivered => "Delivered",
            ShipmentStatus::Exception => "Clearance event",
            ShipmentStatus::Cancelled => "Shipment cancelled",
        }
    }

    fn build_events(&self, tracking: &str) -> Vec<CarrierTrackingEvent> {
        let seed = sandbox::seed_for(tracking);
        let steps = sandbox::timeline(tracking);
        let (_, destination) = sandbox::route_for(seed);

        let mut events: Vec<CarrierTrackingEvent> = steps
            .iter()
            .map(|step| {
                let location = if step.status == ShipmentStatus::Delivered {
                    destination
                } else {
                    HUBS[((seed + u64::from(step.sequence)) % HUBS.len() as u64) as usize]
                };
                CarrierTrackingEvent::new(
                    format!("DHL-{tracking}-{}", step.sequence),
                    TrackingEventKind::StatusChange,
                    step.event_time,
                )
                .with_status(step.status)
                .with_description(Self::describe(step.status))
                .with_location(location)
            })
            .collect();

        if steps.len() >= 2 && seed % 3 == 0 {
            let scan_time = steps[1].event_time + Duration::hours(6);
            let insert_at = events
                .iter()
                .position(|e| e.event_time > scan_time)
                .unwrap_or(events.len());
            events.insert(
                insert_at,
                CarrierTrackingEvent::new(
                    format!("DHL-{tracking}-scan"),
                    TrackingEventKind::LocationUpdate,
                    scan_time,
                )
                .with_description("Arrived at sort facility")
                .with_location(HUBS[(seed % HUBS.len() as u64) as usize]),
            );
        }

        events
    }

    async fn fetch_events(&self, tracking: &str) -> CarrierResult<Vec<CarrierTrackingEvent>> {
        let request = async { Ok(self.build_events(tracking)) };
        tokio::time::timeout(self.config.timeout(), request)
            .await
            .map_err(|_| CarrierError::timeout(CarrierType::Dhl, self.config.timeout_secs))?
    }
}

#[async_trait]
impl CarrierAdapter for DhlAdapter {
    fn carrier_type(&self) -> CarrierType {
        CarrierType::Dhl
    }

    fn display_name(&self) -> String {
        format!("DHL ({})", self.endpoint())
    }

    fn validate_tracking_number(&self, tracking: &str) -> bool {
        let normalized = tracking.trim().to_uppercase();
        DHL_EXPRESS_REGEX.is_match(&normalized)
            || DHL_GLOBALMAIL_REGEX.is_match(&normalized)
            || DHL_PACKET_REGEX.is_match(&normalized)
            || DHL_ECOMMERCE_REGEX.is_match(&normalized)
    }

    async fn get_shipment_details(&self, tracking: &str) -> CarrierResult<ShipmentDetails> {
        if !self.validate_tracking_number(tracking) {
            return Err(CarrierError::invalid_tracking(CarrierType::Dhl, tracking));
        }

        let events = self.retry.execute(|| self.fetch_events(tracking)).await?;
        let Some(last) = events.iter().rev().find(|e| e.status.is_some()) else {
            return Err(CarrierError::api(CarrierType::Dhl, "empty tracking history"));
        };
        let seed = sandbox::seed_for(tracking);
        let (origin, destination) = sandbox::route_for(seed);
        let steps = sandbox::timeline(tracking);

        Ok(ShipmentDetails {
            carrier: CarrierType::Dhl,
            tracking_number: tracking.to_string(),
            status: last.status.unwrap_or(ShipmentStatus::Pending),
            estimated_delivery: sandbox::estimated_delivery(&steps),
            origin: Some(origin.to_string()),
            destination: Some(destination.to_string()),
            last_updated: last.event_time,
        })
    }

    async fn get_tracking_events(
        &self,
        tracking: &str,
    ) -> CarrierResult<Vec<CarrierTrackingEvent>> {
        if !self.validate_tracking_number(tracking) {
            return Err(CarrierError::invalid_tracking(CarrierType::Dhl, tracking));
        }

        let events = self.retry.execute(|| self.fetch_events(tracking)).await?;
        debug!(carrier = "dhl", count = events.len(), "Fetched tracking history");
        Ok(events)
    }

    fn parse_webhook(&self, payload: &Value) -> CarrierResult<WebhookEvent> {
        let tracking = payload
            .get("trackingNumber")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                CarrierError::webhook_parse(CarrierType::Dhl, "missing trackingNumber")
            })?;
        if !self.validate_tracking_number(tracking) {
            return Err(CarrierError::invalid_tracking(CarrierType::Dhl, tracking));
        }

        let event_obj = payload
            .get("event")
            .ok_or_else(|| CarrierError::webhook_parse(CarrierType::Dhl, "missing event"))?;
        let code = event_obj
            .get("statusCode")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                CarrierError::webhook_parse(CarrierType::Dhl, "missing event.statusCode")
            })?;
        let timestamp = event_obj
            .get("timestamp")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                CarrierError::webhook_parse(CarrierType::Dhl, "missing event.timestamp")
            })?;
        let event_time = DateTime::parse_from_rfc3339(timestamp)
            .map_err(|e| {
                CarrierError::webhook_parse(CarrierType::Dhl, format!("bad timestamp: {e}"))
            })?
            .with_timezone(&Utc);

        let location = event_obj
            .get("location")
            .and_then(|loc| loc.get("address"))
            .and_then(|addr| addr.get("addressLocality"))
            .and_then(Value::as_str)
            .map(str::to_string);

        // DHL unified status codes
        let (kind, status) = match code {
            "pre-transit" => (TrackingEventKind::StatusChange, Some(ShipmentStatus::Pending)),
            "transit" => (
                TrackingEventKind::StatusChange,
                Some(ShipmentStatus::InTransit),
            ),
            "delivered" => (
                TrackingEventKind::StatusChange,
                Some(ShipmentStatus::Delivered),
            ),
            "failure" => (
                TrackingEventKind::StatusChange,
                Some(ShipmentStatus::Exception),
            ),
            _ => (TrackingEventKind::Info, None),
        };

        let description = event_obj
            .get("description")
            .and_then(Value::as_str)
            .map_or_else(|| format!("DHL status {code}"), str::to_string);

        // DHL pushes carry no native event id
        let external_id = format!("{tracking}:{timestamp}:{code}");

        let mut event = CarrierTrackingEvent::new(external_id, kind, event_time)
            .with_description(description);
        if let Some(status) = status {
            event = event.with_status(status);
        }
        if let Some(location) = location {
            event = event.with_location(location);
        }

        Ok(WebhookEvent {
            carrier: CarrierType::Dhl,
            tracking_number: tracking.to_string(),
            event,
        })
    }

    /// The sandbox backend is always reachable; a misconfigured carrier
    /// reports unavailable.
    async fn is_available(&self) -> bool {
        self.config.validate().is_ok()
    }
}
