//! USPS tracking adapter.

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

/// Domestic formats: 20 or 26 digits.
static USPS_DOMESTIC_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{20}|\d{26})$").expect("valid regex"));

/// IMpb with routing prefix: `420`, a ZIP (5 or 9 digits), then 22 digits.
static USPS_IMPB_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^420\d{5}(\d{4})?\d{22}$").expect("valid regex"));

/// International: two letters, nine digits, `US` suffix.
static USPS_INTL_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z]{2}\d{9}US$").expect("valid regex"));

const DEFAULT_ENDPOINT: &str = "https://api-cat.usps.com/tracking/v3";

const FACILITIES: &[&str] = &[
    "Merrifield, VA",
    "Des Moines, IA",
    "Bell Gardens, CA",
    "Jersey City, NJ",
];

/// Adapter for USPS package tracking.
pub struct UspsAdapter {
    config: CarrierConfig,
    retry: RetryExecutor,
}

impl UspsAdapter {
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
            ShipmentStatus::Pending => "Shipping Label Created, USPS Awaiting Item",
            ShipmentStatus::InTransit => "In Transit to Next Facility",
            ShipmentStatus::OutForDelivery => "Out for Delivery",
            ShipmentStatus::Delivered => "Delivered, In/At Mailbox",
            ShipmentStatus::Exception => "Alert: Delivery Exception",
            ShipmentStatus::Cancelled => "Label Cancelled",
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
                    FACILITIES
                        [((seed + u64::from(step.sequence)) % FACILITIES.len() as u64) as usize]
                };
                CarrierTrackingEvent::new(
                    format!("USPS-{tracking}-{}", step.sequence),
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
                    format!("USPS-{tracking}-scan"),
                    TrackingEventKind::LocationUpdate,
                    scan_time,
                )
                .with_description("Arrived at USPS Regional Facility")
                .with_location(FACILITIES[(seed % FACILITIES.len() as u64) as usize]),
            );
        }

        events
    }

    async fn fetch_events(&self, tracking: &str) -> CarrierResult<Vec<CarrierTrackingEvent>> {
        let request = async { Ok(self.build_events(tracking)) };
        tokio::time::timeout(self.config.timeout(), request)
            .await
            .map_err(|_| CarrierError::timeout(CarrierType::Usps, self.config.timeout_secs))?
    }
}

#[async_trait]
impl CarrierAdapter for UspsAdapter {
    fn carrier_type(&self) -> CarrierType {
        CarrierType::Usps
    }

    fn display_name(&self) -> String {
        format!("USPS ({})", self.endpoint())
    }

    fn validate_tracking_number(&self, tracking: &str) -> bool {
        let normalized = tracking.trim().to_uppercase();
        USPS_DOMESTIC_REGEX.is_match(&normalized)
            || USPS_IMPB_REGEX.is_match(&normalized)
            || USPS_INTL_REGEX.is_match(&normalized)
    }

    async fn get_shipment_details(&self, tracking: &str) -> CarrierResult<ShipmentDetails> {
        if !self.validate_tracking_number(tracking) {
            return Err(CarrierError::invalid_tracking(CarrierType::Usps, tracking));
        }

        let events = self.retry.execute(|| self.fetch_events(tracking)).await?;
        let Some(last) = events.iter().rev().find(|e| e.status.is_some()) else {
            return Err(CarrierError::api(CarrierType::Usps, "empty tracking history"));
        };
        let seed = sandbox::seed_for(tracking);
        let (origin, destination) = sandbox::route_for(seed);
        let steps = sandbox::timeline(tracking);

        Ok(ShipmentDetails {
            carrier: CarrierType::Usps,
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
            return Err(CarrierError::invalid_tracking(CarrierType::Usps, tracking));
        }

        let events = self.retry.execute(|| self.fetch_events(tracking)).await?;
        debug!(carrier = "usps", count = events.len(), "Fetched tracking history");
        Ok(events)
    }

    fn parse_webhook(&self, payload: &Value) -> CarrierResult<WebhookEvent> {
        let tracking = payload
            .get("trackingNumber")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                CarrierError::webhook_parse(CarrierType::Usps, "missing trackingNumber")
            })?;
        if !self.validate_tracking_number(tracking) {
            return Err(CarrierError::invalid_tracking(CarrierType::Usps, tracking));
        }

        let scan = payload
            .get("scanEvent")
            .ok_or_else(|| CarrierError::webhook_parse(CarrierType::Usps, "missing scanEvent"))?;
        let code = scan
            .get("eventCode")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                CarrierError::webhook_parse(CarrierType::Usps, "missing scanEvent.eventCode")
            })?;
        let timestamp = scan
            .get("eventTimestamp")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                CarrierError::webhook_parse(CarrierType::Usps, "missing scanEvent.eventTimestamp")
            })?;
        let event_time = DateTime::parse_from_rfc3339(timestamp)
            .map_err(|e| {
                CarrierError::webhook_parse(CarrierType::Usps, format!("bad timestamp: {e}"))
            })?
            .with_timezone(&Utc);

        let location = scan.get("eventCity").and_then(Value::as_str).map(|city| {
            match scan.get("eventState").and_then(Value::as_str) {
                Some(state) => format!("{city}, {state}"),
                None => city.to_string(),
            }
        });

        // USPS scan event codes
        let (kind, status) = match code {
            "MA" => (TrackingEventKind::StatusChange, Some(ShipmentStatus::Pending)),
            "10" => (
                TrackingEventKind::StatusChange,
                Some(ShipmentStatus::InTransit),
            ),
            "OF" => (
                TrackingEventKind::StatusChange,
                Some(ShipmentStatus::OutForDelivery),
            ),
            "01" => (
                TrackingEventKind::StatusChange,
                Some(ShipmentStatus::Delivered),
            ),
            "04" => (
                TrackingEventKind::StatusChange,
                Some(ShipmentStatus::Exception),
            ),
            "55" => (TrackingEventKind::DeliveryAttempt, None),
            _ => (TrackingEventKind::Info, None),
        };

        let description = scan
            .get("eventDescription")
            .and_then(Value::as_str)
            .map_or_else(|| format!("USPS scan {code}"), str::to_string);
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
            carrier: CarrierType::Usps,
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
