//! UPS tracking adapter.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;
use tracing::{debug, instrument};

use freightdesk_core::ShipmentStatus;

use crate::adapters::sandbox;
use crate::config::CarrierConfig;
use crate::error::{CarrierError, CarrierResult};
use crate::event::{CarrierTrackingEvent, ShipmentDetails, TrackingEventKind, WebhookEvent};
use crate::retry::{RetryConfig, RetryExecutor};
use crate::traits::CarrierAdapter;
use crate::types::CarrierType;

/// Standard format: `1Z` followed by 16 alphanumeric characters.
static UPS_STANDARD_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^1Z[A-Z0-9]{16}$").expect("valid regex"));

/// Legacy freight format: `T` or `K` followed by 10 digits.
static UPS_FREIGHT_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[TK]\d{10}$").expect("valid regex"));

/// UPS customer integration environment.
const DEFAULT_ENDPOINT: &str = "https://wwwcie.ups.com/api/track/v1";

const HUBS: &[&str] = &[
    "Louisville, KY",
    "Ontario, CA",
    "Rockford, IL",
    "Philadelphia, PA",
];

/// Adapter for UPS package tracking.
pub struct UpsAdapter {
    config: CarrierConfig,
    retry: RetryExecutor,
}

impl UpsAdapter {
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
            ShipmentStatus::Pending => "Order Processed: Ready for UPS",
            ShipmentStatus::InTransit => "Departed from Facility",
            ShipmentStatus::OutForDelivery => "Out For Delivery Today",
            ShipmentStatus::Delivered => "Delivered",
            ShipmentStatus::Exception => "Exception: The package is delayed",
            ShipmentStatus::Cancelled => "Shipment Voided",
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
                    format!("{tracking}-{:03}", step.sequence),
                    TrackingEventKind::StatusChange,
                    step.event_time,
                )
                .with_status(step.status)
                .with_description(Self::describe(step.status))
                .with_location(location)
            })
            .collect();

        // Some shipments get an extra facility scan with no status change
        if steps.len() >= 2 && seed % 3 == 0 {
            let scan_time = steps[1].event_time + Duration::hours(6);
            let insert_at = events
                .iter()
                .position(|e| e.event_time > scan_time)
                .unwrap_or(events.len());
            events.insert(
                insert_at,
                CarrierTrackingEvent::new(
                    format!("{tracking}-scan"),
                    TrackingEventKind::LocationUpdate,
                    scan_time,
                )
                .with_description("Arrived at UPS Facility")
                .with_location(HUBS[(seed % HUBS.len() as u64) as usize]),
            );
        }

        events
    }

    async fn fetch_events(&self, tracking: &str) -> CarrierResult<Vec<CarrierTrackingEvent>> {
        let request = async { Ok(self.build_events(tracking)) };
        tokio::time::timeout(self.config.timeout(), request)
            .await
            .map_err(|_| CarrierError::timeout(CarrierType::Ups, self.config.timeout_secs))?
    }
}

#[async_trait]
impl CarrierAdapter for UpsAdapter {
    fn carrier_type(&self) -> CarrierType {
        CarrierType::Ups
    }

    fn display_name(&self) -> String {
        format!("UPS ({})", self.endpoint())
    }

    fn validate_tracking_number(&self, tracking: &str) -> bool {
        let normalized = tracking.trim().to_uppercase();
        UPS_STANDARD_REGEX.is_match(&normalized) || UPS_FREIGHT_REGEX.is_match(&normalized)
    }

    async fn get_shipment_details(&self, tracking: &str) -> CarrierResult<ShipmentDetails> {
        if !self.validate_tracking_number(tracking) {
            return Err(CarrierError::invalid_tracking(CarrierType::Ups, tracking));
        }

        let events = self.retry.execute(|| self.fetch_events(tracking)).await?;
        let Some(last) = events.iter().rev().find(|e| e.status.is_some()) else {
            return Err(CarrierError::api(CarrierType::Ups, "empty tracking history"));
        };
        let seed = sandbox::seed_for(tracking);
        let (origin, destination) = sandbox::route_for(seed);
        let steps = sandbox::timeline(tracking);

        Ok(ShipmentDetails {
            carrier: CarrierType::Ups,
            tracking_number: tracking.to_string(),
            status: last.status.unwrap_or(ShipmentStatus::Pending),
            estimated_delivery: sandbox::estimated_delivery(&steps),
            origin: Some(origin.to_string()),
            destination: Some(destination.to_string()),
            last_updated: last.event_time,
        })
    }

    #[instrument(skip(self), fields(carrier = "ups"))]
    async fn get_tracking_events(
        &self,
        tracking: &str,
    ) -> CarrierResult<Vec<CarrierTrackingEvent>> {
        if !self.validate_tracking_number(tracking) {
            return Err(CarrierError::invalid_tracking(CarrierType::Ups, tracking));
        }

        let events = self.retry.execute(|| self.fetch_events(tracking)).await?;
        debug!(count = events.len(), "Fetched UPS tracking history");
        Ok(events)
    }

    fn parse_webhook(&self, payload: &Value) -> CarrierResult<WebhookEvent> {
        let tracking = payload
            .get("trackingNumber")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                CarrierError::webhook_parse(CarrierType::Ups, "missing trackingNumber")
            })?;
        if !self.validate_tracking_number(tracking) {
            return Err(CarrierError::invalid_tracking(CarrierType::Ups, tracking));
        }

        let activity = payload.get("activityStatus").ok_or_else(|| {
            CarrierError::webhook_parse(CarrierType::Ups, "missing activityStatus")
        })?;
        let code = activity.get("type").and_then(Value::as_str).ok_or_else(|| {
            CarrierError::webhook_parse(CarrierType::Ups, "missing activityStatus.type")
        })?;
        let timestamp = payload
            .get("localActivityDate")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                CarrierError::webhook_parse(CarrierType::Ups, "missing localActivityDate")
            })?;
        let event_time = DateTime::parse_from_rfc3339(timestamp)
            .map_err(|e| {
                CarrierError::webhook_parse(
                    CarrierType::Ups,
                    format!("bad localActivityDate: {e}"),
                )
            })?
            .with_timezone(&Utc);

        let location = payload.get("activityLocation").and_then(|loc| {
            let city = loc.get("city").and_then(Value::as_str)?;
            match loc.get("stateProvince").and_then(Value::as_str) {
                Some(state) => Some(format!("{city}, {state}")),
                None => Some(city.to_string()),
            }
        });

        // UPS activity type codes
        let (kind, status) = match code {
            "M" => (TrackingEventKind::StatusChange, Some(ShipmentStatus::Pending)),
            "P" | "I" => (
                TrackingEventKind::StatusChange,
                Some(ShipmentStatus::InTransit),
            ),
            "O" => (
                TrackingEventKind::StatusChange,
                Some(ShipmentStatus::OutForDelivery),
            ),
            "D" => (
                TrackingEventKind::StatusChange,
                Some(ShipmentStatus::Delivered),
            ),
            "X" => (
                TrackingEventKind::StatusChange,
                Some(ShipmentStatus::Exception),
            ),
            "V" => (
                TrackingEventKind::StatusChange,
                Some(ShipmentStatus::Cancelled),
            ),
            "F" => (TrackingEventKind::DeliveryAttempt, None),
            _ => (TrackingEventKind::Info, None),
        };

        let description = activity
            .get("description")
            .and_then(Value::as_str)
            .map_or_else(|| format!("UPS activity {code}"), str::to_string);
        let external_id = payload
            .get("eventId")
            .and_then(Value::as_str)
            .map_or_else(|| format!("{tracking}:{timestamp}:{code}"), str::to_string);

        let mut event = CarrierTrackingEvent::new(external_id, kind, event_time)
            .with_description(description);
        if let Some(status) = status {
            event = event.with_status(status);
        }
        if let Some(location) = location {
            event = event.with_location(location);
        }

        Ok(WebhookEvent {
            carrier: CarrierType::Ups,
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
