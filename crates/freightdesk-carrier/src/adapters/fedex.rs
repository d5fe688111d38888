//! FedEx tracking adapter.

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

/// Express and Ground: 12, 14 or 20 digits.
static FEDEX_DIGITS_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{12}|\d{14}|\d{20})$").expect("valid regex"));

/// SmartPost: 22 digits starting with 96.
static FEDEX_SMARTPOST_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^96\d{20}$").expect("valid regex"));

const DEFAULT_ENDPOINT: &str = "https://apis-sandbox.fedex.com/track/v1";

const HUBS: &[&str] = &[
    "Memphis, TN",
    "Indianapolis, IN",
    "Oakland, CA",
    "Anchorage, AK",
];

/// Adapter for FedEx package tracking.
pub struct FedexAdapter {
    config: CarrierConfig,
    retry: RetryExecutor,
}

impl FedexAdapter {
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
            ShipmentStatus::Pending => "Shipment information sent to FedEx",
            ShipmentStatus::InTransit => "In transit",
            ShipmentStatus::OutForDelivery => "On FedEx vehicle for delivery",
            ShipmentStatus::Delivered => "Delivered",
            ShipmentStatus::Exception => "Shipment exception",
            ShipmentStatus::Cancelled => "Shipment cancelled by shipper",
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
                    format!("FDX-{tracking}-{}", step.sequence),
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
                    format!("FDX-{tracking}-scan"),
                    TrackingEventKind::LocationUpdate,
                    scan_time,
                )
                .with_description("Arrived at FedEx location")
                .with_location(HUBS[(seed % HUBS.len() as u64) as usize]),
            );
        }

        events
    }

    async fn fetch_events(&self, tracking: &str) -> CarrierResult<Vec<CarrierTrackingEvent>> {
        let request = async { Ok(self.build_events(tracking)) };
        tokio::time::timeout(self.config.timeout(), request)
            .await
            .map_err(|_| CarrierError::timeout(CarrierType::Fedex, self.config.timeout_secs))?
    }
}

#[async_trait]
impl CarrierAdapter for FedexAdapter {
    fn carrier_type(&self) -> CarrierType {
        CarrierType::Fedex
    }

    fn display_name(&self) -> String {
        format!("FedEx ({})", self.endpoint())
    }

    fn validate_tracking_number(&self, tracking: &str) -> bool {
        let normalized = tracking.trim().to_uppercase();
        FEDEX_DIGITS_REGEX.is_match(&normalized) || FEDEX_SMARTPOST_REGEX.is_match(&normalized)
    }

    async fn get_shipment_details(&self, tracking: &str) -> CarrierResult<ShipmentDetails> {
        if !self.validate_tracking_number(tracking) {
            return Err(CarrierError::invalid_tracking(CarrierType::Fedex, tracking));
        }

        let events = self.retry.execute(|| self.fetch_events(tracking)).await?;
        let Some(last) = events.iter().rev().find(|e| e.status.is_some()) else {
            return Err(CarrierError::api(CarrierType::Fedex, "empty tracking history"));
        };
        let seed = sandbox::seed_for(tracking);
        let (origin, destination) = sandbox::route_for(seed);
        let steps = sandbox::timeline(tracking);

        Ok(ShipmentDetails {
            carrier: CarrierType::Fedex,
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
            return Err(CarrierError::invalid_tracking(CarrierType::Fedex, tracking));
        }

        let events = self.retry.execute(|| self.fetch_events(tracking)).await?;
        debug!(carrier = "fedex", count = events.len(), "Fetched tracking history");
        Ok(events)
    }

    fn parse_webhook(&self, payload: &Value) -> CarrierResult<WebhookEvent> {
        let tracking = payload
            .get("trackingNumber")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                CarrierError::webhook_parse(CarrierType::Fedex, "missing trackingNumber")
            })?;
        if !self.validate_tracking_number(tracking) {
            return Err(CarrierError::invalid_tracking(CarrierType::Fedex, tracking));
        }

        let code = payload
            .get("eventType")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                CarrierError::webhook_parse(CarrierType::Fedex, "missing eventType")
            })?;
        let timestamp = payload
            .get("timestamp")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                CarrierError::webhook_parse(CarrierType::Fedex, "missing timestamp")
            })?;
        let event_time = DateTime::parse_from_rfc3339(timestamp)
            .map_err(|e| {
                CarrierError::webhook_parse(CarrierType::Fedex, format!("bad timestamp: {e}"))
            })?
            .with_timezone(&Utc);

        let location = payload.get("scanLocation").and_then(|loc| {
            let city = loc.get("city").and_then(Value::as_str)?;
            match loc.get("stateOrProvinceCode").and_then(Value::as_str) {
                Some(state) => Some(format!("{city}, {state}")),
                None => Some(city.to_string()),
            }
        });

        // FedEx scan event codes
        let (kind, status) = match code {
            "OC" => (TrackingEventKind::StatusChange, Some(ShipmentStatus::Pending)),
            "PU" | "IT" | "DP" | "AR" => (
                TrackingEventKind::StatusChange,
                Some(ShipmentStatus::InTransit),
            ),
            "OD" => (
                TrackingEventKind::StatusChange,
                Some(ShipmentStatus::OutForDelivery),
            ),
            "DL" => (
                TrackingEventKind::StatusChange,
                Some(ShipmentStatus::Delivered),
            ),
            "DE" => (
                TrackingEventKind::StatusChange,
                Some(ShipmentStatus::Exception),
            ),
            "CA" => (
                TrackingEventKind::StatusChange,
                Some(ShipmentStatus::Cancelled),
            ),
            _ => (TrackingEventKind::Info, None),
        };

        let description = payload
            .get("eventDescription")
            .and_then(Value::as_str)
            .map_or_else(|| format!("FedEx scan {code}"), str::to_string);
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
            carrier: CarrierType::Fedex,
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

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn adapter() -> FedexAdapter {
        FedexAdapter::with_defaults()
    }

    #[test]
    fn test_validates_digit_formats() {
        let fedex = adapter();
        assert!(fedex.validate_tracking_number("794677799690"));
        assert!(fedex.validate_tracking_number("61299998887766554433"));
        assert!(fedex.validate_tracking_number("9611223344556677889900"));
        assert!(fedex.validate_tracking_number("12345678901234"));
    }

    #[test]
    fn test_rejects_invalid_formats() {
        let fedex = adapter();
        assert!(!fedex.validate_tracking_number("79467779969"));
        assert!(!fedex.validate_tracking_number("7946777996901"));
        assert!(!fedex.validate_tracking_number("9511223344556677889900"));
        assert!(!fedex.validate_tracking_number("1Z5R89390357567127"));
        assert!(!fedex.validate_tracking_number("79467779969A"));
    }

    #[tokio::test]
    async fn test_history_is_stable() {
        let fedex = adapter();
        let first = fedex.get_tracking_events("794677799690").await.unwrap();
        let second = fedex.get_tracking_events("794677799690").await.unwrap();
        assert!(!first.is_empty());
        assert_eq!(first.len(), second.len());
        for pair in first.windows(2) {
            assert!(pair[0].event_time <= pair[1].event_time);
        }
    }

    #[tokio::test]
    async fn test_details_for_smartpost_number() {
        let details = adapter()
            .get_shipment_details("9611223344556677889900")
            .await
            .unwrap();
        assert_eq!(details.carrier, CarrierType::Fedex);
        assert!(details.destination.is_some());
    }

    #[test]
    fn test_parse_webhook_out_for_delivery() {
        let payload = json!({
            "trackingNumber": "794677799690",
            "eventType": "OD",
            "eventDescription": "On FedEx vehicle for delivery",
            "timestamp": "2026-04-02T08:15:00Z",
            "scanLocation": {"city": "Chicago", "stateOrProvinceCode": "IL"}
        });
        let hook = adapter().parse_webhook(&payload).unwrap();
        assert_eq!(hook.event.status, Some(ShipmentStatus::OutForDelivery));
        assert_eq!(hook.event.location.as_deref(), Some("Chicago, IL"));
        assert_eq!(hook.event.external_id, "794677799690:2026-04-02T08:15:00Z:OD");
    }

    #[test]
    fn test_parse_webhook_unknown_code_is_informational() {
        let payload = json!({
            "trackingNumber": "794677799690",
            "eventType": "WX",
            "eventDescription": "Weather delay possible",
            "timestamp": "2026-04-02T08:15:00Z"
        });
        let hook = adapter().parse_webhook(&payload).unwrap();
        assert_eq!(hook.event.kind, TrackingEventKind::Info);
        assert_eq!(hook.event.status, None);
    }

    #[test]
    fn test_parse_webhook_rejects_foreign_tracking_number() {
        let payload = json!({
            "trackingNumber": "1Z5R89390357567127",
            "eventType": "DL",
            "timestamp": "2026-04-02T08:15:00Z"
        });
        let err = adapter().parse_webhook(&payload).unwrap_err();
        assert!(matches!(err, CarrierError::InvalidTrackingNumber { .. }));
    }
}
