//! Normalized tracking data returned by carrier adapters.
//!
//! Every adapter translates its carrier's response shapes into these
//! types so the rest of the engine never sees carrier-specific fields.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use thiserror::Error;

use freightdesk_core::ShipmentStatus;

use crate::types::CarrierType;

/// Error returned when parsing an unknown event kind.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid tracking event kind: {value}")]
pub struct ParseTrackingEventKindError {
    /// The string that failed to parse.
    pub value: String,
}

/// Kind of tracking event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackingEventKind {
    /// Shipment registered in FreightDesk.
    Creation,
    /// Canonical status changed (or was asserted).
    StatusChange,
    /// Package scanned at a new location, status unchanged.
    LocationUpdate,
    /// Carrier attempted delivery without completing it.
    DeliveryAttempt,
    /// Carrier reported a problem.
    Exception,
    /// Informational note with no tracking semantics.
    Info,
}

impl TrackingEventKind {
    /// Returns the kind as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Creation => "creation",
            Self::StatusChange => "status_change",
            Self::LocationUpdate => "location_update",
            Self::DeliveryAttempt => "delivery_attempt",
            Self::Exception => "exception",
            Self::Info => "info",
        }
    }
}

impl Display for TrackingEventKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for TrackingEventKind {
    type Err = ParseTrackingEventKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "creation" => Ok(Self::Creation),
            "status_change" => Ok(Self::StatusChange),
            "location_update" => Ok(Self::LocationUpdate),
            "delivery_attempt" => Ok(Self::DeliveryAttempt),
            "exception" => Ok(Self::Exception),
            "info" => Ok(Self::Info),
            _ => Err(ParseTrackingEventKindError {
                value: s.to_string(),
            }),
        }
    }
}

/// One tracking event as reported by a carrier, in normalized form.
///
/// `external_id` is the carrier's identity for the scan and is the
/// deduplication key used by the reconciler. Adapters that receive
/// payloads without a native event id synthesize a stable one from the
/// tracking number, timestamp and event code.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CarrierTrackingEvent {
    /// Carrier-assigned event identity.
    pub external_id: String,
    /// Kind of event.
    pub kind: TrackingEventKind,
    /// Status the carrier asserts with this event, if any.
    pub status: Option<ShipmentStatus>,
    /// Human-readable description from the carrier.
    pub description: String,
    /// Scan location, when reported.
    pub location: Option<String>,
    /// When the event happened according to the carrier.
    pub event_time: DateTime<Utc>,
}

impl CarrierTrackingEvent {
    /// Create a new tracking event.
    #[must_use]
    pub fn new(
        external_id: impl Into<String>,
        kind: TrackingEventKind,
        event_time: DateTime<Utc>,
    ) -> Self {
        Self {
            external_id: external_id.into(),
            kind,
            status: None,
            description: String::new(),
            location: None,
            event_time,
        }
    }

    /// Set the asserted status.
    #[must_use]
    pub fn with_status(mut self, status: ShipmentStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Set the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Set the scan location.
    #[must_use]
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }
}

/// Snapshot of a shipment as the carrier currently sees it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShipmentDetails {
    /// Carrier that produced the snapshot.
    pub carrier: CarrierType,
    /// Carrier tracking number.
    pub tracking_number: String,
    /// Current status according to the carrier.
    pub status: ShipmentStatus,
    /// Estimated delivery date, when the carrier publishes one.
    pub estimated_delivery: Option<DateTime<Utc>>,
    /// Origin city/region.
    pub origin: Option<String>,
    /// Destination city/region.
    pub destination: Option<String>,
    /// When the carrier last updated this snapshot.
    pub last_updated: DateTime<Utc>,
}

/// A webhook payload translated into normalized form.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookEvent {
    /// Carrier that sent the webhook.
    pub carrier: CarrierType,
    /// Carrier tracking number the event belongs to.
    pub tracking_number: String,
    /// The translated event.
    pub event: CarrierTrackingEvent,
}
