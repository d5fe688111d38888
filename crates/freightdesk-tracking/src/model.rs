//! Shipment and event models.
//!
//! [`ShipmentEvent`] rows form an append-only log: once accepted by the
//! reconciler an event is never edited or reordered, only annotated at
//! acceptance time. A shipment's `status` is always the status applied
//! by its most recently accepted status-changing event.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

use freightdesk_carrier::{CarrierType, TrackingEventKind};
use freightdesk_core::{ActorId, ShipmentEventId, ShipmentId, ShipmentStatus};

use crate::conflict::ConflictRecord;

/// Where an event came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventSource {
    /// Polled from a carrier API.
    Api,
    /// Entered by staff in the admin app.
    Manual,
    /// Pushed by a carrier webhook.
    Webhook,
}

impl EventSource {
    /// Returns the source as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Api => "api",
            Self::Manual => "manual",
            Self::Webhook => "webhook",
        }
    }

    /// True for sources that originate at the carrier.
    ///
    /// Carrier-originated events are treated as noisy but factual:
    /// invalid transitions are demoted to informational instead of
    /// rejected, and they form the carrier side of conflict detection.
    #[must_use]
    pub fn is_carrier_feed(&self) -> bool {
        matches!(self, Self::Api | Self::Webhook)
    }
}

impl Display for EventSource {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Outcome of the most recent carrier API sync for a shipment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiSyncStatus {
    /// Never synced.
    Pending,
    /// Last sync succeeded.
    Success,
    /// Last sync failed; see `api_error` on the shipment.
    Failed,
}

impl ApiSyncStatus {
    /// Returns the status as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Success => "success",
            Self::Failed => "failed",
        }
    }
}

impl Display for ApiSyncStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A tracked shipment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Shipment {
    /// Internal identifier.
    pub id: ShipmentId,
    /// FreightDesk reference code shown to staff and customers.
    pub tracking_code: String,
    /// Carrier moving the shipment.
    pub carrier: CarrierType,
    /// The carrier's own tracking number.
    pub carrier_tracking_number: String,
    /// Canonical status, owned by the reconciler.
    pub status: ShipmentStatus,
    /// Set when conflicting events were detected; cleared only by an
    /// explicit review resolution, never by the reconciler.
    pub needs_review: bool,
    /// Outcome of the most recent API sync.
    pub api_sync_status: ApiSyncStatus,
    /// Error message from the most recent failed sync.
    pub api_error: Option<String>,
    /// When the shipment was last synced against the carrier API.
    pub last_api_sync: Option<DateTime<Utc>>,
    /// Route origin, when known.
    pub origin: Option<String>,
    /// Route destination, when known.
    pub destination: Option<String>,
    /// Carrier's delivery estimate, when published.
    pub estimated_delivery: Option<DateTime<Utc>>,
    /// When the shipment was registered.
    pub created_at: DateTime<Utc>,
    /// When the shipment was last modified.
    pub updated_at: DateTime<Utc>,
}

impl Shipment {
    /// Register a new shipment in `Pending` status.
    #[must_use]
    pub fn new(carrier: CarrierType, carrier_tracking_number: impl Into<String>) -> Self {
        let id = ShipmentId::new();
        let now = Utc::now();
        Self {
            id,
            tracking_code: generate_tracking_code(&id),
            carrier,
            carrier_tracking_number: carrier_tracking_number.into(),
            status: ShipmentStatus::Pending,
            needs_review: false,
            api_sync_status: ApiSyncStatus::Pending,
            api_error: None,
            last_api_sync: None,
            origin: None,
            destination: None,
            estimated_delivery: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// True when the shipment reached a terminal status.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

/// Derive the staff-facing reference code from the shipment id.
fn generate_tracking_code(id: &ShipmentId) -> String {
    let hex = id.as_uuid().simple().to_string();
    format!("FD-{}", hex[..10].to_uppercase())
}

/// One accepted entry in a shipment's event log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShipmentEvent {
    /// Event identifier.
    pub id: ShipmentEventId,
    /// Shipment the event belongs to.
    pub shipment_id: ShipmentId,
    /// Kind of event.
    pub kind: TrackingEventKind,
    /// Status the event asserts, if any. Cleared when a carrier event's
    /// status portion was discarded as an invalid transition.
    pub status: Option<ShipmentStatus>,
    /// Human-readable description.
    pub description: String,
    /// Location, when reported.
    pub location: Option<String>,
    /// When the event happened according to its source.
    pub event_time: DateTime<Utc>,
    /// When the reconciler accepted the event. Non-decreasing with
    /// insertion order.
    pub recorded_at: DateTime<Utc>,
    /// Where the event came from.
    pub source: EventSource,
    /// Staff member who entered a manual event.
    pub source_id: Option<ActorId>,
    /// Carrier event identity; deduplication key for carrier feeds.
    pub external_id: Option<String>,
    /// Conflicts detected when this event was accepted.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conflicts: Vec<ConflictRecord>,
    /// True when the event proposed a status the state machine rejected
    /// and was kept as informational only.
    #[serde(default)]
    pub status_discarded: bool,
}

impl ShipmentEvent {
    /// True when the event asserted a status that was kept.
    #[must_use]
    pub fn asserts_status(&self) -> bool {
        self.status.is_some() && !self.status_discarded
    }
}
