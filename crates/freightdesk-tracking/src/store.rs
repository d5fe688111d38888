//! Shipment persistence.
//!
//! Provides the [`ShipmentStore`] trait the engine runs against and an
//! in-memory implementation backing tests and the sandbox deployment.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use thiserror::Error;
use tokio::sync::RwLock;

use freightdesk_carrier::CarrierType;
use freightdesk_core::{ShipmentId, ShipmentStatus};

use crate::model::{ApiSyncStatus, Shipment, ShipmentEvent};

/// Errors raised by shipment storage.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The requested record does not exist.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Kind of record looked up.
        entity: &'static str,
        /// Identifier used in the lookup.
        id: String,
    },

    /// A uniqueness constraint was violated.
    #[error("store conflict: {message}")]
    Conflict { message: String },

    /// The storage backend failed.
    #[error("storage backend error: {message}")]
    Backend { message: String },
}

impl StoreError {
    /// Creates a not found error.
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }

    /// Creates a conflict error.
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }

    /// Creates a backend error.
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend {
            message: message.into(),
        }
    }

    /// True when retrying the operation later could succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Backend { .. })
    }
}

/// Storage contract for shipments and their event logs.
///
/// The event log is append-only. `append_event` must apply the event,
/// the optional status change, and the review flag as one atomic write
/// so no reader observes an event without its status effect.
#[async_trait]
pub trait ShipmentStore: Send + Sync {
    /// Insert a newly registered shipment.
    async fn insert_shipment(&self, shipment: Shipment) -> Result<(), StoreError>;

    /// Load a shipment by id.
    async fn load_shipment(&self, id: ShipmentId) -> Result<Shipment, StoreError>;

    /// Look up a shipment by carrier and carrier tracking number.
    async fn find_by_carrier_reference(
        &self,
        carrier: CarrierType,
        tracking_number: &str,
    ) -> Result<Option<Shipment>, StoreError>;

    /// List every shipment, in no particular order.
    async fn list_shipments(&self) -> Result<Vec<Shipment>, StoreError>;

    /// Append an accepted event and apply its effects atomically.
    ///
    /// `new_status` moves the shipment when present. `flag_review` sets
    /// the review flag when true; a false value leaves the flag
    /// untouched, clearing it is an explicit review action via
    /// [`ShipmentStore::set_needs_review`].
    async fn append_event(
        &self,
        shipment_id: ShipmentId,
        event: ShipmentEvent,
        new_status: Option<ShipmentStatus>,
        flag_review: bool,
    ) -> Result<(), StoreError>;

    /// All events for a shipment, ascending by event time. Events with
    /// equal event times keep their acceptance order.
    async fn events_for(&self, shipment_id: ShipmentId) -> Result<Vec<ShipmentEvent>, StoreError>;

    /// Events whose event time is at or after `since`, same ordering as
    /// [`ShipmentStore::events_for`].
    ///
    /// The reconciler always folds full history; this is the bounded
    /// read for backends where a shipment's log grows too large to load
    /// whole (conflict windows, audit pages).
    async fn events_since(
        &self,
        shipment_id: ShipmentId,
        since: DateTime<Utc>,
    ) -> Result<Vec<ShipmentEvent>, StoreError>;

    /// Record the outcome of a carrier API sync attempt.
    async fn record_sync_outcome(
        &self,
        shipment_id: ShipmentId,
        status: ApiSyncStatus,
        error: Option<String>,
        synced_at: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    /// Set or clear the review flag.
    async fn set_needs_review(
        &self,
        shipment_id: ShipmentId,
        needs_review: bool,
    ) -> Result<(), StoreError>;

    /// Non-terminal shipments never synced or last synced before
    /// `older_than`.
    async fn list_due_for_sync(
        &self,
        older_than: DateTime<Utc>,
    ) -> Result<Vec<Shipment>, StoreError>;
}

#[derive(Debug, Default)]
struct Inner {
    shipments: HashMap<ShipmentId, Shipment>,
    // Insertion order; sorted views are built per read.
    events: HashMap<ShipmentId, Vec<ShipmentEvent>>,
    by_carrier_ref: HashMap<(CarrierType, String), ShipmentId>,
}

/// In-memory shipment store.
///
/// A single lock guards shipments, events, and the carrier reference
/// index so `append_event` is atomic across all three.
#[derive(Debug, Default)]
pub struct InMemoryShipmentStore {
    inner: RwLock<Inner>,
}

impl InMemoryShipmentStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn sorted(mut events: Vec<ShipmentEvent>) -> Vec<ShipmentEvent> {
        // Stable sort keeps acceptance order for equal event times.
        events.sort_by_key(|e| e.event_time);
        events
    }
}

#[async_trait]
impl ShipmentStore for InMemoryShipmentStore {
    async fn insert_shipment(&self, shipment: Shipment) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        let ref_key = (shipment.carrier, shipment.carrier_tracking_number.clone());

        if inner.shipments.contains_key(&shipment.id) {
            return Err(StoreError::conflict(format!(
                "shipment {} already exists",
                shipment.id
            )));
        }
        if inner.by_carrier_ref.contains_key(&ref_key) {
            return Err(StoreError::conflict(format!(
                "{} tracking number '{}' already registered",
                ref_key.0, ref_key.1
            )));
        }

        tracing::debug!(
            shipment_id = %shipment.id,
            carrier = %shipment.carrier,
            tracking_number = %shipment.carrier_tracking_number,
            "Stored new shipment"
        );

        inner.by_carrier_ref.insert(ref_key, shipment.id);
        inner.events.insert(shipment.id, Vec::new());
        inner.shipments.insert(shipment.id, shipment);
        Ok(())
    }

    async fn load_shipment(&self, id: ShipmentId) -> Result<Shipment, StoreError> {
        let inner = self.inner.read().await;
        inner
            .shipments
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("shipment", id.to_string()))
    }

    async fn find_by_carrier_reference(
        &self,
        carrier: CarrierType,
        tracking_number: &str,
    ) -> Result<Option<Shipment>, StoreError> {
        let inner = self.inner.read().await;
        let id = inner
            .by_carrier_ref
            .get(&(carrier, tracking_number.to_string()));
        Ok(id.and_then(|id| inner.shipments.get(id).cloned()))
    }

    async fn list_shipments(&self) -> Result<Vec<Shipment>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner.shipments.values().cloned().collect())
    }

    async fn append_event(
        &self,
        shipment_id: ShipmentId,
        event: ShipmentEvent,
        new_status: Option<ShipmentStatus>,
        flag_review: bool,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;

        let shipment = inner
            .shipments
            .get_mut(&shipment_id)
            .ok_or_else(|| StoreError::not_found("shipment", shipment_id.to_string()))?;

        if let Some(status) = new_status {
            shipment.status = status;
        }
        if flag_review {
            shipment.needs_review = true;
        }
        shipment.updated_at = Utc::now();

        inner.events.entry(shipment_id).or_default().push(event);
        Ok(())
    }

    async fn events_for(&self, shipment_id: ShipmentId) -> Result<Vec<ShipmentEvent>, StoreError> {
        let inner = self.inner.read().await;
        let events = inner
            .events
            .get(&shipment_id)
            .ok_or_else(|| StoreError::not_found("shipment", shipment_id.to_string()))?;
        Ok(Self::sorted(events.clone()))
    }

    async fn events_since(
        &self,
        shipment_id: ShipmentId,
        since: DateTime<Utc>,
    ) -> Result<Vec<ShipmentEvent>, StoreError> {
        let events = self.events_for(shipment_id).await?;
        Ok(events
            .into_iter()
            .filter(|e| e.event_time >= since)
            .collect())
    }

    async fn record_sync_outcome(
        &self,
        shipment_id: ShipmentId,
        status: ApiSyncStatus,
        error: Option<String>,
        synced_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        let shipment = inner
            .shipments
            .get_mut(&shipment_id)
            .ok_or_else(|| StoreError::not_found("shipment", shipment_id.to_string()))?;

        shipment.api_sync_status = status;
        shipment.api_error = error;
        shipment.last_api_sync = Some(synced_at);
        shipment.updated_at = Utc::now();
        Ok(())
    }

    async fn set_needs_review(
        &self,
        shipment_id: ShipmentId,
        needs_review: bool,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        let shipment = inner
            .shipments
            .get_mut(&shipment_id)
            .ok_or_else(|| StoreError::not_found("shipment", shipment_id.to_string()))?;

        shipment.needs_review = needs_review;
        shipment.updated_at = Utc::now();
        Ok(())
    }

    async fn list_due_for_sync(
        &self,
        older_than: DateTime<Utc>,
    ) -> Result<Vec<Shipment>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner
            .shipments
            .values()
            .filter(|s| !s.is_terminal())
            .filter(|s| s.last_api_sync.is_none_or(|at| at < older_than))
            .cloned()
            .collect())
    }
}
