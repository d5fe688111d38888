//! Caller-facing shipment services.
//!
//! These wrap the reconciler for the admin app and webhook endpoint:
//! registration, manual status updates, webhook ingestion, and review
//! resolution. Preconditions that belong to the human workflow (the
//! required note on terminal statuses) are enforced here, before any
//! candidate event is constructed.

use chrono::{DateTime, Utc};
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, instrument, warn};

use freightdesk_carrier::{CarrierError, CarrierRegistry, CarrierType, TrackingEventKind};
use freightdesk_core::{ActorId, ShipmentEventId, ShipmentId, ShipmentStatus};

use crate::error::{TrackingError, TrackingResult};
use crate::model::{EventSource, Shipment, ShipmentEvent};
use crate::reconciler::{CandidateEvent, EventReconciler, ReconcileOutcome};
use crate::store::{ShipmentStore, StoreError};

/// Registers new shipments.
pub struct ShipmentIntake {
    registry: Arc<CarrierRegistry>,
    store: Arc<dyn ShipmentStore>,
    reconciler: Arc<EventReconciler>,
}

impl ShipmentIntake {
    #[must_use]
    pub fn new(
        registry: Arc<CarrierRegistry>,
        store: Arc<dyn ShipmentStore>,
        reconciler: Arc<EventReconciler>,
    ) -> Self {
        Self {
            registry,
            store,
            reconciler,
        }
    }

    /// Register a shipment for tracking.
    ///
    /// The tracking number must match the carrier's format and must not
    /// already be registered. The shipment starts `pending` with a
    /// `creation` event in its log; route details are filled in from
    /// the carrier when available, but a failed detail lookup does not
    /// block registration.
    #[instrument(skip(self), fields(carrier = %carrier, tracking_number = %tracking_number))]
    pub async fn register_shipment(
        &self,
        carrier: CarrierType,
        tracking_number: &str,
    ) -> TrackingResult<Shipment> {
        let adapter = self.registry.get_adapter(carrier).await?;

        if !adapter.validate_tracking_number(tracking_number) {
            return Err(CarrierError::invalid_tracking(carrier, tracking_number).into());
        }

        if self
            .store
            .find_by_carrier_reference(carrier, tracking_number)
            .await?
            .is_some()
        {
            return Err(TrackingError::shipment_exists(carrier, tracking_number));
        }

        let mut shipment = Shipment::new(carrier, tracking_number);
        match adapter.get_shipment_details(tracking_number).await {
            Ok(details) => {
                shipment.origin = details.origin;
                shipment.destination = details.destination;
                shipment.estimated_delivery = details.estimated_delivery;
            }
            Err(e) => {
                warn!(error = %e, "Could not enrich shipment with carrier details");
            }
        }

        let shipment_id = shipment.id;
        let created_at = shipment.created_at;
        self.store.insert_shipment(shipment).await?;

        let creation = CandidateEvent {
            kind: TrackingEventKind::Creation,
            status: Some(ShipmentStatus::Pending),
            description: "Shipment registered".to_string(),
            location: None,
            event_time: created_at,
            source: EventSource::Api,
            source_id: None,
            external_id: None,
        };
        self.reconciler.reconcile(shipment_id, creation).await?;

        let shipment = self.store.load_shipment(shipment_id).await?;
        info!(
            shipment_id = %shipment.id,
            tracking_code = %shipment.tracking_code,
            "Registered shipment"
        );
        Ok(shipment)
    }
}

/// A staff-entered status change.
#[derive(Debug, Clone)]
pub struct ManualUpdateRequest {
    /// Shipment to update.
    pub shipment_id: ShipmentId,
    /// Status the staff member asserts.
    pub new_status: ShipmentStatus,
    /// Free-text note; required for terminal statuses.
    pub note: Option<String>,
    /// Location, when known.
    pub location: Option<String>,
    /// When the change happened; defaults to now.
    pub event_time: Option<DateTime<Utc>>,
    /// Staff member making the change.
    pub actor: ActorId,
}

impl ManualUpdateRequest {
    #[must_use]
    pub fn new(shipment_id: ShipmentId, new_status: ShipmentStatus, actor: ActorId) -> Self {
        Self {
            shipment_id,
            new_status,
            note: None,
            location: None,
            event_time: None,
            actor,
        }
    }

    /// Attach a note.
    #[must_use]
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    /// Attach a location.
    #[must_use]
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    /// Set an explicit event time.
    #[must_use]
    pub fn with_event_time(mut self, event_time: DateTime<Utc>) -> Self {
        self.event_time = Some(event_time);
        self
    }
}

/// Applies staff status changes through the reconciler.
pub struct ManualUpdateService {
    reconciler: Arc<EventReconciler>,
}

impl ManualUpdateService {
    #[must_use]
    pub fn new(reconciler: Arc<EventReconciler>) -> Self {
        Self { reconciler }
    }

    /// Apply a manual status change.
    ///
    /// `delivered` and `cancelled` require a non-blank note; the
    /// request is rejected with [`TrackingError::MissingRequiredNote`]
    /// before any event is constructed. Illegal transitions surface as
    /// [`TrackingError::InvalidTransition`]; nothing is persisted on
    /// either rejection.
    #[instrument(
        skip(self, request),
        fields(shipment_id = %request.shipment_id, new_status = %request.new_status)
    )]
    pub async fn apply(&self, request: ManualUpdateRequest) -> TrackingResult<ReconcileOutcome> {
        let note = request
            .note
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty());

        if request.new_status.is_terminal() && note.is_none() {
            return Err(TrackingError::missing_required_note(request.new_status));
        }

        let description = note.map_or_else(
            || format!("Status set to {} by staff", request.new_status),
            ToString::to_string,
        );
        let event_time = request.event_time.unwrap_or_else(Utc::now);

        let mut candidate =
            CandidateEvent::manual(request.new_status, description, request.actor, event_time);
        if let Some(location) = request.location {
            candidate = candidate.with_location(location);
        }

        self.reconciler.reconcile(request.shipment_id, candidate).await
    }
}

/// Ingests carrier webhook pushes.
pub struct WebhookIngest {
    registry: Arc<CarrierRegistry>,
    store: Arc<dyn ShipmentStore>,
    reconciler: Arc<EventReconciler>,
}

impl WebhookIngest {
    #[must_use]
    pub fn new(
        registry: Arc<CarrierRegistry>,
        store: Arc<dyn ShipmentStore>,
        reconciler: Arc<EventReconciler>,
    ) -> Self {
        Self {
            registry,
            store,
            reconciler,
        }
    }

    /// Translate a raw webhook payload and reconcile its event.
    ///
    /// The shipment is located by carrier and tracking number; pushes
    /// for unknown shipments fail with
    /// [`TrackingError::ShipmentNotFound`]. Status assertions follow
    /// the same rules as polled events.
    #[instrument(skip(self, payload), fields(carrier = %carrier))]
    pub async fn ingest(
        &self,
        carrier: CarrierType,
        payload: &Value,
    ) -> TrackingResult<ReconcileOutcome> {
        let adapter = self.registry.get_adapter(carrier).await?;
        let webhook = adapter.parse_webhook(payload)?;

        let shipment = self
            .store
            .find_by_carrier_reference(carrier, &webhook.tracking_number)
            .await?
            .ok_or_else(|| TrackingError::shipment_not_found(webhook.tracking_number.clone()))?;

        info!(
            shipment_id = %shipment.id,
            tracking_number = %webhook.tracking_number,
            "Ingesting webhook event"
        );
        self.reconciler
            .reconcile(shipment.id, CandidateEvent::from_webhook(&webhook.event))
            .await
    }
}

/// Resolves shipments flagged for human review.
pub struct ReviewService {
    store: Arc<dyn ShipmentStore>,
}

impl ReviewService {
    #[must_use]
    pub fn new(store: Arc<dyn ShipmentStore>) -> Self {
        Self { store }
    }

    /// Clear the review flag, recording who resolved it and why.
    ///
    /// A shipment that is not flagged resolves as a no-op: no event is
    /// appended and the flag stays clear.
    #[instrument(skip(self, note), fields(shipment_id = %shipment_id, actor = %actor))]
    pub async fn resolve(
        &self,
        shipment_id: ShipmentId,
        actor: ActorId,
        note: impl Into<String>,
    ) -> TrackingResult<()> {
        let shipment = self
            .store
            .load_shipment(shipment_id)
            .await
            .map_err(|e| match e {
                StoreError::NotFound { .. } => {
                    TrackingError::shipment_not_found(shipment_id.to_string())
                }
                other => TrackingError::from(other),
            })?;

        if !shipment.needs_review {
            return Ok(());
        }

        let now = Utc::now();
        let event = ShipmentEvent {
            id: ShipmentEventId::new(),
            shipment_id,
            kind: TrackingEventKind::Info,
            status: None,
            description: note.into(),
            location: None,
            event_time: now,
            recorded_at: now,
            source: EventSource::Manual,
            source_id: Some(actor),
            external_id: None,
            conflicts: Vec::new(),
            status_discarded: false,
        };
        self.store.append_event(shipment_id, event, None, false).await?;
        self.store.set_needs_review(shipment_id, false).await?;

        info!("Review resolved");
        Ok(())
    }
}
