//! Event reconciliation.
//!
//! Every tracking event, regardless of source, passes through
//! [`EventReconciler::reconcile`] before it is persisted. The reconciler
//! owns the canonical shipment status: it deduplicates carrier events,
//! validates proposed status transitions, detects conflicts between
//! carrier feeds and manual overrides, and commits the event together
//! with its status effect in one atomic store write.
//!
//! Reconciliation for one shipment is single-writer: a per-shipment
//! async lock serializes concurrent submissions (a webhook arriving
//! mid-poll, two syncs racing) while different shipments proceed in
//! parallel.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use freightdesk_carrier::{CarrierTrackingEvent, TrackingEventKind};
use freightdesk_core::{ActorId, ShipmentEventId, ShipmentId, ShipmentStatus};

use crate::conflict::{ConflictRecord, RecentStatusChange};
use crate::error::{TrackingError, TrackingResult};
use crate::model::{EventSource, Shipment, ShipmentEvent};
use crate::store::{ShipmentStore, StoreError};

/// Reconciliation tuning knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcilerConfig {
    /// Hours of history inspected when comparing a carrier status
    /// against recent manual changes.
    #[serde(default = "default_conflict_lookback_hours")]
    pub conflict_lookback_hours: i64,

    /// Width of the rapid-change window in minutes.
    #[serde(default = "default_rapid_window_minutes")]
    pub rapid_window_minutes: i64,

    /// Strictly more status changes than this inside the window flags
    /// the incoming event.
    #[serde(default = "default_rapid_threshold")]
    pub rapid_threshold: u32,

    /// Maximum recent changes embedded in a rapid-change annotation.
    #[serde(default = "default_rapid_preview")]
    pub rapid_preview: usize,
}

fn default_conflict_lookback_hours() -> i64 {
    24
}

fn default_rapid_window_minutes() -> i64 {
    5
}

fn default_rapid_threshold() -> u32 {
    3
}

fn default_rapid_preview() -> usize {
    3
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            conflict_lookback_hours: default_conflict_lookback_hours(),
            rapid_window_minutes: default_rapid_window_minutes(),
            rapid_threshold: default_rapid_threshold(),
            rapid_preview: default_rapid_preview(),
        }
    }
}

impl ReconcilerConfig {
    /// Set the manual-conflict lookback in hours.
    #[must_use]
    pub fn with_conflict_lookback_hours(mut self, hours: i64) -> Self {
        self.conflict_lookback_hours = hours;
        self
    }

    /// Set the rapid-change window in minutes.
    #[must_use]
    pub fn with_rapid_window_minutes(mut self, minutes: i64) -> Self {
        self.rapid_window_minutes = minutes;
        self
    }

    /// Set the rapid-change threshold.
    #[must_use]
    pub fn with_rapid_threshold(mut self, threshold: u32) -> Self {
        self.rapid_threshold = threshold;
        self
    }

    /// Set the rapid-change preview cap.
    #[must_use]
    pub fn with_rapid_preview(mut self, preview: usize) -> Self {
        self.rapid_preview = preview;
        self
    }

    /// Manual-conflict lookback as a duration.
    #[must_use]
    pub fn conflict_lookback(&self) -> Duration {
        Duration::hours(self.conflict_lookback_hours)
    }

    /// Rapid-change window as a duration.
    #[must_use]
    pub fn rapid_window(&self) -> Duration {
        Duration::minutes(self.rapid_window_minutes)
    }
}

/// An event submitted for reconciliation, before acceptance.
#[derive(Debug, Clone)]
pub struct CandidateEvent {
    /// Kind of event.
    pub kind: TrackingEventKind,
    /// Status the event asserts, if any.
    pub status: Option<ShipmentStatus>,
    /// Human-readable description.
    pub description: String,
    /// Location, when reported.
    pub location: Option<String>,
    /// When the event happened according to its source.
    pub event_time: DateTime<Utc>,
    /// Where the event came from.
    pub source: EventSource,
    /// Staff member behind a manual event.
    pub source_id: Option<ActorId>,
    /// Carrier event identity, used for deduplication.
    pub external_id: Option<String>,
}

impl CandidateEvent {
    /// Candidate from a polled carrier event.
    #[must_use]
    pub fn from_carrier(event: &CarrierTrackingEvent) -> Self {
        Self {
            kind: event.kind,
            status: event.status,
            description: event.description.clone(),
            location: event.location.clone(),
            event_time: event.event_time,
            source: EventSource::Api,
            source_id: None,
            external_id: Some(event.external_id.clone()),
        }
    }

    /// Candidate from a webhook-delivered carrier event.
    #[must_use]
    pub fn from_webhook(event: &CarrierTrackingEvent) -> Self {
        Self {
            source: EventSource::Webhook,
            ..Self::from_carrier(event)
        }
    }

    /// Candidate for a manual status change entered by staff.
    pub fn manual(
        status: ShipmentStatus,
        description: impl Into<String>,
        actor: ActorId,
        event_time: DateTime<Utc>,
    ) -> Self {
        Self {
            kind: TrackingEventKind::StatusChange,
            status: Some(status),
            description: description.into(),
            location: None,
            event_time,
            source: EventSource::Manual,
            source_id: Some(actor),
            external_id: None,
        }
    }

    /// Attach a location.
    #[must_use]
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }
}

/// What reconciliation did with a candidate.
#[derive(Debug)]
pub enum ReconcileOutcome {
    /// Event accepted and appended. `new_status` is the status applied
    /// to the shipment, `None` for informational acceptance.
    Accepted {
        event: ShipmentEvent,
        new_status: Option<ShipmentStatus>,
    },
    /// Carrier event identity already recorded; nothing persisted.
    Duplicate,
}

impl ReconcileOutcome {
    /// True when the candidate was dropped as a duplicate.
    #[must_use]
    pub fn is_duplicate(&self) -> bool {
        matches!(self, Self::Duplicate)
    }

    /// The accepted event, when one was persisted.
    #[must_use]
    pub fn accepted_event(&self) -> Option<&ShipmentEvent> {
        match self {
            Self::Accepted { event, .. } => Some(event),
            Self::Duplicate => None,
        }
    }
}

/// The single funnel every tracking event passes through.
pub struct EventReconciler {
    store: Arc<dyn ShipmentStore>,
    config: ReconcilerConfig,
    // Entries are never evicted; the map is bounded by the shipment
    // population.
    locks: Mutex<HashMap<ShipmentId, Arc<Mutex<()>>>>,
}

impl EventReconciler {
    /// Create a reconciler with default configuration.
    #[must_use]
    pub fn new(store: Arc<dyn ShipmentStore>) -> Self {
        Self::with_config(store, ReconcilerConfig::default())
    }

    /// Create a reconciler with explicit configuration.
    #[must_use]
    pub fn with_config(store: Arc<dyn ShipmentStore>, config: ReconcilerConfig) -> Self {
        Self {
            store,
            config,
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Run a candidate event through the reconciliation pipeline.
    ///
    /// Accepted events are appended together with their status effect
    /// and review flag in one atomic store write. Duplicates are
    /// dropped without persistence. A manual candidate proposing an
    /// illegal transition is rejected with
    /// [`TrackingError::InvalidTransition`] and persists nothing.
    #[instrument(
        skip(self, candidate),
        fields(shipment_id = %shipment_id, source = %candidate.source, kind = %candidate.kind)
    )]
    pub async fn reconcile(
        &self,
        shipment_id: ShipmentId,
        candidate: CandidateEvent,
    ) -> TrackingResult<ReconcileOutcome> {
        let shipment_lock = self.lock_for(shipment_id).await;
        let _guard = shipment_lock.lock().await;

        let shipment = self.load(shipment_id).await?;
        let history = self.store.events_for(shipment_id).await?;

        if let Some(external_id) = &candidate.external_id {
            if history
                .iter()
                .any(|e| e.external_id.as_deref() == Some(external_id))
            {
                debug!(external_id = %external_id, "Duplicate carrier event ignored");
                return Ok(ReconcileOutcome::Duplicate);
            }
        }

        let changes = status_changes(&history);
        let mut status_discarded = false;

        let apply_status = match candidate.status {
            None => None,
            // Idempotent re-assertion: accepted, but not a transition
            // for conflict-detection purposes.
            Some(target) if target == shipment.status => None,
            Some(target) if shipment.status.can_transition_to(&target) => Some(target),
            Some(target) => match candidate.source {
                EventSource::Manual => {
                    return Err(TrackingError::invalid_transition(shipment.status, target));
                }
                EventSource::Api | EventSource::Webhook => {
                    // Carrier truth wins over a recent manual override:
                    // when the current status came from a manual change
                    // inside the lookback window, the carrier status
                    // applies despite the transition table and the
                    // disagreement is surfaced for review.
                    if self.current_set_by_recent_manual(&changes, candidate.event_time) {
                        warn!(
                            from = %shipment.status,
                            to = %target,
                            "Carrier feed overrides recent manual status"
                        );
                        Some(target)
                    } else {
                        warn!(
                            discarded = %target,
                            current = %shipment.status,
                            "Invalid carrier status transition kept as informational"
                        );
                        status_discarded = true;
                        None
                    }
                }
            },
        };

        let mut conflicts = Vec::new();
        if let Some(applied) = apply_status {
            if candidate.source.is_carrier_feed() {
                if let Some(conflict) =
                    self.manual_disagreement(&changes, applied, candidate.event_time)
                {
                    warn!(
                        conflict = %conflict.kind(),
                        status = %applied,
                        "Carrier status disagrees with a recent manual change"
                    );
                    conflicts.push(conflict);
                }
            }
            if let Some(conflict) = self.rapid_thrash(&changes, applied, &candidate) {
                warn!(conflict = %conflict.kind(), "Shipment status is changing rapidly");
                conflicts.push(conflict);
            }
        }

        let flag_review = !conflicts.is_empty();
        let event = ShipmentEvent {
            id: ShipmentEventId::new(),
            shipment_id,
            kind: candidate.kind,
            status: if status_discarded {
                None
            } else {
                candidate.status
            },
            description: candidate.description,
            location: candidate.location,
            event_time: candidate.event_time,
            recorded_at: Utc::now(),
            source: candidate.source,
            source_id: candidate.source_id,
            external_id: candidate.external_id,
            conflicts,
            status_discarded,
        };

        self.store
            .append_event(shipment_id, event.clone(), apply_status, flag_review)
            .await?;

        info!(
            event_id = %event.id,
            new_status = ?apply_status,
            flagged = flag_review,
            informational = status_discarded,
            "Accepted shipment event"
        );

        Ok(ReconcileOutcome::Accepted {
            event,
            new_status: apply_status,
        })
    }

    async fn lock_for(&self, shipment_id: ShipmentId) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks
            .entry(shipment_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    async fn load(&self, shipment_id: ShipmentId) -> TrackingResult<Shipment> {
        self.store
            .load_shipment(shipment_id)
            .await
            .map_err(|e| match e {
                StoreError::NotFound { .. } => {
                    TrackingError::shipment_not_found(shipment_id.to_string())
                }
                other => TrackingError::from(other),
            })
    }

    /// True when the latest status change is manual and falls inside
    /// the lookback window ending at the candidate's event time.
    fn current_set_by_recent_manual(
        &self,
        changes: &[RecentStatusChange],
        candidate_time: DateTime<Utc>,
    ) -> bool {
        let window_start = candidate_time - self.config.conflict_lookback();
        changes.last().is_some_and(|change| {
            change.source == EventSource::Manual
                && change.event_time >= window_start
                && change.event_time <= candidate_time
        })
    }

    /// The most recent manual status change inside the lookback window
    /// that disagrees with the applied carrier status.
    fn manual_disagreement(
        &self,
        changes: &[RecentStatusChange],
        applied: ShipmentStatus,
        candidate_time: DateTime<Utc>,
    ) -> Option<ConflictRecord> {
        let window_start = candidate_time - self.config.conflict_lookback();
        changes
            .iter()
            .filter(|change| {
                change.source == EventSource::Manual
                    && change.status != applied
                    && change.event_time >= window_start
                    && change.event_time <= candidate_time
            })
            .max_by_key(|change| change.event_time)
            .map(|manual| ConflictRecord::ApiManualConflict {
                api_status: applied,
                manual_status: manual.status,
                manual_event_time: manual.event_time,
            })
    }

    /// Flags when, counting the incoming change, strictly more status
    /// changes than the threshold fall inside the trailing window.
    fn rapid_thrash(
        &self,
        changes: &[RecentStatusChange],
        applied: ShipmentStatus,
        candidate: &CandidateEvent,
    ) -> Option<ConflictRecord> {
        let window_start = candidate.event_time - self.config.rapid_window();
        let mut in_window: Vec<RecentStatusChange> = changes
            .iter()
            .filter(|change| {
                change.event_time >= window_start && change.event_time <= candidate.event_time
            })
            .cloned()
            .collect();

        let observed = in_window.len() as u32 + 1;
        if observed <= self.config.rapid_threshold {
            return None;
        }

        in_window.sort_by_key(|change| change.event_time);
        let mut recent = vec![RecentStatusChange {
            status: applied,
            source: candidate.source,
            event_time: candidate.event_time,
        }];
        recent.extend(in_window.into_iter().rev());
        recent.truncate(self.config.rapid_preview);

        Some(ConflictRecord::RapidStatusChanges {
            observed,
            window_minutes: self.config.rapid_window_minutes,
            recent,
        })
    }
}

/// Reconstruct the shipment's status changes by folding accepted
/// assertions in acceptance order. Re-assertions of the standing status
/// (including the creation event) are not changes.
fn status_changes(history: &[ShipmentEvent]) -> Vec<RecentStatusChange> {
    let mut by_acceptance: Vec<&ShipmentEvent> = history.iter().collect();
    by_acceptance.sort_by_key(|e| e.recorded_at);

    let mut current = ShipmentStatus::Pending;
    let mut changes = Vec::new();
    for event in by_acceptance {
        if !event.asserts_status() {
            continue;
        }
        if let Some(status) = event.status {
            if status != current {
                changes.push(RecentStatusChange {
                    status,
                    source: event.source,
                    event_time: event.event_time,
                });
                current = status;
            }
        }
    }
    changes
}
