//! Shipment synchronization against carrier APIs.
//!
//! The orchestrator drives three entry points over one routine: a
//! single on-demand sync, an operator-selected batch, and the scheduled
//! sweep over everything due for refresh. Per-shipment failures are
//! recorded on the shipment and folded into the batch summary; they
//! never abort sibling shipments.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, info, instrument, warn};

use freightdesk_carrier::{CarrierConfig, CarrierRegistry};
use freightdesk_core::ShipmentId;

use crate::error::{TrackingError, TrackingResult};
use crate::model::ApiSyncStatus;
use crate::rate_limit::CarrierRateLimiters;
use crate::reconciler::{CandidateEvent, EventReconciler};
use crate::store::{ShipmentStore, StoreError};

/// Longest error message recorded on a shipment after a failed sync.
const MAX_RECORDED_ERROR_LEN: usize = 500;

/// Sync tuning knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Shipments synced concurrently within one batch.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Minutes after which a shipment is due for refresh.
    #[serde(default = "default_refresh_interval_minutes")]
    pub refresh_interval_minutes: i64,
}

fn default_concurrency() -> usize {
    4
}

fn default_refresh_interval_minutes() -> i64 {
    15
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            refresh_interval_minutes: default_refresh_interval_minutes(),
        }
    }
}

impl SyncConfig {
    /// Set the batch concurrency.
    #[must_use]
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Set the refresh interval in minutes.
    #[must_use]
    pub fn with_refresh_interval_minutes(mut self, minutes: i64) -> Self {
        self.refresh_interval_minutes = minutes;
        self
    }

    /// Refresh interval as a duration.
    #[must_use]
    pub fn refresh_interval(&self) -> Duration {
        Duration::minutes(self.refresh_interval_minutes)
    }
}

/// How a single shipment's sync ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncOutcomeStatus {
    /// Events fetched and reconciled.
    Succeeded,
    /// Adapter resolution, fetch, or reconciliation failed.
    Failed,
    /// Nothing to do: terminal shipment or cancelled batch.
    Skipped,
}

impl SyncOutcomeStatus {
    /// Returns the status as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
        }
    }
}

/// Per-shipment sync result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShipmentSyncOutcome {
    /// Shipment that was synced.
    pub shipment_id: ShipmentId,
    /// How the sync ended.
    pub status: SyncOutcomeStatus,
    /// Events newly accepted by the reconciler.
    pub new_events: usize,
    /// Failure or skip reason.
    pub message: Option<String>,
}

impl ShipmentSyncOutcome {
    /// Successful sync that accepted `new_events` events.
    #[must_use]
    pub fn succeeded(shipment_id: ShipmentId, new_events: usize) -> Self {
        Self {
            shipment_id,
            status: SyncOutcomeStatus::Succeeded,
            new_events,
            message: None,
        }
    }

    /// Failed sync with a reason.
    pub fn failed(shipment_id: ShipmentId, message: impl Into<String>) -> Self {
        Self {
            shipment_id,
            status: SyncOutcomeStatus::Failed,
            new_events: 0,
            message: Some(truncate_error(&message.into())),
        }
    }

    /// Skipped sync with a reason.
    pub fn skipped(shipment_id: ShipmentId, message: impl Into<String>) -> Self {
        Self {
            shipment_id,
            status: SyncOutcomeStatus::Skipped,
            new_events: 0,
            message: Some(message.into()),
        }
    }
}

/// Aggregate result of a batch sync.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncSummary {
    /// Shipments in the batch.
    pub total: usize,
    /// Shipments synced successfully.
    pub succeeded: usize,
    /// Shipments whose sync failed.
    pub failed: usize,
    /// Shipments skipped (terminal or cancelled).
    pub skipped: usize,
    /// True when the batch was cancelled before completing.
    pub cancelled: bool,
    /// Per-shipment outcomes, in submission order.
    pub outcomes: Vec<ShipmentSyncOutcome>,
}

impl SyncSummary {
    /// Empty summary for a batch of `total` shipments.
    #[must_use]
    pub fn new(total: usize) -> Self {
        Self {
            total,
            ..Self::default()
        }
    }

    /// Fold one shipment's outcome into the summary.
    pub fn add(&mut self, outcome: ShipmentSyncOutcome) {
        match outcome.status {
            SyncOutcomeStatus::Succeeded => self.succeeded += 1,
            SyncOutcomeStatus::Failed => self.failed += 1,
            SyncOutcomeStatus::Skipped => self.skipped += 1,
        }
        self.outcomes.push(outcome);
    }
}

struct SyncContext {
    registry: Arc<CarrierRegistry>,
    store: Arc<dyn ShipmentStore>,
    reconciler: Arc<EventReconciler>,
    limiters: CarrierRateLimiters,
    config: SyncConfig,
    cancelled: AtomicBool,
}

impl SyncContext {
    #[instrument(skip(self), fields(shipment_id = %shipment_id))]
    async fn sync_one(&self, shipment_id: ShipmentId) -> TrackingResult<ShipmentSyncOutcome> {
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

        if shipment.is_terminal() {
            debug!(status = %shipment.status, "Skipping sync for terminal shipment");
            return Ok(ShipmentSyncOutcome::skipped(
                shipment_id,
                format!("shipment is {}", shipment.status),
            ));
        }

        let adapter = match self.registry.get_adapter(shipment.carrier).await {
            Ok(adapter) => adapter,
            Err(e) => {
                warn!(carrier = %shipment.carrier, error = %e, "Could not resolve carrier adapter");
                return self.record_failure(shipment_id, &e.to_string()).await;
            }
        };

        // The limit is per carrier account, shared by every shipment on
        // that carrier.
        let requests_per_minute = self
            .registry
            .config_for(shipment.carrier)
            .await
            .map_or_else(
                || CarrierConfig::default().requests_per_minute,
                |c| c.requests_per_minute,
            );
        self.limiters
            .acquire(shipment.carrier, requests_per_minute)
            .await;

        let events = match adapter
            .get_tracking_events(&shipment.carrier_tracking_number)
            .await
        {
            Ok(events) => events,
            Err(e) => {
                warn!(carrier = %shipment.carrier, error = %e, "Tracking event fetch failed");
                return self.record_failure(shipment_id, &e.to_string()).await;
            }
        };

        // Diff by carrier event identity, not content, so re-polls stay
        // idempotent.
        let known: HashSet<String> = self
            .store
            .events_for(shipment_id)
            .await?
            .into_iter()
            .filter_map(|e| e.external_id)
            .collect();

        let mut fresh: Vec<_> = events
            .iter()
            .filter(|e| !known.contains(&e.external_id))
            .collect();
        fresh.sort_by_key(|e| e.event_time);

        let mut new_events = 0;
        for event in fresh {
            match self
                .reconciler
                .reconcile(shipment_id, CandidateEvent::from_carrier(event))
                .await
            {
                Ok(outcome) if !outcome.is_duplicate() => new_events += 1,
                Ok(_) => {}
                Err(e) => {
                    warn!(error = %e, "Reconciliation failed during sync");
                    return self.record_failure(shipment_id, &e.to_string()).await;
                }
            }
        }

        self.store
            .record_sync_outcome(shipment_id, ApiSyncStatus::Success, None, Utc::now())
            .await?;

        info!(new_events, "Shipment sync complete");
        Ok(ShipmentSyncOutcome::succeeded(shipment_id, new_events))
    }

    async fn record_failure(
        &self,
        shipment_id: ShipmentId,
        message: &str,
    ) -> TrackingResult<ShipmentSyncOutcome> {
        let truncated = truncate_error(message);
        self.store
            .record_sync_outcome(
                shipment_id,
                ApiSyncStatus::Failed,
                Some(truncated.clone()),
                Utc::now(),
            )
            .await?;
        Ok(ShipmentSyncOutcome::failed(shipment_id, truncated))
    }
}

fn truncate_error(message: &str) -> String {
    if message.len() <= MAX_RECORDED_ERROR_LEN {
        message.to_string()
    } else {
        message.chars().take(MAX_RECORDED_ERROR_LEN).collect()
    }
}

/// Drives shipment syncs against carrier adapters.
pub struct SyncOrchestrator {
    inner: Arc<SyncContext>,
}

impl SyncOrchestrator {
    /// Create an orchestrator with default configuration.
    #[must_use]
    pub fn new(
        registry: Arc<CarrierRegistry>,
        store: Arc<dyn ShipmentStore>,
        reconciler: Arc<EventReconciler>,
    ) -> Self {
        Self::with_config(registry, store, reconciler, SyncConfig::default())
    }

    /// Create an orchestrator with explicit configuration.
    #[must_use]
    pub fn with_config(
        registry: Arc<CarrierRegistry>,
        store: Arc<dyn ShipmentStore>,
        reconciler: Arc<EventReconciler>,
        config: SyncConfig,
    ) -> Self {
        Self {
            inner: Arc::new(SyncContext {
                registry,
                store,
                reconciler,
                limiters: CarrierRateLimiters::new(),
                config,
                cancelled: AtomicBool::new(false),
            }),
        }
    }

    /// Sync one shipment on demand.
    ///
    /// Terminal shipments come back `Skipped`. Carrier failures are
    /// recorded on the shipment and returned as a `Failed` outcome, not
    /// as an error; errors are reserved for unknown shipments and
    /// storage faults.
    pub async fn sync_shipment(
        &self,
        shipment_id: ShipmentId,
    ) -> TrackingResult<ShipmentSyncOutcome> {
        self.inner.sync_one(shipment_id).await
    }

    /// Sync a batch of shipments with bounded concurrency.
    ///
    /// Failures are isolated per shipment. After [`Self::cancel`] no
    /// further shipment starts; in-flight ones run to completion and
    /// their results stay committed.
    pub async fn sync_batch(&self, shipment_ids: Vec<ShipmentId>) -> SyncSummary {
        let mut summary = SyncSummary::new(shipment_ids.len());
        let semaphore = Arc::new(Semaphore::new(self.inner.config.concurrency));
        let mut handles = Vec::with_capacity(shipment_ids.len());

        for shipment_id in shipment_ids {
            // The semaphore is never closed while we hold it.
            let Ok(permit) = semaphore.clone().acquire_owned().await else {
                break;
            };

            if self.inner.cancelled.load(Ordering::SeqCst) {
                drop(permit);
                summary.cancelled = true;
                summary.add(ShipmentSyncOutcome::skipped(shipment_id, "sync cancelled"));
                continue;
            }

            let ctx = self.inner.clone();
            handles.push((
                shipment_id,
                tokio::spawn(async move {
                    let _permit = permit;
                    ctx.sync_one(shipment_id).await.unwrap_or_else(|e| {
                        ShipmentSyncOutcome::failed(shipment_id, e.to_string())
                    })
                }),
            ));
        }

        for (shipment_id, handle) in handles {
            match handle.await {
                Ok(outcome) => summary.add(outcome),
                Err(e) => {
                    warn!(shipment_id = %shipment_id, error = %e, "Sync task panicked");
                    summary.add(ShipmentSyncOutcome::failed(shipment_id, "sync task panicked"));
                }
            }
        }

        info!(
            total = summary.total,
            succeeded = summary.succeeded,
            failed = summary.failed,
            skipped = summary.skipped,
            cancelled = summary.cancelled,
            "Sync batch complete"
        );
        summary
    }

    /// Sync every shipment due for refresh as of `now`.
    pub async fn sync_due(&self, now: DateTime<Utc>) -> TrackingResult<SyncSummary> {
        let cutoff = now - self.inner.config.refresh_interval();
        let due = self.inner.store.list_due_for_sync(cutoff).await?;
        info!(count = due.len(), "Starting scheduled sync sweep");

        let ids = due.into_iter().map(|s| s.id).collect();
        Ok(self.sync_batch(ids).await)
    }

    /// Stop starting new shipments in current and future batches.
    ///
    /// Cancellation is sticky; build a fresh orchestrator for the next
    /// campaign.
    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::SeqCst);
    }

    /// True once [`Self::cancel`] has been called.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sync_config_defaults() {
        let config = SyncConfig::default();
        assert_eq!(config.concurrency, 4);
        assert_eq!(config.refresh_interval_minutes, 15);
        assert_eq!(config.refresh_interval(), Duration::minutes(15));
    }

    #[test]
    fn test_sync_config_builders() {
        let config = SyncConfig::default()
            .with_concurrency(8)
            .with_refresh_interval_minutes(30);
        assert_eq!(config.concurrency, 8);
        assert_eq!(config.refresh_interval(), Duration::minutes(30));

        // Zero concurrency would deadlock the batch semaphore.
        let config = SyncConfig::default().with_concurrency(0);
        assert_eq!(config.concurrency, 1);
    }

    #[test]
    fn test_summary_accumulation() {
        let mut summary = SyncSummary::new(3);
        summary.add(ShipmentSyncOutcome::succeeded(ShipmentId::new(), 2));
        summary.add(ShipmentSyncOutcome::failed(ShipmentId::new(), "boom"));
        summary.add(ShipmentSyncOutcome::skipped(ShipmentId::new(), "terminal"));

        assert_eq!(summary.total, 3);
        assert_eq!(summary.succeeded, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.skipped, 1);
        assert!(!summary.cancelled);
        assert_eq!(summary.outcomes.len(), 3);
    }

    #[test]
    fn test_failed_outcome_truncates_message() {
        let long = "x".repeat(2 * MAX_RECORDED_ERROR_LEN);
        let outcome = ShipmentSyncOutcome::failed(ShipmentId::new(), long);
        assert_eq!(
            outcome.message.map(|m| m.len()),
            Some(MAX_RECORDED_ERROR_LEN)
        );
    }

    #[test]
    fn test_truncate_error_short_passthrough() {
        assert_eq!(truncate_error("short"), "short");
    }
}
