//! Shared fixtures for the tracking integration tests.
//!
//! Provides a wired-up engine context, a scripted carrier adapter for
//! controlling what polls return, and compact builders for candidate
//! events so each test reads as its scenario.

#![allow(dead_code)]

use chrono::{DateTime, Utc};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Once};

use freightdesk_carrier::{
    async_trait, CarrierAdapter, CarrierError, CarrierRegistry, CarrierResult,
    CarrierTrackingEvent, CarrierType, ShipmentDetails, TrackingEventKind, WebhookEvent,
};
use freightdesk_core::{ActorId, ShipmentStatus};
use freightdesk_tracking::{
    CandidateEvent, EventReconciler, InMemoryShipmentStore, ManualUpdateService, ReconcilerConfig,
    ReviewService, Shipment, ShipmentIntake, ShipmentStore, SyncConfig, SyncOrchestrator,
    WebhookIngest,
};

static INIT: Once = Once::new();

/// Initialize logging for tests (once).
pub fn init_test_logging() {
    INIT.call_once(|| {
        if std::env::var("RUST_LOG").is_ok() {
            tracing_subscriber::fmt()
                .with_test_writer()
                .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
                .try_init()
                .ok();
        }
    });
}

/// Parse an RFC 3339 timestamp.
pub fn ts(value: &str) -> DateTime<Utc> {
    value.parse().expect("valid RFC 3339 timestamp")
}

/// A status-asserting carrier event with a fixed identity and time.
pub fn carrier_event(
    external_id: &str,
    status: ShipmentStatus,
    event_time: &str,
) -> CarrierTrackingEvent {
    CarrierTrackingEvent::new(external_id, TrackingEventKind::StatusChange, ts(event_time))
        .with_status(status)
        .with_description(format!("Carrier reported {status}"))
}

/// Candidate as the sync orchestrator would submit it.
pub fn api_candidate(external_id: &str, status: ShipmentStatus, event_time: &str) -> CandidateEvent {
    CandidateEvent::from_carrier(&carrier_event(external_id, status, event_time))
}

/// Candidate as the webhook endpoint would submit it.
pub fn webhook_candidate(
    external_id: &str,
    status: ShipmentStatus,
    event_time: &str,
) -> CandidateEvent {
    CandidateEvent::from_webhook(&carrier_event(external_id, status, event_time))
}

/// Candidate for a staff-entered status change by a fresh actor.
pub fn manual_candidate(status: ShipmentStatus, event_time: &str) -> CandidateEvent {
    CandidateEvent::manual(
        status,
        format!("Status set to {status} by staff"),
        ActorId::new(),
        ts(event_time),
    )
}

// ---------------------------------------------------------------------------
// ScriptedAdapter - a carrier whose history the test controls
// ---------------------------------------------------------------------------

/// Adapter returning a scripted event list instead of sandbox data.
///
/// Polls are counted so tests can assert whether the orchestrator
/// reached the carrier at all.
pub struct ScriptedAdapter {
    carrier: CarrierType,
    events: Mutex<Vec<CarrierTrackingEvent>>,
    fail_polls: AtomicBool,
    fail_details: AtomicBool,
    poll_calls: AtomicUsize,
}

impl ScriptedAdapter {
    pub fn new(carrier: CarrierType) -> Self {
        Self {
            carrier,
            events: Mutex::new(Vec::new()),
            fail_polls: AtomicBool::new(false),
            fail_details: AtomicBool::new(false),
            poll_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_events(self, events: Vec<CarrierTrackingEvent>) -> Self {
        *self.events.lock().unwrap() = events;
        self
    }

    /// Replace the scripted history.
    pub fn set_events(&self, events: Vec<CarrierTrackingEvent>) {
        *self.events.lock().unwrap() = events;
    }

    /// Make every subsequent poll fail as carrier-unavailable.
    pub fn fail_polls(&self) {
        self.fail_polls.store(true, Ordering::SeqCst);
    }

    /// Make detail lookups fail while polls keep working.
    pub fn fail_details(&self) {
        self.fail_details.store(true, Ordering::SeqCst);
    }

    /// Number of tracking-event polls served or refused.
    pub fn poll_count(&self) -> usize {
        self.poll_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CarrierAdapter for ScriptedAdapter {
    fn carrier_type(&self) -> CarrierType {
        self.carrier
    }

    fn display_name(&self) -> String {
        format!("Scripted {}", self.carrier.label())
    }

    fn validate_tracking_number(&self, tracking: &str) -> bool {
        !tracking.is_empty()
    }

    async fn get_shipment_details(&self, tracking: &str) -> CarrierResult<ShipmentDetails> {
        if self.fail_details.load(Ordering::SeqCst) {
            return Err(CarrierError::unavailable(self.carrier));
        }
        Ok(ShipmentDetails {
            carrier: self.carrier,
            tracking_number: tracking.to_string(),
            status: ShipmentStatus::Pending,
            estimated_delivery: None,
            origin: Some("Oakland, CA".to_string()),
            destination: Some("Denver, CO".to_string()),
            last_updated: Utc::now(),
        })
    }

    async fn get_tracking_events(
        &self,
        _tracking: &str,
    ) -> CarrierResult<Vec<CarrierTrackingEvent>> {
        self.poll_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_polls.load(Ordering::SeqCst) {
            return Err(CarrierError::unavailable(self.carrier));
        }
        Ok(self.events.lock().unwrap().clone())
    }

    fn parse_webhook(&self, _payload: &Value) -> CarrierResult<WebhookEvent> {
        Err(CarrierError::webhook_parse(
            self.carrier,
            "scripted adapter has no webhook format",
        ))
    }
}

// ---------------------------------------------------------------------------
// TestContext - the engine wired against the in-memory store
// ---------------------------------------------------------------------------

/// Registry, store, and reconciler assembled the way production wires
/// them, minus any carrier configuration.
pub struct TestContext {
    pub registry: Arc<CarrierRegistry>,
    pub store: Arc<InMemoryShipmentStore>,
    pub reconciler: Arc<EventReconciler>,
}

impl TestContext {
    pub fn new() -> Self {
        Self::with_reconciler_config(ReconcilerConfig::default())
    }

    pub fn with_reconciler_config(config: ReconcilerConfig) -> Self {
        init_test_logging();
        let registry = Arc::new(CarrierRegistry::new());
        let store = Arc::new(InMemoryShipmentStore::new());
        let reconciler = Arc::new(EventReconciler::with_config(store.clone(), config));
        Self {
            registry,
            store,
            reconciler,
        }
    }

    /// The store as the trait object the services take.
    pub fn store(&self) -> Arc<dyn ShipmentStore> {
        self.store.clone()
    }

    /// Register a scripted adapter and return a handle for inspection.
    pub async fn script_carrier(&self, adapter: ScriptedAdapter) -> Arc<ScriptedAdapter> {
        let adapter = Arc::new(adapter);
        self.registry.register_adapter(adapter.clone()).await;
        adapter
    }

    /// Insert a `pending` shipment directly, bypassing intake.
    pub async fn seed_shipment(&self, carrier: CarrierType, tracking: &str) -> Shipment {
        let shipment = Shipment::new(carrier, tracking);
        self.store
            .insert_shipment(shipment.clone())
            .await
            .expect("insert seeded shipment");
        shipment
    }

    pub fn intake(&self) -> ShipmentIntake {
        ShipmentIntake::new(self.registry.clone(), self.store(), self.reconciler.clone())
    }

    pub fn manual(&self) -> ManualUpdateService {
        ManualUpdateService::new(self.reconciler.clone())
    }

    pub fn webhooks(&self) -> WebhookIngest {
        WebhookIngest::new(self.registry.clone(), self.store(), self.reconciler.clone())
    }

    pub fn reviews(&self) -> ReviewService {
        ReviewService::new(self.store())
    }

    pub fn orchestrator(&self) -> SyncOrchestrator {
        SyncOrchestrator::new(self.registry.clone(), self.store(), self.reconciler.clone())
    }

    pub fn orchestrator_with(&self, config: SyncConfig) -> SyncOrchestrator {
        SyncOrchestrator::with_config(
            self.registry.clone(),
            self.store(),
            self.reconciler.clone(),
            config,
        )
    }
}
