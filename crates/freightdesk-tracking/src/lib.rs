//! FreightDesk Shipment Tracking
//!
//! The synchronization and reconciliation engine: shipments, their
//! append-only event logs, and the machinery that keeps both consistent
//! while carrier feeds and staff updates disagree with each other.
//!
//! # Key Components
//!
//! - [`ShipmentStore`] - Persistence seam, with an in-memory implementation
//! - [`EventReconciler`] - The single funnel every status assertion goes through
//! - [`SyncOrchestrator`] - Polls carriers and feeds fresh events to the reconciler
//! - [`ShipmentIntake`] / [`ManualUpdateService`] / [`WebhookIngest`] - Caller-facing entry points
//! - [`ReviewService`] - Clears shipments flagged for human review
//!
//! # Reconciliation Flow
//!
//! ```text
//! ┌────────────────┐  ┌────────────────┐  ┌────────────────┐
//! │  API polling   │  │    Webhooks    │  │ Staff updates  │
//! └───────┬────────┘  └───────┬────────┘  └───────┬────────┘
//!         │                   │                   │
//!         └───────────────────┼───────────────────┘
//!                             ▼
//!                   ┌───────────────────┐
//!                   │ Event Reconciler  │
//!                   └─────────┬─────────┘
//!                             ▼
//!                   ┌───────────────────┐
//!                   │  Shipment Store   │
//!                   └───────────────────┘
//! ```
//!
//! The reconciler serializes work per shipment, deduplicates carrier
//! events, validates transitions, and annotates conflicts; the store
//! applies each accepted event, status move, and review flag in one
//! atomic step.
//!
//! Carrier feeds and staff disagree in predictable ways; the reconciler
//! resolves each incoming assertion against the stored history:
//!
//! - **Duplicate**: a carrier event already recorded (by external id) is dropped
//! - **Demoted**: a carrier assertion that breaks the transition table is
//!   kept as informational, without moving the status
//! - **Override**: a carrier assertion that contradicts a recent manual
//!   change wins, with the conflict annotated and the shipment flagged
//! - **Rejected**: a manual assertion that breaks the transition table
//!   fails outright and persists nothing
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use freightdesk_carrier::{CarrierConfig, CarrierRegistry, CarrierType};
//! use freightdesk_tracking::{EventReconciler, InMemoryShipmentStore, ShipmentIntake, ShipmentStore};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let registry = Arc::new(CarrierRegistry::new());
//! registry
//!     .configure(CarrierType::Ups, CarrierConfig::default())
//!     .await?;
//!
//! let store: Arc<dyn ShipmentStore> = Arc::new(InMemoryShipmentStore::new());
//! let reconciler = Arc::new(EventReconciler::new(store.clone()));
//!
//! let intake = ShipmentIntake::new(registry, store.clone(), reconciler);
//! let shipment = intake
//!     .register_shipment(CarrierType::Ups, "1Z5R89390357567127")
//!     .await?;
//!
//! assert!(shipment.tracking_code.starts_with("FD-"));
//! let log = store.events_for(shipment.id).await?;
//! assert_eq!(log.len(), 1);
//! # Ok(())
//! # }
//! ```

pub mod conflict;
pub mod error;
pub mod model;
pub mod orchestrator;
pub mod rate_limit;
pub mod reconciler;
pub mod service;
pub mod store;

pub use conflict::{ConflictKind, ConflictRecord, RecentStatusChange};
pub use error::{TrackingError, TrackingResult};
pub use model::{ApiSyncStatus, EventSource, Shipment, ShipmentEvent};
pub use orchestrator::{
    ShipmentSyncOutcome, SyncConfig, SyncOrchestrator, SyncOutcomeStatus, SyncSummary,
};
pub use rate_limit::{CarrierRateLimiters, TokenBucket};
pub use reconciler::{CandidateEvent, EventReconciler, ReconcileOutcome, ReconcilerConfig};
pub use service::{
    ManualUpdateRequest, ManualUpdateService, ReviewService, ShipmentIntake, WebhookIngest,
};
pub use store::{InMemoryShipmentStore, ShipmentStore, StoreError};
