//! FreightDesk Carrier Integration
//!
//! Uniform access to carrier tracking backends. Everything above this
//! crate talks to [`CarrierAdapter`] and [`CarrierRegistry`]; everything
//! below it deals with one carrier's formats and field names.
//!
//! # Modules
//!
//! - [`traits`] - The [`CarrierAdapter`] contract
//! - [`adapters`] - Built-in UPS, FedEx, DHL and USPS implementations
//! - [`registry`] - [`CarrierRegistry`]: configuration and adapter cache
//! - [`event`] - Normalized tracking events and shipment snapshots
//! - [`config`] - Per-carrier connection settings
//! - [`retry`] - Exponential backoff for transient carrier faults
//! - [`error`] - [`CarrierError`] with transient/permanent classification
//!
//! # Example
//!
//! ```
//! use freightdesk_carrier::{CarrierConfig, CarrierRegistry, CarrierType};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let registry = CarrierRegistry::new();
//! registry
//!     .configure(CarrierType::Ups, CarrierConfig::default())
//!     .await?;
//!
//! let ups = registry.get_adapter(CarrierType::Ups).await?;
//! assert!(ups.validate_tracking_number("1Z5R89390357567127"));
//!
//! let history = ups.get_tracking_events("1Z5R89390357567127").await?;
//! assert!(!history.is_empty());
//! # Ok(())
//! # }
//! ```

pub mod adapters;
pub mod config;
pub mod error;
pub mod event;
pub mod registry;
pub mod retry;
pub mod traits;
pub mod types;

// Re-exports for convenience
pub use adapters::{DhlAdapter, FedexAdapter, UpsAdapter, UspsAdapter};
pub use config::CarrierConfig;
pub use error::{CarrierError, CarrierResult};
pub use event::{
    CarrierTrackingEvent, ParseTrackingEventKindError, ShipmentDetails, TrackingEventKind,
    WebhookEvent,
};
pub use registry::CarrierRegistry;
pub use retry::{RetryConfig, RetryExecutor};
pub use traits::CarrierAdapter;
pub use types::{CarrierType, ParseCarrierTypeError};

// Re-export async_trait for adapter implementors
pub use async_trait::async_trait;
