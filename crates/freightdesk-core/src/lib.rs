//! FreightDesk Core Library
//!
//! Shared types for the FreightDesk tracking engine.
//!
//! # Modules
//!
//! - [`ids`] - Strongly typed identifiers (ShipmentId, ShipmentEventId, ActorId)
//! - [`status`] - Shipment status state machine (ShipmentStatus)
//!
//! # Example
//!
//! ```
//! use freightdesk_core::{ShipmentId, ShipmentStatus};
//!
//! let id = ShipmentId::new();
//! let status = ShipmentStatus::Pending;
//!
//! assert!(status.can_transition_to(&ShipmentStatus::InTransit));
//! assert!(!status.can_transition_to(&ShipmentStatus::Delivered));
//! println!("{id} is {status}");
//! ```

pub mod ids;
pub mod status;

// Re-export main types for convenient access
pub use ids::{ActorId, ParseIdError, ShipmentEventId, ShipmentId};
pub use status::{ParseShipmentStatusError, ShipmentStatus};
