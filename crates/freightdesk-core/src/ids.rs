//! Strongly Typed Identifiers
//!
//! This module provides type-safe identifier types for FreightDesk.
//! Using the newtype pattern, these types prevent accidental misuse of
//! different ID types at compile time.
//!
//! # Example
//!
//! ```
//! use freightdesk_core::{ShipmentId, ShipmentEventId};
//!
//! let shipment = ShipmentId::new();
//! let event = ShipmentEventId::new();
//!
//! // Type safety: cannot pass ShipmentEventId where ShipmentId is expected
//! fn requires_shipment(id: ShipmentId) -> String {
//!     id.to_string()
//! }
//!
//! let result = requires_shipment(shipment);
//! // requires_shipment(event); // This would not compile!
//! ```

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use uuid::Uuid;

/// Error type for ID parsing failures
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseIdError {
    /// The type of ID that failed to parse
    pub id_type: &'static str,
    /// The underlying UUID parse error message
    pub message: String,
}

impl Display for ParseIdError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Failed to parse {}: {}", self.id_type, self.message)
    }
}

impl std::error::Error for ParseIdError {}

/// Macro to define a strongly-typed ID type
macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Creates a new random ID using UUID v4.
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Creates an ID from an existing UUID.
            #[must_use]
            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Returns a reference to the underlying UUID.
            #[must_use]
            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = ParseIdError;

            fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
                Uuid::parse_str(s)
                    .map(Self)
                    .map_err(|e| ParseIdError {
                        id_type: stringify!($name),
                        message: e.to_string(),
                    })
            }
        }
    };
}

define_id!(
    /// Strongly typed identifier for shipments.
    ///
    /// Identifies a shipment record across the tracking engine. Provides
    /// compile-time type safety to prevent confusion with other ID types.
    ///
    /// # Example
    ///
    /// ```
    /// use freightdesk_core::ShipmentId;
    /// use uuid::Uuid;
    ///
    /// // Create a new random ShipmentId
    /// let shipment_id = ShipmentId::new();
    /// println!("Shipment: {}", shipment_id);
    ///
    /// // Create from existing UUID
    /// let uuid = Uuid::new_v4();
    /// let shipment_id = ShipmentId::from_uuid(uuid);
    /// assert_eq!(shipment_id.as_uuid(), &uuid);
    /// ```
    ShipmentId
);

define_id!(
    /// Strongly typed identifier for shipment tracking events.
    ///
    /// Each accepted event in a shipment's append-only log carries one.
    ShipmentEventId
);

define_id!(
    /// Strongly typed identifier for staff actors.
    ///
    /// Attached to manually entered events and review resolutions so the
    /// audit trail records who made each change.
    ActorId
);
