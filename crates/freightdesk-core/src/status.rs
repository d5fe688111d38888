//! Shipment Status State Machine
//!
//! Canonical shipment statuses and the transition table that governs them.
//! The machine validates transitions; it never mutates shipment state
//! itself. Callers decide what to do with a rejected transition.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use thiserror::Error;

/// Error returned when parsing an unknown status string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid shipment status: {value}")]
pub struct ParseShipmentStatusError {
    /// The string that failed to parse.
    pub value: String,
}

/// Canonical status of a shipment.
///
/// `Pending` is the initial status of every shipment. `Delivered` and
/// `Cancelled` are terminal: no transition leaves them.
///
/// Allowed transitions:
///
/// | From             | To                                              |
/// |------------------|-------------------------------------------------|
/// | `pending`          | `in-transit`, `cancelled`, `exception`              |
/// | `in-transit`       | `out-for-delivery`, `exception`, `cancelled`, `delivered` |
/// | `out-for-delivery` | `delivered`, `exception`, `in-transit`              |
/// | `exception`        | `in-transit`, `cancelled`, `delivered`              |
/// | `delivered`        | (terminal)                                      |
/// | `cancelled`        | (terminal)                                      |
///
/// A self-transition (any status to itself) is always allowed so repeated
/// carrier scans reporting the same status stay idempotent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ShipmentStatus {
    /// Shipment registered, not yet moving.
    Pending,
    /// Shipment is moving through the carrier network.
    InTransit,
    /// Shipment is on a vehicle for final delivery.
    OutForDelivery,
    /// Shipment reached the recipient. Terminal.
    Delivered,
    /// Delivery problem reported (customs hold, failed attempt, damage).
    Exception,
    /// Shipment cancelled. Terminal.
    Cancelled,
}

impl ShipmentStatus {
    /// Returns the status as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InTransit => "in-transit",
            Self::OutForDelivery => "out-for-delivery",
            Self::Delivered => "delivered",
            Self::Exception => "exception",
            Self::Cancelled => "cancelled",
        }
    }

    /// Returns all statuses.
    #[must_use]
    pub fn all() -> [Self; 6] {
        [
            Self::Pending,
            Self::InTransit,
            Self::OutForDelivery,
            Self::Delivered,
            Self::Exception,
            Self::Cancelled,
        ]
    }

    /// Returns true if no further status changes are allowed.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Delivered | Self::Cancelled)
    }

    /// Check if a transition to the target status is valid.
    #[must_use]
    pub fn can_transition_to(&self, target: &Self) -> bool {
        match (self, target) {
            // Idempotent: same status is always allowed
            (a, b) if a == b => true,
            (Self::Pending, Self::InTransit | Self::Cancelled | Self::Exception) => true,
            (
                Self::InTransit,
                Self::OutForDelivery | Self::Exception | Self::Cancelled | Self::Delivered,
            ) => true,
            // Returning to in-transit covers a failed delivery attempt
            (Self::OutForDelivery, Self::Delivered | Self::Exception | Self::InTransit) => true,
            (Self::Exception, Self::InTransit | Self::Cancelled | Self::Delivered) => true,
            // Delivered and Cancelled are terminal
            _ => false,
        }
    }
}

impl Display for ShipmentStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ShipmentStatus {
    type Err = ParseShipmentStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "in-transit" => Ok(Self::InTransit),
            "out-for-delivery" => Ok(Self::OutForDelivery),
            "delivered" => Ok(Self::Delivered),
            "exception" => Ok(Self::Exception),
            "cancelled" => Ok(Self::Cancelled),
            _ => Err(ParseShipmentStatusError {
                value: s.to_string(),
            }),
        }
    }
}
