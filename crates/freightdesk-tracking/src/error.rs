//! Error types for the tracking engine.

use thiserror::Error;

use freightdesk_carrier::{CarrierError, CarrierType};
use freightdesk_core::ShipmentStatus;

use crate::store::StoreError;

/// Errors surfaced by reconciliation, sync, and the shipment services.
#[derive(Debug, Error)]
pub enum TrackingError {
    /// A manual update proposed a transition the state machine forbids.
    #[error("invalid status transition from '{from}' to '{to}'")]
    InvalidTransition {
        /// Current status.
        from: ShipmentStatus,
        /// Proposed status.
        to: ShipmentStatus,
    },

    /// A manual update to a terminal status arrived without a note.
    #[error("a note is required when manually marking a shipment '{status}'")]
    MissingRequiredNote {
        /// The terminal status that was proposed.
        status: ShipmentStatus,
    },

    /// No shipment matches the given reference.
    #[error("shipment not found: {reference}")]
    ShipmentNotFound {
        /// Id, tracking code, or carrier tracking number used in the lookup.
        reference: String,
    },

    /// A shipment with this carrier tracking number is already registered.
    #[error("shipment already registered for {carrier} tracking number '{tracking_number}'")]
    ShipmentExists {
        /// Carrier of the existing shipment.
        carrier: CarrierType,
        /// The duplicated tracking number.
        tracking_number: String,
    },

    /// A carrier adapter call failed.
    #[error(transparent)]
    Carrier(#[from] CarrierError),

    /// The shipment store failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl TrackingError {
    /// Creates an invalid transition error.
    pub fn invalid_transition(from: ShipmentStatus, to: ShipmentStatus) -> Self {
        Self::InvalidTransition { from, to }
    }

    /// Creates a missing note error.
    pub fn missing_required_note(status: ShipmentStatus) -> Self {
        Self::MissingRequiredNote { status }
    }

    /// Creates a shipment not found error.
    pub fn shipment_not_found(reference: impl Into<String>) -> Self {
        Self::ShipmentNotFound {
            reference: reference.into(),
        }
    }

    /// Creates a duplicate shipment error.
    pub fn shipment_exists(carrier: CarrierType, tracking_number: impl Into<String>) -> Self {
        Self::ShipmentExists {
            carrier,
            tracking_number: tracking_number.into(),
        }
    }

    /// True when retrying the same call later could succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Carrier(e) => e.is_transient(),
            Self::Store(e) => e.is_transient(),
            Self::InvalidTransition { .. }
            | Self::MissingRequiredNote { .. }
            | Self::ShipmentNotFound { .. }
            | Self::ShipmentExists { .. } => false,
        }
    }

    /// Returns a stable error code for logging and API responses.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidTransition { .. } => "invalid_transition",
            Self::MissingRequiredNote { .. } => "missing_required_note",
            Self::ShipmentNotFound { .. } => "shipment_not_found",
            Self::ShipmentExists { .. } => "shipment_exists",
            Self::Carrier(e) => e.error_code(),
            Self::Store(_) => "store_error",
        }
    }
}

/// Result type for tracking operations.
pub type TrackingResult<T> = Result<T, TrackingError>;
