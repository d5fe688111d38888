//! Carrier adapter contract.
//!
//! Every carrier integration implements [`CarrierAdapter`]. The rest of
//! the engine works exclusively against this trait, so adding a carrier
//! means adding one adapter and one registry entry, nothing else.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::CarrierResult;
use crate::event::{CarrierTrackingEvent, ShipmentDetails, WebhookEvent};
use crate::types::CarrierType;

/// Uniform interface to a carrier's tracking backend.
///
/// Implementations must be `Send + Sync`; adapters are shared behind
/// `Arc` across concurrent sync tasks.
#[async_trait]
pub trait CarrierAdapter: Send + Sync {
    /// The carrier this adapter integrates with.
    fn carrier_type(&self) -> CarrierType;

    /// Human-readable name, including the active endpoint.
    fn display_name(&self) -> String;

    /// Check whether a tracking number matches this carrier's format.
    ///
    /// Purely syntactic: no network traffic, no allocation beyond the
    /// uppercased copy of the input. Fetch operations call this first
    /// and fail fast on mismatch.
    fn validate_tracking_number(&self, tracking: &str) -> bool;

    /// Fetch the carrier's current snapshot of a shipment.
    async fn get_shipment_details(&self, tracking: &str) -> CarrierResult<ShipmentDetails>;

    /// Fetch the full tracking event history for a shipment.
    ///
    /// Events are returned in ascending `event_time` order.
    async fn get_tracking_events(&self, tracking: &str)
        -> CarrierResult<Vec<CarrierTrackingEvent>>;

    /// Translate a raw webhook payload into a normalized event.
    ///
    /// Each carrier pushes its own field names; the adapter owns that
    /// mapping so callers never inspect raw payloads.
    fn parse_webhook(&self, payload: &Value) -> CarrierResult<WebhookEvent>;

    /// Probe whether the carrier backend is currently reachable.
    ///
    /// Never returns an error: any probe failure reads as `false`.
    async fn is_available(&self) -> bool {
        true
    }
}
