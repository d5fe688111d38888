//! Conflict records attached to accepted events.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

use freightdesk_core::ShipmentStatus;

use crate::model::EventSource;

/// A status change observed while scanning for rapid-change conflicts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecentStatusChange {
    /// Status the shipment changed to.
    pub status: ShipmentStatus,
    /// Source of the change.
    pub source: EventSource,
    /// When the change happened.
    pub event_time: DateTime<Utc>,
}

/// A conflict detected while reconciling an incoming event.
///
/// Records are attached to the event that triggered detection and are
/// never mutated afterwards. The same underlying disagreement can
/// therefore surface on several events if it persists across syncs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConflictRecord {
    /// A carrier feed and a manual entry assert different statuses in
    /// the same time window. The carrier feed wins; the disagreement is
    /// flagged for review.
    ApiManualConflict {
        /// Status asserted by the carrier side.
        api_status: ShipmentStatus,
        /// Status asserted by the manual side.
        manual_status: ShipmentStatus,
        /// When the manual entry says the change happened.
        manual_event_time: DateTime<Utc>,
    },
    /// More status changes inside the detection window than the
    /// configured threshold allows.
    RapidStatusChanges {
        /// Number of changes observed, incoming event included.
        observed: u32,
        /// Width of the detection window in minutes.
        window_minutes: i64,
        /// Most recent changes, newest first, capped at the configured
        /// preview length.
        recent: Vec<RecentStatusChange>,
    },
}

impl ConflictRecord {
    /// Returns the kind discriminant for this record.
    #[must_use]
    pub fn kind(&self) -> ConflictKind {
        match self {
            Self::ApiManualConflict { .. } => ConflictKind::ApiManualConflict,
            Self::RapidStatusChanges { .. } => ConflictKind::RapidStatusChanges,
        }
    }
}

/// Discriminant of a [`ConflictRecord`], for logging and filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictKind {
    /// Carrier feed disagrees with a manual entry.
    ApiManualConflict,
    /// Status thrashing inside the detection window.
    RapidStatusChanges,
}

impl ConflictKind {
    /// Returns the kind as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ApiManualConflict => "api_manual_conflict",
            Self::RapidStatusChanges => "rapid_status_changes",
        }
    }
}

impl Display for ConflictKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_api_manual_conflict_serializes_tagged() {
        let record = ConflictRecord::ApiManualConflict {
            api_status: ShipmentStatus::InTransit,
            manual_status: ShipmentStatus::Delivered,
            manual_event_time: "2026-01-10T10:05:00Z".parse().unwrap(),
        };
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["type"], json!("api_manual_conflict"));
        assert_eq!(value["api_status"], json!("in-transit"));
        assert_eq!(value["manual_status"], json!("delivered"));
    }

    #[test]
    fn test_rapid_changes_round_trips() {
        let record = ConflictRecord::RapidStatusChanges {
            observed: 4,
            window_minutes: 5,
            recent: vec![RecentStatusChange {
                status: ShipmentStatus::Exception,
                source: EventSource::Api,
                event_time: "2026-01-10T10:04:00Z".parse().unwrap(),
            }],
        };
        let text = serde_json::to_string(&record).unwrap();
        let back: ConflictRecord = serde_json::from_str(&text).unwrap();
        assert_eq!(back, record);
        assert_eq!(back.kind(), ConflictKind::RapidStatusChanges);
    }

    #[test]
    fn test_kind_strings() {
        assert_eq!(ConflictKind::ApiManualConflict.as_str(), "api_manual_conflict");
        assert_eq!(ConflictKind::RapidStatusChanges.as_str(), "rapid_status_changes");
    }
}
