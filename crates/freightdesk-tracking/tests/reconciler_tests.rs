//! Integration tests for the event reconciler.
//!
//! Covers the full pipeline against the in-memory store: deduplication,
//! transition validation, carrier-over-manual overrides, conflict
//! annotation, and per-shipment serialization of concurrent submissions.

mod common;

use std::sync::Arc;

use freightdesk_carrier::CarrierType;
use freightdesk_core::{ActorId, ShipmentId, ShipmentStatus};
use freightdesk_tracking::{
    CandidateEvent, ConflictKind, ConflictRecord, EventSource, ReconcileOutcome, ShipmentStore,
    TrackingError,
};

use common::{api_candidate, manual_candidate, ts, TestContext};

fn applied_status(outcome: &ReconcileOutcome) -> Option<ShipmentStatus> {
    match outcome {
        ReconcileOutcome::Accepted { new_status, .. } => *new_status,
        ReconcileOutcome::Duplicate => panic!("expected an accepted outcome"),
    }
}

// ---------------------------------------------------------------------------
// Acceptance and deduplication
// ---------------------------------------------------------------------------

#[tokio::test]
async fn carrier_progression_applies_statuses() {
    let ctx = TestContext::new();
    let shipment = ctx.seed_shipment(CarrierType::Ups, "1Z5R89390357567127").await;

    let first = ctx
        .reconciler
        .reconcile(
            shipment.id,
            api_candidate("evt-1", ShipmentStatus::InTransit, "2026-01-10T08:00:00Z"),
        )
        .await
        .unwrap();
    assert_eq!(applied_status(&first), Some(ShipmentStatus::InTransit));

    let second = ctx
        .reconciler
        .reconcile(
            shipment.id,
            api_candidate("evt-2", ShipmentStatus::Delivered, "2026-01-10T12:00:00Z"),
        )
        .await
        .unwrap();
    assert_eq!(applied_status(&second), Some(ShipmentStatus::Delivered));

    let stored = ctx.store.load_shipment(shipment.id).await.unwrap();
    assert_eq!(stored.status, ShipmentStatus::Delivered);
    assert!(!stored.needs_review);

    let log = ctx.store.events_for(shipment.id).await.unwrap();
    assert_eq!(log.len(), 2);
    assert!(log[0].event_time < log[1].event_time);
}

#[tokio::test]
async fn duplicate_external_id_dropped_before_validation() {
    let ctx = TestContext::new();
    let shipment = ctx.seed_shipment(CarrierType::Fedex, "794677799690").await;

    ctx.reconciler
        .reconcile(
            shipment.id,
            api_candidate("scan-77", ShipmentStatus::InTransit, "2026-01-10T08:00:00Z"),
        )
        .await
        .unwrap();

    // Same identity, different content: still a duplicate.
    let replay = ctx
        .reconciler
        .reconcile(
            shipment.id,
            api_candidate("scan-77", ShipmentStatus::Delivered, "2026-01-11T08:00:00Z"),
        )
        .await
        .unwrap();
    assert!(replay.is_duplicate());

    let stored = ctx.store.load_shipment(shipment.id).await.unwrap();
    assert_eq!(stored.status, ShipmentStatus::InTransit);
    assert_eq!(ctx.store.events_for(shipment.id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn unknown_shipment_rejected() {
    let ctx = TestContext::new();

    let err = ctx
        .reconciler
        .reconcile(
            ShipmentId::new(),
            api_candidate("evt-1", ShipmentStatus::InTransit, "2026-01-10T08:00:00Z"),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, TrackingError::ShipmentNotFound { .. }));
    assert_eq!(err.error_code(), "shipment_not_found");
}

// ---------------------------------------------------------------------------
// Transition validation per source
// ---------------------------------------------------------------------------

#[tokio::test]
async fn manual_invalid_transition_rejected_without_persisting() {
    let ctx = TestContext::new();
    let shipment = ctx.seed_shipment(CarrierType::Dhl, "1234567890").await;

    // pending -> delivered skips the whole lifecycle
    let err = ctx
        .reconciler
        .reconcile(
            shipment.id,
            manual_candidate(ShipmentStatus::Delivered, "2026-01-10T08:00:00Z"),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, TrackingError::InvalidTransition { .. }));
    assert!(err.to_string().contains("'pending'"));
    assert!(err.to_string().contains("'delivered'"));

    let stored = ctx.store.load_shipment(shipment.id).await.unwrap();
    assert_eq!(stored.status, ShipmentStatus::Pending);
    assert!(ctx.store.events_for(shipment.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn manual_valid_transition_applies() {
    let ctx = TestContext::new();
    let shipment = ctx.seed_shipment(CarrierType::Usps, "9400111899223197428490").await;

    let actor = ActorId::new();
    let outcome = ctx
        .reconciler
        .reconcile(
            shipment.id,
            CandidateEvent::manual(
                ShipmentStatus::InTransit,
                "Scanned at origin depot",
                actor,
                ts("2026-01-10T08:00:00Z"),
            ),
        )
        .await
        .unwrap();

    assert_eq!(applied_status(&outcome), Some(ShipmentStatus::InTransit));
    let event = outcome.accepted_event().unwrap();
    assert_eq!(event.source, EventSource::Manual);
    assert_eq!(event.source_id, Some(actor));

    let stored = ctx.store.load_shipment(shipment.id).await.unwrap();
    assert_eq!(stored.status, ShipmentStatus::InTransit);
    assert!(!stored.needs_review);
}

#[tokio::test]
async fn carrier_invalid_transition_demoted_to_informational() {
    let ctx = TestContext::new();
    let shipment = ctx.seed_shipment(CarrierType::Ups, "1Z5R89390357567127").await;

    ctx.reconciler
        .reconcile(
            shipment.id,
            api_candidate("evt-1", ShipmentStatus::InTransit, "2026-01-10T08:00:00Z"),
        )
        .await
        .unwrap();

    // in-transit -> pending is backwards; no manual override in play, so
    // the event is kept but its status portion is dropped.
    let outcome = ctx
        .reconciler
        .reconcile(
            shipment.id,
            api_candidate("evt-2", ShipmentStatus::Pending, "2026-01-10T09:00:00Z"),
        )
        .await
        .unwrap();

    assert_eq!(applied_status(&outcome), None);
    let event = outcome.accepted_event().unwrap();
    assert!(event.status_discarded);
    assert_eq!(event.status, None);
    assert!(event.conflicts.is_empty());

    let stored = ctx.store.load_shipment(shipment.id).await.unwrap();
    assert_eq!(stored.status, ShipmentStatus::InTransit);
    assert!(!stored.needs_review);
    assert_eq!(ctx.store.events_for(shipment.id).await.unwrap().len(), 2);
}

#[tokio::test]
async fn reasserting_current_status_is_not_a_change() {
    let ctx = TestContext::new();
    let shipment = ctx.seed_shipment(CarrierType::Ups, "1Z5R89390357567127").await;

    ctx.reconciler
        .reconcile(
            shipment.id,
            api_candidate("evt-1", ShipmentStatus::InTransit, "2026-01-10T10:00:00Z"),
        )
        .await
        .unwrap();

    let reassertion = ctx
        .reconciler
        .reconcile(
            shipment.id,
            api_candidate("evt-2", ShipmentStatus::InTransit, "2026-01-10T10:01:00Z"),
        )
        .await
        .unwrap();
    assert_eq!(applied_status(&reassertion), None);
    let event = reassertion.accepted_event().unwrap();
    assert_eq!(event.status, Some(ShipmentStatus::InTransit));
    assert!(!event.status_discarded);
    assert!(event.conflicts.is_empty());

    // The re-assertion must not count towards rapid-change detection.
    let progression = ctx
        .reconciler
        .reconcile(
            shipment.id,
            api_candidate("evt-3", ShipmentStatus::OutForDelivery, "2026-01-10T10:02:00Z"),
        )
        .await
        .unwrap();
    assert!(progression.accepted_event().unwrap().conflicts.is_empty());

    let stored = ctx.store.load_shipment(shipment.id).await.unwrap();
    assert_eq!(stored.status, ShipmentStatus::OutForDelivery);
    assert!(!stored.needs_review);
}

// ---------------------------------------------------------------------------
// Carrier feeds vs manual overrides
// ---------------------------------------------------------------------------

#[tokio::test]
async fn carrier_overrides_recent_manual_status() {
    let ctx = TestContext::new();
    let shipment = ctx.seed_shipment(CarrierType::Ups, "1Z5R89390357567127").await;

    ctx.reconciler
        .reconcile(
            shipment.id,
            api_candidate("evt-1", ShipmentStatus::InTransit, "2026-01-10T08:00:00Z"),
        )
        .await
        .unwrap();
    ctx.reconciler
        .reconcile(
            shipment.id,
            manual_candidate(ShipmentStatus::Delivered, "2026-01-10T09:00:00Z"),
        )
        .await
        .unwrap();

    // delivered -> in-transit breaks the table, but the delivered status
    // was set manually an hour earlier: the carrier feed wins.
    let outcome = ctx
        .reconciler
        .reconcile(
            shipment.id,
            api_candidate("evt-2", ShipmentStatus::InTransit, "2026-01-10T10:00:00Z"),
        )
        .await
        .unwrap();

    assert_eq!(applied_status(&outcome), Some(ShipmentStatus::InTransit));
    let event = outcome.accepted_event().unwrap();
    assert_eq!(event.conflicts.len(), 1);
    match &event.conflicts[0] {
        ConflictRecord::ApiManualConflict {
            api_status,
            manual_status,
            manual_event_time,
        } => {
            assert_eq!(*api_status, ShipmentStatus::InTransit);
            assert_eq!(*manual_status, ShipmentStatus::Delivered);
            assert_eq!(*manual_event_time, ts("2026-01-10T09:00:00Z"));
        }
        other => panic!("expected an api/manual conflict, got {other:?}"),
    }

    let stored = ctx.store.load_shipment(shipment.id).await.unwrap();
    assert_eq!(stored.status, ShipmentStatus::InTransit);
    assert!(stored.needs_review);

    // A clean follow-up event does not clear the review flag.
    ctx.reconciler
        .reconcile(
            shipment.id,
            api_candidate("evt-3", ShipmentStatus::Delivered, "2026-01-10T11:00:00Z"),
        )
        .await
        .unwrap();
    let stored = ctx.store.load_shipment(shipment.id).await.unwrap();
    assert_eq!(stored.status, ShipmentStatus::Delivered);
    assert!(stored.needs_review, "only review resolution clears the flag");
}

#[tokio::test]
async fn stale_carrier_event_does_not_override_newer_manual_status() {
    let ctx = TestContext::new();
    let shipment = ctx.seed_shipment(CarrierType::Ups, "1Z5R89390357567127").await;

    ctx.reconciler
        .reconcile(
            shipment.id,
            api_candidate("evt-1", ShipmentStatus::InTransit, "2026-01-10T08:00:00Z"),
        )
        .await
        .unwrap();
    ctx.reconciler
        .reconcile(
            shipment.id,
            manual_candidate(ShipmentStatus::Delivered, "2026-01-10T09:00:00Z"),
        )
        .await
        .unwrap();

    // A delayed carrier scan from before the manual change must not roll
    // the shipment back.
    let outcome = ctx
        .reconciler
        .reconcile(
            shipment.id,
            api_candidate("evt-2", ShipmentStatus::OutForDelivery, "2026-01-10T08:30:00Z"),
        )
        .await
        .unwrap();

    assert_eq!(applied_status(&outcome), None);
    assert!(outcome.accepted_event().unwrap().status_discarded);

    let stored = ctx.store.load_shipment(shipment.id).await.unwrap();
    assert_eq!(stored.status, ShipmentStatus::Delivered);
    assert!(!stored.needs_review);
}

#[tokio::test]
async fn valid_carrier_transition_still_flags_manual_disagreement() {
    let ctx = TestContext::new();
    let shipment = ctx.seed_shipment(CarrierType::Dhl, "9876543210").await;

    ctx.reconciler
        .reconcile(
            shipment.id,
            manual_candidate(ShipmentStatus::InTransit, "2026-01-10T09:00:00Z"),
        )
        .await
        .unwrap();

    let outcome = ctx
        .reconciler
        .reconcile(
            shipment.id,
            api_candidate("evt-1", ShipmentStatus::OutForDelivery, "2026-01-10T10:00:00Z"),
        )
        .await
        .unwrap();

    assert_eq!(applied_status(&outcome), Some(ShipmentStatus::OutForDelivery));
    let event = outcome.accepted_event().unwrap();
    assert_eq!(event.conflicts.len(), 1);
    assert_eq!(event.conflicts[0].kind(), ConflictKind::ApiManualConflict);

    let stored = ctx.store.load_shipment(shipment.id).await.unwrap();
    assert!(stored.needs_review);
}

// ---------------------------------------------------------------------------
// Rapid status changes
// ---------------------------------------------------------------------------

#[tokio::test]
async fn rapid_status_changes_flagged_with_newest_first_preview() {
    let ctx = TestContext::new();
    let shipment = ctx.seed_shipment(CarrierType::Ups, "1Z5R89390357567127").await;

    for (external_id, status, at) in [
        ("r1", ShipmentStatus::InTransit, "2026-01-10T10:00:00Z"),
        ("r2", ShipmentStatus::OutForDelivery, "2026-01-10T10:01:00Z"),
        ("r3", ShipmentStatus::InTransit, "2026-01-10T10:02:00Z"),
    ] {
        let outcome = ctx
            .reconciler
            .reconcile(shipment.id, api_candidate(external_id, status, at))
            .await
            .unwrap();
        assert!(
            outcome.accepted_event().unwrap().conflicts.is_empty(),
            "{external_id} is still within the threshold"
        );
    }

    // Fourth change within five minutes crosses the default threshold.
    let outcome = ctx
        .reconciler
        .reconcile(
            shipment.id,
            api_candidate("r4", ShipmentStatus::OutForDelivery, "2026-01-10T10:03:00Z"),
        )
        .await
        .unwrap();

    let event = outcome.accepted_event().unwrap();
    assert_eq!(event.conflicts.len(), 1);
    match &event.conflicts[0] {
        ConflictRecord::RapidStatusChanges {
            observed,
            window_minutes,
            recent,
        } => {
            assert_eq!(*observed, 4);
            assert_eq!(*window_minutes, 5);
            assert_eq!(recent.len(), 3, "preview capped at the configured length");
            assert_eq!(recent[0].status, ShipmentStatus::OutForDelivery);
            assert_eq!(recent[0].event_time, ts("2026-01-10T10:03:00Z"));
            assert_eq!(recent[1].event_time, ts("2026-01-10T10:02:00Z"));
            assert_eq!(recent[2].event_time, ts("2026-01-10T10:01:00Z"));
        }
        other => panic!("expected a rapid-changes conflict, got {other:?}"),
    }

    let stored = ctx.store.load_shipment(shipment.id).await.unwrap();
    assert!(stored.needs_review);
}

#[tokio::test]
async fn rapid_window_excludes_older_changes() {
    let ctx = TestContext::new();
    let shipment = ctx.seed_shipment(CarrierType::Ups, "1Z5R89390357567127").await;

    for (external_id, status, at) in [
        ("r1", ShipmentStatus::InTransit, "2026-01-10T10:00:00Z"),
        ("r2", ShipmentStatus::OutForDelivery, "2026-01-10T10:01:00Z"),
        ("r3", ShipmentStatus::InTransit, "2026-01-10T10:02:00Z"),
    ] {
        ctx.reconciler
            .reconcile(shipment.id, api_candidate(external_id, status, at))
            .await
            .unwrap();
    }

    // Half an hour later the earlier burst has left the window.
    let outcome = ctx
        .reconciler
        .reconcile(
            shipment.id,
            api_candidate("r4", ShipmentStatus::OutForDelivery, "2026-01-10T10:30:00Z"),
        )
        .await
        .unwrap();

    assert!(outcome.accepted_event().unwrap().conflicts.is_empty());
    let stored = ctx.store.load_shipment(shipment.id).await.unwrap();
    assert!(!stored.needs_review);
}

#[tokio::test]
async fn both_conflict_kinds_can_attach_to_one_event() {
    let ctx = TestContext::new();
    let shipment = ctx.seed_shipment(CarrierType::Fedex, "926129010903426").await;

    ctx.reconciler
        .reconcile(
            shipment.id,
            api_candidate("e1", ShipmentStatus::InTransit, "2026-01-10T10:00:00Z"),
        )
        .await
        .unwrap();
    ctx.reconciler
        .reconcile(
            shipment.id,
            manual_candidate(ShipmentStatus::OutForDelivery, "2026-01-10T10:01:00Z"),
        )
        .await
        .unwrap();
    ctx.reconciler
        .reconcile(
            shipment.id,
            api_candidate("e2", ShipmentStatus::InTransit, "2026-01-10T10:02:00Z"),
        )
        .await
        .unwrap();

    // Fourth change in the window, and it disagrees with the manual one.
    let outcome = ctx
        .reconciler
        .reconcile(
            shipment.id,
            api_candidate("e3", ShipmentStatus::Exception, "2026-01-10T10:03:00Z"),
        )
        .await
        .unwrap();

    let event = outcome.accepted_event().unwrap();
    let kinds: Vec<ConflictKind> = event.conflicts.iter().map(ConflictRecord::kind).collect();
    assert!(kinds.contains(&ConflictKind::ApiManualConflict));
    assert!(kinds.contains(&ConflictKind::RapidStatusChanges));
    assert_eq!(event.conflicts.len(), 2);
}

// ---------------------------------------------------------------------------
// Concurrency
// ---------------------------------------------------------------------------

#[tokio::test]
async fn concurrent_submissions_serialize_per_shipment() {
    let ctx = TestContext::new();
    let shipment = ctx.seed_shipment(CarrierType::Ups, "1Z5R89390357567127").await;

    let mut handles = Vec::new();
    for i in 0..8 {
        let reconciler = Arc::clone(&ctx.reconciler);
        let shipment_id = shipment.id;
        let candidate = api_candidate(
            &format!("evt-{i}"),
            ShipmentStatus::InTransit,
            &format!("2026-01-10T10:0{i}:00Z"),
        );
        handles.push(tokio::spawn(async move {
            reconciler.reconcile(shipment_id, candidate).await
        }));
    }

    for handle in handles {
        let outcome = handle.await.unwrap().unwrap();
        assert!(!outcome.is_duplicate());
    }

    // Whatever the interleaving, exactly one submission moved the status
    // and every event landed in the log.
    let stored = ctx.store.load_shipment(shipment.id).await.unwrap();
    assert_eq!(stored.status, ShipmentStatus::InTransit);
    assert!(!stored.needs_review);
    assert_eq!(ctx.store.events_for(shipment.id).await.unwrap().len(), 8);
}
