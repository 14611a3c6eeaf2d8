//! Scenario: Submission Failures Surface to the Caller
//!
//! # Invariants under test
//! - Submitting before any mode is selected fails validation, logs once, and
//!   issues no backend call.
//! - Out-of-range and occupied slots fail validation before any backend
//!   call.
//! - Backend rejections and transport failures are returned with a readable
//!   reason, logged, and leave the pool untouched. No automatic retry.
//! - An enqueue the backend never answers fails as a transport timeout after
//!   the request timeout and frees the slot for the next submission.
//! - An enqueue response without a ticket identifier still produces a local
//!   ticket, keyed by player name until matched.

use std::time::Duration;

use mmd_backend::BackendError;
use mmd_runtime::DashboardError;
use mmd_schemas::{JoinQueueResponse, Region};
use mmd_testkit::{match_event, profile, CatalogScript, FakeBackend, FixedGenerator, Harness};

fn gen() -> FixedGenerator {
    FixedGenerator::new(vec![profile("HOTEL_08", 77, Region::AsiaSe)])
}

#[tokio::test(start_paused = true)]
async fn submit_before_catalog_is_rejected() {
    let h = Harness::start(FakeBackend::new(CatalogScript::Hang), gen());

    let err = h.handle.submit(1).await.unwrap_err();
    assert_eq!(err, DashboardError::Validation("no game mode selected".to_string()));
    assert_eq!(h.sink.count_log("[X] ERROR: No game mode selected"), 1);
    assert_eq!(h.backend.join_calls(), 0);

    h.shutdown().await;
}

#[tokio::test]
async fn bad_slots_never_reach_the_backend() {
    let h = Harness::start(FakeBackend::default(), gen());
    h.ready().await;

    assert_eq!(h.handle.submit(0).await.unwrap_err().kind(), "validation");
    assert_eq!(h.handle.submit(5).await.unwrap_err().kind(), "validation");
    h.handle.submit(4).await.expect("last slot is valid");
    assert_eq!(h.handle.submit(4).await.unwrap_err().kind(), "validation");
    assert_eq!(h.backend.join_calls(), 1);

    let err = h.handle.ticket(2).await.unwrap_err();
    assert_eq!(err.kind(), "state");

    h.shutdown().await;
}

#[tokio::test]
async fn backend_rejection_is_reported_with_detail() {
    let backend = FakeBackend::default();
    backend.push_join(Err(BackendError::Http {
        status: 422,
        detail: "skill must be positive".to_string(),
    }));
    backend.push_join(Err(BackendError::Timeout(Duration::from_secs(5))));
    let h = Harness::start(backend, gen());
    h.ready().await;

    let err = h.handle.submit(1).await.unwrap_err();
    assert_eq!(
        err,
        DashboardError::Backend {
            status: Some(422),
            detail: "skill must be positive".to_string()
        }
    );
    let err = h.handle.submit(1).await.unwrap_err();
    assert_eq!(err.kind(), "transport");

    assert_eq!(
        h.sink.error_logs(),
        vec![
            "[X] ERROR: Failed to queue player - skill must be positive",
            "[X] ERROR: Failed to queue player - Backend request timeout",
        ]
    );
    assert_eq!(h.backend.join_calls(), 2);
    assert_eq!(h.snapshot().await.pool.total, 0);

    h.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn silent_enqueue_times_out_and_frees_the_slot() {
    let backend = FakeBackend::default();
    backend.push_join_hang();
    let h = Harness::start(backend, gen());
    h.ready().await;

    let err = h.handle.submit(1).await.unwrap_err();
    assert_eq!(
        err,
        DashboardError::Transport("Backend request timeout".to_string())
    );
    assert!(h.snapshot().await.in_flight_slots.is_empty());
    assert_eq!(
        h.sink.error_logs(),
        vec!["[X] ERROR: Failed to queue player - Backend request timeout"]
    );

    let view = h.handle.submit(1).await.expect("slot is free again");
    assert_eq!(view.ticket_id.as_deref(), Some("TKT-1"));
    assert_eq!(h.backend.join_calls(), 2);
    assert_eq!(h.snapshot().await.pool.total, 1);

    h.shutdown().await;
}

#[tokio::test]
async fn missing_ticket_id_is_matched_by_player_name() {
    let backend = FakeBackend::default();
    backend.push_join(Ok(JoinQueueResponse::default()));
    let h = Harness::start(backend, gen());
    h.ready().await;

    let view = h.handle.submit(3).await.expect("submit");
    assert_eq!(view.ticket_id, None);
    assert_eq!(view.player_name, "HOTEL_08");
    assert_eq!(h.handle.ticket(3).await.expect("present"), view);

    h.push
        .match_found(&match_event("M-5", "2v2_clash", &["HOTEL_08"]))
        .await;
    h.flush_push("matched").await;
    assert_eq!(h.snapshot().await.pool.total, 0);

    h.shutdown().await;
}

#[tokio::test]
async fn run_match_only_logs() {
    let h = Harness::start(FakeBackend::default(), gen());
    h.ready().await;
    let calls = h.backend.total_calls();

    h.handle.run_match().await.expect("run_match");
    let logs = h.sink.logs();
    let tail = &logs[logs.len() - 4..];
    assert_eq!(
        tail,
        [
            "[ℹ] BACKEND MATCHING: Matches are handled by the backend worker",
            "> Backend worker automatically processes matches every 2 seconds",
            "> Players will be matched when conditions are met",
            "> Real-time match events are received via WebSocket",
        ]
    );
    assert_eq!(h.backend.total_calls(), calls);

    h.shutdown().await;
}
