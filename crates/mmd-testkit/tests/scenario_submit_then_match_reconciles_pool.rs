//! Scenario: Submissions Build the Pool, Matches Drain It
//!
//! # Invariants under test
//! - Four successful submissions across two regions leave exactly four
//!   tickets, and the average skill is computed over exactly those four.
//! - A match covering two of the four ticket identifiers removes exactly
//!   those two and bumps the match counter to 1.
//! - Conservation: pool size = successful submissions - tickets removed by
//!   matches - tickets removed by clear, never negative.
//!
//! Runs the real runtime task against `FakeBackend`; no network.

use mmd_backend::BackendError;
use mmd_schemas::{Notification, Region};
use mmd_testkit::{match_event, profile, FakeBackend, FixedGenerator, Harness};

fn four_players() -> FixedGenerator {
    FixedGenerator::new(vec![
        profile("ALPHA_01", 80, Region::UsEast),
        profile("BRAVO_02", 100, Region::EuWest),
        profile("CHARLIE_03", 90, Region::UsEast),
        profile("DELTA_04", 111, Region::EuWest),
    ])
}

async fn submit_four(h: &Harness) -> Vec<String> {
    let mut ids = Vec::new();
    for slot in 1..=4 {
        let view = h.handle.submit(slot).await.expect("submit");
        ids.push(view.ticket_id.expect("backend assigned an id"));
    }
    ids
}

#[tokio::test]
async fn four_submissions_two_regions() {
    let h = Harness::start(FakeBackend::default(), four_players());
    h.ready().await;

    let ids = submit_four(&h).await;
    assert_eq!(ids, vec!["TKT-1", "TKT-2", "TKT-3", "TKT-4"]);

    let snap = h.snapshot().await;
    assert_eq!(snap.pool.total, 4);
    // (80 + 100 + 90 + 111) / 4 = 95.25
    assert_eq!(snap.pool.average_skill, Some(95));
    assert_eq!(snap.pool.regions, vec![Region::UsEast, Region::EuWest]);
    assert_eq!(snap.pool.most_common_region, Some(Region::UsEast));
    assert!(snap.in_flight_slots.is_empty());

    // Every request went to the selected (first) mode.
    let reqs = h.backend.join_requests();
    assert_eq!(reqs.len(), 4);
    assert!(reqs.iter().all(|(mode, _)| mode == "2v2_clash"));
    assert_eq!(reqs[1].1.player_name, "BRAVO_02");

    let logs = h.sink.logs();
    assert!(logs.contains(&"> QUEUEING PLAYER_1 FOR 2V2_CLASH...".to_string()));
    assert!(logs.contains(&"✓ PLAYER_4 QUEUED [SKILL: 111 | REGION: eu-west]".to_string()));

    h.shutdown().await;
}

#[tokio::test]
async fn match_covering_two_of_four_removes_exactly_two() {
    let h = Harness::start(FakeBackend::default(), four_players());
    h.ready().await;
    let ids = submit_four(&h).await;

    h.push.connect().await;
    h.push
        .match_found(&match_event("M-1", "2v2_clash", &[&ids[0], &ids[2]]))
        .await;
    h.flush_push("after M-1").await;

    let snap = h.snapshot().await;
    assert_eq!(snap.pool.total, 2);
    assert_eq!(snap.status.match_count, 1);
    let left: Vec<_> = snap
        .pool
        .tickets
        .iter()
        .filter_map(|t| t.ticket_id.clone())
        .collect();
    assert_eq!(left, vec!["TKT-2", "TKT-4"]);
    assert_eq!(h.match_notifications(), 1);

    let logs = h.sink.logs();
    assert!(logs.contains(&"[*] MATCH FOUND: M-1".to_string()));
    assert!(logs.contains(&"    Players: 2".to_string()));

    h.shutdown().await;
}

#[tokio::test]
async fn pool_size_is_conserved_across_mixed_operations() {
    let backend = FakeBackend::default();
    // Third submission is rejected by the backend and must not count.
    backend.push_join(Ok(mmd_testkit::ticket_response("A")));
    backend.push_join(Ok(mmd_testkit::ticket_response("B")));
    backend.push_join(Err(BackendError::Http {
        status: 400,
        detail: "Invalid game mode".to_string(),
    }));
    backend.push_join(Ok(mmd_testkit::ticket_response("C")));
    backend.push_join(Ok(mmd_testkit::ticket_response("D")));

    let h = Harness::start(backend, four_players());
    h.ready().await;

    let mut successful = 0usize;
    for slot in [1, 2, 3, 3, 4] {
        if h.handle.submit(slot).await.is_ok() {
            successful += 1;
        }
    }
    assert_eq!(successful, 4);
    assert_eq!(h.snapshot().await.pool.total, 4);

    // One real ticket, one unknown id, and a repeat of the same match.
    h.push
        .match_found(&match_event("M-1", "2v2_clash", &["A", "nope"]))
        .await;
    h.push
        .match_found(&match_event("M-1", "2v2_clash", &["A", "nope"]))
        .await;
    h.push
        .match_found(&match_event("M-2", "2v2_clash", &["B", "A"]))
        .await;
    h.flush_push("matches done").await;

    let removed_by_matches = 2;
    let snap = h.snapshot().await;
    assert_eq!(snap.pool.total, successful - removed_by_matches);
    assert_eq!(snap.status.match_count, 2);

    let cleared = h.handle.clear().await.expect("clear");
    assert_eq!(cleared, 2);
    assert_eq!(h.snapshot().await.pool.total, successful - removed_by_matches - cleared);

    h.shutdown().await;
}

#[tokio::test]
async fn pool_notifications_follow_each_mutation() {
    let h = Harness::start(FakeBackend::default(), four_players());
    h.ready().await;
    h.handle.submit(1).await.expect("submit");

    let pool_sizes: Vec<usize> = h
        .sink
        .notifications()
        .iter()
        .filter_map(|n| match n {
            Notification::PoolChanged(view) => Some(view.total),
            _ => None,
        })
        .collect();
    assert_eq!(pool_sizes, vec![1]);

    h.shutdown().await;
}
