use mmd_audit::{AuditTrail, TOPIC_LOG, TOPIC_MATCH};
use mmd_registry::{PlayerTicket, RegistryError, TicketRegistry};
use mmd_schemas::{
    ConnectionState, MatchEvent, Notification, PoolSnapshot, PoolView, StatusView, SystemStatus,
};
use serde_json::json;
use tracing::{debug, info, warn};

use crate::gate::MatchGate;
use crate::watermark::{PollFreshness, PollWatermark};

/// Result of offering a match event to the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchOutcome {
    /// First delivery. `removed` local tickets were covered by the match.
    Applied { removed: usize },
    /// The match identifier was already applied; nothing changed.
    Duplicate,
}

/// Result of offering a poll response to the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// Accepted and the displayed values changed.
    Applied,
    /// Accepted; the displayed values were already current.
    Unchanged,
    /// Older than the last applied response; discarded.
    Stale { watermark: u64, got: u64 },
}

/// Single writer of the ticket registry and owner of the dashboard counters.
///
/// Every mutating method returns the notifications describing the mutation,
/// in the order the presentation layer should see them. Notifications are
/// built only after the mutation has been applied. Log notifications are
/// appended to the audit history on the way out.
#[derive(Debug)]
pub struct ReconcileEngine {
    registry: TicketRegistry,
    gate: MatchGate,
    pool_watermark: PollWatermark,
    status_watermark: PollWatermark,
    audit: AuditTrail,

    match_count: u64,
    displayed_total_queued: u64,
    queue_active: bool,
    system_line: Option<String>,
    connection: ConnectionState,
}

impl ReconcileEngine {
    pub fn new(registry: TicketRegistry) -> Self {
        Self::with_audit(registry, AuditTrail::default())
    }

    pub fn with_audit(registry: TicketRegistry, audit: AuditTrail) -> Self {
        Self {
            registry,
            gate: MatchGate::new(),
            pool_watermark: PollWatermark::new(),
            status_watermark: PollWatermark::new(),
            audit,
            match_count: 0,
            displayed_total_queued: 0,
            queue_active: false,
            system_line: None,
            connection: ConnectionState::Disconnected,
        }
    }

    // -----------------------------------------------------------------------
    // Read side
    // -----------------------------------------------------------------------

    pub fn registry(&self) -> &TicketRegistry {
        &self.registry
    }

    pub fn audit(&self) -> &AuditTrail {
        &self.audit
    }

    pub fn match_count(&self) -> u64 {
        self.match_count
    }

    pub fn connection(&self) -> ConnectionState {
        self.connection
    }

    pub fn pool_view(&self) -> PoolView {
        self.registry.view()
    }

    pub fn status_view(&self) -> StatusView {
        StatusView {
            displayed_total_queued: self.displayed_total_queued,
            queue_active: self.queue_active,
            match_count: self.match_count,
            connection: self.connection,
            system_line: self.system_line.clone(),
        }
    }

    /// Has `match_id` already been applied?
    pub fn has_seen_match(&self, match_id: &str) -> bool {
        self.gate.contains(match_id)
    }

    // -----------------------------------------------------------------------
    // Log lines
    // -----------------------------------------------------------------------

    pub fn log_info(&mut self, message: impl Into<String>) -> Notification {
        let n = Notification::log_info(message);
        self.audit_log(&n);
        n
    }

    pub fn log_error(&mut self, message: impl Into<String>) -> Notification {
        let n = Notification::log_error(message);
        self.audit_log(&n);
        n
    }

    /// Pass through notifications produced elsewhere (catalog loader, push
    /// channel), recording any log lines in the audit history.
    pub fn record(&mut self, notifications: Vec<Notification>) -> Vec<Notification> {
        for n in &notifications {
            self.audit_log(n);
        }
        notifications
    }

    fn audit_log(&mut self, n: &Notification) {
        if let Notification::Log(line) = n {
            let payload = json!({ "level": line.level, "message": line.message });
            if let Err(err) = self.audit.append_at(line.ts, TOPIC_LOG, "line", payload) {
                warn!(error = %err, "audit append failed");
            }
        }
    }

    // -----------------------------------------------------------------------
    // Push-driven
    // -----------------------------------------------------------------------

    /// Apply an authoritative match event.
    ///
    /// A repeated match identifier is rejected before anything is recorded,
    /// counted or removed.
    pub fn on_match_event(&mut self, event: &MatchEvent) -> (MatchOutcome, Vec<Notification>) {
        if !self.gate.admit(&event.match_id) {
            debug!(match_id = %event.match_id, "duplicate match event ignored");
            return (MatchOutcome::Duplicate, Vec::new());
        }

        match serde_json::to_value(event) {
            Ok(payload) => {
                if let Err(err) = self.audit.append(TOPIC_MATCH, "match_found", payload) {
                    warn!(error = %err, "audit append failed");
                }
            }
            Err(err) => warn!(error = %err, "match event not serializable for audit"),
        }
        self.match_count += 1;

        let removed = self.registry.remove_covered(&event.ticket_ids);
        info!(
            match_id = %event.match_id,
            game_mode = %event.game_mode,
            covered = event.ticket_ids.len(),
            removed = removed.len(),
            "match applied"
        );

        let player_count = event.ticket_ids.len();
        let mut out = vec![
            self.log_info(format!("[*] MATCH FOUND: {}", event.match_id)),
            self.log_info(format!("    Mode: {}", event.game_mode.to_uppercase())),
            self.log_info(format!("    Region: {}", event.region)),
            self.log_info(format!("    Players: {player_count}")),
        ];
        out.push(Notification::MatchFound {
            match_id: event.match_id.clone(),
            game_mode: event.game_mode.clone(),
            region: event.region.clone(),
            player_count,
        });
        out.push(Notification::MatchDetail {
            match_id: event.match_id.clone(),
            teams: event.teams.clone(),
            timestamp: event.timestamp,
        });
        out.push(Notification::PoolChanged(self.registry.view()));
        out.push(Notification::StatusChanged(self.status_view()));

        (
            MatchOutcome::Applied {
                removed: removed.len(),
            },
            out,
        )
    }

    /// Record a push connection transition.
    pub fn set_connection(&mut self, state: ConnectionState) -> Vec<Notification> {
        if self.connection == state {
            return Vec::new();
        }
        self.connection = state;
        vec![Notification::StatusChanged(self.status_view())]
    }

    // -----------------------------------------------------------------------
    // Poll-driven
    // -----------------------------------------------------------------------

    /// Overwrite the displayed aggregate counters from a pool snapshot.
    ///
    /// The registry is never consulted or mutated here.
    pub fn on_pool_snapshot(
        &mut self,
        seq: u64,
        snapshot: &PoolSnapshot,
    ) -> (PollOutcome, Vec<Notification>) {
        if let PollFreshness::Stale { watermark, got } = self.pool_watermark.accept(seq) {
            debug!(watermark, got, "stale pool snapshot discarded");
            return (PollOutcome::Stale { watermark, got }, Vec::new());
        }

        let total = snapshot.total_queued();
        let active = snapshot.has_active_queue();
        if total == self.displayed_total_queued && active == self.queue_active {
            return (PollOutcome::Unchanged, Vec::new());
        }
        self.displayed_total_queued = total;
        self.queue_active = active;
        (
            PollOutcome::Applied,
            vec![Notification::StatusChanged(self.status_view())],
        )
    }

    pub fn on_system_status(
        &mut self,
        seq: u64,
        status: &SystemStatus,
    ) -> (PollOutcome, Vec<Notification>) {
        if let PollFreshness::Stale { watermark, got } = self.status_watermark.accept(seq) {
            debug!(watermark, got, "stale system status discarded");
            return (PollOutcome::Stale { watermark, got }, Vec::new());
        }

        let line = status.display_line();
        if self.system_line.as_deref() == Some(line.as_str()) {
            return (PollOutcome::Unchanged, Vec::new());
        }
        self.system_line = Some(line);
        (
            PollOutcome::Applied,
            vec![Notification::StatusChanged(self.status_view())],
        )
    }

    // -----------------------------------------------------------------------
    // Submission / clear
    // -----------------------------------------------------------------------

    /// Validate a slot before any backend call is made.
    pub fn check_slot(&self, slot: u32) -> Result<(), RegistryError> {
        self.registry.check_slot(slot)
    }

    /// Optimistic insert after a successful enqueue.
    pub fn insert_submitted(
        &mut self,
        ticket: PlayerTicket,
    ) -> Result<Vec<Notification>, RegistryError> {
        let (slot, skill, region) = (ticket.slot, ticket.skill, ticket.region);
        self.registry.insert(ticket)?;

        let mut out = vec![Notification::PoolChanged(self.registry.view())];
        out.push(self.log_info(format!(
            "✓ PLAYER_{slot} QUEUED [SKILL: {skill} | REGION: {region}]"
        )));
        Ok(out)
    }

    /// Local-only clear. Backend-side tickets stay queued.
    pub fn clear(&mut self) -> (usize, Vec<Notification>) {
        let removed = self.registry.clear().len();
        info!(removed, "player pool cleared");
        let out = vec![
            Notification::PoolChanged(self.registry.view()),
            self.log_info("> PLAYER POOL CLEARED"),
        ];
        (removed, out)
    }

    /// Explicit lifecycle reset: registry, seen matches, counters, watermarks
    /// and audit history all return to their initial state.
    pub fn reset(&mut self) -> Vec<Notification> {
        self.registry.clear();
        self.gate.reset();
        self.pool_watermark.reset();
        self.status_watermark.reset();
        self.audit.reset();
        self.match_count = 0;
        self.displayed_total_queued = 0;
        self.queue_active = false;
        self.system_line = None;
        vec![
            Notification::PoolChanged(self.registry.view()),
            Notification::StatusChanged(self.status_view()),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};
    use mmd_schemas::{PoolStats, Region};
    use std::collections::BTreeMap;

    fn ts() -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp(1_718_000_000, 0).unwrap()
    }

    fn engine() -> ReconcileEngine {
        ReconcileEngine::new(TicketRegistry::new(4, 45..=130))
    }

    fn ticket(slot: u32, id: &str) -> PlayerTicket {
        PlayerTicket::new(
            slot,
            format!("P_{slot}"),
            80,
            Region::UsEast,
            "1v1_duel",
            Some(id.to_string()),
            ts(),
        )
    }

    fn match_event(id: &str, tickets: &[&str]) -> MatchEvent {
        MatchEvent {
            match_id: id.to_string(),
            game_mode: "1v1_duel".to_string(),
            region: "us-east".to_string(),
            ticket_ids: tickets.iter().map(|s| s.to_string()).collect(),
            teams: BTreeMap::new(),
            timestamp: Some(ts()),
        }
    }

    fn pool(sizes: &[(&str, u64)]) -> PoolSnapshot {
        PoolSnapshot {
            pool_status: sizes
                .iter()
                .map(|(k, n)| {
                    (
                        k.to_string(),
                        PoolStats {
                            queue_size: *n,
                            extra: BTreeMap::new(),
                        },
                    )
                })
                .collect(),
        }
    }

    #[test]
    fn match_event_emits_in_order_after_removal() {
        let mut e = engine();
        e.insert_submitted(ticket(1, "t-1")).unwrap();
        e.insert_submitted(ticket(2, "t-2")).unwrap();

        let (outcome, out) = e.on_match_event(&match_event("m-1", &["t-1", "t-9"]));
        assert_eq!(outcome, MatchOutcome::Applied { removed: 1 });
        assert_eq!(e.match_count(), 1);

        let logs: Vec<&str> = out.iter().filter_map(Notification::log_message).collect();
        assert_eq!(
            logs,
            vec![
                "[*] MATCH FOUND: m-1",
                "    Mode: 1V1_DUEL",
                "    Region: us-east",
                "    Players: 2"
            ]
        );

        let rest: Vec<&Notification> = out.iter().filter(|n| n.log_message().is_none()).collect();
        assert!(matches!(rest[0], Notification::MatchFound { player_count: 2, .. }));
        assert!(matches!(rest[1], Notification::MatchDetail { .. }));
        match rest[2] {
            Notification::PoolChanged(view) => assert_eq!(view.total, 1),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn duplicate_match_is_a_no_op() {
        let mut e = engine();
        e.insert_submitted(ticket(1, "t-1")).unwrap();
        e.on_match_event(&match_event("m-1", &["t-1"]));
        let audit_len = e.audit().len();

        e.insert_submitted(ticket(1, "t-1")).unwrap();
        let (outcome, out) = e.on_match_event(&match_event("m-1", &["t-1"]));
        assert_eq!(outcome, MatchOutcome::Duplicate);
        assert!(out.is_empty());
        assert_eq!(e.match_count(), 1);
        assert_eq!(e.registry().len(), 1);
        // Only the success log line of the second insert was added.
        assert_eq!(e.audit().len(), audit_len + 1);
    }

    #[test]
    fn pool_snapshot_updates_aggregates_only() {
        let mut e = engine();
        e.insert_submitted(ticket(1, "t-1")).unwrap();

        let (outcome, out) = e.on_pool_snapshot(1, &pool(&[("1v1_duel", 5), ("2v2_clash", 0)]));
        assert_eq!(outcome, PollOutcome::Applied);
        assert_eq!(out.len(), 1);
        let status = e.status_view();
        assert_eq!(status.displayed_total_queued, 5);
        assert!(status.queue_active);
        assert_eq!(e.registry().len(), 1);

        let (outcome, _) = e.on_pool_snapshot(2, &pool(&[("1v1_duel", 5)]));
        assert_eq!(outcome, PollOutcome::Unchanged);
    }

    #[test]
    fn stale_pool_snapshot_is_discarded() {
        let mut e = engine();
        e.on_pool_snapshot(5, &pool(&[("1v1_duel", 3)]));
        let (outcome, out) = e.on_pool_snapshot(4, &pool(&[("1v1_duel", 9)]));
        assert_eq!(
            outcome,
            PollOutcome::Stale {
                watermark: 5,
                got: 4
            }
        );
        assert!(out.is_empty());
        assert_eq!(e.status_view().displayed_total_queued, 3);
    }

    #[test]
    fn status_and_pool_watermarks_are_independent() {
        let mut e = engine();
        e.on_pool_snapshot(10, &pool(&[("1v1_duel", 1)]));
        let status = SystemStatus {
            status: "online".to_string(),
            active_queues: 1,
            uptime: json!("1h"),
        };
        let (outcome, _) = e.on_system_status(1, &status);
        assert_eq!(outcome, PollOutcome::Applied);
        assert_eq!(
            e.status_view().system_line.as_deref(),
            Some("SYSTEM: ONLINE | ACTIVE QUEUES: 1 | UPTIME: 1h")
        );
    }

    #[test]
    fn insert_failure_emits_nothing() {
        let mut e = engine();
        e.insert_submitted(ticket(1, "t-1")).unwrap();
        let err = e.insert_submitted(ticket(1, "t-2")).unwrap_err();
        assert_eq!(err, RegistryError::SlotOccupied { slot: 1 });
        assert_eq!(e.registry().len(), 1);
    }

    #[test]
    fn clear_and_reset() {
        let mut e = engine();
        e.insert_submitted(ticket(1, "t-1")).unwrap();
        e.insert_submitted(ticket(2, "t-2")).unwrap();
        let (removed, out) = e.clear();
        assert_eq!(removed, 2);
        assert_eq!(out[1].log_message(), Some("> PLAYER POOL CLEARED"));

        e.on_match_event(&match_event("m-1", &[]));
        assert!(e.has_seen_match("m-1"));
        e.reset();
        assert_eq!(e.match_count(), 0);
        assert!(!e.has_seen_match("m-1"));
        assert!(e.audit().is_empty());
    }

    #[test]
    fn connection_change_emits_status_once() {
        let mut e = engine();
        assert_eq!(e.set_connection(ConnectionState::Connecting).len(), 1);
        assert!(e.set_connection(ConnectionState::Connecting).is_empty());
        assert_eq!(e.status_view().connection, ConnectionState::Connecting);
    }
}
