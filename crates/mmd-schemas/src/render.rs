//! Notifications delivered to the presentation layer.
//!
//! The synchronization core never renders anything itself. It hands finished
//! [`Notification`] values to a [`RenderSink`], which may draw a terminal,
//! forward to an SSE stream, or record them for a test.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{GameMode, PlayerSummary, Region};

// ---------------------------------------------------------------------------
// Connection state
// ---------------------------------------------------------------------------

/// Lifecycle of the push channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Views
// ---------------------------------------------------------------------------

/// One locally tracked ticket, as shown in the pool list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketView {
    pub slot: u32,
    pub player_name: String,
    pub skill: i64,
    pub region: Region,
    pub game_mode: String,
    /// `None` while the backend has not assigned an identifier.
    pub ticket_id: Option<String>,
    pub enqueued_at: DateTime<Utc>,
}

/// The local optimistic pool.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolView {
    pub tickets: Vec<TicketView>,
    pub total: usize,
    /// Rounded mean skill; `None` when the pool is empty.
    pub average_skill: Option<i64>,
    /// Distinct regions in first-seen order.
    pub regions: Vec<Region>,
    pub most_common_region: Option<Region>,
}

/// Aggregate counters shown in the status bar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusView {
    pub displayed_total_queued: u64,
    pub queue_active: bool,
    pub match_count: u64,
    pub connection: ConnectionState,
    /// Last rendered system status line, if any poll succeeded.
    pub system_line: Option<String>,
}

impl Default for StatusView {
    fn default() -> Self {
        Self {
            displayed_total_queued: 0,
            queue_active: false,
            match_count: 0,
            connection: ConnectionState::Disconnected,
            system_line: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Log lines
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    Info,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogLine {
    pub ts: DateTime<Utc>,
    pub level: LogLevel,
    pub message: String,
}

impl LogLine {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            ts: Utc::now(),
            level: LogLevel::Info,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            ts: Utc::now(),
            level: LogLevel::Error,
            message: message.into(),
        }
    }

    /// `[14:03:07] message`
    pub fn display_line(&self) -> String {
        format!("[{}] {}", self.ts.format("%H:%M:%S"), self.message)
    }
}

// ---------------------------------------------------------------------------
// Notification
// ---------------------------------------------------------------------------

/// Everything the core tells the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Notification {
    /// The local ticket registry changed.
    PoolChanged(PoolView),
    MatchFound {
        match_id: String,
        game_mode: String,
        region: String,
        player_count: usize,
    },
    MatchDetail {
        match_id: String,
        teams: BTreeMap<String, Vec<PlayerSummary>>,
        timestamp: Option<DateTime<Utc>>,
    },
    StatusChanged(StatusView),
    /// Active catalog or selected mode changed.
    CatalogChanged {
        modes: Vec<GameMode>,
        selected: Option<String>,
        fallback: bool,
    },
    Log(LogLine),
}

impl Notification {
    pub fn log_info(message: impl Into<String>) -> Self {
        Notification::Log(LogLine::info(message))
    }

    pub fn log_error(message: impl Into<String>) -> Self {
        Notification::Log(LogLine::error(message))
    }

    /// The message text if this is a log line.
    pub fn log_message(&self) -> Option<&str> {
        match self {
            Notification::Log(line) => Some(line.message.as_str()),
            _ => None,
        }
    }
}

/// Presentation-side consumer of notifications.
///
/// Implementations must not block; they are called from the runtime loop.
pub trait RenderSink: Send + Sync {
    fn notify(&self, notification: Notification);
}

/// A sink that discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl RenderSink for NullSink {
    fn notify(&self, _notification: Notification) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notification_serializes_with_type_tag() {
        let n = Notification::MatchFound {
            match_id: "m-7".to_string(),
            game_mode: "1v1_duel".to_string(),
            region: "us-east".to_string(),
            player_count: 2,
        };
        let v = serde_json::to_value(&n).unwrap();
        assert_eq!(v["type"], "match_found");
        assert_eq!(v["player_count"], 2);

        let log = serde_json::to_value(Notification::log_info("hello")).unwrap();
        assert_eq!(log["type"], "log");
        assert_eq!(log["message"], "hello");
        assert_eq!(log["level"], "info");
    }

    #[test]
    fn log_message_only_for_logs() {
        assert_eq!(
            Notification::log_error("[X] boom").log_message(),
            Some("[X] boom")
        );
        assert_eq!(
            Notification::StatusChanged(StatusView::default()).log_message(),
            None
        );
    }
}
