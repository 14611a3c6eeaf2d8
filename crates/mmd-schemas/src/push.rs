//! Push-channel frames and typed events.
//!
//! A frame is one JSON text message `{"event": "<tag>", "data": <payload>}`.
//! Only three tags are dispatched; everything else is ignored by consumers.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// The event tags the dashboard understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PushEventKind {
    MatchFound,
    DashboardLog,
    PoolUpdated,
}

impl PushEventKind {
    pub const ALL: [PushEventKind; 3] = [
        PushEventKind::MatchFound,
        PushEventKind::DashboardLog,
        PushEventKind::PoolUpdated,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PushEventKind::MatchFound => "match_found",
            PushEventKind::DashboardLog => "dashboard_log",
            PushEventKind::PoolUpdated => "pool_updated",
        }
    }

    pub fn parse(tag: &str) -> Option<Self> {
        match tag {
            "match_found" => Some(PushEventKind::MatchFound),
            "dashboard_log" => Some(PushEventKind::DashboardLog),
            "pool_updated" => Some(PushEventKind::PoolUpdated),
            _ => None,
        }
    }
}

impl fmt::Display for PushEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw frame as carried by the transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PushFrame {
    pub event: String,
    #[serde(default)]
    pub data: Value,
}

impl PushFrame {
    pub fn new(kind: PushEventKind, data: Value) -> Self {
        Self {
            event: kind.as_str().to_string(),
            data,
        }
    }
}

// ---------------------------------------------------------------------------
// Payloads
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerSummary {
    pub player_name: String,
    #[serde(default)]
    pub skill: Option<i64>,
    #[serde(default)]
    pub region: Option<String>,
}

/// A match formed by the backend.
///
/// `ticket_ids` lists the tickets the match consumed, in backend order.
/// `teams` maps a team label to its ordered players.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchEvent {
    pub match_id: String,
    pub game_mode: String,
    #[serde(default)]
    pub region: String,
    #[serde(default)]
    pub ticket_ids: Vec<String>,
    #[serde(default)]
    pub teams: BTreeMap<String, Vec<PlayerSummary>>,
    #[serde(default, deserialize_with = "deserialize_backend_ts")]
    pub timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardLog {
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolUpdated {
    pub game_mode: String,
    #[serde(default)]
    pub action: Option<String>,
}

/// A decoded push event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushEvent {
    MatchFound(MatchEvent),
    DashboardLog(DashboardLog),
    PoolUpdated(PoolUpdated),
}

impl PushEvent {
    pub fn kind(&self) -> PushEventKind {
        match self {
            PushEvent::MatchFound(_) => PushEventKind::MatchFound,
            PushEvent::DashboardLog(_) => PushEventKind::DashboardLog,
            PushEvent::PoolUpdated(_) => PushEventKind::PoolUpdated,
        }
    }

    /// Decode `data` as the payload for `kind`.
    pub fn decode(kind: PushEventKind, data: Value) -> Result<Self, serde_json::Error> {
        Ok(match kind {
            PushEventKind::MatchFound => PushEvent::MatchFound(serde_json::from_value(data)?),
            PushEventKind::DashboardLog => PushEvent::DashboardLog(serde_json::from_value(data)?),
            PushEventKind::PoolUpdated => PushEvent::PoolUpdated(serde_json::from_value(data)?),
        })
    }
}

/// Backend timestamps arrive either as epoch seconds (`1718000000.25`), epoch
/// millis, or RFC 3339 strings. Anything unparseable maps to `None` so a
/// cosmetic field never causes a match event to be dropped.
fn deserialize_backend_ts<'de, D>(de: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Value>::deserialize(de)?;
    Ok(raw.and_then(|v| parse_backend_ts(&v)))
}

/// Values above this are treated as epoch milliseconds.
const MILLIS_THRESHOLD: f64 = 100_000_000_000.0;

pub fn parse_backend_ts(v: &Value) -> Option<DateTime<Utc>> {
    match v {
        Value::Number(n) => {
            let f = n.as_f64()?;
            if !f.is_finite() || f < 0.0 {
                return None;
            }
            let millis = if f >= MILLIS_THRESHOLD { f } else { f * 1000.0 };
            DateTime::<Utc>::from_timestamp_millis(millis.round() as i64)
        }
        Value::String(s) => DateTime::parse_from_rfc3339(s.trim())
            .ok()
            .map(|dt| dt.with_timezone(&Utc)),
        _ => None,
    }
}
