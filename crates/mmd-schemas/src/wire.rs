//! REST wire types for the matchmaking backend.
//!
//! Field names follow the backend exactly (`game_modes`, `playerName`,
//! `regionPreference`, `pool_status`, ...). Unknown fields are ignored.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ---------------------------------------------------------------------------
// Game modes
// ---------------------------------------------------------------------------

/// One selectable game mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameMode {
    pub key: String,
    pub description: String,
}

impl GameMode {
    pub fn new(key: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            description: description.into(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
struct GameModeInfo {
    #[serde(default)]
    description: String,
}

/// `GET /game_modes`
///
/// The catalog is an object keyed by mode; key order is significant (the first
/// key becomes the default mode), so the raw map is kept and converted in order.
#[derive(Debug, Clone, Deserialize)]
pub struct GameModesResponse {
    pub game_modes: serde_json::Map<String, Value>,
}

impl GameModesResponse {
    /// Convert into an ordered list of modes, preserving backend key order.
    pub fn into_modes(self) -> Result<Vec<GameMode>, serde_json::Error> {
        let mut out = Vec::with_capacity(self.game_modes.len());
        for (key, raw) in self.game_modes {
            let info: GameModeInfo = if raw.is_null() {
                GameModeInfo::default()
            } else {
                serde_json::from_value(raw)?
            };
            out.push(GameMode {
                key,
                description: info.description,
            });
        }
        Ok(out)
    }
}

// ---------------------------------------------------------------------------
// Regions
// ---------------------------------------------------------------------------

/// Fixed region set players can be queued in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Region {
    #[serde(rename = "in-central")]
    InCentral,
    #[serde(rename = "us-east")]
    UsEast,
    #[serde(rename = "eu-west")]
    EuWest,
    #[serde(rename = "asia-se")]
    AsiaSe,
}

impl Region {
    pub const ALL: [Region; 4] = [
        Region::InCentral,
        Region::UsEast,
        Region::EuWest,
        Region::AsiaSe,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Region::InCentral => "in-central",
            Region::UsEast => "us-east",
            Region::EuWest => "eu-west",
            Region::AsiaSe => "asia-se",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "in-central" => Some(Region::InCentral),
            "us-east" => Some(Region::UsEast),
            "eu-west" => Some(Region::EuWest),
            "asia-se" => Some(Region::AsiaSe),
            _ => None,
        }
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// POST /join_queue
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinQueueRequest {
    pub player_name: String,
    pub skill: i64,
    /// Ordered list of `{region: weight}` preferences.
    pub region_preference: Vec<BTreeMap<String, u32>>,
}

impl JoinQueueRequest {
    /// A request preferring exactly one region with weight 1.
    pub fn single_region(player_name: impl Into<String>, skill: i64, region: Region) -> Self {
        let mut pref = BTreeMap::new();
        pref.insert(region.as_str().to_string(), 1);
        Self {
            player_name: player_name.into(),
            skill,
            region_preference: vec![pref],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketRef {
    pub ticket: String,
}

/// Success body of `POST /join_queue`.
///
/// Current backends answer `{ticket: {ticket: <id>}}`; older ones answer
/// `{player_id: <id>}`. Both are accepted. A body carrying neither yields no
/// ticket identifier.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinQueueResponse {
    #[serde(default)]
    pub ticket: Option<TicketRef>,
    #[serde(default)]
    pub player_id: Option<String>,
}

impl JoinQueueResponse {
    pub fn ticket_id(&self) -> Option<&str> {
        self.ticket
            .as_ref()
            .map(|t| t.ticket.as_str())
            .or(self.player_id.as_deref())
            .filter(|id| !id.trim().is_empty())
    }
}

/// Error body returned with non-2xx statuses (`{detail}`).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub detail: Option<Value>,
}

impl ErrorBody {
    /// Human-readable rendering of `detail`.
    ///
    /// Strings are returned verbatim; validation lists (`[{msg: ..}, ..]`) are
    /// joined with `"; "`; anything else is rendered as compact JSON.
    pub fn detail_text(&self) -> Option<String> {
        match self.detail.as_ref()? {
            Value::Null => None,
            Value::String(s) => Some(s.clone()),
            Value::Array(items) => {
                let msgs: Vec<String> = items
                    .iter()
                    .map(|item| match item.get("msg").and_then(Value::as_str) {
                        Some(m) => m.to_string(),
                        None => item.to_string(),
                    })
                    .collect();
                Some(msgs.join("; "))
            }
            other => Some(other.to_string()),
        }
    }
}

// ---------------------------------------------------------------------------
// GET /system_status
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemStatusResponse {
    pub system: SystemStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemStatus {
    pub status: String,
    #[serde(default)]
    pub active_queues: u64,
    /// Number or preformatted string; displayed verbatim.
    #[serde(default)]
    pub uptime: Value,
}

impl SystemStatus {
    pub fn uptime_text(&self) -> String {
        match &self.uptime {
            Value::Null => "-".to_string(),
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }

    /// `SYSTEM: ONLINE | ACTIVE QUEUES: 2 | UPTIME: 3h`
    pub fn display_line(&self) -> String {
        format!(
            "SYSTEM: {} | ACTIVE QUEUES: {} | UPTIME: {}",
            self.status.to_uppercase(),
            self.active_queues,
            self.uptime_text()
        )
    }
}

// ---------------------------------------------------------------------------
// GET /pool_status
// ---------------------------------------------------------------------------

/// Per-mode pool statistics. Only `queue_size` is interpreted; all other
/// fields are kept verbatim in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PoolStats {
    #[serde(default)]
    pub queue_size: u64,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// Authoritative aggregate view of every pool. Carries no per-ticket identity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PoolSnapshot {
    #[serde(default)]
    pub pool_status: BTreeMap<String, PoolStats>,
}

impl PoolSnapshot {
    pub fn total_queued(&self) -> u64 {
        self.pool_status.values().map(|p| p.queue_size).sum()
    }

    pub fn active_queue_count(&self) -> usize {
        self.pool_status
            .values()
            .filter(|p| p.queue_size > 0)
            .count()
    }

    pub fn has_active_queue(&self) -> bool {
        self.active_queue_count() > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn game_modes_keep_backend_order() {
        let raw = json!({
            "game_modes": {
                "zeta_mode": { "description": "last alphabetically" },
                "alpha_mode": { "description": "first alphabetically", "teamSize": 1 },
                "mid_mode": {}
            }
        });
        let resp: GameModesResponse = serde_json::from_value(raw).unwrap();
        let modes = resp.into_modes().unwrap();
        let keys: Vec<&str> = modes.iter().map(|m| m.key.as_str()).collect();
        assert_eq!(keys, vec!["zeta_mode", "alpha_mode", "mid_mode"]);
        assert_eq!(modes[2].description, "");
    }

    #[test]
    fn join_request_uses_camel_case_and_region_weight() {
        let req = JoinQueueRequest::single_region("ALPHA_01", 77, Region::EuWest);
        let v = serde_json::to_value(&req).unwrap();
        assert_eq!(
            v,
            json!({
                "playerName": "ALPHA_01",
                "skill": 77,
                "regionPreference": [{ "eu-west": 1 }]
            })
        );
    }

    #[test]
    fn join_response_accepts_nested_ticket_or_player_id() {
        let nested: JoinQueueResponse =
            serde_json::from_value(json!({ "ticket": { "ticket": "t-1", "status": "searching" } }))
                .unwrap();
        assert_eq!(nested.ticket_id(), Some("t-1"));

        let legacy: JoinQueueResponse =
            serde_json::from_value(json!({ "message": "queued", "player_id": "p-9" })).unwrap();
        assert_eq!(legacy.ticket_id(), Some("p-9"));

        let neither: JoinQueueResponse = serde_json::from_value(json!({})).unwrap();
        assert_eq!(neither.ticket_id(), None);
    }

    #[test]
    fn error_detail_renders_string_and_validation_list() {
        let s: ErrorBody = serde_json::from_value(json!({ "detail": "Invalid game mode" })).unwrap();
        assert_eq!(s.detail_text().as_deref(), Some("Invalid game mode"));

        let list: ErrorBody = serde_json::from_value(json!({
            "detail": [{ "loc": ["body", "skill"], "msg": "field required" }, { "msg": "bad region" }]
        }))
        .unwrap();
        assert_eq!(
            list.detail_text().as_deref(),
            Some("field required; bad region")
        );

        let none: ErrorBody = serde_json::from_value(json!({})).unwrap();
        assert_eq!(none.detail_text(), None);
    }

    #[test]
    fn pool_snapshot_aggregates() {
        let snap: PoolSnapshot = serde_json::from_value(json!({
            "pool_status": {
                "1v1_duel": { "queue_size": 3, "avg_wait": 1.5 },
                "2v2_clash": { "queue_size": 0 },
                "3v3_arena": { "queue_size": 4 }
            }
        }))
        .unwrap();
        assert_eq!(snap.total_queued(), 7);
        assert_eq!(snap.active_queue_count(), 2);
        assert!(snap.has_active_queue());
        assert!(snap.pool_status["1v1_duel"].extra.contains_key("avg_wait"));
    }

    #[test]
    fn system_status_display_line() {
        let st: SystemStatusResponse = serde_json::from_value(json!({
            "system": { "status": "online", "active_queues": 2, "uptime": "1h 2m" }
        }))
        .unwrap();
        assert_eq!(
            st.system.display_line(),
            "SYSTEM: ONLINE | ACTIVE QUEUES: 2 | UPTIME: 1h 2m"
        );
    }

    #[test]
    fn region_parse_round_trip() {
        for r in Region::ALL {
            assert_eq!(Region::parse(r.as_str()), Some(r));
        }
        assert_eq!(Region::parse("mars-north"), None);
    }
}
