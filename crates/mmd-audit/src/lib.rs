//! Append-only dashboard history.
//!
//! Every match event and every dashboard log line is appended here for
//! audit/history only; nothing in the matching path reads it back. Entries
//! can carry a SHA-256 hash chain (`hash_prev` + `hash_self`) so an exported
//! history can be verified after the fact.
//!
//! The trail is in-memory. It lives as long as the owning runtime and is only
//! emptied by an explicit [`AuditTrail::reset`].

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

pub const TOPIC_MATCH: &str = "match";
pub const TOPIC_LOG: &str = "log";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub seq: u64,
    pub ts_utc: DateTime<Utc>,
    pub topic: String,
    pub event_type: String,
    pub payload: Value,
    pub hash_prev: Option<String>,
    pub hash_self: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AuditTrail {
    entries: Vec<AuditEntry>,
    hash_chain: bool,
    last_hash: Option<String>,
    /// Next sequence number; equals the number of entries appended since the
    /// last reset.
    seq: u64,
}

impl Default for AuditTrail {
    fn default() -> Self {
        Self::new(true)
    }
}

impl AuditTrail {
    pub fn new(hash_chain: bool) -> Self {
        Self {
            entries: Vec::new(),
            hash_chain,
            last_hash: None,
            seq: 0,
        }
    }

    /// Append one entry stamped with the current time.
    pub fn append(&mut self, topic: &str, event_type: &str, payload: Value) -> Result<&AuditEntry> {
        self.append_at(Utc::now(), topic, event_type, payload)
    }

    /// Append with an explicit timestamp.
    pub fn append_at(
        &mut self,
        ts_utc: DateTime<Utc>,
        topic: &str,
        event_type: &str,
        payload: Value,
    ) -> Result<&AuditEntry> {
        let mut entry = AuditEntry {
            seq: self.seq,
            ts_utc,
            topic: topic.to_string(),
            event_type: event_type.to_string(),
            payload,
            hash_prev: None,
            hash_self: None,
        };

        if self.hash_chain {
            entry.hash_prev = self.last_hash.clone();
            let self_hash = compute_entry_hash(&entry)?;
            entry.hash_self = Some(self_hash.clone());
            self.last_hash = Some(self_hash);
        }

        self.seq += 1;
        self.entries.push(entry);
        let idx = self.entries.len() - 1;
        Ok(&self.entries[idx])
    }

    pub fn entries(&self) -> &[AuditEntry] {
        &self.entries
    }

    pub fn by_topic<'a>(&'a self, topic: &'a str) -> impl Iterator<Item = &'a AuditEntry> + 'a {
        self.entries.iter().filter(move |e| e.topic == topic)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn last_hash(&self) -> Option<&str> {
        self.last_hash.as_deref()
    }

    /// Explicit lifecycle reset. The hash chain restarts from genesis.
    pub fn reset(&mut self) {
        self.entries.clear();
        self.last_hash = None;
        self.seq = 0;
    }

    /// Export as JSON Lines (one canonical entry per line).
    pub fn to_jsonl(&self) -> Result<String> {
        let mut out = String::new();
        for e in &self.entries {
            out.push_str(&canonical_json_line(e)?);
            out.push('\n');
        }
        Ok(out)
    }

    /// Verify the in-memory chain.
    pub fn verify(&self) -> Result<VerifyResult> {
        verify_entries(self.entries.iter().cloned().enumerate())
    }
}

/// Canonicalize by sorting keys recursively and emitting compact JSON.
fn canonical_json_line<T: Serialize>(v: &T) -> Result<String> {
    let raw = serde_json::to_value(v).context("serialize audit entry failed")?;
    serde_json::to_string(&sort_keys(&raw)).context("json stringify failed")
}

fn sort_keys(v: &Value) -> Value {
    match v {
        Value::Object(map) => {
            let mut keys: Vec<_> = map.keys().cloned().collect();
            keys.sort();
            let mut new = serde_json::Map::new();
            for k in keys {
                new.insert(k.clone(), sort_keys(&map[&k]));
            }
            Value::Object(new)
        }
        Value::Array(arr) => Value::Array(arr.iter().map(sort_keys).collect()),
        _ => v.clone(),
    }
}

/// Hash over the canonical JSON of the entry WITHOUT `hash_self`.
pub fn compute_entry_hash(entry: &AuditEntry) -> Result<String> {
    let mut clone = entry.clone();
    clone.hash_self = None;

    let canonical = canonical_json_line(&clone)?;
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    Ok(hex::encode(hasher.finalize()))
}

/// Verify an exported JSONL history.
pub fn verify_hash_chain_str(content: &str) -> Result<VerifyResult> {
    let mut parsed = Vec::new();
    for (i, line) in content.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let entry: AuditEntry = serde_json::from_str(trimmed)
            .with_context(|| format!("parse audit entry at line {}", i + 1))?;
        parsed.push((i, entry));
    }
    verify_entries(parsed.into_iter())
}

fn verify_entries(entries: impl Iterator<Item = (usize, AuditEntry)>) -> Result<VerifyResult> {
    let mut prev_hash: Option<String> = None;
    let mut count = 0usize;

    for (i, entry) in entries {
        count += 1;

        if entry.hash_prev != prev_hash {
            return Ok(VerifyResult::Broken {
                line: i + 1,
                reason: format!(
                    "hash_prev mismatch: expected {:?}, got {:?}",
                    prev_hash, entry.hash_prev
                ),
            });
        }

        if let Some(ref claimed) = entry.hash_self {
            let recomputed = compute_entry_hash(&entry)?;
            if *claimed != recomputed {
                return Ok(VerifyResult::Broken {
                    line: i + 1,
                    reason: format!(
                        "hash_self mismatch: claimed {}, recomputed {}",
                        claimed, recomputed
                    ),
                });
            }
        }

        prev_hash = entry.hash_self.clone();
    }

    Ok(VerifyResult::Valid { lines: count })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyResult {
    Valid { lines: usize },
    Broken { line: usize, reason: String },
}

impl VerifyResult {
    pub fn is_valid(&self) -> bool {
        matches!(self, VerifyResult::Valid { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> AuditTrail {
        let mut t = AuditTrail::new(true);
        t.append(TOPIC_LOG, "line", json!({ "message": "> LOADING BACKEND DATA..." }))
            .unwrap();
        t.append(TOPIC_MATCH, "match_found", json!({ "matchId": "m-1" }))
            .unwrap();
        t.append(TOPIC_LOG, "line", json!({ "message": "[*] MATCH FOUND: m-1" }))
            .unwrap();
        t
    }

    #[test]
    fn chain_links_each_entry_to_previous() {
        let t = sample();
        let e = t.entries();
        assert_eq!(e[0].hash_prev, None);
        assert_eq!(e[1].hash_prev, e[0].hash_self);
        assert_eq!(e[2].hash_prev, e[1].hash_self);
        assert_eq!(t.last_hash(), e[2].hash_self.as_deref());
        assert_eq!(t.verify().unwrap(), VerifyResult::Valid { lines: 3 });
    }

    #[test]
    fn exported_history_verifies_and_detects_tampering() {
        let t = sample();
        let jsonl = t.to_jsonl().unwrap();
        assert!(verify_hash_chain_str(&jsonl).unwrap().is_valid());

        let tampered = jsonl.replace("m-1", "m-2");
        let res = verify_hash_chain_str(&tampered).unwrap();
        assert!(
            matches!(res, VerifyResult::Broken { line: 2, .. }),
            "unexpected: {res:?}"
        );
    }

    #[test]
    fn by_topic_filters_and_reset_restarts_sequence() {
        let mut t = sample();
        assert_eq!(t.by_topic(TOPIC_MATCH).count(), 1);
        assert_eq!(t.by_topic(TOPIC_LOG).count(), 2);

        t.reset();
        assert!(t.is_empty());
        let e = t.append(TOPIC_LOG, "line", json!({})).unwrap();
        assert_eq!(e.seq, 0);
        assert_eq!(e.hash_prev, None);
    }

    #[test]
    fn unchained_trail_has_no_hashes_and_still_verifies() {
        let mut t = AuditTrail::new(false);
        t.append(TOPIC_LOG, "line", json!({ "message": "x" })).unwrap();
        assert!(t.entries()[0].hash_self.is_none());
        assert!(t.verify().unwrap().is_valid());
    }
}
