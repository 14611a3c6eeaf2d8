//! Seen-match gate.
//!
//! The push channel is at-most-once per connection, but a backend may still
//! re-deliver a match (retries on its side, a replay after reconnect). The
//! gate records every match identifier that has been applied so re-delivery
//! is a no-op.

use std::collections::HashSet;

#[derive(Debug, Clone, Default)]
pub struct MatchGate {
    seen: HashSet<String>,
}

impl MatchGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// `true` the first time `match_id` is offered; `false` on every repeat.
    pub fn admit(&mut self, match_id: &str) -> bool {
        if self.seen.contains(match_id) {
            return false;
        }
        self.seen.insert(match_id.to_string());
        true
    }

    pub fn contains(&self, match_id: &str) -> bool {
        self.seen.contains(match_id)
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    pub fn reset(&mut self) {
        self.seen.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admits_each_id_once() {
        let mut g = MatchGate::new();
        assert!(g.admit("m-1"));
        assert!(!g.admit("m-1"));
        assert!(g.admit("m-2"));
        assert_eq!(g.len(), 2);

        g.reset();
        assert!(g.is_empty());
        assert!(g.admit("m-1"));
    }
}
