//! Poll monotonicity watermark.
//!
//! # Purpose
//!
//! Polls are issued on a timer and their responses race each other: a slow
//! response to request 7 can arrive after the response to request 8. Applying
//! it would roll the displayed aggregate back in time. Every poll request is
//! stamped with a sequence number by the poller; this module tracks the
//! highest sequence number applied so far and rejects anything older.
//!
//! # Invariants
//!
//! - **Non-decreasing**: a response is accepted only if its sequence number
//!   is >= the last accepted one.
//! - **Watermark advances only on acceptance**: rejections (and failed polls,
//!   which never reach the watermark) do not move it.
//! - **Pure, no IO**.

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PollFreshness {
    Fresh,
    /// Response is older than the last applied one.
    Stale { watermark: u64, got: u64 },
}

impl PollFreshness {
    pub fn is_fresh(&self) -> bool {
        matches!(self, PollFreshness::Fresh)
    }
}

#[derive(Clone, Debug, Default)]
pub struct PollWatermark {
    last_applied: Option<u64>,
}

impl PollWatermark {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read-only freshness probe.
    pub fn check(&self, seq: u64) -> PollFreshness {
        match self.last_applied {
            Some(w) if seq < w => PollFreshness::Stale {
                watermark: w,
                got: seq,
            },
            _ => PollFreshness::Fresh,
        }
    }

    /// Check and advance the watermark if fresh.
    pub fn accept(&mut self, seq: u64) -> PollFreshness {
        let result = self.check(seq);
        if result.is_fresh() {
            self.last_applied = Some(seq);
        }
        result
    }

    pub fn last_applied(&self) -> Option<u64> {
        self.last_applied
    }

    pub fn reset(&mut self) {
        self.last_applied = None;
    }
}
