//! mmd-reconcile
//!
//! Reconciliation between the locally held optimistic ticket pool and the
//! authoritative matchmaking backend.
//!
//! - Match events (push, authoritative) are the only path that removes
//!   tickets, and each distinct match identifier is applied at most once.
//! - Pool/status snapshots (poll, eventually consistent) only overwrite the
//!   displayed aggregate counters; they never touch per-ticket state.
//! - Poll responses older than the last applied one are discarded.
//!
//! Deterministic, pure logic. No IO.

mod engine;
mod gate;
mod watermark;

pub use engine::{MatchOutcome, PollOutcome, ReconcileEngine};
pub use gate::MatchGate;
pub use watermark::{PollFreshness, PollWatermark};
