//! mmd-push
//!
//! Realtime push channel from the matchmaking backend.
//!
//! - [`PushChannelManager`] owns the connection state and the handler table
//!   and demultiplexes decoded events onto handlers. It holds no buffer: a
//!   message is dispatched when it arrives or not at all.
//! - [`WsTransport`] is the bundled WebSocket transport. It feeds
//!   [`PushSignal`]s into an mpsc channel and reconnects on its own with
//!   exponential backoff.

mod manager;
mod transport;

pub use manager::{DispatchOutcome, Handler, PushChannelManager};
pub use transport::{Backoff, PushSignal, WsTransport};
