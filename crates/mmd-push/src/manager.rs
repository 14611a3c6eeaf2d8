use std::collections::HashMap;
use std::fmt;

use mmd_schemas::{ConnectionState, Notification, PushEvent, PushEventKind, PushFrame};
use tracing::{debug, info, warn};

/// Event handler. `C` is the context the handler mutates (the runtime core).
pub type Handler<C> = Box<dyn Fn(&mut C, PushEvent) + Send + Sync>;

/// What happened to one inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Decoded and handed to exactly one handler.
    Dispatched(PushEventKind),
    /// Known kind but nothing registered for it.
    NoHandler(PushEventKind),
    /// Tag outside the known set; dropped.
    UnknownEvent(String),
    /// Frame or payload failed to decode; dropped.
    Malformed { event: String, reason: String },
}

impl DispatchOutcome {
    /// Dashboard log line for outcomes the operator should see.
    pub fn log_line(&self) -> Option<Notification> {
        match self {
            DispatchOutcome::Malformed { event, reason } => Some(Notification::log_error(
                format!("[X] PUSH: Dropped malformed {event} message - {reason}"),
            )),
            _ => None,
        }
    }
}

/// Push channel lifecycle and demultiplexer.
///
/// ```text
/// Disconnected --start--> Connecting --connect--> Connected
///      ^                                              |
///      +------------------disconnect------------------+
/// ```
///
/// Handlers live in a table keyed by event kind and are registered once.
/// Registering a second handler for a kind replaces the first. Connection
/// transitions never touch the table, so a reconnect cannot duplicate
/// dispatch.
pub struct PushChannelManager<C> {
    state: ConnectionState,
    handlers: HashMap<PushEventKind, Handler<C>>,
    connects: u64,
}

impl<C> Default for PushChannelManager<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> fmt::Debug for PushChannelManager<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut kinds: Vec<_> = self.handlers.keys().copied().collect();
        kinds.sort();
        f.debug_struct("PushChannelManager")
            .field("state", &self.state)
            .field("handlers", &kinds)
            .field("connects", &self.connects)
            .finish()
    }
}

impl<C> PushChannelManager<C> {
    pub fn new() -> Self {
        Self {
            state: ConnectionState::Disconnected,
            handlers: HashMap::new(),
            connects: 0,
        }
    }

    /// Register the handler for `kind`. Returns `true` if one was replaced.
    pub fn register<F>(&mut self, kind: PushEventKind, handler: F) -> bool
    where
        F: Fn(&mut C, PushEvent) + Send + Sync + 'static,
    {
        self.handlers.insert(kind, Box::new(handler)).is_some()
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Number of Connected transitions seen so far.
    pub fn connects(&self) -> u64 {
        self.connects
    }

    /// Disconnected -> Connecting. No-op in any other state.
    pub fn start(&mut self) -> bool {
        if self.state != ConnectionState::Disconnected {
            return false;
        }
        self.state = ConnectionState::Connecting;
        true
    }

    /// Transport acknowledged a connection. Re-entrant: repeated
    /// acknowledgements while already connected are absorbed.
    pub fn on_connect(&mut self) -> Option<Notification> {
        if self.state == ConnectionState::Connected {
            debug!("push channel already connected");
            return None;
        }
        self.state = ConnectionState::Connected;
        self.connects += 1;
        info!(connects = self.connects, "push channel connected");
        Some(Notification::log_info("> WEBSOCKET: Connected to backend"))
    }

    /// Transport lost the connection. Only a drop from Connected is reported;
    /// reconnection is the transport's business.
    pub fn on_disconnect(&mut self) -> Option<Notification> {
        let was_connected = self.state == ConnectionState::Connected;
        self.state = ConnectionState::Disconnected;
        if !was_connected {
            return None;
        }
        warn!("push channel disconnected");
        Some(Notification::log_error(
            "[X] WEBSOCKET: Disconnected from backend",
        ))
    }

    /// Decode one raw text frame and dispatch it.
    pub fn dispatch(&self, ctx: &mut C, raw: &str) -> DispatchOutcome {
        match serde_json::from_str::<PushFrame>(raw) {
            Ok(frame) => self.dispatch_frame(ctx, frame),
            Err(err) => {
                warn!(error = %err, "push frame is not valid json");
                DispatchOutcome::Malformed {
                    event: "frame".to_string(),
                    reason: err.to_string(),
                }
            }
        }
    }

    /// Dispatch an already framed message synchronously to its handler.
    pub fn dispatch_frame(&self, ctx: &mut C, frame: PushFrame) -> DispatchOutcome {
        let Some(kind) = PushEventKind::parse(&frame.event) else {
            debug!(event = %frame.event, "unknown push event dropped");
            return DispatchOutcome::UnknownEvent(frame.event);
        };

        let event = match PushEvent::decode(kind, frame.data) {
            Ok(ev) => ev,
            Err(err) => {
                warn!(event = %kind, error = %err, "malformed push payload dropped");
                return DispatchOutcome::Malformed {
                    event: kind.to_string(),
                    reason: err.to_string(),
                };
            }
        };

        match self.handlers.get(&kind) {
            Some(handler) => {
                handler(ctx, event);
                DispatchOutcome::Dispatched(kind)
            }
            None => {
                debug!(event = %kind, "no handler registered");
                DispatchOutcome::NoHandler(kind)
            }
        }
    }
}
