//! WebSocket push transport.
//!
//! One JSON text frame per message: `{"event": "<tag>", "data": <payload>}`.
//! The transport knows nothing about event kinds; it forwards raw text and
//! connection lifecycle signals to whoever holds the receiving end.

use std::time::Duration;

use anyhow::{Context, Result};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, warn};

/// Raw transport output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushSignal {
    Connected,
    Disconnected { reason: String },
    Frame(String),
}

/// Exponential reconnect delay, doubling from `initial` up to `max`.
#[derive(Debug, Clone)]
pub struct Backoff {
    initial: Duration,
    max: Duration,
    current: Duration,
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(Duration::from_secs(1), Duration::from_secs(30))
    }
}

impl Backoff {
    pub fn new(initial: Duration, max: Duration) -> Self {
        Self {
            initial,
            max,
            current: initial,
        }
    }

    /// Delay to wait now; the following call returns double (capped).
    pub fn next_delay(&mut self) -> Duration {
        let d = self.current;
        self.current = (self.current * 2).min(self.max);
        d
    }

    pub fn reset(&mut self) {
        self.current = self.initial;
    }
}

/// Bundled WebSocket transport with its own reconnection policy.
#[derive(Debug, Clone)]
pub struct WsTransport {
    url: String,
    client_id: String,
    backoff: Backoff,
}

impl WsTransport {
    pub fn new(url: impl Into<String>, client_id: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            client_id: client_id.into(),
            backoff: Backoff::default(),
        }
    }

    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// Push URL with the client identity as `playerId` query parameter.
    pub fn endpoint(&self) -> String {
        if self.client_id.is_empty() {
            return self.url.clone();
        }
        let sep = if self.url.contains('?') { '&' } else { '?' };
        format!("{}{}playerId={}", self.url, sep, self.client_id)
    }

    /// Run until the receiving side of `tx` is dropped.
    pub fn spawn(self, tx: mpsc::Sender<PushSignal>) -> JoinHandle<()> {
        tokio::spawn(self.run(tx))
    }

    async fn run(mut self, tx: mpsc::Sender<PushSignal>) {
        let endpoint = self.endpoint();
        loop {
            let mut connected = false;
            let result = self.connect_and_stream(&endpoint, &tx, &mut connected).await;

            if connected {
                let reason = match &result {
                    Ok(()) => "closed".to_string(),
                    Err(e) => e.to_string(),
                };
                if tx.send(PushSignal::Disconnected { reason }).await.is_err() {
                    return;
                }
                self.backoff.reset();
            }

            if tx.is_closed() {
                debug!("push receiver dropped; transport exiting");
                return;
            }

            let delay = self.backoff.next_delay();
            match result {
                Ok(()) => info!(?delay, "push channel closed; reconnecting"),
                Err(e) => warn!(error = %e, ?delay, "push channel error; reconnecting"),
            }
            sleep(delay).await;
        }
    }

    async fn connect_and_stream(
        &self,
        endpoint: &str,
        tx: &mpsc::Sender<PushSignal>,
        connected: &mut bool,
    ) -> Result<()> {
        let (ws_stream, resp) = connect_async(endpoint)
            .await
            .context("connect_async push channel")?;
        info!(status = %resp.status(), "push channel connected");

        *connected = true;
        tx.send(PushSignal::Connected)
            .await
            .context("push receiver dropped")?;

        let (mut write, mut read) = ws_stream.split();
        while let Some(msg) = read.next().await {
            match msg.context("push channel read")? {
                Message::Text(text) => {
                    tx.send(PushSignal::Frame(text))
                        .await
                        .context("push receiver dropped")?;
                }
                Message::Ping(payload) => {
                    let _ = write.send(Message::Pong(payload)).await;
                }
                Message::Close(frame) => {
                    debug!(?frame, "push channel close frame");
                    return Ok(());
                }
                _ => {}
            }
        }
        Ok(())
    }
}
