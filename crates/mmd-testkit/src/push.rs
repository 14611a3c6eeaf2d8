use mmd_push::PushSignal;
use mmd_schemas::{MatchEvent, PushEventKind, PushFrame};
use serde_json::{json, Value};
use tokio::sync::mpsc;

/// Test stand-in for the websocket transport: the test decides when the
/// connection comes and goes and which frames arrive.
#[derive(Debug, Clone)]
pub struct ScriptedPush {
    tx: mpsc::Sender<PushSignal>,
}

impl ScriptedPush {
    pub fn channel() -> (Self, mpsc::Receiver<PushSignal>) {
        let (tx, rx) = mpsc::channel(64);
        (Self { tx }, rx)
    }

    async fn send(&self, signal: PushSignal) {
        // The runtime only drops its receiver when it stops.
        let _ = self.tx.send(signal).await;
    }

    pub async fn connect(&self) {
        self.send(PushSignal::Connected).await;
    }

    pub async fn disconnect(&self) {
        self.send(PushSignal::Disconnected {
            reason: "scripted".to_string(),
        })
        .await;
    }

    pub async fn raw(&self, text: impl Into<String>) {
        self.send(PushSignal::Frame(text.into())).await;
    }

    pub async fn event(&self, kind: PushEventKind, data: Value) {
        let frame = PushFrame::new(kind, data);
        let text = serde_json::to_string(&frame).unwrap_or_default();
        self.raw(text).await;
    }

    pub async fn match_found(&self, event: &MatchEvent) {
        let data = serde_json::to_value(event).unwrap_or(Value::Null);
        self.event(PushEventKind::MatchFound, data).await;
    }

    pub async fn dashboard_log(&self, message: &str) {
        self.event(PushEventKind::DashboardLog, json!({ "message": message }))
            .await;
    }
}
