use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use mmd_schemas::{LogLevel, Notification, RenderSink};
use tokio::sync::Notify;

/// Upper bound for [`RecordingSink::wait_for`]. Under a paused clock this is
/// virtual time.
const WAIT_LIMIT: Duration = Duration::from_secs(60);

/// Render sink that keeps every notification, in delivery order.
#[derive(Debug, Default)]
pub struct RecordingSink {
    seen: Mutex<Vec<Notification>>,
    changed: Notify,
}

impl RenderSink for RecordingSink {
    fn notify(&self, notification: Notification) {
        self.lock().push(notification);
        self.changed.notify_waiters();
    }
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Notification>> {
        self.seen.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn notifications(&self) -> Vec<Notification> {
        self.lock().clone()
    }

    /// Log messages in order.
    pub fn logs(&self) -> Vec<String> {
        self.lock()
            .iter()
            .filter_map(Notification::log_message)
            .map(str::to_string)
            .collect()
    }

    pub fn error_logs(&self) -> Vec<String> {
        self.lock()
            .iter()
            .filter_map(|n| match n {
                Notification::Log(line) if line.level == LogLevel::Error => {
                    Some(line.message.clone())
                }
                _ => None,
            })
            .collect()
    }

    pub fn count_log(&self, message: &str) -> usize {
        self.logs().iter().filter(|m| m.as_str() == message).count()
    }

    pub fn count(&self, pred: impl Fn(&Notification) -> bool) -> usize {
        self.lock().iter().filter(|n| pred(n)).count()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Wait until `pred` holds over everything recorded so far.
    ///
    /// Panics after [`WAIT_LIMIT`]; test helper only.
    pub async fn wait_for(&self, what: &str, pred: impl Fn(&[Notification]) -> bool) {
        let waited = tokio::time::timeout(WAIT_LIMIT, async {
            loop {
                let notified = self.changed.notified();
                tokio::pin!(notified);
                notified.as_mut().enable();
                if pred(self.lock().as_slice()) {
                    return;
                }
                notified.await;
            }
        })
        .await;
        if waited.is_err() {
            panic!("timed out waiting for {what}; logs so far: {:?}", self.logs());
        }
    }

    pub async fn wait_for_log(&self, message: &str) {
        self.wait_for(message, |seen| {
            seen.iter().any(|n| n.log_message() == Some(message))
        })
        .await;
    }
}
