//! Toast notifications
//!
//! Every user-visible outcome (success, validation rejection, remote
//! failure) is published as a short-lived [`Toast`]. A UI subscribes with
//! [`Notifier::subscribe`]; with no subscribers toasts are only logged.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::debug;

/// Severity of a toast
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToastLevel {
    Success,
    Info,
    Warn,
    Error,
}

/// A short-lived, human-readable notification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Toast {
    pub level: ToastLevel,
    pub message: String,
}

impl Toast {
    pub fn new(level: ToastLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
        }
    }
}

/// Broadcast bus for toasts
#[derive(Debug, Clone)]
pub struct Notifier {
    tx: broadcast::Sender<Toast>,
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Notifier {
    pub fn new() -> Self {
        Self::with_capacity(64)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Toast> {
        self.tx.subscribe()
    }

    pub fn publish(&self, toast: Toast) {
        debug!(level = ?toast.level, message = %toast.message, "Toast");
        // No receivers is fine; the toast has already been logged
        let _ = self.tx.send(toast);
    }

    pub fn success(&self, message: impl Into<String>) {
        self.publish(Toast::new(ToastLevel::Success, message));
    }

    pub fn info(&self, message: impl Into<String>) {
        self.publish(Toast::new(ToastLevel::Info, message));
    }

    pub fn warn(&self, message: impl Into<String>) {
        self.publish(Toast::new(ToastLevel::Warn, message));
    }

    pub fn error(&self, message: impl Into<String>) {
        self.publish(Toast::new(ToastLevel::Error, message));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_subscribers_receive_toasts() {
        let notifier = Notifier::new();
        let mut rx = notifier.subscribe();
        notifier.warn("label already exists in target");
        let toast = rx.recv().await.unwrap();
        assert_eq!(toast.level, ToastLevel::Warn);
        assert_eq!(toast.message, "label already exists in target");
    }

    #[test]
    fn test_publish_without_subscribers() {
        let notifier = Notifier::new();
        notifier.error("nobody listening");
    }
}
