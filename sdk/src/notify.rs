//! User-visible notifications.
//!
//! Toast-style notices raised by the sync layer (connection loss, failed
//! mutations). Every notice is logged and broadcast to whoever renders them.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;

use crate::ws::config::DEFAULT_CHANNEL_CAPACITY;

/// Severity of a notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    /// Informational.
    Info,
    /// Degraded but recovering.
    Warning,
    /// Needs attention.
    Error,
}

/// A single user-visible notice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    /// Severity.
    pub level: NoticeLevel,
    /// Human-readable text.
    pub message: String,
    /// When the notice was raised.
    pub raised_at: DateTime<Utc>,
}

impl Notice {
    /// Creates a notice stamped with the current time.
    #[must_use]
    pub fn new(level: NoticeLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
            raised_at: Utc::now(),
        }
    }
}

/// Broadcasts notices to any number of listeners.
#[derive(Debug, Clone)]
pub struct Notifier {
    tx: broadcast::Sender<Notice>,
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new(DEFAULT_CHANNEL_CAPACITY)
    }
}

impl Notifier {
    /// Creates a notifier with the given channel capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Returns a receiver for subsequent notices.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<Notice> {
        self.tx.subscribe()
    }

    /// Logs and broadcasts a notice. Having no listener is not an error.
    pub fn notify(&self, notice: Notice) {
        match notice.level {
            NoticeLevel::Info => tracing::info!(notice = %notice.message),
            NoticeLevel::Warning => tracing::warn!(notice = %notice.message),
            NoticeLevel::Error => tracing::error!(notice = %notice.message),
        }
        let _ = self.tx.send(notice);
    }

    /// Raises an info notice.
    pub fn info(&self, message: impl Into<String>) {
        self.notify(Notice::new(NoticeLevel::Info, message));
    }

    /// Raises a warning notice.
    pub fn warn(&self, message: impl Into<String>) {
        self.notify(Notice::new(NoticeLevel::Warning, message));
    }

    /// Raises an error notice.
    pub fn error(&self, message: impl Into<String>) {
        self.notify(Notice::new(NoticeLevel::Error, message));
    }
}
