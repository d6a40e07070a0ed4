//! Sync layer metrics.
//!
//! Provides atomic counters for monitoring realtime synchronization.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use serde::Serialize;

/// Counters shared by the session, router, cache and mutation coordinator.
#[derive(Debug)]
pub struct SyncMetrics {
    /// Text messages received from the push channel.
    messages_received: AtomicU64,

    /// Messages dropped because the envelope did not parse.
    parse_errors: AtomicU64,

    /// Messages mapped to at least one query group.
    events_routed: AtomicU64,

    /// Messages handed to the fallback hook.
    events_unrouted: AtomicU64,

    /// Completed refetches.
    refetches: AtomicU64,

    /// Failed refetches.
    refetch_failures: AtomicU64,

    /// Scheduled reconnects.
    reconnects: AtomicU64,

    /// Optimistic mutations confirmed by the server.
    mutations_committed: AtomicU64,

    /// Optimistic mutations rolled back.
    mutations_rolled_back: AtomicU64,

    /// Start time for uptime.
    start_time: Instant,
}

impl Default for SyncMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl SyncMetrics {
    /// Creates a new metrics instance.
    #[must_use]
    pub fn new() -> Self {
        Self {
            messages_received: AtomicU64::new(0),
            parse_errors: AtomicU64::new(0),
            events_routed: AtomicU64::new(0),
            events_unrouted: AtomicU64::new(0),
            refetches: AtomicU64::new(0),
            refetch_failures: AtomicU64::new(0),
            reconnects: AtomicU64::new(0),
            mutations_committed: AtomicU64::new(0),
            mutations_rolled_back: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    /// Records a received message.
    pub fn record_message(&self) {
        self.messages_received.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a dropped, malformed message.
    pub fn record_parse_error(&self) {
        self.parse_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a routed event.
    pub fn record_routed(&self) {
        self.events_routed.fetch_add(1, Ordering::Relaxed);
    }

    /// Records an unrouted event.
    pub fn record_unrouted(&self) {
        self.events_unrouted.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a refetch outcome.
    pub fn record_refetch(&self, ok: bool) {
        if ok {
            self.refetches.fetch_add(1, Ordering::Relaxed);
        } else {
            self.refetch_failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Records a scheduled reconnect.
    pub fn record_reconnect(&self) {
        self.reconnects.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a committed mutation.
    pub fn record_commit(&self) {
        self.mutations_committed.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a rolled back mutation.
    pub fn record_rollback(&self) {
        self.mutations_rolled_back.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns received messages.
    #[must_use]
    pub fn messages_received(&self) -> u64 {
        self.messages_received.load(Ordering::Relaxed)
    }

    /// Returns dropped messages.
    #[must_use]
    pub fn parse_errors(&self) -> u64 {
        self.parse_errors.load(Ordering::Relaxed)
    }

    /// Returns routed events.
    #[must_use]
    pub fn events_routed(&self) -> u64 {
        self.events_routed.load(Ordering::Relaxed)
    }

    /// Returns unrouted events.
    #[must_use]
    pub fn events_unrouted(&self) -> u64 {
        self.events_unrouted.load(Ordering::Relaxed)
    }

    /// Returns completed refetches.
    #[must_use]
    pub fn refetches(&self) -> u64 {
        self.refetches.load(Ordering::Relaxed)
    }

    /// Returns failed refetches.
    #[must_use]
    pub fn refetch_failures(&self) -> u64 {
        self.refetch_failures.load(Ordering::Relaxed)
    }

    /// Returns scheduled reconnects.
    #[must_use]
    pub fn reconnects(&self) -> u64 {
        self.reconnects.load(Ordering::Relaxed)
    }

    /// Returns committed mutations.
    #[must_use]
    pub fn mutations_committed(&self) -> u64 {
        self.mutations_committed.load(Ordering::Relaxed)
    }

    /// Returns rolled back mutations.
    #[must_use]
    pub fn mutations_rolled_back(&self) -> u64 {
        self.mutations_rolled_back.load(Ordering::Relaxed)
    }

    /// Returns time since the metrics were created.
    #[must_use]
    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Returns a serializable copy of all counters.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            messages_received: self.messages_received(),
            parse_errors: self.parse_errors(),
            events_routed: self.events_routed(),
            events_unrouted: self.events_unrouted(),
            refetches: self.refetches(),
            refetch_failures: self.refetch_failures(),
            reconnects: self.reconnects(),
            mutations_committed: self.mutations_committed(),
            mutations_rolled_back: self.mutations_rolled_back(),
            uptime_secs: self.uptime().as_secs(),
        }
    }
}

/// Point-in-time copy of [`SyncMetrics`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    /// Received messages.
    pub messages_received: u64,
    /// Dropped messages.
    pub parse_errors: u64,
    /// Routed events.
    pub events_routed: u64,
    /// Unrouted events.
    pub events_unrouted: u64,
    /// Completed refetches.
    pub refetches: u64,
    /// Failed refetches.
    pub refetch_failures: u64,
    /// Scheduled reconnects.
    pub reconnects: u64,
    /// Committed mutations.
    pub mutations_committed: u64,
    /// Rolled back mutations.
    pub mutations_rolled_back: u64,
    /// Uptime in seconds.
    pub uptime_secs: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_new() {
        let metrics = SyncMetrics::new();
        assert_eq!(metrics.messages_received(), 0);
        assert_eq!(metrics.reconnects(), 0);
    }

    #[test]
    fn test_metrics_record() {
        let metrics = SyncMetrics::new();
        metrics.record_message();
        metrics.record_message();
        metrics.record_parse_error();
        metrics.record_refetch(true);
        metrics.record_refetch(false);
        metrics.record_rollback();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.messages_received, 2);
        assert_eq!(snapshot.parse_errors, 1);
        assert_eq!(snapshot.refetches, 1);
        assert_eq!(snapshot.refetch_failures, 1);
        assert_eq!(snapshot.mutations_rolled_back, 1);
        assert_eq!(snapshot.mutations_committed, 0);
    }
}
