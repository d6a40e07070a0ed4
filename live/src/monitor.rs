//! Orders monitor.
//!
//! Watches one query group of the shared cache and highlights rows that
//! appear or change, the way the orders table of the dashboard does.

use std::sync::Arc;
use std::time::{Duration, Instant};

use fleetdesk_sdk::{
    json_key, FlashDiff, FlashKind, FlashStyle, FlashTracker, QueryCache, QueryKey,
};
use serde_json::Value;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Query group watched by default.
pub const ORDERS_KEY: &str = "orders";

/// Field identifying an order row.
pub const ORDER_ID_FIELD: &str = "id";

/// One highlighted row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Highlight {
    /// Row id.
    pub id: String,
    /// Why the row is highlighted.
    pub kind: FlashKind,
    /// Style token to render.
    pub class: &'static str,
}

/// What a table view renders: whether data arrived yet and which rows glow.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Highlights {
    /// True once the first snapshot was taken.
    pub loaded: bool,
    /// Live highlights, sorted by id.
    pub rows: Vec<Highlight>,
}

impl Highlights {
    /// Returns the highlight of `id`, if any.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Highlight> {
        self.rows.iter().find(|row| row.id == id)
    }
}

/// Highlights changes in one cached collection.
#[derive(Debug)]
pub struct OrdersMonitor {
    cache: Arc<QueryCache>,
    key: QueryKey,
    id_field: String,
    tracker: FlashTracker<Value>,
    highlights: watch::Sender<Highlights>,
}

impl OrdersMonitor {
    /// Creates a monitor of the `orders` group.
    #[must_use]
    pub fn new(cache: Arc<QueryCache>, style: FlashStyle, duration: Duration) -> Self {
        Self {
            cache,
            key: QueryKey::new(ORDERS_KEY),
            id_field: ORDER_ID_FIELD.to_string(),
            tracker: FlashTracker::new().with_style(style).with_duration(duration),
            highlights: watch::Sender::new(Highlights::default()),
        }
    }

    /// Watches `key` instead of `orders`.
    #[must_use]
    pub fn with_key(mut self, key: impl Into<QueryKey>) -> Self {
        self.key = key.into();
        self
    }

    /// Returns the watched group.
    #[must_use]
    pub fn key(&self) -> &QueryKey {
        &self.key
    }

    /// Returns the flash tracker.
    #[must_use]
    pub fn tracker(&self) -> &FlashTracker<Value> {
        &self.tracker
    }

    /// Returns a receiver of the rendered highlights, updated after every
    /// refresh and expiry while [`Self::run`] is running.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Highlights> {
        self.highlights.subscribe()
    }

    /// Returns the live highlights as of `now`.
    #[must_use]
    pub fn highlights_at(&self, now: Instant) -> Highlights {
        let mut rows: Vec<Highlight> = self
            .tracker
            .keys()
            .filter_map(|id| {
                Some(Highlight {
                    id: id.to_string(),
                    kind: self.tracker.flash_kind_at(id, now)?,
                    class: self.tracker.flash_class_at(id, now)?,
                })
            })
            .collect();
        rows.sort_by(|a, b| a.id.cmp(&b.id));
        Highlights {
            loaded: self.tracker.has_baseline(),
            rows,
        }
    }

    /// Feeds the current cached rows to the tracker.
    ///
    /// Until the group is loaded nothing is recorded, so the first load
    /// becomes the baseline instead of flashing every row. Non-array data
    /// is treated as an empty collection.
    pub async fn refresh(&mut self) -> FlashDiff {
        self.refresh_at(now()).await
    }

    /// Like [`Self::refresh`] with an explicit clock.
    pub async fn refresh_at(&mut self, now: Instant) -> FlashDiff {
        let rows = match self.cache.get(&self.key).await {
            Some(Value::Array(rows)) => rows,
            Some(other) => {
                warn!(key = %self.key, kind = json_kind(&other), "expected a list of rows");
                Vec::new()
            }
            None => {
                debug!(key = %self.key, "not loaded yet");
                return FlashDiff::default();
            }
        };

        let diff = self
            .tracker
            .update_at(&rows, json_key(&self.id_field), now);
        for id in &diff.added {
            info!(key = %self.key, %id, class = ?self.tracker.flash_class_at(id, now), "row added");
        }
        for id in &diff.updated {
            info!(key = %self.key, %id, class = ?self.tracker.flash_class_at(id, now), "row updated");
        }
        if !diff.removed.is_empty() {
            debug!(key = %self.key, removed = diff.removed.len(), "rows removed");
        }
        diff
    }

    /// Runs until `shutdown` flips to true or the cache is gone.
    ///
    /// Refreshes on every change of the watched group and wakes up when the
    /// next highlight ends to drop it.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        let mut changes = self.cache.subscribe();
        self.refresh().await;
        self.publish();

        loop {
            let next_expiry = self.tracker.next_expiry();
            tokio::select! {
                () = shutdown_requested(&mut shutdown) => break,
                change = changes.recv() => match change {
                    Ok(key) if key == self.key => {
                        self.refresh().await;
                    }
                    Ok(_) => continue,
                    Err(RecvError::Lagged(skipped)) => {
                        debug!(skipped, "cache change feed lagged");
                        self.refresh().await;
                    }
                    Err(RecvError::Closed) => break,
                },
                () = sleep_until(next_expiry) => {
                    for id in self.tracker.purge_expired(now()) {
                        debug!(key = %self.key, %id, "highlight ended");
                    }
                }
            }
            self.publish();
        }

        debug!(key = %self.key, "orders monitor stopped");
    }

    fn publish(&self) {
        self.highlights.send_replace(self.highlights_at(now()));
    }
}

/// Current time on the runtime clock, so paused test clocks apply.
fn now() -> Instant {
    tokio::time::Instant::now().into_std()
}

/// Resolves once shutdown is requested or the sender is gone.
async fn shutdown_requested(rx: &mut watch::Receiver<bool>) {
    let _ = rx.wait_for(|stop| *stop).await;
}

/// Sleeps until `deadline`, or forever without one.
async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(tokio::time::Instant::from_std(deadline)).await,
        None => std::future::pending().await,
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
