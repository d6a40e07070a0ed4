//! Change-flash tracking.
//!
//! Diffs successive snapshots of a displayed collection and keeps a
//! time-bounded highlight per row that was added or changed.
//!
//! Expiry is deadline based. Nothing is scheduled in the background, so
//! rows that leave the collection and trackers that are dropped leave no
//! timers behind. Callers that want to re-render exactly when a highlight
//! ends can sleep until [`FlashTracker::next_expiry`].
//!
//! # Example
//!
//! ```rust
//! use fleetdesk_sdk::flash::{json_key, FlashTracker};
//! use serde_json::json;
//!
//! let mut tracker = FlashTracker::new();
//! tracker.update(&[json!({"id": "a", "v": 1})], json_key("id"));
//! tracker.update(
//!     &[json!({"id": "a", "v": 1}), json!({"id": "b", "v": 1})],
//!     json_key("id"),
//! );
//!
//! assert!(tracker.is_flashing("b"));
//! assert!(!tracker.is_flashing("a"));
//! ```

use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Default highlight duration in milliseconds.
pub const DEFAULT_FLASH_DURATION_MS: u64 = 2000;

/// Why a row is highlighted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlashKind {
    /// Row was not in the previous snapshot.
    New,
    /// Row changed since the previous snapshot.
    Updated,
}

/// Visual style of the highlight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlashStyle {
    /// Solid background tint.
    #[default]
    Default,
    /// Pulsing background.
    Pulse,
    /// Glowing outline.
    Glow,
}

impl FlashStyle {
    /// Returns the style token for a highlight of `kind`.
    #[must_use]
    pub const fn class(self, kind: FlashKind) -> &'static str {
        match (self, kind) {
            (Self::Default, FlashKind::New) => "flash-new",
            (Self::Default, FlashKind::Updated) => "flash-updated",
            (Self::Pulse, FlashKind::New) => "flash-pulse-new",
            (Self::Pulse, FlashKind::Updated) => "flash-pulse-updated",
            (Self::Glow, FlashKind::New) => "flash-glow-new",
            (Self::Glow, FlashKind::Updated) => "flash-glow-updated",
        }
    }
}

impl std::str::FromStr for FlashStyle {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "default" => Ok(Self::Default),
            "pulse" => Ok(Self::Pulse),
            "glow" => Ok(Self::Glow),
            other => Err(format!("unknown flash style: {}", other)),
        }
    }
}

/// A live highlight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlashEntry {
    /// Classification.
    pub kind: FlashKind,
    /// When the highlight (re)started.
    pub started_at: Instant,
    /// When it ends.
    pub expires_at: Instant,
}

impl FlashEntry {
    /// Returns true while `now` is before the deadline.
    #[must_use]
    pub fn is_live(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

/// Keys classified by one update.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlashDiff {
    /// Keys seen for the first time.
    pub added: Vec<String>,
    /// Keys whose value changed.
    pub updated: Vec<String>,
    /// Keys that left the collection.
    pub removed: Vec<String>,
}

impl FlashDiff {
    /// Returns true if nothing changed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.updated.is_empty() && self.removed.is_empty()
    }
}

/// Returns a key extractor reading `field` from JSON objects.
///
/// String fields are used as-is, numbers are rendered. Items without the
/// field are not tracked.
pub fn json_key(field: &str) -> impl Fn(&Value) -> Option<String> + '_ {
    move |item: &Value| match item.get(field)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Tracks new and changed rows of one collection.
#[derive(Debug, Clone)]
pub struct FlashTracker<T> {
    duration: Duration,
    style: FlashStyle,
    snapshot: Option<HashMap<String, T>>,
    flashes: HashMap<String, FlashEntry>,
}

impl<T> Default for FlashTracker<T> {
    fn default() -> Self {
        Self {
            duration: Duration::from_millis(DEFAULT_FLASH_DURATION_MS),
            style: FlashStyle::default(),
            snapshot: None,
            flashes: HashMap::new(),
        }
    }
}

impl<T: Clone + PartialEq> FlashTracker<T> {
    /// Creates a tracker with the default duration and style.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the highlight duration.
    #[must_use]
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    /// Sets the visual style.
    #[must_use]
    pub fn with_style(mut self, style: FlashStyle) -> Self {
        self.style = style;
        self
    }

    /// Returns the highlight duration.
    #[must_use]
    pub const fn duration(&self) -> Duration {
        self.duration
    }

    /// Returns the visual style.
    #[must_use]
    pub const fn style(&self) -> FlashStyle {
        self.style
    }

    /// Returns true once a baseline snapshot was recorded.
    #[must_use]
    pub fn has_baseline(&self) -> bool {
        self.snapshot.is_some()
    }

    /// Feeds the latest full collection.
    pub fn update<F>(&mut self, items: &[T], key_fn: F) -> FlashDiff
    where
        F: Fn(&T) -> Option<String>,
    {
        self.update_at(items, key_fn, Instant::now())
    }

    /// Feeds the latest full collection as of `now`.
    ///
    /// The first call only records the baseline. The snapshot is replaced on
    /// every call.
    pub fn update_at<F>(&mut self, items: &[T], key_fn: F, now: Instant) -> FlashDiff
    where
        F: Fn(&T) -> Option<String>,
    {
        self.purge_expired(now);

        let mut order = Vec::with_capacity(items.len());
        let mut next = HashMap::with_capacity(items.len());
        for item in items {
            let Some(key) = key_fn(item) else {
                continue;
            };
            if next.insert(key.clone(), item.clone()).is_none() {
                order.push(key);
            }
        }

        let mut diff = FlashDiff::default();
        if let Some(previous) = self.snapshot.take() {
            for key in order {
                let Some(item) = next.get(&key) else {
                    continue;
                };
                let kind = match previous.get(&key) {
                    None => FlashKind::New,
                    Some(old) if old != item => FlashKind::Updated,
                    Some(_) => continue,
                };
                self.flashes.insert(
                    key.clone(),
                    FlashEntry {
                        kind,
                        started_at: now,
                        expires_at: now + self.duration,
                    },
                );
                match kind {
                    FlashKind::New => diff.added.push(key),
                    FlashKind::Updated => diff.updated.push(key),
                }
            }

            let present: HashSet<&String> = next.keys().collect();
            let mut removed: Vec<String> = previous
                .into_keys()
                .filter(|key| !present.contains(key))
                .collect();
            removed.sort_unstable();
            diff.removed = removed;
        }

        self.flashes.retain(|key, _| next.contains_key(key));
        self.snapshot = Some(next);
        diff
    }

    /// Returns true if `key` is highlighted now.
    #[must_use]
    pub fn is_flashing(&self, key: &str) -> bool {
        self.is_flashing_at(key, Instant::now())
    }

    /// Returns true if `key` is highlighted at `now`.
    #[must_use]
    pub fn is_flashing_at(&self, key: &str, now: Instant) -> bool {
        self.flash_kind_at(key, now).is_some()
    }

    /// Returns the highlight kind of `key` now.
    #[must_use]
    pub fn flash_kind(&self, key: &str) -> Option<FlashKind> {
        self.flash_kind_at(key, Instant::now())
    }

    /// Returns the highlight kind of `key` at `now`.
    #[must_use]
    pub fn flash_kind_at(&self, key: &str, now: Instant) -> Option<FlashKind> {
        self.flashes
            .get(key)
            .filter(|entry| entry.is_live(now))
            .map(|entry| entry.kind)
    }

    /// Returns the style token for `key` now, if highlighted.
    #[must_use]
    pub fn flash_class(&self, key: &str) -> Option<&'static str> {
        self.flash_class_at(key, Instant::now())
    }

    /// Returns the style token for `key` at `now`, if highlighted.
    #[must_use]
    pub fn flash_class_at(&self, key: &str, now: Instant) -> Option<&'static str> {
        self.flash_kind_at(key, now)
            .map(|kind| self.style.class(kind))
    }

    /// Returns the earliest pending deadline.
    #[must_use]
    pub fn next_expiry(&self) -> Option<Instant> {
        self.flashes.values().map(|entry| entry.expires_at).min()
    }

    /// Drops expired highlights and returns their keys.
    pub fn purge_expired(&mut self, now: Instant) -> Vec<String> {
        let mut expired = Vec::new();
        self.flashes.retain(|key, entry| {
            let live = entry.is_live(now);
            if !live {
                expired.push(key.clone());
            }
            live
        });
        expired.sort_unstable();
        expired
    }

    /// Returns the keys with a stored highlight, expired or not.
    pub fn keys(&self) -> impl Iterator<Item = &str> + '_ {
        self.flashes.keys().map(String::as_str)
    }

    /// Returns the number of stored highlights, expired or not.
    #[must_use]
    pub fn len(&self) -> usize {
        self.flashes.len()
    }

    /// Returns true if no highlight is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.flashes.is_empty()
    }

    /// Forgets the baseline and every highlight.
    pub fn reset(&mut self) {
        self.snapshot = None;
        self.flashes.clear();
    }
}
