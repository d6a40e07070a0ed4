//! Query cache store.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::{broadcast, RwLock};

use super::fetcher::QueryFetcher;
use crate::client::ClientError;
use crate::metrics::SyncMetrics;
use crate::ws::config::DEFAULT_CHANNEL_CAPACITY;

/// Name of a query group, e.g. `orders`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QueryKey(String);

impl QueryKey {
    /// Creates a key.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Returns the key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the REST path the group is fetched from.
    #[must_use]
    pub fn path(&self) -> String {
        format!("/{}", self.0)
    }
}

impl std::fmt::Display for QueryKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for QueryKey {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for QueryKey {
    fn from(name: String) -> Self {
        Self(name)
    }
}

/// Cached data of one query group.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheEntry {
    /// Last data written.
    pub data: Value,
    /// True once invalidated until the next write.
    pub stale: bool,
    /// Write counter for this key.
    pub version: u64,
    /// When the data was applied to the cache.
    pub updated_at: DateTime<Utc>,
}

/// Cache errors.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// The data source failed.
    #[error("refetch of {key} failed: {source}")]
    Fetch {
        /// Query group.
        key: QueryKey,
        /// Underlying error.
        #[source]
        source: ClientError,
    },
}

/// Shared store of query groups.
pub struct QueryCache {
    entries: RwLock<HashMap<QueryKey, CacheEntry>>,
    fetcher: Arc<dyn QueryFetcher>,
    changes: broadcast::Sender<QueryKey>,
    metrics: Arc<SyncMetrics>,
}

impl std::fmt::Debug for QueryCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryCache").finish_non_exhaustive()
    }
}

impl QueryCache {
    /// Creates an empty cache backed by `fetcher`.
    #[must_use]
    pub fn new(fetcher: Arc<dyn QueryFetcher>) -> Self {
        Self::with_metrics(fetcher, Arc::new(SyncMetrics::new()))
    }

    /// Creates an empty cache reporting into `metrics`.
    #[must_use]
    pub fn with_metrics(fetcher: Arc<dyn QueryFetcher>, metrics: Arc<SyncMetrics>) -> Self {
        let (changes, _) = broadcast::channel(DEFAULT_CHANNEL_CAPACITY);
        Self {
            entries: RwLock::new(HashMap::new()),
            fetcher,
            changes,
            metrics,
        }
    }

    /// Returns the metrics.
    #[must_use]
    pub fn metrics(&self) -> Arc<SyncMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Returns a receiver of keys whose data changed.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<QueryKey> {
        self.changes.subscribe()
    }

    /// Returns the cached data for `key`.
    pub async fn get(&self, key: &QueryKey) -> Option<Value> {
        self.entries.read().await.get(key).map(|e| e.data.clone())
    }

    /// Returns the full entry for `key`.
    pub async fn entry(&self, key: &QueryKey) -> Option<CacheEntry> {
        self.entries.read().await.get(key).cloned()
    }

    /// Returns all keys currently cached.
    pub async fn keys(&self) -> Vec<QueryKey> {
        let mut keys: Vec<QueryKey> = self.entries.read().await.keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Writes `data` for `key` and returns the new version.
    pub async fn set(&self, key: &QueryKey, data: Value) -> u64 {
        self.update(key, |_| data).await.version
    }

    /// Replaces the data for `key` with `f(current)` under one write lock.
    pub async fn update<F>(&self, key: &QueryKey, f: F) -> CacheEntry
    where
        F: FnOnce(Option<&Value>) -> Value,
    {
        self.write(key, f).await.1
    }

    /// Like [`Self::update`], but returns the entry that was replaced so the
    /// caller can restore it later.
    pub async fn patch<F>(&self, key: &QueryKey, f: F) -> Option<CacheEntry>
    where
        F: FnOnce(Option<&Value>) -> Value,
    {
        self.write(key, f).await.0
    }

    async fn write<F>(&self, key: &QueryKey, f: F) -> (Option<CacheEntry>, CacheEntry)
    where
        F: FnOnce(Option<&Value>) -> Value,
    {
        let written = {
            let mut entries = self.entries.write().await;
            let previous = entries.get(key).cloned();
            let entry = CacheEntry {
                data: f(previous.as_ref().map(|e| &e.data)),
                stale: false,
                version: previous.as_ref().map_or(1, |e| e.version.saturating_add(1)),
                updated_at: Utc::now(),
            };
            entries.insert(key.clone(), entry.clone());
            (previous, entry)
        };
        let _ = self.changes.send(key.clone());
        written
    }

    /// Puts back a previously captured entry, or removes the key if the
    /// capture was empty.
    pub async fn restore(&self, key: &QueryKey, entry: Option<CacheEntry>) {
        {
            let mut entries = self.entries.write().await;
            match entry {
                Some(entry) => {
                    entries.insert(key.clone(), entry);
                }
                None => {
                    entries.remove(key);
                }
            }
        }
        let _ = self.changes.send(key.clone());
    }

    /// Marks `key` stale. Returns false if nothing was cached.
    pub async fn invalidate(&self, key: &QueryKey) -> bool {
        match self.entries.write().await.get_mut(key) {
            Some(entry) => {
                entry.stale = true;
                true
            }
            None => false,
        }
    }

    /// Returns true if `key` is stale or absent.
    pub async fn is_stale(&self, key: &QueryKey) -> bool {
        self.entries
            .read()
            .await
            .get(key)
            .is_none_or(|e| e.stale)
    }

    /// Fetches `key` from the data source and writes the result.
    ///
    /// The lock is not held across the fetch, so the write lands in the order
    /// responses arrive.
    ///
    /// # Errors
    ///
    /// Returns an error if the data source fails; the entry is left as is.
    pub async fn refetch(&self, key: &QueryKey) -> Result<Value, CacheError> {
        match self.fetcher.fetch(key).await {
            Ok(data) => {
                self.metrics.record_refetch(true);
                self.set(key, data.clone()).await;
                tracing::debug!(%key, "query group refetched");
                Ok(data)
            }
            Err(source) => {
                self.metrics.record_refetch(false);
                tracing::debug!(%key, status = ?source.status(), "query group refetch failed");
                Err(CacheError::Fetch {
                    key: key.clone(),
                    source,
                })
            }
        }
    }

    /// Marks `key` stale and refetches it immediately.
    ///
    /// # Errors
    ///
    /// Returns an error if the refetch fails; the entry stays stale.
    pub async fn invalidate_and_refetch(&self, key: &QueryKey) -> Result<Value, CacheError> {
        self.invalidate(key).await;
        self.refetch(key).await
    }
}
