//! Data sources the cache refetches from.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use futures_util::future::BoxFuture;
use serde_json::Value;
use tokio::sync::RwLock;

use super::store::QueryKey;
use crate::client::ClientError;

/// Loads the authoritative value of a query group.
pub trait QueryFetcher: Send + Sync {
    /// Fetches the current data for `key`.
    fn fetch<'a>(&'a self, key: &'a QueryKey) -> BoxFuture<'a, Result<Value, ClientError>>;
}

/// In-memory data source.
///
/// Serves whatever was last stored per key. Useful offline and as a
/// stand-in for the REST API.
#[derive(Debug, Default)]
pub struct MemoryFetcher {
    data: RwLock<HashMap<QueryKey, Value>>,
    fetches: AtomicU64,
    offline: AtomicBool,
}

impl MemoryFetcher {
    /// Creates an empty fetcher.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores the value served for `key`.
    pub async fn set(&self, key: impl Into<QueryKey>, value: Value) {
        self.data.write().await.insert(key.into(), value);
    }

    /// Removes the value served for `key`.
    pub async fn remove(&self, key: &QueryKey) -> Option<Value> {
        self.data.write().await.remove(key)
    }

    /// Makes every fetch fail with a timeout while set.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::Relaxed);
    }

    /// Returns the number of fetches served or attempted.
    #[must_use]
    pub fn fetch_count(&self) -> u64 {
        self.fetches.load(Ordering::Relaxed)
    }
}

impl QueryFetcher for MemoryFetcher {
    fn fetch<'a>(&'a self, key: &'a QueryKey) -> BoxFuture<'a, Result<Value, ClientError>> {
        Box::pin(async move {
            self.fetches.fetch_add(1, Ordering::Relaxed);
            if self.offline.load(Ordering::Relaxed) {
                return Err(ClientError::Timeout);
            }
            self.data
                .read()
                .await
                .get(key)
                .cloned()
                .ok_or_else(|| ClientError::NotFound(key.path()))
        })
    }
}
