//! Optimistic mutations.
//!
//! A mutation shows up in the cache before the server answers. The draft is
//! appended to the region with a temporary id; the server's answer then
//! either replaces it (followed by a refetch of the region) or the region is
//! rolled back to exactly what it held before.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use serde_json::{Map, Value};
use tokio::sync::Mutex;

use crate::cache::{CacheEntry, QueryCache, QueryKey};
use crate::client::ClientError;
use crate::metrics::SyncMetrics;
use crate::notify::Notifier;

/// Prefix of ids minted for optimistic items.
pub const TEMP_ID_PREFIX: &str = "temp-";

/// Default item id field.
pub const DEFAULT_ID_FIELD: &str = "id";

/// Mutation errors.
#[derive(Debug, thiserror::Error)]
pub enum MutationError {
    /// The server rejected the mutation; the region was rolled back.
    #[error("mutation rejected: {0}")]
    Rejected(#[source] ClientError),

    /// The draft is not a JSON object.
    #[error("draft must be a JSON object")]
    InvalidDraft,

    /// The region holds something other than a list.
    #[error("query group {0} does not hold a list")]
    InvalidRegion(QueryKey),
}

/// Returns true if `id` was minted for an optimistic item.
#[must_use]
pub fn is_temporary_id(id: &str) -> bool {
    id.starts_with(TEMP_ID_PREFIX)
}

fn item_id<'a>(item: &'a Value, id_field: &str) -> Option<&'a str> {
    item.get(id_field).and_then(Value::as_str)
}

fn is_temporary(item: &Value, id_field: &str) -> bool {
    item_id(item, id_field).is_some_and(is_temporary_id)
}

/// True if every field of `draft` other than the id equals the same field
/// of `confirmed`. Extra server-side fields are ignored.
fn content_matches(draft: &Value, confirmed: &Value, id_field: &str) -> bool {
    match (draft.as_object(), confirmed.as_object()) {
        (Some(draft), Some(confirmed)) => draft
            .iter()
            .filter(|(field, _)| field.as_str() != id_field)
            .all(|(field, value)| confirmed.get(field) == Some(value)),
        _ => false,
    }
}

/// Drops optimistic items that already have an authoritative twin.
///
/// Optimistic items are paired in order with the first unpaired
/// authoritative item of equal content. Unpaired optimistic items are kept.
#[must_use]
pub fn dedupe_optimistic(items: Vec<Value>, id_field: &str) -> Vec<Value> {
    let mut paired = vec![false; items.len()];
    let mut discard = vec![false; items.len()];

    for (i, draft) in items.iter().enumerate() {
        if !is_temporary(draft, id_field) {
            continue;
        }
        let twin = items.iter().enumerate().position(|(j, candidate)| {
            !paired.get(j).copied().unwrap_or(true)
                && !is_temporary(candidate, id_field)
                && content_matches(draft, candidate, id_field)
        });
        if let Some(j) = twin {
            if let Some(slot) = paired.get_mut(j) {
                *slot = true;
            }
            if let Some(slot) = discard.get_mut(i) {
                *slot = true;
            }
        }
    }

    items
        .into_iter()
        .zip(discard)
        .filter_map(|(item, discarded)| (!discarded).then_some(item))
        .collect()
}

/// A speculative write waiting for the server.
#[derive(Debug, Clone)]
pub struct OptimisticPatch {
    /// Region the draft was written to.
    pub region: QueryKey,
    /// Temporary id of the draft.
    pub temp_id: String,
    /// Region entry before the draft, or `None` if the region was empty.
    pub snapshot: Option<CacheEntry>,
}

/// Applies drafts, then reconciles or rolls them back.
pub struct OptimisticCoordinator {
    cache: Arc<QueryCache>,
    notifier: Notifier,
    id_field: String,
    regions: Mutex<HashMap<QueryKey, Arc<Mutex<()>>>>,
    sequence: AtomicU64,
    metrics: Arc<SyncMetrics>,
}

impl std::fmt::Debug for OptimisticCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OptimisticCoordinator")
            .field("id_field", &self.id_field)
            .finish_non_exhaustive()
    }
}

impl OptimisticCoordinator {
    /// Creates a coordinator writing to `cache`.
    #[must_use]
    pub fn new(cache: Arc<QueryCache>, notifier: Notifier) -> Self {
        let metrics = cache.metrics();
        Self {
            cache,
            notifier,
            id_field: DEFAULT_ID_FIELD.to_string(),
            regions: Mutex::new(HashMap::new()),
            sequence: AtomicU64::new(0),
            metrics,
        }
    }

    /// Sets the id field of region items.
    #[must_use]
    pub fn with_id_field(mut self, field: impl Into<String>) -> Self {
        self.id_field = field.into();
        self
    }

    /// Returns true while a mutation holds `region`.
    pub async fn has_pending(&self, region: &QueryKey) -> bool {
        let lock = self.region_lock(region).await;
        let pending = lock.try_lock().is_err();
        pending
    }

    /// Runs `request` as an optimistic mutation of `region`.
    ///
    /// Mutations of the same region run one after another.
    ///
    /// # Errors
    ///
    /// Returns [`MutationError::Rejected`] after rolling back when `request`
    /// fails, or a validation error before anything is written.
    pub async fn mutate<Fut>(
        &self,
        region: &QueryKey,
        draft: Value,
        request: Fut,
    ) -> Result<Value, MutationError>
    where
        Fut: Future<Output = Result<Value, ClientError>>,
    {
        let Value::Object(fields) = draft else {
            return Err(MutationError::InvalidDraft);
        };

        let lock = self.region_lock(region).await;
        let _pending = lock.lock().await;

        if let Some(current) = self.cache.get(region).await {
            if !current.is_array() && !current.is_null() {
                return Err(MutationError::InvalidRegion(region.clone()));
            }
        }

        let patch = self.apply(region, fields).await;

        match request.await {
            Ok(confirmed) => {
                self.commit(&patch, &confirmed).await;
                self.metrics.record_commit();
                Ok(confirmed)
            }
            Err(e) => {
                self.rollback(patch).await;
                self.metrics.record_rollback();
                self.notifier
                    .error(format!("Could not save changes to {}: {}", region, e));
                Err(MutationError::Rejected(e))
            }
        }
    }

    async fn region_lock(&self, region: &QueryKey) -> Arc<Mutex<()>> {
        let mut regions = self.regions.lock().await;
        Arc::clone(regions.entry(region.clone()).or_default())
    }

    fn next_temp_id(&self) -> String {
        let seq = self.sequence.fetch_add(1, Ordering::Relaxed);
        format!("{}{}-{}", TEMP_ID_PREFIX, Utc::now().timestamp_millis(), seq)
    }

    /// Appends the draft under a temporary id and captures the prior entry.
    async fn apply(&self, region: &QueryKey, mut fields: Map<String, Value>) -> OptimisticPatch {
        let temp_id = self.next_temp_id();
        fields.insert(self.id_field.clone(), Value::String(temp_id.clone()));
        let draft = Value::Object(fields);

        let snapshot = self
            .cache
            .patch(region, |current| {
                let mut items = current
                    .and_then(Value::as_array)
                    .cloned()
                    .unwrap_or_default();
                items.push(draft);
                Value::Array(items)
            })
            .await;

        tracing::debug!(%region, %temp_id, "optimistic draft applied");
        OptimisticPatch {
            region: region.clone(),
            temp_id,
            snapshot,
        }
    }

    /// Swaps in the server's item, refetches, then drops leftover drafts.
    async fn commit(&self, patch: &OptimisticPatch, confirmed: &Value) {
        let id_field = self.id_field.as_str();

        if confirmed.get(id_field).is_some() {
            self.cache
                .update(&patch.region, |current| {
                    let items = current
                        .and_then(Value::as_array)
                        .cloned()
                        .unwrap_or_default()
                        .into_iter()
                        .map(|item| {
                            if item_id(&item, id_field) == Some(patch.temp_id.as_str()) {
                                confirmed.clone()
                            } else {
                                item
                            }
                        })
                        .collect();
                    Value::Array(items)
                })
                .await;
        }

        if let Err(e) = self.cache.invalidate_and_refetch(&patch.region).await {
            tracing::warn!(region = %patch.region, error = %e, "refetch after mutation failed");
        }

        let Some(Value::Array(items)) = self.cache.get(&patch.region).await else {
            return;
        };
        if !items.iter().any(|item| is_temporary(item, id_field)) {
            return;
        }
        let deduped = dedupe_optimistic(items.clone(), id_field);
        if deduped.len() != items.len() {
            self.cache
                .set(&patch.region, Value::Array(deduped))
                .await;
        }
    }

    async fn rollback(&self, patch: OptimisticPatch) {
        tracing::debug!(region = %patch.region, temp_id = %patch.temp_id, "rolling back draft");
        self.cache.restore(&patch.region, patch.snapshot).await;
    }
}
