//! Sync context.
//!
//! Owns the pieces a dashboard view shares: the query cache, the event
//! router, the mutation coordinator, notices and metrics. Create one per
//! process and pass it by reference; sessions started from it are closed
//! by their owners.

use std::sync::Arc;

use crate::cache::{QueryCache, QueryFetcher};
use crate::error::SdkError;
use crate::metrics::SyncMetrics;
use crate::notify::Notifier;
use crate::optimistic::OptimisticCoordinator;
use crate::router::EventRouter;
use crate::ws::{RealtimeSession, WsConfig};

/// Shared realtime sync state.
#[derive(Debug)]
pub struct SyncContext {
    cache: Arc<QueryCache>,
    router: Arc<EventRouter>,
    coordinator: Arc<OptimisticCoordinator>,
    notifier: Notifier,
}

impl SyncContext {
    /// Creates a context with the default route table.
    #[must_use]
    pub fn new(fetcher: Arc<dyn QueryFetcher>) -> Self {
        let cache = Arc::new(QueryCache::new(fetcher));
        let router = EventRouter::new(Arc::clone(&cache));
        Self::with_router(router)
    }

    /// Creates a context around a configured router.
    #[must_use]
    pub fn with_router(router: EventRouter) -> Self {
        let notifier = Notifier::default();
        let cache = router.cache();
        let coordinator = OptimisticCoordinator::new(Arc::clone(&cache), notifier.clone());
        Self {
            cache,
            router: Arc::new(router),
            coordinator: Arc::new(coordinator),
            notifier,
        }
    }

    /// Returns the query cache.
    #[must_use]
    pub fn cache(&self) -> Arc<QueryCache> {
        Arc::clone(&self.cache)
    }

    /// Returns the event router.
    #[must_use]
    pub fn router(&self) -> Arc<EventRouter> {
        Arc::clone(&self.router)
    }

    /// Returns the mutation coordinator.
    #[must_use]
    pub fn coordinator(&self) -> Arc<OptimisticCoordinator> {
        Arc::clone(&self.coordinator)
    }

    /// Returns the notifier.
    #[must_use]
    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    /// Returns the shared metrics.
    #[must_use]
    pub fn metrics(&self) -> Arc<SyncMetrics> {
        self.cache.metrics()
    }

    /// Starts a realtime session feeding this context.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn start_session(&self, config: WsConfig) -> Result<RealtimeSession, SdkError> {
        Ok(RealtimeSession::start(
            config,
            self.router(),
            self.notifier.clone(),
        )?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryFetcher;
    use crate::cache::QueryKey;
    use serde_json::json;

    #[tokio::test]
    async fn test_context_shares_one_cache() {
        let fetcher = Arc::new(MemoryFetcher::new());
        fetcher.set("orders", json!([{"id": "o1"}])).await;
        let context = SyncContext::new(fetcher);

        context.router().route(r#"{"type":"new_order"}"#).await;

        assert_eq!(
            context.cache().get(&QueryKey::new("orders")).await,
            Some(json!([{"id": "o1"}]))
        );
        assert_eq!(context.metrics().events_routed(), 1);
    }

    #[tokio::test]
    async fn test_context_rejects_bad_session_config() {
        let context = SyncContext::new(Arc::new(MemoryFetcher::new()));
        let result = context.start_session(WsConfig::new("http://nope"));
        assert!(matches!(result, Err(SdkError::Ws(_))));
    }
}
