//! Event router.
//!
//! Turns push channel messages into cache invalidations. A recognized event
//! marks its query groups stale and refetches them right away, so visible
//! tables update without waiting for the next poll.

use std::collections::HashMap;
use std::sync::Arc;

use crate::cache::{QueryCache, QueryKey};
use crate::metrics::SyncMetrics;
use crate::ws::messages::ServerEvent;

/// Default event-type to query-group table.
pub const DEFAULT_ROUTES: &[(&str, &[&str])] = &[
    ("new_order", &["orders"]),
    ("order_updated", &["orders"]),
    ("order_status_changed", &["orders"]),
    ("order_cancelled", &["orders"]),
    ("new_user", &["users"]),
    ("user_updated", &["users"]),
    ("transaction_created", &["transactions"]),
    ("wallet_updated", &["transactions"]),
    ("escrow_released", &["transactions"]),
    ("stats_updated", &["stats"]),
    ("settings_updated", &["settings"]),
    ("report_ready", &["reports"]),
    ("new_message", &["messages"]),
];

/// Hook for events with no route.
pub type FallbackHook = Box<dyn Fn(&ServerEvent) + Send + Sync>;

/// What happened to one inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteOutcome {
    /// Groups were refetched; `failed` lists those whose refetch failed.
    Refetched {
        /// Event type.
        event: String,
        /// Groups invalidated.
        keys: Vec<QueryKey>,
        /// Groups whose refetch failed and remain stale.
        failed: Vec<QueryKey>,
    },
    /// No route; passed to the fallback hook.
    Unhandled {
        /// Event type.
        event: String,
    },
    /// Envelope did not parse; dropped.
    Dropped,
}

/// Maps event types to query groups and drives refetches.
pub struct EventRouter {
    routes: HashMap<String, Vec<QueryKey>>,
    cache: Arc<QueryCache>,
    fallback: FallbackHook,
    metrics: Arc<SyncMetrics>,
}

impl std::fmt::Debug for EventRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventRouter")
            .field("routes", &self.routes)
            .finish_non_exhaustive()
    }
}

impl EventRouter {
    /// Creates a router with the default route table.
    #[must_use]
    pub fn new(cache: Arc<QueryCache>) -> Self {
        DEFAULT_ROUTES
            .iter()
            .fold(Self::empty(cache), |router, (event, keys)| {
                router.with_route(*event, keys.iter().copied())
            })
    }

    /// Creates a router with no routes.
    #[must_use]
    pub fn empty(cache: Arc<QueryCache>) -> Self {
        let metrics = cache.metrics();
        Self {
            routes: HashMap::new(),
            cache,
            fallback: Box::new(|event| {
                tracing::debug!(event = %event.event_type, "no route for event");
            }),
            metrics,
        }
    }

    /// Adds query groups to an event's route.
    #[must_use]
    pub fn with_route<I, K>(mut self, event: impl Into<String>, keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<QueryKey>,
    {
        let route = self.routes.entry(event.into()).or_default();
        for key in keys {
            let key = key.into();
            if !route.contains(&key) {
                route.push(key);
            }
        }
        self
    }

    /// Sets the hook called for unrouted events.
    #[must_use]
    pub fn with_fallback<F>(mut self, hook: F) -> Self
    where
        F: Fn(&ServerEvent) + Send + Sync + 'static,
    {
        self.fallback = Box::new(hook);
        self
    }

    /// Returns the query groups routed for `event`.
    #[must_use]
    pub fn routes_for(&self, event: &str) -> Option<&[QueryKey]> {
        self.routes.get(event).map(Vec::as_slice)
    }

    /// Returns the event names with a route, sorted.
    #[must_use]
    pub fn events(&self) -> Vec<&str> {
        let mut events: Vec<&str> = self.routes.keys().map(String::as_str).collect();
        events.sort_unstable();
        events
    }

    /// Returns the shared cache.
    #[must_use]
    pub fn cache(&self) -> Arc<QueryCache> {
        Arc::clone(&self.cache)
    }

    /// Routes one raw text message. Never fails.
    pub async fn route(&self, raw: &str) -> RouteOutcome {
        self.metrics.record_message();
        match ServerEvent::parse(raw) {
            Ok(event) => self.dispatch(&event).await,
            Err(e) => {
                self.metrics.record_parse_error();
                tracing::warn!(error = %e, "dropping malformed push message");
                RouteOutcome::Dropped
            }
        }
    }

    /// Routes one decoded event.
    pub async fn dispatch(&self, event: &ServerEvent) -> RouteOutcome {
        let Some(keys) = self.routes.get(&event.event_type) else {
            self.metrics.record_unrouted();
            (self.fallback)(event);
            return RouteOutcome::Unhandled {
                event: event.event_type.clone(),
            };
        };

        self.metrics.record_routed();
        let mut failed = Vec::new();
        for key in keys {
            if let Err(e) = self.cache.invalidate_and_refetch(key).await {
                tracing::warn!(event = %event.event_type, error = %e, "refetch failed");
                failed.push(key.clone());
            }
        }

        RouteOutcome::Refetched {
            event: event.event_type.clone(),
            keys: keys.clone(),
            failed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{MemoryFetcher, QueryFetcher};
    use serde_json::json;
    use std::sync::Mutex;

    async fn setup() -> (Arc<MemoryFetcher>, Arc<QueryCache>) {
        let fetcher = Arc::new(MemoryFetcher::new());
        fetcher.set("orders", json!([{"id": "o1"}])).await;
        let source: Arc<dyn QueryFetcher> = Arc::clone(&fetcher) as Arc<dyn QueryFetcher>;
        (fetcher, Arc::new(QueryCache::new(source)))
    }

    #[tokio::test]
    async fn test_router_default_routes() {
        let (_, cache) = setup().await;
        let router = EventRouter::new(cache);
        assert_eq!(
            router.routes_for("new_order"),
            Some(&[QueryKey::new("orders")][..])
        );
        assert!(router.routes_for("unknown").is_none());
        assert!(router.events().contains(&"escrow_released"));
    }

    #[tokio::test]
    async fn test_router_recognized_event_refetches() {
        let (fetcher, cache) = setup().await;
        let key = QueryKey::new("orders");
        cache.set(&key, json!([])).await;
        let router = EventRouter::new(Arc::clone(&cache));

        let outcome = router
            .route(r#"{"type":"new_order","payload":{"id":"o1"}}"#)
            .await;

        assert_eq!(
            outcome,
            RouteOutcome::Refetched {
                event: "new_order".to_string(),
                keys: vec![key.clone()],
                failed: vec![],
            }
        );
        assert_eq!(fetcher.fetch_count(), 1);
        assert_eq!(cache.get(&key).await, Some(json!([{"id": "o1"}])));
        assert!(!cache.is_stale(&key).await);
    }

    #[tokio::test]
    async fn test_router_multiple_groups() {
        let (fetcher, cache) = setup().await;
        fetcher.set("stats", json!({"orders_today": 3})).await;
        let router = EventRouter::empty(Arc::clone(&cache))
            .with_route("new_order", ["orders", "stats"])
            .with_route("new_order", ["orders"]);

        let outcome = router.route(r#"{"type":"new_order"}"#).await;
        assert!(matches!(outcome, RouteOutcome::Refetched { ref keys, .. } if keys.len() == 2));
        assert_eq!(
            cache.get(&QueryKey::new("stats")).await,
            Some(json!({"orders_today": 3}))
        );
    }

    #[tokio::test]
    async fn test_router_unknown_event_calls_fallback() {
        let (fetcher, cache) = setup().await;
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let router = EventRouter::new(cache).with_fallback(move |event| {
            if let Ok(mut seen) = sink.lock() {
                seen.push(event.event_type.clone());
            }
        });

        let outcome = router.route(r#"{"type":"driver_location","payload":{}}"#).await;

        assert_eq!(
            outcome,
            RouteOutcome::Unhandled {
                event: "driver_location".to_string()
            }
        );
        assert_eq!(fetcher.fetch_count(), 0);
        assert_eq!(
            *seen.lock().expect("lock"),
            vec!["driver_location".to_string()]
        );
    }

    #[tokio::test]
    async fn test_router_malformed_message_dropped() {
        let (fetcher, cache) = setup().await;
        let router = EventRouter::new(Arc::clone(&cache));

        assert_eq!(router.route("{not json").await, RouteOutcome::Dropped);
        assert_eq!(router.route(r#"{"payload":1}"#).await, RouteOutcome::Dropped);
        assert_eq!(fetcher.fetch_count(), 0);
        assert_eq!(cache.metrics().parse_errors(), 2);
        assert_eq!(cache.metrics().messages_received(), 2);
    }

    #[tokio::test]
    async fn test_router_refetch_failure_contained() {
        let (fetcher, cache) = setup().await;
        fetcher.set_offline(true);
        let router = EventRouter::new(Arc::clone(&cache));

        let outcome = router.route(r#"{"type":"order_updated"}"#).await;

        assert_eq!(
            outcome,
            RouteOutcome::Refetched {
                event: "order_updated".to_string(),
                keys: vec![QueryKey::new("orders")],
                failed: vec![QueryKey::new("orders")],
            }
        );
        assert!(cache.is_stale(&QueryKey::new("orders")).await);
    }
}
