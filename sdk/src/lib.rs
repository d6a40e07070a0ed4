//! FleetDesk SDK - realtime cache synchronization for the delivery admin
//! dashboard.
//!
//! The dashboard reads orders, users, wallets and stats from the platform's
//! REST API. This crate keeps those reads fresh: a push connection delivers
//! events, the router refetches the affected query groups, the flash
//! tracker highlights rows that changed and the optimistic coordinator makes
//! local edits visible before the server confirms them.
//!
//! # Components
//!
//! - [`ws`]: Push channel session with bounded reconnect
//! - [`router`]: Event type to query group routing
//! - [`flash`]: New/updated row highlighting
//! - [`optimistic`]: Speculative writes with rollback
//! - [`cache`]: Shared query cache
//! - [`client`]: REST client
//! - [`notify`]: User-visible notices
//! - [`metrics`]: Counters
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use fleetdesk_sdk::{MemoryFetcher, SyncContext};
//!
//! let context = SyncContext::new(Arc::new(MemoryFetcher::new()));
//! assert!(context.router().routes_for("new_order").is_some());
//! ```

pub mod cache;
pub mod client;
pub mod context;
pub mod error;
pub mod flash;
pub mod metrics;
pub mod notify;
pub mod optimistic;
pub mod router;
pub mod ws;

pub use cache::{CacheEntry, CacheError, MemoryFetcher, QueryCache, QueryFetcher, QueryKey};
pub use client::{ClientConfig, ClientError, DashboardClient};
pub use context::SyncContext;
pub use error::SdkError;
pub use flash::{json_key, FlashDiff, FlashKind, FlashStyle, FlashTracker};
pub use metrics::{MetricsSnapshot, SyncMetrics};
pub use notify::{Notice, NoticeLevel, Notifier};
pub use optimistic::{MutationError, OptimisticCoordinator, OptimisticPatch};
pub use router::{EventRouter, RouteOutcome};
pub use ws::{ConnectionState, ConnectionStatus, RealtimeSession, WsConfig, WsError};
