//! Push channel client.
//!
//! This module keeps a WebSocket connection to the FleetDesk realtime
//! gateway alive for the lifetime of a view, re-subscribing after every
//! reconnect and handing each inbound message to the event router.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use fleetdesk_sdk::ws::{RealtimeSession, WsConfig};
//! use fleetdesk_sdk::{EventRouter, Notifier, QueryCache};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = Arc::new(fleetdesk_sdk::DashboardClient::with_defaults()?);
//!     let cache = Arc::new(QueryCache::new(client));
//!     let router = Arc::new(EventRouter::new(cache));
//!
//!     let config = WsConfig::new("wss://realtime.fleetdesk.example/ws")
//!         .with_events(["new_order", "order_updated"]);
//!     let session = RealtimeSession::start(config, router, Notifier::default())?;
//!
//!     tokio::signal::ctrl_c().await?;
//!     session.close().await;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod messages;
pub mod session;
pub mod state;

pub use config::WsConfig;
pub use error::WsError;
pub use messages::{ClientMessage, ServerEvent};
pub use session::RealtimeSession;
pub use state::{CloseDecision, ConnectionMachine, ConnectionState, ConnectionStatus};
