//! FleetDesk Live - headless realtime monitor for the admin dashboard.
//!
//! Wires the SDK together from environment configuration: a REST-backed
//! query cache, the event router, one realtime session and a monitor that
//! highlights order rows as they change.
//!
//! # Components
//!
//! - [`config`]: Process configuration
//! - [`monitor`]: Orders flash monitor

pub mod config;
pub mod monitor;

pub use config::{ConfigError, LiveConfig};
pub use monitor::{Highlight, Highlights, OrdersMonitor};
