//! HTTP client for the FleetDesk admin REST API.
//!
//! The sync layer treats the API as an opaque JSON source: every query group
//! maps to one collection endpoint. Credentials ride along as a session
//! cookie.
//!
//! # Example
//!
//! ```rust,ignore
//! use fleetdesk_sdk::client::{ClientConfig, DashboardClient};
//! use fleetdesk_sdk::{QueryFetcher, QueryKey};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ClientConfig::new("https://api.fleetdesk.example/admin")
//!         .with_session_token("token-from-login");
//!     let client = DashboardClient::new(config)?;
//!
//!     let orders = client.fetch(&QueryKey::new("orders")).await?;
//!     println!("orders: {}", orders);
//!
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod http;

pub use config::ClientConfig;
pub use error::ClientError;
pub use http::DashboardClient;
