//! Process-wide query cache.
//!
//! Named query groups hold the last JSON payload fetched for them. The event
//! router and the optimistic mutation coordinator both write here; writes
//! are applied in the order they reach the store (last write wins).

pub mod fetcher;
pub mod store;

pub use fetcher::{MemoryFetcher, QueryFetcher};
pub use store::{CacheEntry, CacheError, QueryCache, QueryKey};
