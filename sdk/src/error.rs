//! SDK error types.
//!
//! Umbrella error over the per-module errors.

use crate::cache::CacheError;
use crate::client::ClientError;
use crate::optimistic::MutationError;
use crate::ws::WsError;

/// SDK errors.
#[derive(Debug, thiserror::Error)]
pub enum SdkError {
    /// Push channel error.
    #[error("realtime: {0}")]
    Ws(#[from] WsError),

    /// REST client error.
    #[error("api: {0}")]
    Client(#[from] ClientError),

    /// Cache error.
    #[error("cache: {0}")]
    Cache(#[from] CacheError),

    /// Mutation error.
    #[error("mutation: {0}")]
    Mutation(#[from] MutationError),
}
