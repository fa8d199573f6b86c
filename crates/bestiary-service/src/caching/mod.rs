//! Caching primitives: the error model, namespaced cache keys, the bounded
//! LRU store, and the in-flight request registry.

use std::time::Duration;

use thiserror::Error;

mod cache_key;
mod inflight;
mod memory;

pub use cache_key::CacheKey;
pub use inflight::InFlightRegistry;
pub use memory::BoundedCache;

/// An error that happens when fetching a record from the remote catalog.
///
/// The error is `Clone + Eq` so that a single failed operation can fan out
/// through the in-flight registry to every caller that joined it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CacheError {
    /// The remote catalog says the record does not exist.
    ///
    /// Surfaced immediately, never retried.
    #[error("not found")]
    NotFound,
    /// The request exceeded its deadline.
    ///
    /// Treated like any other transient failure for retry accounting.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
    /// The record could not be fetched due to a server or connection problem.
    ///
    /// The attached string contains the remote source's response.
    #[error("fetch failed: {0}")]
    Fetch(String),
    /// The record was fetched successfully but its body could not be decoded.
    #[error("malformed: {0}")]
    Malformed(String),
}

impl CacheError {
    /// Whether a retry has a chance of producing a different outcome.
    pub fn is_transient(&self) -> bool {
        matches!(self, CacheError::Fetch(_) | CacheError::Timeout(_))
    }
}

/// The contents of a cacheable operation: either `Ok(T)` or the reason why
/// the record could not be fetched.
pub type CacheContents<T = ()> = Result<T, CacheError>;
