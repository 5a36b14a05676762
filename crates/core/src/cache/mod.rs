//! Shared cache store contract.
//!
//! The cache store is the coordination substrate between the two transport
//! processes: response cache entries, rate-limiter counters, refresh-token
//! records, and the revocation set all live here under namespaced keys. The
//! core depends only on this trait; the in-memory backend in
//! [`memory`] serves single-process/dev deployments, and a Redis-backed
//! implementation slots in for production without touching core code.
//!
//! Cross-process invariants (rotation, caps, counters) rely on the atomic
//! `incr` and `compare_and_swap` primitives, never on read-then-write.

pub mod memory;
pub mod response;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::error::CoreError;

/// Key namespaces, kept in one place so both processes agree on layout.
pub mod keys {
    /// Rate-limiter counters: `ratelimit:{key}:{class}:{window}`.
    pub const RATELIMIT: &str = "ratelimit";
    /// Refresh-token records: `refresh:{token_id}`.
    pub const REFRESH: &str = "refresh";
    /// Session lineage → live refresh token id: `lineage:{lineage_id}`.
    pub const LINEAGE: &str = "lineage";
    /// Revoked access-token ids: `revoked:{jti}`.
    pub const REVOKED: &str = "revoked";
    /// Response cache entries: `cache:{namespace}:{fingerprint}`.
    pub const CACHE: &str = "cache";
}

/// Errors from the cache store.
#[derive(Debug, Error)]
pub enum CacheError {
    /// The store did not answer within the configured timeout.
    #[error("cache store timed out")]
    Timeout,

    /// The store is unreachable or failed the operation.
    #[error("cache store unavailable: {0}")]
    Unavailable(String),
}

impl From<CacheError> for CoreError {
    fn from(err: CacheError) -> Self {
        Self::Transient(err.to_string())
    }
}

/// Keyed store with TTLs and atomic primitives.
///
/// Every method must complete within the deadline the implementation was
/// configured with and surface overruns as [`CacheError::Timeout`]; no core
/// operation blocks indefinitely on the store.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Get a value.
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    /// Set a value with a TTL.
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError>;

    /// Atomically increment a counter, creating it with `ttl` if absent.
    /// Returns the post-increment count. An existing counter keeps its
    /// original expiry.
    async fn incr(&self, key: &str, ttl: Duration) -> Result<i64, CacheError>;

    /// Atomically replace `key` with `new` only if its current value equals
    /// `expected`. Returns whether the swap happened.
    async fn compare_and_swap(
        &self,
        key: &str,
        expected: &str,
        new: &str,
        ttl: Duration,
    ) -> Result<bool, CacheError>;

    /// Reset a key's TTL. No-op if the key is absent.
    async fn expire(&self, key: &str, ttl: Duration) -> Result<(), CacheError>;

    /// Delete a key. No-op if absent.
    async fn delete(&self, key: &str) -> Result<(), CacheError>;
}

/// Wrap a store future with a deadline, mapping overruns to
/// [`CacheError::Timeout`].
pub(crate) async fn with_deadline<T>(
    deadline: Duration,
    fut: impl Future<Output = T> + Send,
) -> Result<T, CacheError> {
    tokio::time::timeout(deadline, fut)
        .await
        .map_err(|_| CacheError::Timeout)
}
