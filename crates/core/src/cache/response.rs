//! Response cache with explicit invalidation.
//!
//! Cached responses are keyed by a fingerprint of the request and grouped
//! into namespaces (menu listing, comment feed, one namespace per order).
//! Invalidation bumps a per-namespace generation counter instead of scanning
//! keys, which works identically on the in-memory backend and on a
//! distributed store: entries written under the old generation become
//! unreachable and age out by TTL.

use std::sync::Arc;
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use sha2::{Digest, Sha256};
use tracing::debug;

use super::{CacheError, CacheStore, keys};
use crate::types::OrderId;

/// Namespace for the public menu listing.
pub const NS_MENU: &str = "menu";
/// Namespace for the comment feed.
pub const NS_COMMENTS: &str = "comments";

/// Namespace for a single order's derived views.
#[must_use]
pub fn order_namespace(order_id: OrderId) -> String {
    format!("order:{order_id}")
}

/// Generation TTL. Far longer than any entry TTL, so a recycled generation
/// number can never resurrect a live stale entry.
const GENERATION_TTL: Duration = Duration::from_secs(30 * 24 * 60 * 60);

/// Request-fingerprint response cache over the shared cache store.
#[derive(Clone)]
pub struct ResponseCache {
    store: Arc<dyn CacheStore>,
    entry_ttl: Duration,
}

impl ResponseCache {
    /// Create a response cache writing entries with the given TTL.
    #[must_use]
    pub fn new(store: Arc<dyn CacheStore>, entry_ttl: Duration) -> Self {
        Self { store, entry_ttl }
    }

    /// Fingerprint the request parts that determine a response.
    fn fingerprint(parts: &[&str]) -> String {
        let mut hasher = Sha256::new();
        for part in parts {
            hasher.update(part.as_bytes());
            hasher.update([0u8]);
        }
        URL_SAFE_NO_PAD.encode(hasher.finalize())
    }

    async fn generation(&self, namespace: &str) -> Result<i64, CacheError> {
        let key = format!("{}:{namespace}:gen", keys::CACHE);
        match self.store.get(&key).await? {
            Some(raw) => Ok(raw.parse().unwrap_or(0)),
            None => Ok(0),
        }
    }

    async fn entry_key(&self, namespace: &str, parts: &[&str]) -> Result<String, CacheError> {
        let generation = self.generation(namespace).await?;
        Ok(format!(
            "{}:{namespace}:{generation}:{}",
            keys::CACHE,
            Self::fingerprint(parts)
        ))
    }

    /// Look up a cached response.
    ///
    /// # Errors
    ///
    /// Returns `CacheError` if the store times out or is unavailable.
    pub async fn get(&self, namespace: &str, parts: &[&str]) -> Result<Option<String>, CacheError> {
        let key = self.entry_key(namespace, parts).await?;
        self.store.get(&key).await
    }

    /// Store a response under the namespace's current generation.
    ///
    /// # Errors
    ///
    /// Returns `CacheError` if the store times out or is unavailable.
    pub async fn put(
        &self,
        namespace: &str,
        parts: &[&str],
        value: &str,
    ) -> Result<(), CacheError> {
        let key = self.entry_key(namespace, parts).await?;
        self.store.set(&key, value, self.entry_ttl).await
    }

    /// Invalidate every entry in a namespace by bumping its generation.
    ///
    /// # Errors
    ///
    /// Returns `CacheError` if the store times out or is unavailable.
    pub async fn invalidate(&self, namespace: &str) -> Result<(), CacheError> {
        let key = format!("{}:{namespace}:gen", keys::CACHE);
        let generation = self.store.incr(&key, GENERATION_TTL).await?;
        debug!(namespace, generation, "invalidated cache namespace");
        Ok(())
    }
}
