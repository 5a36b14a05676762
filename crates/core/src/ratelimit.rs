//! Distributed request-rate governor.
//!
//! Fixed-window counters in the shared cache store, keyed by logical
//! identity and route class, never by transport connection. Both services
//! call [`RateGovernor::admit`] with the same keys, so the limit holds
//! across processes. Counters are created with TTL = window length and
//! expire on their own.

use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::debug;

use crate::cache::{CacheStore, keys};
use crate::error::{CoreError, Result};
use crate::types::CustomerId;

/// Coarse operation categories sharing one rate policy each.
///
/// The mapping from concrete operation to class is configuration in the
/// transport; the governor only ever sees the class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RouteClass {
    /// Login, registration, token refresh.
    Auth,
    /// Order creation and transitions.
    OrderWrite,
    /// Menu, order views, comment feeds.
    Read,
}

impl std::fmt::Display for RouteClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Auth => write!(f, "auth"),
            Self::OrderWrite => write!(f, "order-write"),
            Self::Read => write!(f, "read"),
        }
    }
}

/// Logical admission key: an authenticated identity, or the client address
/// for anonymous routes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IdentityKey {
    Identity(CustomerId),
    Anonymous(IpAddr),
}

impl std::fmt::Display for IdentityKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Identity(id) => write!(f, "id:{id}"),
            Self::Anonymous(ip) => write!(f, "ip:{ip}"),
        }
    }
}

/// Limit and window for one route class.
#[derive(Debug, Clone, Copy)]
pub struct RatePolicy {
    /// Requests admitted per window.
    pub limit: u32,
    /// Window length.
    pub window: Duration,
}

/// Per-class rate policies.
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub auth: RatePolicy,
    pub order_write: RatePolicy,
    pub read: RatePolicy,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            auth: RatePolicy {
                limit: 5,
                window: Duration::from_secs(60),
            },
            order_write: RatePolicy {
                limit: 20,
                window: Duration::from_secs(60),
            },
            read: RatePolicy {
                limit: 120,
                window: Duration::from_secs(60),
            },
        }
    }
}

impl RateLimitConfig {
    /// Policy for a route class.
    #[must_use]
    pub const fn policy(&self, class: RouteClass) -> RatePolicy {
        match class {
            RouteClass::Auth => self.auth,
            RouteClass::OrderWrite => self.order_write,
            RouteClass::Read => self.read,
        }
    }
}

/// Fixed-window rate governor over the shared cache store.
pub struct RateGovernor {
    store: Arc<dyn CacheStore>,
    config: RateLimitConfig,
}

impl RateGovernor {
    /// Create a governor with the given per-class policies.
    #[must_use]
    pub fn new(store: Arc<dyn CacheStore>, config: RateLimitConfig) -> Self {
        Self { store, config }
    }

    /// Admit or reject a request for `key` on `class`.
    ///
    /// # Errors
    ///
    /// Returns `RateLimited` with the time remaining in the current window
    /// once the class limit is exhausted; `Transient` if the counter store
    /// is unavailable.
    pub async fn admit(&self, key: &IdentityKey, class: RouteClass) -> Result<()> {
        self.admit_at(key, class, Utc::now().timestamp()).await
    }

    /// Window arithmetic against an explicit clock, so window boundaries are
    /// controllable in tests.
    async fn admit_at(&self, key: &IdentityKey, class: RouteClass, now_secs: i64) -> Result<()> {
        let policy = self.config.policy(class);
        let window_secs = i64::try_from(policy.window.as_secs().max(1))
            .map_err(|_| CoreError::Transient("rate window overflow".to_string()))?;
        let window_index = now_secs.div_euclid(window_secs);

        let bucket = format!("{}:{key}:{class}:{window_index}", keys::RATELIMIT);
        let count = self.store.incr(&bucket, policy.window).await?;

        if count > i64::from(policy.limit) {
            let elapsed = now_secs.rem_euclid(window_secs);
            let retry_after = Duration::from_secs(u64::try_from(window_secs - elapsed).unwrap_or(0));
            debug!(%key, %class, count, "rate limit exceeded");
            return Err(CoreError::RateLimited { retry_after });
        }

        Ok(())
    }
}
