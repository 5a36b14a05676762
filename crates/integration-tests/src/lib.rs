//! Integration tests for Brewline.
//!
//! Exercises the assembled [`Platform`] facade over the in-memory backends,
//! the same wiring a single-process deployment uses. Every scenario goes
//! through the facade exactly as a transport would; nothing here reaches
//! into component internals.
//!
//! # Test Categories
//!
//! - `session_lifecycle` - Authentication, verification, refresh rotation
//! - `order_flow` - Placement, pricing, fulfillment, cancellation
//! - `coupon_caps` - Concurrent usage-cap enforcement
//! - `rate_limits` - Cross-class fixed-window admission

use std::sync::Arc;
use std::time::Duration;

use secrecy::SecretString;

use brewline_core::cache::memory::MemoryCacheStore;
use brewline_core::config::CoreConfig;
use brewline_core::events::TracingEventSink;
use brewline_core::identity::{Identity, LoyaltyRecord, MemoryIdentityStore};
use brewline_core::orders::memory::MemoryOrderStore;
use brewline_core::platform::hash_password;
use brewline_core::pricing::DiscountStacking;
use brewline_core::ratelimit::RateLimitConfig;
use brewline_core::{CustomerId, Platform, Role};

/// A fully wired platform over in-memory backends, plus handles to the
/// backends for seeding.
pub struct TestContext {
    pub platform: Platform,
    pub orders: Arc<MemoryOrderStore>,
    pub identities: Arc<MemoryIdentityStore>,
}

impl TestContext {
    /// Build a context with default limits and a five-minute cancellation
    /// grace period.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(test_config())
    }

    /// Build a context with a custom configuration.
    #[must_use]
    pub fn with_config(config: CoreConfig) -> Self {
        // First call wins; later contexts in the same test binary reuse it.
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
            )
            .with_test_writer()
            .try_init();

        let cache = Arc::new(MemoryCacheStore::new(config.store_timeout));
        let orders = Arc::new(MemoryOrderStore::new());
        let identities = Arc::new(MemoryIdentityStore::new());
        let platform = Platform::new(
            &config,
            cache,
            orders.clone(),
            identities.clone(),
            Arc::new(TracingEventSink),
        );
        Self {
            platform,
            orders,
            identities,
        }
    }

    /// Seed an identity with a password credential.
    pub fn register(&self, id: i64, role: Role, username: &str, password: &str) -> CustomerId {
        let customer_id = CustomerId::new(id);
        let hash = hash_password(password).expect("hash password");
        self.identities.add(
            Identity {
                id: customer_id,
                role,
                loyalty: LoyaltyRecord::default(),
            },
            username,
            &hash,
        );
        customer_id
    }
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Configuration mirroring production defaults with a short store deadline.
#[must_use]
pub fn test_config() -> CoreConfig {
    CoreConfig {
        token_secret: SecretString::from("kE9#vR2x!mQ7zW4@bN1cT6&yU3*pL8dF"),
        access_ttl: Duration::from_secs(900),
        refresh_ttl: Duration::from_secs(14 * 24 * 3600),
        cancel_grace: Duration::from_secs(300),
        store_timeout: Duration::from_millis(500),
        cache_ttl: Duration::from_secs(300),
        rate_limits: RateLimitConfig::default(),
        stacking: DiscountStacking::Additive,
    }
}
