//! The platform facade.
//!
//! One object wiring every policy component together, embedded as-is by both
//! transport processes. Transports translate requests into these calls and
//! map [`CoreError`](crate::error::CoreError) onto their status codes; no
//! domain rule lives outside this crate.

use std::sync::Arc;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use chrono::Utc;
use tracing::{info, instrument, warn};

use crate::cache::CacheStore;
use crate::cache::response::ResponseCache;
use crate::config::CoreConfig;
use crate::error::{CoreError, Result};
use crate::events::EventSink;
use crate::identity::{Credentials, IdentityStore, LoyaltyTiers};
use crate::orders::lifecycle::{LifecycleConfig, OrderLifecycle};
use crate::orders::store::OrderStore;
use crate::orders::{LineItem, Order, OrderState};
use crate::policy::{self, Operation};
use crate::pricing::{PricingConfig, PricingEngine, PricingResult};
use crate::ratelimit::{IdentityKey, RateGovernor, RouteClass};
use crate::token::{Principal, TokenPair, TokenService};
use crate::types::OrderId;

/// The assembled policy core.
pub struct Platform {
    tokens: TokenService,
    governor: RateGovernor,
    lifecycle: OrderLifecycle,
    pricing: PricingEngine,
    identities: Arc<dyn IdentityStore>,
    orders: Arc<dyn OrderStore>,
    cache: ResponseCache,
}

impl Platform {
    /// Assemble the platform from its backends.
    #[must_use]
    pub fn new(
        config: &CoreConfig,
        cache_store: Arc<dyn CacheStore>,
        order_store: Arc<dyn OrderStore>,
        identities: Arc<dyn IdentityStore>,
        events: Arc<dyn EventSink>,
    ) -> Self {
        let pricing = PricingEngine::new(PricingConfig {
            stacking: config.stacking,
            tiers: LoyaltyTiers::default(),
        });
        let cache = ResponseCache::new(cache_store.clone(), config.cache_ttl);
        let lifecycle = OrderLifecycle::new(
            order_store.clone(),
            pricing.clone(),
            events,
            cache.clone(),
            LifecycleConfig::with_grace(config.cancel_grace),
        );

        Self {
            tokens: TokenService::new(
                cache_store.clone(),
                config.token_secret.clone(),
                config.access_ttl,
                config.refresh_ttl,
            ),
            governor: RateGovernor::new(cache_store, config.rate_limits.clone()),
            lifecycle,
            pricing,
            identities,
            orders: order_store,
            cache,
        }
    }

    // =========================================================================
    // Sessions
    // =========================================================================

    /// Authenticate credentials and start a session.
    ///
    /// Every failure mode collapses to `Unauthorized`; the caller learns
    /// nothing about whether the username exists.
    ///
    /// # Errors
    ///
    /// Returns `Unauthorized` for bad credentials, `Transient` if a backend
    /// is unavailable.
    #[instrument(skip_all, fields(username = %credentials.username))]
    pub async fn authenticate(&self, credentials: &Credentials) -> Result<TokenPair> {
        let stored = self
            .identities
            .fetch_credential(&credentials.username)
            .await
            .ok_or(CoreError::Unauthorized)?;
        verify_password(&credentials.password, &stored.password_hash)?;

        let identity = self
            .identities
            .fetch_identity(stored.identity_id)
            .await
            .ok_or(CoreError::Unauthorized)?;

        info!(identity = %identity.id, "authenticated");
        self.tokens.issue(&identity).await
    }

    /// Verify an access token into a [`Principal`].
    ///
    /// # Errors
    ///
    /// Returns `Unauthorized` for invalid, expired, or revoked tokens.
    pub async fn verify(&self, access_token: &str) -> Result<Principal> {
        self.tokens.verify_access(access_token).await
    }

    /// Exchange a refresh token for a new pair (single use, rotating).
    ///
    /// # Errors
    ///
    /// Returns `Unauthorized` for unknown, expired, or replayed tokens.
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenPair> {
        self.tokens.refresh(refresh_token).await
    }

    /// End a session: revoke the refresh lineage and blocklist the presented
    /// access token for its remaining validity. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns `Transient` if the store is unavailable.
    pub async fn logout(&self, access_token: &str, refresh_token: &str) -> Result<()> {
        if let Ok(claims) = self.tokens.peek_claims(access_token) {
            self.tokens
                .revoke_access(&claims.jti, std::time::Duration::from_secs(claims.remaining_secs()))
                .await?;
        }
        self.tokens.revoke(refresh_token).await
    }

    // =========================================================================
    // Admission
    // =========================================================================

    /// Check the caller's role against the static access policy.
    ///
    /// # Errors
    ///
    /// Returns `Forbidden` when the role is insufficient.
    pub fn authorize(&self, principal: &Principal, operation: Operation) -> Result<()> {
        policy::authorize(principal.role, operation)
    }

    /// Admit or rate-limit a request before any domain logic runs.
    ///
    /// # Errors
    ///
    /// Returns `RateLimited` with a retry-after duration once the class limit
    /// is exhausted.
    pub async fn admit_request(&self, key: &IdentityKey, class: RouteClass) -> Result<()> {
        self.governor.admit(key, class).await
    }

    // =========================================================================
    // Pricing
    // =========================================================================

    /// Quote a basket without creating an order. Advisory: cap enforcement
    /// happens again at placement.
    ///
    /// # Errors
    ///
    /// Returns the coupon errors from pricing and `Transient` for backend
    /// failures.
    pub async fn quote_price(
        &self,
        principal: &Principal,
        line_items: &[LineItem],
        coupon_code: Option<&str>,
    ) -> Result<PricingResult> {
        let coupon = match coupon_code {
            Some(code) => Some(
                self.orders
                    .fetch_coupon(code)
                    .await?
                    .ok_or(CoreError::InvalidCoupon)?,
            ),
            None => None,
        };
        let coupon_input = match &coupon {
            Some(coupon) => {
                let usage = self
                    .orders
                    .fetch_coupon_usage(coupon.id, principal.id)
                    .await?;
                Some((coupon, usage))
            }
            None => None,
        };
        let loyalty = self.orders.fetch_loyalty(principal.id).await?;
        Ok(self
            .pricing
            .quote(line_items, coupon_input, &loyalty, Utc::now())?)
    }

    // =========================================================================
    // Orders
    // =========================================================================

    /// Create a draft order owned by the caller.
    ///
    /// # Errors
    ///
    /// See [`OrderLifecycle::create_draft`].
    pub async fn create_draft(
        &self,
        principal: &Principal,
        line_items: Vec<LineItem>,
        coupon_code: Option<String>,
    ) -> Result<Order> {
        self.authorize(principal, Operation::OrderCreate)?;
        self.lifecycle
            .create_draft(principal, line_items, coupon_code)
            .await
    }

    /// Fetch an order, subject to ownership rules.
    ///
    /// # Errors
    ///
    /// See [`OrderLifecycle::fetch`].
    pub async fn fetch_order(&self, principal: &Principal, order_id: OrderId) -> Result<Order> {
        self.authorize(principal, Operation::OrderView)?;
        self.lifecycle.fetch(principal, order_id).await
    }

    /// Place a draft order.
    ///
    /// # Errors
    ///
    /// See [`OrderLifecycle::place`].
    pub async fn place_order(&self, principal: &Principal, order_id: OrderId) -> Result<Order> {
        self.authorize(principal, Operation::OrderCreate)?;
        self.lifecycle.place(principal, order_id).await
    }

    /// Advance an order along the fulfillment sequence (staff).
    ///
    /// # Errors
    ///
    /// See [`OrderLifecycle::transition`].
    pub async fn transition_order(
        &self,
        principal: &Principal,
        order_id: OrderId,
        target: OrderState,
    ) -> Result<Order> {
        self.authorize(principal, Operation::OrderAdvance)?;
        self.lifecycle.transition(principal, order_id, target).await
    }

    /// Cancel an order, subject to role and grace-window rules.
    ///
    /// # Errors
    ///
    /// See [`OrderLifecycle::cancel`].
    pub async fn cancel_order(&self, principal: &Principal, order_id: OrderId) -> Result<Order> {
        self.lifecycle.cancel(principal, order_id).await
    }

    // =========================================================================
    // Caching
    // =========================================================================

    /// The shared response cache, for transports caching derived views.
    #[must_use]
    pub const fn response_cache(&self) -> &ResponseCache {
        &self.cache
    }
}

/// Hash a password using Argon2id.
///
/// # Errors
///
/// Returns `Transient` if hashing fails, which only happens on broken
/// parameters.
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| CoreError::Transient(e.to_string()))
}

/// Verify a password against a hash.
fn verify_password(password: &str, hash: &str) -> Result<()> {
    let parsed_hash = PasswordHash::new(hash).map_err(|_| CoreError::Unauthorized)?;
    let argon2 = Argon2::default();

    argon2
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| {
            warn!("password verification failed");
            CoreError::Unauthorized
        })
}
