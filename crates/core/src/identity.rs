//! Identity snapshots and the external identity store seam.
//!
//! The core never owns identity rows. At authentication time it fetches an
//! immutable [`Identity`] snapshot from the store; everything downstream
//! (policy, pricing, rate keys) works off that snapshot.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::{CustomerId, Money, Role};

/// Immutable identity snapshot fetched at authentication time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Unique identity id (customers and staff share one id space).
    pub id: CustomerId,
    /// Role as of the fetch.
    pub role: Role,
    /// Loyalty state for customers; staff and admin carry the default record.
    pub loyalty: LoyaltyRecord,
}

/// Customer loyalty state, mutated only at order finalization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct LoyaltyRecord {
    /// Number of finalized orders over the customer's lifetime.
    pub order_count: u32,
    /// Total spend over the customer's lifetime.
    pub lifetime_spend: Money,
}

/// Loyalty tier derived from lifetime spend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LoyaltyTier {
    #[default]
    Bronze,
    Silver,
    Gold,
}

/// Spend thresholds and per-tier discount percentages.
#[derive(Debug, Clone)]
pub struct LoyaltyTiers {
    /// Lifetime spend needed for Silver.
    pub silver_spend: Money,
    /// Lifetime spend needed for Gold.
    pub gold_spend: Money,
    /// Discount percent granted to Silver customers.
    pub silver_pct: Decimal,
    /// Discount percent granted to Gold customers.
    pub gold_pct: Decimal,
}

impl Default for LoyaltyTiers {
    fn default() -> Self {
        Self {
            silver_spend: Money::from_cents(50_000),
            gold_spend: Money::from_cents(100_000),
            silver_pct: Decimal::from(5),
            gold_pct: Decimal::from(10),
        }
    }
}

impl LoyaltyTiers {
    /// Classify a loyalty record into a tier.
    #[must_use]
    pub fn tier_of(&self, record: &LoyaltyRecord) -> LoyaltyTier {
        if record.lifetime_spend >= self.gold_spend {
            LoyaltyTier::Gold
        } else if record.lifetime_spend >= self.silver_spend {
            LoyaltyTier::Silver
        } else {
            LoyaltyTier::Bronze
        }
    }

    /// Discount percent for a tier.
    #[must_use]
    pub fn discount_pct(&self, tier: LoyaltyTier) -> Decimal {
        match tier {
            LoyaltyTier::Bronze => Decimal::ZERO,
            LoyaltyTier::Silver => self.silver_pct,
            LoyaltyTier::Gold => self.gold_pct,
        }
    }
}

/// Login credentials presented to `authenticate`.
#[derive(Clone, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// Stored credential material for an identity.
#[derive(Debug, Clone)]
pub struct StoredCredential {
    pub identity_id: CustomerId,
    /// Argon2 PHC-format hash string.
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

/// External identity persistence, consumed at its interface only.
#[async_trait]
pub trait IdentityStore: Send + Sync {
    /// Fetch an identity snapshot by id.
    async fn fetch_identity(&self, id: CustomerId) -> Option<Identity>;

    /// Fetch the stored credential for a username.
    async fn fetch_credential(&self, username: &str) -> Option<StoredCredential>;
}

/// In-memory [`IdentityStore`] for single-process deployments and tests.
#[derive(Default)]
pub struct MemoryIdentityStore {
    inner: std::sync::RwLock<MemoryIdentityInner>,
}

#[derive(Default)]
struct MemoryIdentityInner {
    identities: std::collections::HashMap<CustomerId, Identity>,
    credentials: std::collections::HashMap<String, StoredCredential>,
}

impl MemoryIdentityStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an identity with its credential.
    pub fn add(&self, identity: Identity, username: &str, password_hash: &str) {
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        inner.credentials.insert(
            username.to_string(),
            StoredCredential {
                identity_id: identity.id,
                password_hash: password_hash.to_string(),
                created_at: Utc::now(),
            },
        );
        inner.identities.insert(identity.id, identity);
    }
}

#[async_trait]
impl IdentityStore for MemoryIdentityStore {
    async fn fetch_identity(&self, id: CustomerId) -> Option<Identity> {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        inner.identities.get(&id).cloned()
    }

    async fn fetch_credential(&self, username: &str) -> Option<StoredCredential> {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        inner.credentials.get(username).cloned()
    }
}
