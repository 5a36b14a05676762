//! Session token lifecycle: issuance, verification, refresh, revocation.
//!
//! Access tokens are self-contained and verified by signature plus a
//! revocation-set lookup. Refresh tokens are opaque random ids whose records
//! live in the shared cache store, so both transport processes see the same
//! rotation state. Rotation is enforced with a compare-and-swap on the
//! lineage key: at most one live refresh token id per session lineage, and a
//! replayed id revokes the entire lineage.

mod signer;

pub use signer::{AccessClaims, SignerError, TokenSigner};

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::cache::{CacheStore, keys};
use crate::error::{CoreError, Result};
use crate::identity::Identity;
use crate::types::{CustomerId, Role};

/// Access + refresh token pair handed to a transport after authentication or
/// refresh.
#[derive(Debug, Clone, Serialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub access_expires_at: DateTime<Utc>,
    pub refresh_expires_at: DateTime<Utc>,
}

/// Verified caller identity reconstructed from access-token claims.
///
/// Carries exactly what policy and rate keying need; loyalty state is fetched
/// fresh from the identity store when pricing needs it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Principal {
    pub id: CustomerId,
    pub role: Role,
}

/// Persisted refresh-token record, stored as JSON under `refresh:{id}`.
#[derive(Debug, Serialize, Deserialize)]
struct RefreshRecord {
    subject: CustomerId,
    role: Role,
    lineage: String,
    expires_at: DateTime<Utc>,
}

/// Token service shared by both transport layers.
pub struct TokenService {
    store: Arc<dyn CacheStore>,
    signer: TokenSigner,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl TokenService {
    /// Create a token service over the shared cache store.
    #[must_use]
    pub fn new(
        store: Arc<dyn CacheStore>,
        secret: SecretString,
        access_ttl: Duration,
        refresh_ttl: Duration,
    ) -> Self {
        Self {
            store,
            signer: TokenSigner::new(secret),
            access_ttl,
            refresh_ttl,
        }
    }

    /// Issue a fresh token pair for an authenticated identity, starting a new
    /// session lineage.
    ///
    /// # Errors
    ///
    /// Returns `Transient` if the cache store is unavailable.
    pub async fn issue(&self, identity: &Identity) -> Result<TokenPair> {
        let lineage = Uuid::new_v4().simple().to_string();
        self.issue_in_lineage(identity.id, identity.role, &lineage)
            .await
    }

    async fn issue_in_lineage(
        &self,
        subject: CustomerId,
        role: Role,
        lineage: &str,
    ) -> Result<TokenPair> {
        let now = Utc::now();
        let access_expires_at = now + self.access_ttl;
        let refresh_expires_at = now + self.refresh_ttl;

        let claims = AccessClaims {
            sub: subject,
            role,
            iat: now.timestamp(),
            exp: access_expires_at.timestamp(),
            jti: Uuid::new_v4().simple().to_string(),
            lineage: lineage.to_string(),
        };
        let access_token = self
            .signer
            .sign(&claims)
            .map_err(|_| CoreError::Unauthorized)?;

        let refresh_id = Uuid::new_v4().simple().to_string();
        let record = RefreshRecord {
            subject,
            role,
            lineage: lineage.to_string(),
            expires_at: refresh_expires_at,
        };
        let record_json =
            serde_json::to_string(&record).map_err(|e| CoreError::Transient(e.to_string()))?;

        self.store
            .set(&refresh_key(&refresh_id), &record_json, self.refresh_ttl)
            .await?;
        self.store
            .set(&lineage_key(lineage), &refresh_id, self.refresh_ttl)
            .await?;

        debug!(subject = %subject, lineage, "issued token pair");

        Ok(TokenPair {
            access_token,
            refresh_token: refresh_id,
            access_expires_at,
            refresh_expires_at,
        })
    }

    /// Verify an access token: signature, expiry, revocation set.
    ///
    /// # Errors
    ///
    /// Returns `Unauthorized` for every verification failure without
    /// disclosing which check failed; `Transient` if the revocation lookup
    /// cannot reach the store.
    pub async fn verify_access(&self, token: &str) -> Result<Principal> {
        let claims = self
            .signer
            .verify(token)
            .map_err(|_| CoreError::Unauthorized)?;

        if self.store.get(&revoked_key(&claims.jti)).await?.is_some() {
            return Err(CoreError::Unauthorized);
        }

        Ok(Principal {
            id: claims.sub,
            role: claims.role,
        })
    }

    /// Exchange a refresh token for a new pair, rotating the lineage.
    ///
    /// A reused (already rotated) token id is treated as replay: the whole
    /// lineage is revoked and the caller sees `Unauthorized`.
    ///
    /// # Errors
    ///
    /// Returns `Unauthorized` for unknown, expired, or replayed tokens;
    /// `Transient` if the store is unavailable.
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenPair> {
        let record = self.load_refresh_record(refresh_token).await?;

        if record.expires_at <= Utc::now() {
            return Err(CoreError::Unauthorized);
        }

        // Rotate: the lineage pointer must still name this token id. The CAS
        // is the cross-process arbiter; a stale id means the token was
        // already exchanged once.
        let next_id = Uuid::new_v4().simple().to_string();
        let rotated = self
            .store
            .compare_and_swap(
                &lineage_key(&record.lineage),
                refresh_token,
                &next_id,
                self.refresh_ttl,
            )
            .await?;

        if !rotated {
            warn!(lineage = %record.lineage, "refresh token replay detected, revoking lineage");
            self.revoke_lineage(&record.lineage).await?;
            self.store.delete(&refresh_key(refresh_token)).await?;
            return Err(CoreError::Unauthorized);
        }

        // The rotated-out record stays until its TTL. A later replay of the
        // old id must still resolve to this lineage so the CAS mismatch above
        // can recognize it and revoke the lineage; only the lineage pointer
        // says which id is live.
        let next_record = RefreshRecord {
            subject: record.subject,
            role: record.role,
            lineage: record.lineage.clone(),
            expires_at: Utc::now() + self.refresh_ttl,
        };
        let record_json =
            serde_json::to_string(&next_record).map_err(|e| CoreError::Transient(e.to_string()))?;
        self.store
            .set(&refresh_key(&next_id), &record_json, self.refresh_ttl)
            .await?;

        let now = Utc::now();
        let access_expires_at = now + self.access_ttl;
        let claims = AccessClaims {
            sub: record.subject,
            role: record.role,
            iat: now.timestamp(),
            exp: access_expires_at.timestamp(),
            jti: Uuid::new_v4().simple().to_string(),
            lineage: record.lineage,
        };
        let access_token = self
            .signer
            .sign(&claims)
            .map_err(|_| CoreError::Unauthorized)?;

        Ok(TokenPair {
            access_token,
            refresh_token: next_id,
            access_expires_at,
            refresh_expires_at: next_record.expires_at,
        })
    }

    /// Revoke a refresh token and its lineage (logout).
    ///
    /// Unknown tokens revoke nothing but still succeed; logout is
    /// idempotent.
    ///
    /// # Errors
    ///
    /// Returns `Transient` if the store is unavailable.
    pub async fn revoke(&self, refresh_token: &str) -> Result<()> {
        if let Ok(record) = self.load_refresh_record(refresh_token).await {
            self.revoke_lineage(&record.lineage).await?;
        }
        self.store.delete(&refresh_key(refresh_token)).await?;
        Ok(())
    }

    /// Add an access-token id to the revocation set for the remainder of its
    /// validity, after which the entry self-prunes.
    ///
    /// # Errors
    ///
    /// Returns `Transient` if the store is unavailable.
    pub async fn revoke_access(&self, jti: &str, remaining: Duration) -> Result<()> {
        if remaining.is_zero() {
            return Ok(());
        }
        self.store.set(&revoked_key(jti), "1", remaining).await?;
        Ok(())
    }

    /// Inspect an access token without a revocation lookup. Used when the
    /// caller needs the raw claims (e.g. to revoke the token it holds).
    ///
    /// # Errors
    ///
    /// Returns `Unauthorized` if the token does not verify.
    pub fn peek_claims(&self, token: &str) -> Result<AccessClaims> {
        self.signer.verify(token).map_err(|_| CoreError::Unauthorized)
    }

    async fn load_refresh_record(&self, refresh_token: &str) -> Result<RefreshRecord> {
        let raw = self
            .store
            .get(&refresh_key(refresh_token))
            .await?
            .ok_or(CoreError::Unauthorized)?;
        serde_json::from_str(&raw).map_err(|_| CoreError::Unauthorized)
    }

    async fn revoke_lineage(&self, lineage: &str) -> Result<()> {
        // Deleting the lineage pointer invalidates whichever refresh id is
        // currently live; its record key is cleaned up lazily by TTL.
        self.store.delete(&lineage_key(lineage)).await?;
        Ok(())
    }
}

fn refresh_key(id: &str) -> String {
    format!("{}:{id}", keys::REFRESH)
}

fn lineage_key(id: &str) -> String {
    format!("{}:{id}", keys::LINEAGE)
}

fn revoked_key(jti: &str) -> String {
    format!("{}:{jti}", keys::REVOKED)
}
