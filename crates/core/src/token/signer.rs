//! Access-token signing and verification.
//!
//! Access tokens are compact HS256-signed claim sets
//! (`header.payload.signature`, base64url without padding). Verification is
//! pure: signature plus expiry, with the MAC comparison done in constant
//! time. Revocation is layered on top by the token service, not here.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::Utc;
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;

use crate::types::{CustomerId, Role};

type HmacSha256 = Hmac<Sha256>;

/// Static JOSE header for every token we mint.
const HEADER: &str = r#"{"alg":"HS256","typ":"JWT"}"#;

/// Claims carried by an access token.
///
/// Self-contained: verification needs no identity-store round trip. The
/// `lineage` ties the access token to its refresh-token family so a stolen
/// refresh token can be cut off as one unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessClaims {
    /// Subject identity id.
    pub sub: CustomerId,
    /// Role at issuance.
    pub role: Role,
    /// Issued-at, unix seconds.
    pub iat: i64,
    /// Expiry, unix seconds.
    pub exp: i64,
    /// Token id, the revocation handle.
    pub jti: String,
    /// Session lineage id shared with the refresh-token chain.
    pub lineage: String,
}

impl AccessClaims {
    /// Seconds of validity remaining, zero if already expired.
    #[must_use]
    pub fn remaining_secs(&self) -> u64 {
        let now = Utc::now().timestamp();
        u64::try_from(self.exp - now).unwrap_or(0)
    }
}

/// Signing failures. Verification failures carry no detail by design.
#[derive(Debug, Error)]
pub enum SignerError {
    #[error("token encoding failed: {0}")]
    Encoding(String),

    /// Signature, structure, or expiry check failed.
    #[error("token verification failed")]
    Invalid,
}

/// HS256 signer shared by both transport services.
pub struct TokenSigner {
    secret: SecretString,
}

impl TokenSigner {
    /// Create a signer from the shared signing secret.
    #[must_use]
    pub const fn new(secret: SecretString) -> Self {
        Self { secret }
    }

    fn mac(&self) -> Result<HmacSha256, SignerError> {
        HmacSha256::new_from_slice(self.secret.expose_secret().as_bytes())
            .map_err(|e| SignerError::Encoding(e.to_string()))
    }

    /// Sign claims into a compact token.
    ///
    /// # Errors
    ///
    /// Returns `SignerError::Encoding` if claim serialization fails.
    pub fn sign(&self, claims: &AccessClaims) -> Result<String, SignerError> {
        let payload =
            serde_json::to_vec(claims).map_err(|e| SignerError::Encoding(e.to_string()))?;
        let signing_input = format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(HEADER.as_bytes()),
            URL_SAFE_NO_PAD.encode(payload)
        );

        let mut mac = self.mac()?;
        mac.update(signing_input.as_bytes());
        let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());

        Ok(format!("{signing_input}.{signature}"))
    }

    /// Verify a compact token's structure, signature, and expiry.
    ///
    /// # Errors
    ///
    /// Returns `SignerError::Invalid` for any malformed, forged, or expired
    /// token; the distinction is deliberately not reported.
    pub fn verify(&self, token: &str) -> Result<AccessClaims, SignerError> {
        let mut parts = token.splitn(3, '.');
        let (Some(header), Some(payload), Some(signature)) =
            (parts.next(), parts.next(), parts.next())
        else {
            return Err(SignerError::Invalid);
        };

        let signature_bytes = URL_SAFE_NO_PAD
            .decode(signature)
            .map_err(|_| SignerError::Invalid)?;

        let mut mac = self.mac().map_err(|_| SignerError::Invalid)?;
        mac.update(header.as_bytes());
        mac.update(b".");
        mac.update(payload.as_bytes());
        // Constant-time comparison.
        mac.verify_slice(&signature_bytes)
            .map_err(|_| SignerError::Invalid)?;

        let payload_bytes = URL_SAFE_NO_PAD
            .decode(payload)
            .map_err(|_| SignerError::Invalid)?;
        let claims: AccessClaims =
            serde_json::from_slice(&payload_bytes).map_err(|_| SignerError::Invalid)?;

        if claims.exp <= Utc::now().timestamp() {
            return Err(SignerError::Invalid);
        }

        Ok(claims)
    }
}
