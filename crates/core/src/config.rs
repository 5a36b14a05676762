//! Core configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `BREWLINE_TOKEN_SECRET` - Token signing secret (min 32 chars, high entropy)
//! - `BREWLINE_CANCEL_GRACE_SECS` - Customer self-cancellation window after
//!   placement, in seconds. Deployment policy; deliberately has no default.
//!
//! ## Optional
//! - `BREWLINE_ACCESS_TTL_SECS` - Access token lifetime (default: 900)
//! - `BREWLINE_REFRESH_TTL_SECS` - Refresh token lifetime (default: 1209600, 14 days)
//! - `BREWLINE_STORE_TIMEOUT_MS` - Cache store operation deadline (default: 1000)
//! - `BREWLINE_CACHE_TTL_SECS` - Response cache entry TTL (default: 300)
//! - `BREWLINE_RATE_WINDOW_SECS` - Rate limit window length (default: 60)
//! - `BREWLINE_RATE_AUTH_LIMIT` - Auth requests per window (default: 5)
//! - `BREWLINE_RATE_ORDER_WRITE_LIMIT` - Order writes per window (default: 20)
//! - `BREWLINE_RATE_READ_LIMIT` - Reads per window (default: 120)
//! - `BREWLINE_DISCOUNT_STACKING` - `additive` or `exclusive` (default: additive)

use std::collections::HashMap;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

use crate::pricing::DiscountStacking;
use crate::ratelimit::{RateLimitConfig, RatePolicy};

const MIN_TOKEN_SECRET_LENGTH: usize = 32;
const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "secret",
    "password",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "enter-",
    "put-your",
    "add-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Core platform configuration, shared by every service embedding the crate.
#[derive(Debug, Clone)]
pub struct CoreConfig {
    /// Token signing secret
    pub token_secret: SecretString,
    /// Access token lifetime
    pub access_ttl: Duration,
    /// Refresh token lifetime
    pub refresh_ttl: Duration,
    /// Customer self-cancellation window after placement
    pub cancel_grace: Duration,
    /// Deadline for any single cache store operation
    pub store_timeout: Duration,
    /// Response cache entry TTL
    pub cache_ttl: Duration,
    /// Per-class rate limit policies
    pub rate_limits: RateLimitConfig,
    /// How loyalty and coupon discounts combine
    pub stacking: DiscountStacking,
}

impl CoreConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if the token secret fails validation (placeholder detection, entropy
    /// check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let token_secret = get_validated_secret("BREWLINE_TOKEN_SECRET")?;
        validate_token_secret(&token_secret, "BREWLINE_TOKEN_SECRET")?;

        let access_ttl = get_duration_secs("BREWLINE_ACCESS_TTL_SECS", Some(900))?;
        let refresh_ttl = get_duration_secs("BREWLINE_REFRESH_TTL_SECS", Some(1_209_600))?;
        let cancel_grace = get_duration_secs("BREWLINE_CANCEL_GRACE_SECS", None)?;
        let store_timeout =
            Duration::from_millis(get_parsed_or_default("BREWLINE_STORE_TIMEOUT_MS", 1000)?);
        let cache_ttl = get_duration_secs("BREWLINE_CACHE_TTL_SECS", Some(300))?;

        let window = get_duration_secs("BREWLINE_RATE_WINDOW_SECS", Some(60))?;
        let rate_limits = RateLimitConfig {
            auth: RatePolicy {
                limit: get_parsed_or_default("BREWLINE_RATE_AUTH_LIMIT", 5)?,
                window,
            },
            order_write: RatePolicy {
                limit: get_parsed_or_default("BREWLINE_RATE_ORDER_WRITE_LIMIT", 20)?,
                window,
            },
            read: RatePolicy {
                limit: get_parsed_or_default("BREWLINE_RATE_READ_LIMIT", 120)?,
                window,
            },
        };

        let stacking = parse_stacking(&get_env_or_default(
            "BREWLINE_DISCOUNT_STACKING",
            "additive",
        ))?;

        Ok(Self {
            token_secret,
            access_ttl,
            refresh_ttl,
            cancel_grace,
            store_timeout,
            cache_ttl,
            rate_limits,
            stacking,
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parse an environment variable, falling back to a default when unset.
fn get_parsed_or_default<T: std::str::FromStr>(key: &str, default: T) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .parse()
            .map_err(|e: T::Err| ConfigError::InvalidEnvVar(key.to_string(), e.to_string())),
        Err(_) => Ok(default),
    }
}

/// Parse a duration in whole seconds. `default: None` makes the variable
/// required.
fn get_duration_secs(key: &str, default: Option<u64>) -> Result<Duration, ConfigError> {
    let secs = match (std::env::var(key), default) {
        (Ok(raw), _) => raw
            .parse::<u64>()
            .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))?,
        (Err(_), Some(default)) => default,
        (Err(_), None) => return Err(ConfigError::MissingEnvVar(key.to_string())),
    };
    Ok(Duration::from_secs(secs))
}

fn parse_stacking(raw: &str) -> Result<DiscountStacking, ConfigError> {
    match raw {
        "additive" => Ok(DiscountStacking::Additive),
        "exclusive" => Ok(DiscountStacking::Exclusive),
        other => Err(ConfigError::InvalidEnvVar(
            "BREWLINE_DISCOUNT_STACKING".to_string(),
            format!("expected 'additive' or 'exclusive', got '{other}'"),
        )),
    }
}

/// Validate that the token secret meets minimum length requirements.
fn validate_token_secret(secret: &SecretString, var_name: &str) -> Result<(), ConfigError> {
    let value = secret.expose_secret();
    if value.len() < MIN_TOKEN_SECRET_LENGTH {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "must be at least {} characters (got {})",
                MIN_TOKEN_SECRET_LENGTH,
                value.len()
            ),
        ));
    }
    Ok(())
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.len() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)] // Character count will never exceed f64 precision
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    // Check blocklist
    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    // Check entropy (real secrets like API keys have high entropy)
    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use a randomly generated secret."
            ),
        ));
    }

    Ok(())
}

/// Load and validate a secret from environment.
fn get_validated_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    validate_secret_strength(&value, key)?;
    Ok(SecretString::from(value))
}
