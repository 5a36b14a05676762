//! Unified error taxonomy for the policy core.
//!
//! Both transport services translate these kinds into protocol responses, so
//! the kind and its retry semantics must stay stable: domain rejections are
//! definitive, `Conflict`/`Transient` are retryable by the caller.

use std::time::Duration;

use thiserror::Error;

/// Error kinds surfaced by every core operation.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Bad, expired, or revoked credential. The reason is deliberately not
    /// disclosed to the caller.
    #[error("unauthorized")]
    Unauthorized,

    /// Authenticated but not permitted to perform the operation.
    #[error("forbidden")]
    Forbidden,

    /// Admission denied by the rate governor; retryable after the interval.
    #[error("rate limited, retry after {retry_after:?}")]
    RateLimited {
        /// Time remaining in the current window.
        retry_after: Duration,
    },

    /// Coupon code is unknown or inactive.
    #[error("invalid coupon")]
    InvalidCoupon,

    /// Coupon exists but is outside its validity window.
    #[error("expired coupon")]
    ExpiredCoupon,

    /// Coupon global or per-customer usage cap already reached.
    #[error("coupon usage cap exceeded")]
    UsageCapExceeded,

    /// Order state machine guard rejected the transition.
    #[error("invalid order transition")]
    InvalidTransition,

    /// Optimistic-concurrency retries exhausted; retry with fresh data.
    #[error("conflicting concurrent update")]
    Conflict,

    /// External store timed out or was unavailable; retryable with backoff.
    #[error("transient store failure: {0}")]
    Transient(String),
}

impl CoreError {
    /// Whether the caller may retry the same request unchanged.
    ///
    /// Domain rejections (pricing, transitions, authorization) are
    /// definitive; only admission, conflict, and store failures are
    /// retryable.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RateLimited { .. } | Self::Conflict | Self::Transient(_)
        )
    }

    /// Retry-after hint, present only for rate-limit rejections.
    #[must_use]
    pub const fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after } => Some(*retry_after),
            _ => None,
        }
    }
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
