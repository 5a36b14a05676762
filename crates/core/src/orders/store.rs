//! Durable order/coupon/loyalty persistence seam.
//!
//! The store owns transactional integrity: each `commit_*` operation is a
//! single all-or-nothing unit that re-validates the optimistic version (and,
//! for placement, the coupon caps) before writing. The lifecycle manager
//! retries version conflicts a bounded number of times; it never performs
//! read-then-write against this interface.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::error::CoreError;
use crate::identity::LoyaltyRecord;
use crate::orders::{DraftOrder, Order, OrderState};
use crate::pricing::{Coupon, CouponUsage, PricingResult};
use crate::types::{CouponId, CustomerId, OrderId};

/// Store-level failures.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A row the commit references does not exist.
    #[error("referenced row not found")]
    NotFound,

    /// The commit's expected version no longer matches: a concurrent writer
    /// got there first.
    #[error("version conflict")]
    VersionConflict,

    /// Placement-time cap re-check failed.
    #[error("coupon usage cap exceeded")]
    UsageCapExceeded,

    /// Timeout or connectivity failure.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl From<StoreError> for CoreError {
    fn from(err: StoreError) -> Self {
        match err {
            // An operation against a nonexistent order fails its guard.
            StoreError::NotFound => Self::InvalidTransition,
            StoreError::VersionConflict => Self::Conflict,
            StoreError::UsageCapExceeded => Self::UsageCapExceeded,
            StoreError::Unavailable(msg) => Self::Transient(msg),
        }
    }
}

/// Atomic placement commit: state change, pricing fields, coupon usage
/// increment, and loyalty increment in one transaction.
#[derive(Debug, Clone)]
pub struct PlacementCommit {
    pub order_id: OrderId,
    /// Version the manager read before quoting.
    pub expected_version: u64,
    pub pricing: PricingResult,
    /// Coupon whose usage counters the transaction increments.
    pub coupon_id: Option<CouponId>,
    pub at: DateTime<Utc>,
}

/// Atomic state transition commit for staff fulfillment steps.
#[derive(Debug, Clone, Copy)]
pub struct TransitionCommit {
    pub order_id: OrderId,
    pub expected_version: u64,
    pub target: OrderState,
    pub at: DateTime<Utc>,
}

/// Atomic cancellation commit. Reverses coupon-usage and loyalty increments
/// when the order had already been placed.
#[derive(Debug, Clone, Copy)]
pub struct CancellationCommit {
    pub order_id: OrderId,
    pub expected_version: u64,
    pub at: DateTime<Utc>,
}

/// External durable storage for orders, coupons, and loyalty records.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Create a draft order.
    async fn insert_draft(&self, draft: DraftOrder) -> Result<Order, StoreError>;

    /// Fetch an order by id.
    async fn fetch_order(&self, id: OrderId) -> Result<Option<Order>, StoreError>;

    /// Fetch a coupon by code.
    async fn fetch_coupon(&self, code: &str) -> Result<Option<Coupon>, StoreError>;

    /// Historical applied-coupon counts for cap checks.
    async fn fetch_coupon_usage(
        &self,
        coupon_id: CouponId,
        customer_id: CustomerId,
    ) -> Result<CouponUsage, StoreError>;

    /// Loyalty record for a customer; the default record if none exists yet.
    async fn fetch_loyalty(&self, customer_id: CustomerId) -> Result<LoyaltyRecord, StoreError>;

    /// Atomically place a draft order. Fails `VersionConflict` if the order
    /// changed since `expected_version`, `UsageCapExceeded` if the coupon cap
    /// re-check fails inside the transaction.
    async fn commit_placement(&self, commit: PlacementCommit) -> Result<Order, StoreError>;

    /// Atomically apply a staff fulfillment transition.
    async fn commit_transition(&self, commit: TransitionCommit) -> Result<Order, StoreError>;

    /// Atomically cancel an order, reversing placement side effects.
    async fn commit_cancellation(&self, commit: CancellationCommit) -> Result<Order, StoreError>;
}
