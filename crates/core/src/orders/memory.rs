//! In-memory order store backend.
//!
//! Single-process/dev counterpart of the durable store, mirroring its
//! transactional contract: one mutex guards all tables, so every `commit_*`
//! is genuinely all-or-nothing and the optimistic version check behaves like
//! a database compare-and-set.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;

use crate::identity::LoyaltyRecord;
use crate::orders::store::{
    CancellationCommit, OrderStore, PlacementCommit, StoreError, TransitionCommit,
};
use crate::orders::{DraftOrder, Order, OrderState};
use crate::pricing::{Coupon, CouponUsage};
use crate::types::{CouponId, CustomerId, Money, OrderId};

#[derive(Default)]
struct UsageCounters {
    total: u32,
    by_customer: HashMap<CustomerId, u32>,
}

#[derive(Default)]
struct Inner {
    orders: HashMap<OrderId, Order>,
    coupons: HashMap<String, Coupon>,
    usage: HashMap<CouponId, UsageCounters>,
    loyalty: HashMap<CustomerId, LoyaltyRecord>,
    next_order_id: i64,
}

impl Inner {
    fn coupon_by_id(&self, id: CouponId) -> Option<&Coupon> {
        self.coupons.values().find(|c| c.id == id)
    }
}

/// In-memory [`OrderStore`] implementation.
#[derive(Default)]
pub struct MemoryOrderStore {
    inner: Mutex<Inner>,
}

impl MemoryOrderStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a coupon definition.
    pub async fn add_coupon(&self, coupon: Coupon) {
        let mut inner = self.inner.lock().await;
        inner.coupons.insert(coupon.code.clone(), coupon);
    }

    /// Seed a loyalty record.
    pub async fn set_loyalty(&self, customer_id: CustomerId, record: LoyaltyRecord) {
        let mut inner = self.inner.lock().await;
        inner.loyalty.insert(customer_id, record);
    }
}

#[async_trait]
impl OrderStore for MemoryOrderStore {
    async fn insert_draft(&self, draft: DraftOrder) -> Result<Order, StoreError> {
        let mut inner = self.inner.lock().await;
        inner.next_order_id += 1;
        let id = OrderId::new(inner.next_order_id);

        let subtotal = draft
            .line_items
            .iter()
            .fold(Money::ZERO, |acc, item| acc.add(item.line_total()));
        let now = Utc::now();
        let order = Order {
            id,
            customer_id: draft.customer_id,
            line_items: draft.line_items,
            coupon_code: draft.coupon_code,
            state: OrderState::Draft,
            subtotal,
            discount: Money::ZERO,
            total: subtotal,
            created_at: now,
            placed_at: None,
            state_changed_at: now,
            version: 1,
        };
        inner.orders.insert(id, order.clone());
        Ok(order)
    }

    async fn fetch_order(&self, id: OrderId) -> Result<Option<Order>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner.orders.get(&id).cloned())
    }

    async fn fetch_coupon(&self, code: &str) -> Result<Option<Coupon>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner.coupons.get(code).cloned())
    }

    async fn fetch_coupon_usage(
        &self,
        coupon_id: CouponId,
        customer_id: CustomerId,
    ) -> Result<CouponUsage, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .usage
            .get(&coupon_id)
            .map(|counters| CouponUsage {
                total: counters.total,
                by_customer: counters.by_customer.get(&customer_id).copied().unwrap_or(0),
            })
            .unwrap_or_default())
    }

    async fn fetch_loyalty(&self, customer_id: CustomerId) -> Result<LoyaltyRecord, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner.loyalty.get(&customer_id).cloned().unwrap_or_default())
    }

    async fn commit_placement(&self, commit: PlacementCommit) -> Result<Order, StoreError> {
        let mut inner = self.inner.lock().await;

        let order = inner
            .orders
            .get(&commit.order_id)
            .ok_or(StoreError::NotFound)?;
        if order.version != commit.expected_version || order.state != OrderState::Draft {
            return Err(StoreError::VersionConflict);
        }
        let customer_id = order.customer_id;

        // Cap re-check inside the transaction; quote-time checks are only
        // advisory.
        if let Some(coupon_id) = commit.coupon_id {
            let coupon = inner.coupon_by_id(coupon_id).ok_or(StoreError::NotFound)?;
            let usage_cap = coupon.usage_cap;
            let per_customer_cap = coupon.per_customer_cap;

            let counters = inner.usage.entry(coupon_id).or_default();
            let by_customer = counters.by_customer.get(&customer_id).copied().unwrap_or(0);
            if usage_cap.is_some_and(|cap| counters.total >= cap)
                || per_customer_cap.is_some_and(|cap| by_customer >= cap)
            {
                return Err(StoreError::UsageCapExceeded);
            }
            counters.total += 1;
            *counters.by_customer.entry(customer_id).or_insert(0) += 1;
        }

        let loyalty = inner.loyalty.entry(customer_id).or_default();
        loyalty.order_count += 1;
        loyalty.lifetime_spend = loyalty.lifetime_spend.add(commit.pricing.total);

        let order = inner
            .orders
            .get_mut(&commit.order_id)
            .ok_or(StoreError::NotFound)?;
        order.state = OrderState::Placed;
        order.subtotal = commit.pricing.subtotal;
        order.discount = commit.pricing.discount;
        order.total = commit.pricing.total;
        order.placed_at = Some(commit.at);
        order.state_changed_at = commit.at;
        order.version += 1;

        Ok(order.clone())
    }

    async fn commit_transition(&self, commit: TransitionCommit) -> Result<Order, StoreError> {
        let mut inner = self.inner.lock().await;
        let order = inner
            .orders
            .get_mut(&commit.order_id)
            .ok_or(StoreError::NotFound)?;
        if order.version != commit.expected_version {
            return Err(StoreError::VersionConflict);
        }

        order.state = commit.target;
        order.state_changed_at = commit.at;
        order.version += 1;
        Ok(order.clone())
    }

    async fn commit_cancellation(&self, commit: CancellationCommit) -> Result<Order, StoreError> {
        let mut inner = self.inner.lock().await;

        let order = inner
            .orders
            .get(&commit.order_id)
            .ok_or(StoreError::NotFound)?;
        if order.version != commit.expected_version {
            return Err(StoreError::VersionConflict);
        }

        // Reverse placement side effects if the order had left Draft.
        if order.state != OrderState::Draft {
            let customer_id = order.customer_id;
            let total = order.total;
            let coupon_id = order
                .coupon_code
                .as_ref()
                .and_then(|code| inner.coupons.get(code))
                .map(|c| c.id);

            if let Some(coupon_id) = coupon_id
                && let Some(counters) = inner.usage.get_mut(&coupon_id)
            {
                counters.total = counters.total.saturating_sub(1);
                if let Some(count) = counters.by_customer.get_mut(&customer_id) {
                    *count = count.saturating_sub(1);
                }
            }

            let loyalty = inner.loyalty.entry(customer_id).or_default();
            loyalty.order_count = loyalty.order_count.saturating_sub(1);
            loyalty.lifetime_spend = loyalty.lifetime_spend.saturating_sub(total);
        }

        let order = inner
            .orders
            .get_mut(&commit.order_id)
            .ok_or(StoreError::NotFound)?;
        order.state = OrderState::Cancelled;
        order.state_changed_at = commit.at;
        order.version += 1;
        Ok(order.clone())
    }
}
