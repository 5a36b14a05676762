//! Order lifecycle manager.
//!
//! Validates every state change against the graph and the caller's rights,
//! then delegates the write to the store's atomic commits. Version conflicts
//! are retried a bounded number of times with a refetch and full
//! re-validation in between, so a retry can still land on an idempotent
//! no-op or a definitive rejection. Events and cache invalidation fire only
//! after a commit actually changed state.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use tracing::{info, instrument, warn};

use crate::cache::response::{ResponseCache, order_namespace};
use crate::error::{CoreError, Result};
use crate::events::{EventSink, OrderStateChanged};
use crate::orders::store::{
    CancellationCommit, OrderStore, PlacementCommit, StoreError, TransitionCommit,
};
use crate::orders::{DraftOrder, LineItem, Order, OrderState};
use crate::pricing::PricingEngine;
use crate::token::Principal;
use crate::types::{OrderId, Role};

/// Lifecycle tuning. The cancellation grace period is deployment policy and
/// carries no default.
#[derive(Debug, Clone, Copy)]
pub struct LifecycleConfig {
    /// How long after placement a customer may still cancel their own order.
    pub cancel_grace: Duration,
    /// Retries per operation when a commit loses a version race.
    pub max_commit_retries: u32,
    /// Pause between conflict retries.
    pub retry_backoff: Duration,
}

impl LifecycleConfig {
    /// Config with the given grace period and standard retry settings.
    #[must_use]
    pub const fn with_grace(cancel_grace: Duration) -> Self {
        Self {
            cancel_grace,
            max_commit_retries: 3,
            retry_backoff: Duration::from_millis(25),
        }
    }
}

/// The lifecycle manager.
pub struct OrderLifecycle {
    store: Arc<dyn OrderStore>,
    pricing: PricingEngine,
    events: Arc<dyn EventSink>,
    cache: ResponseCache,
    config: LifecycleConfig,
}

impl OrderLifecycle {
    /// Create a lifecycle manager.
    #[must_use]
    pub fn new(
        store: Arc<dyn OrderStore>,
        pricing: PricingEngine,
        events: Arc<dyn EventSink>,
        cache: ResponseCache,
        config: LifecycleConfig,
    ) -> Self {
        Self {
            store,
            pricing,
            events,
            cache,
            config,
        }
    }

    /// Create a draft order owned by the caller.
    ///
    /// # Errors
    ///
    /// Returns `InvalidTransition` for an empty line-item list; `Transient`
    /// if the store is unavailable.
    #[instrument(skip(self, line_items))]
    pub async fn create_draft(
        &self,
        principal: &Principal,
        line_items: Vec<LineItem>,
        coupon_code: Option<String>,
    ) -> Result<Order> {
        if line_items.is_empty() {
            return Err(CoreError::InvalidTransition);
        }
        let order = self
            .store
            .insert_draft(DraftOrder {
                customer_id: principal.id,
                line_items,
                coupon_code,
            })
            .await?;
        info!(order_id = %order.id, "draft created");
        Ok(order)
    }

    /// Fetch an order, enforcing view rights: owners see their own orders,
    /// staff see all.
    ///
    /// # Errors
    ///
    /// Returns `InvalidTransition` for an unknown id and `Forbidden` for a
    /// foreign order viewed by a customer.
    pub async fn fetch(&self, principal: &Principal, order_id: OrderId) -> Result<Order> {
        let order = self.load(order_id).await?;
        if !order.is_owned_by(principal.id) && !principal.role.at_least(Role::Staff) {
            return Err(CoreError::Forbidden);
        }
        Ok(order)
    }

    /// Place a draft order: price it and commit `Draft → Placed` atomically
    /// together with coupon-usage and loyalty updates.
    ///
    /// Placing an already-placed order is an idempotent no-op.
    ///
    /// # Errors
    ///
    /// `Forbidden` for a non-owner, `InvalidTransition` when the order has
    /// moved past `Placed`, the coupon errors from pricing, and `Conflict`
    /// once version-race retries are exhausted.
    #[instrument(skip(self))]
    pub async fn place(&self, principal: &Principal, order_id: OrderId) -> Result<Order> {
        let mut order = self.load(order_id).await?;
        if !order.is_owned_by(principal.id) {
            return Err(CoreError::Forbidden);
        }

        let mut attempts = 0;
        loop {
            match order.state {
                OrderState::Placed => return Ok(order),
                OrderState::Draft => {}
                _ => return Err(CoreError::InvalidTransition),
            }
            if order.line_items.is_empty() {
                return Err(CoreError::InvalidTransition);
            }

            let now = Utc::now();
            let coupon = match &order.coupon_code {
                Some(code) => Some(
                    self.store
                        .fetch_coupon(code)
                        .await?
                        .ok_or(CoreError::InvalidCoupon)?,
                ),
                None => None,
            };
            let coupon_input = match &coupon {
                Some(coupon) => {
                    let usage = self
                        .store
                        .fetch_coupon_usage(coupon.id, order.customer_id)
                        .await?;
                    Some((coupon, usage))
                }
                None => None,
            };
            let loyalty = self.store.fetch_loyalty(order.customer_id).await?;
            let pricing = self
                .pricing
                .quote(&order.line_items, coupon_input, &loyalty, now)?;

            let commit = PlacementCommit {
                order_id,
                expected_version: order.version,
                pricing,
                coupon_id: coupon.as_ref().map(|c| c.id),
                at: now,
            };
            match self.store.commit_placement(commit).await {
                Ok(placed) => {
                    self.committed(&placed, OrderState::Draft, now).await;
                    return Ok(placed);
                }
                Err(StoreError::VersionConflict) => {
                    order = self.backoff_and_reload(order_id, &mut attempts).await?;
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    /// Advance an order one step along the fulfillment sequence.
    ///
    /// Requesting the state the order is already in is an idempotent no-op.
    ///
    /// # Errors
    ///
    /// `Forbidden` for non-staff callers, `InvalidTransition` for any
    /// non-sequential target (including anything out of a terminal state),
    /// `Conflict` once retries are exhausted.
    #[instrument(skip(self))]
    pub async fn transition(
        &self,
        principal: &Principal,
        order_id: OrderId,
        target: OrderState,
    ) -> Result<Order> {
        if !principal.role.at_least(Role::Staff) {
            return Err(CoreError::Forbidden);
        }
        let mut order = self.load(order_id).await?;
        let mut attempts = 0;
        loop {
            if order.state == target {
                return Ok(order);
            }
            if order.state.next_sequential() != Some(target) {
                return Err(CoreError::InvalidTransition);
            }

            let now = Utc::now();
            let from = order.state;
            let commit = TransitionCommit {
                order_id,
                expected_version: order.version,
                target,
                at: now,
            };
            match self.store.commit_transition(commit).await {
                Ok(updated) => {
                    self.committed(&updated, from, now).await;
                    return Ok(updated);
                }
                Err(StoreError::VersionConflict) => {
                    order = self.backoff_and_reload(order_id, &mut attempts).await?;
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    /// Cancel an order.
    ///
    /// Staff cancel any active order. Customers cancel their own drafts
    /// freely and their own placed orders within the grace period; after
    /// preparation starts, cancellation is staff-only.
    ///
    /// # Errors
    ///
    /// `Forbidden` when the caller lacks the right to cancel in the current
    /// state, `InvalidTransition` from a non-cancellable state.
    #[instrument(skip(self))]
    pub async fn cancel(&self, principal: &Principal, order_id: OrderId) -> Result<Order> {
        self.cancel_at(principal, order_id, Utc::now()).await
    }

    /// Cancellation against an explicit clock, so the grace boundary is
    /// controllable in tests.
    async fn cancel_at(
        &self,
        principal: &Principal,
        order_id: OrderId,
        now: DateTime<Utc>,
    ) -> Result<Order> {
        let mut order = self.load(order_id).await?;
        let mut attempts = 0;
        loop {
            if !order.state.is_cancellable() {
                return Err(CoreError::InvalidTransition);
            }
            self.authorize_cancel(principal, &order, now)?;

            let from = order.state;
            let commit = CancellationCommit {
                order_id,
                expected_version: order.version,
                at: now,
            };
            match self.store.commit_cancellation(commit).await {
                Ok(cancelled) => {
                    self.committed(&cancelled, from, now).await;
                    return Ok(cancelled);
                }
                Err(StoreError::VersionConflict) => {
                    order = self.backoff_and_reload(order_id, &mut attempts).await?;
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    fn authorize_cancel(
        &self,
        principal: &Principal,
        order: &Order,
        now: DateTime<Utc>,
    ) -> Result<()> {
        if principal.role.at_least(Role::Staff) {
            return Ok(());
        }
        if !order.is_owned_by(principal.id) {
            return Err(CoreError::Forbidden);
        }
        match order.state {
            OrderState::Draft => Ok(()),
            OrderState::Placed => {
                let grace = TimeDelta::from_std(self.config.cancel_grace)
                    .map_err(|err| CoreError::Transient(err.to_string()))?;
                let placed_at = order.placed_at.ok_or(CoreError::InvalidTransition)?;
                if now <= placed_at + grace {
                    Ok(())
                } else {
                    Err(CoreError::Forbidden)
                }
            }
            _ => Err(CoreError::Forbidden),
        }
    }

    async fn load(&self, order_id: OrderId) -> Result<Order> {
        self.store
            .fetch_order(order_id)
            .await?
            .ok_or(CoreError::InvalidTransition)
    }

    async fn backoff_and_reload(&self, order_id: OrderId, attempts: &mut u32) -> Result<Order> {
        *attempts += 1;
        if *attempts > self.config.max_commit_retries {
            warn!(%order_id, attempts, "commit retries exhausted");
            return Err(CoreError::Conflict);
        }
        tokio::time::sleep(self.config.retry_backoff).await;
        self.load(order_id).await
    }

    /// Post-commit side effects: event publication and invalidation of the
    /// order's cached views.
    async fn committed(&self, order: &Order, from: OrderState, at: DateTime<Utc>) {
        self.events
            .publish(OrderStateChanged {
                order_id: order.id,
                customer_id: order.customer_id,
                from_state: from,
                to_state: order.state,
                at,
            })
            .await;
        if let Err(err) = self.cache.invalidate(&order_namespace(order.id)).await {
            warn!(order_id = %order.id, %err, "cache invalidation failed");
        }
    }
}
