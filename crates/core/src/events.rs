//! Order lifecycle event publication.
//!
//! Events are emitted after a transition commits, never before, and only for
//! transitions that actually changed state. Delivery is fire-and-forget: a
//! sink failure is the sink's problem and must not fail the committed
//! transition.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use crate::orders::OrderState;
use crate::types::{CustomerId, OrderId};

/// A committed order state change.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct OrderStateChanged {
    pub order_id: OrderId,
    pub customer_id: CustomerId,
    pub from_state: OrderState,
    pub to_state: OrderState,
    pub at: DateTime<Utc>,
}

/// Destination for committed lifecycle events.
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Publish one event. Must not fail the caller; swallow and log internal
    /// delivery errors.
    async fn publish(&self, event: OrderStateChanged);
}

/// Sink that emits events to the tracing pipeline. Default for deployments
/// without an external notification bus.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingEventSink;

#[async_trait]
impl EventSink for TracingEventSink {
    async fn publish(&self, event: OrderStateChanged) {
        info!(
            order_id = %event.order_id,
            customer_id = %event.customer_id,
            from = %event.from_state,
            to = %event.to_state,
            "order state changed"
        );
    }
}
