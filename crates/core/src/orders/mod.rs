//! Order model and lifecycle state graph.
//!
//! An order is owned exclusively by the lifecycle manager while active; once
//! it reaches a terminal state it is read-only history. States are explicit
//! tagged variants and every mutation flows through the store's atomic
//! commits, so invariants stay enforceable by the type system rather than by
//! boolean flags.

pub mod lifecycle;
pub mod memory;
pub mod store;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{CustomerId, Money, OrderId, ProductId};

/// Lifecycle states.
///
/// `Draft → Placed → InPreparation → Ready → Completed`, with `Cancelled`
/// reachable from the three non-terminal working states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderState {
    Draft,
    Placed,
    InPreparation,
    Ready,
    Completed,
    Cancelled,
}

impl OrderState {
    /// Whether the state is terminal (read-only history).
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }

    /// The next state in the staff fulfillment sequence, if any.
    #[must_use]
    pub const fn next_sequential(self) -> Option<Self> {
        match self {
            Self::Placed => Some(Self::InPreparation),
            Self::InPreparation => Some(Self::Ready),
            Self::Ready => Some(Self::Completed),
            Self::Draft | Self::Completed | Self::Cancelled => None,
        }
    }

    /// Whether cancellation is reachable from this state.
    #[must_use]
    pub const fn is_cancellable(self) -> bool {
        matches!(self, Self::Draft | Self::Placed | Self::InPreparation)
    }
}

impl std::fmt::Display for OrderState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Draft => write!(f, "draft"),
            Self::Placed => write!(f, "placed"),
            Self::InPreparation => write!(f, "in_preparation"),
            Self::Ready => write!(f, "ready"),
            Self::Completed => write!(f, "completed"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// One order line with the unit price snapshotted at draft time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    pub product_id: ProductId,
    pub quantity: u32,
    pub unit_price: Money,
}

impl LineItem {
    /// Price of this line.
    #[must_use]
    pub fn line_total(&self) -> Money {
        self.unit_price.times(self.quantity)
    }
}

/// Input for creating a draft order.
#[derive(Debug, Clone, Deserialize)]
pub struct DraftOrder {
    pub customer_id: CustomerId,
    pub line_items: Vec<LineItem>,
    pub coupon_code: Option<String>,
}

/// An order as held in the durable store.
///
/// `version` is the optimistic-concurrency token; every committed mutation
/// increments it, and commits carry the version they read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub customer_id: CustomerId,
    pub line_items: Vec<LineItem>,
    pub coupon_code: Option<String>,
    pub state: OrderState,
    pub subtotal: Money,
    pub discount: Money,
    pub total: Money,
    pub created_at: DateTime<Utc>,
    /// Set when the order leaves `Draft`; anchors the customer cancellation
    /// grace period.
    pub placed_at: Option<DateTime<Utc>>,
    /// Timestamp of the latest state change.
    pub state_changed_at: DateTime<Utc>,
    pub version: u64,
}

impl Order {
    /// Whether `customer` owns this order.
    #[must_use]
    pub fn is_owned_by(&self, customer: CustomerId) -> bool {
        self.customer_id == customer
    }
}
