//! Static role-to-operation access policy.
//!
//! One table, shared by every transport, evaluated before any domain logic
//! runs. Resource-level checks (order ownership, cancellation windows) live
//! with the resource in the lifecycle manager; this module only answers
//! whether a role may attempt an operation at all.

use crate::error::{CoreError, Result};
use crate::types::Role;

/// Operations subject to the access policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// Browse the menu. Open to every role.
    MenuRead,
    /// Create, edit, or retire menu items.
    MenuManage,
    /// Create and place orders.
    OrderCreate,
    /// View an order (ownership is checked separately).
    OrderView,
    /// Advance an order along the fulfillment sequence.
    OrderAdvance,
    /// Cancel any customer's order regardless of the grace window.
    OrderCancelAny,
    /// Create and deactivate coupons.
    CouponManage,
    /// View sales and usage statistics.
    StatsView,
    /// Post a comment.
    CommentWrite,
}

/// Minimum role allowed to attempt `operation`.
#[must_use]
pub const fn required_role(operation: Operation) -> Role {
    match operation {
        Operation::MenuRead
        | Operation::OrderCreate
        | Operation::OrderView
        | Operation::CommentWrite => Role::Customer,
        Operation::OrderAdvance | Operation::OrderCancelAny | Operation::StatsView => Role::Staff,
        Operation::MenuManage | Operation::CouponManage => Role::Admin,
    }
}

/// Check that `role` may attempt `operation`.
///
/// # Errors
///
/// Returns `Forbidden` when the role is below the operation's minimum.
pub fn authorize(role: Role, operation: Operation) -> Result<()> {
    if role.at_least(required_role(operation)) {
        Ok(())
    } else {
        Err(CoreError::Forbidden)
    }
}
