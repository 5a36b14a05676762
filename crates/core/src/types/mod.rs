//! Shared newtypes used across every Brewline component.

pub mod id;
pub mod money;
pub mod role;

pub use id::{CouponId, CustomerId, OrderId, ProductId};
pub use money::Money;
pub use role::Role;
