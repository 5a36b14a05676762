//! Integration tests for the order lifecycle and pricing.
//!
//! Drafting, placement with coupons, staff fulfillment, and cancellation
//! rules, driven entirely through the platform facade.

use chrono::{TimeDelta, Utc};
use rust_decimal::Decimal;

use brewline_core::orders::store::OrderStore;
use brewline_core::orders::{LineItem, OrderState};
use brewline_core::policy::Operation;
use brewline_core::pricing::{Coupon, Discount};
use brewline_core::token::Principal;
use brewline_core::{CoreError, CouponId, CustomerId, Money, ProductId, Role};
use brewline_integration_tests::TestContext;

fn customer(id: i64) -> Principal {
    Principal {
        id: CustomerId::new(id),
        role: Role::Customer,
    }
}

fn staff() -> Principal {
    Principal {
        id: CustomerId::new(900),
        role: Role::Staff,
    }
}

fn line(cents: i64, quantity: u32) -> LineItem {
    LineItem {
        product_id: ProductId::new(1),
        quantity,
        unit_price: Money::from_cents(cents),
    }
}

fn coupon(code: &str, discount: Discount) -> Coupon {
    Coupon {
        id: CouponId::new(1),
        code: code.to_string(),
        discount,
        valid_from: Utc::now() - TimeDelta::days(1),
        valid_until: Some(Utc::now() + TimeDelta::days(1)),
        usage_cap: None,
        per_customer_cap: None,
        active: true,
    }
}

// =============================================================================
// Pricing Scenarios
// =============================================================================

#[tokio::test]
async fn test_percentage_coupon_on_twenty() {
    let ctx = TestContext::new();
    ctx.orders
        .add_coupon(coupon("TEN", Discount::Percentage(Decimal::from(10))))
        .await;

    let quote = ctx
        .platform
        .quote_price(&customer(1), &[line(2000, 1)], Some("TEN"))
        .await
        .expect("quote");
    assert_eq!(quote.subtotal, Money::from_cents(2000));
    assert_eq!(quote.discount, Money::from_cents(200));
    assert_eq!(quote.total, Money::from_cents(1800));
}

#[tokio::test]
async fn test_fixed_coupon_on_eight() {
    let ctx = TestContext::new();
    ctx.orders
        .add_coupon(coupon("FIVE", Discount::Fixed(Money::from_cents(500))))
        .await;

    let quote = ctx
        .platform
        .quote_price(&customer(1), &[line(800, 1)], Some("FIVE"))
        .await
        .expect("quote");
    assert_eq!(quote.discount, Money::from_cents(500));
    assert_eq!(quote.total, Money::from_cents(300));
}

#[tokio::test]
async fn test_fixed_coupon_never_exceeds_subtotal() {
    let ctx = TestContext::new();
    ctx.orders
        .add_coupon(coupon("FIVE", Discount::Fixed(Money::from_cents(500))))
        .await;

    let quote = ctx
        .platform
        .quote_price(&customer(1), &[line(300, 1)], Some("FIVE"))
        .await
        .expect("quote");
    assert_eq!(quote.discount, Money::from_cents(300));
    assert_eq!(quote.total, Money::ZERO);
}

#[tokio::test]
async fn test_unknown_coupon_code() {
    let ctx = TestContext::new();
    let result = ctx
        .platform
        .quote_price(&customer(1), &[line(1000, 1)], Some("GHOST"))
        .await;
    assert!(matches!(result, Err(CoreError::InvalidCoupon)));
}

#[tokio::test]
async fn test_expired_coupon_code() {
    let ctx = TestContext::new();
    let mut expired = coupon("OLD", Discount::Percentage(Decimal::from(10)));
    expired.valid_until = Some(Utc::now() - TimeDelta::hours(1));
    ctx.orders.add_coupon(expired).await;

    let result = ctx
        .platform
        .quote_price(&customer(1), &[line(1000, 1)], Some("OLD"))
        .await;
    assert!(matches!(result, Err(CoreError::ExpiredCoupon)));
}

// =============================================================================
// Placement and Fulfillment
// =============================================================================

#[tokio::test]
async fn test_full_order_flow() {
    let ctx = TestContext::new();
    ctx.orders
        .add_coupon(coupon("TEN", Discount::Percentage(Decimal::from(10))))
        .await;
    let owner = customer(1);

    let draft = ctx
        .platform
        .create_draft(&owner, vec![line(2000, 1)], Some("TEN".to_string()))
        .await
        .expect("draft");
    assert_eq!(draft.state, OrderState::Draft);

    let placed = ctx.platform.place_order(&owner, draft.id).await.expect("place");
    assert_eq!(placed.state, OrderState::Placed);
    assert_eq!(placed.total, Money::from_cents(1800));

    let operator = staff();
    let order = ctx
        .platform
        .transition_order(&operator, placed.id, OrderState::InPreparation)
        .await
        .expect("to in_preparation");
    let order = ctx
        .platform
        .transition_order(&operator, order.id, OrderState::Ready)
        .await
        .expect("to ready");
    let order = ctx
        .platform
        .transition_order(&operator, order.id, OrderState::Completed)
        .await
        .expect("to completed");
    assert_eq!(order.state, OrderState::Completed);

    // Placement counted toward loyalty.
    let loyalty = ctx
        .orders
        .fetch_loyalty(owner.id)
        .await
        .expect("loyalty");
    assert_eq!(loyalty.order_count, 1);
    assert_eq!(loyalty.lifetime_spend, Money::from_cents(1800));
}

#[tokio::test]
async fn test_placing_twice_is_noop() {
    let ctx = TestContext::new();
    let owner = customer(1);
    let draft = ctx
        .platform
        .create_draft(&owner, vec![line(500, 1)], None)
        .await
        .expect("draft");

    let placed = ctx.platform.place_order(&owner, draft.id).await.expect("place");
    let again = ctx
        .platform
        .place_order(&owner, draft.id)
        .await
        .expect("repeat place");
    assert_eq!(again.version, placed.version);

    // The repeat did not double-count loyalty.
    let loyalty = ctx
        .orders
        .fetch_loyalty(owner.id)
        .await
        .expect("loyalty");
    assert_eq!(loyalty.order_count, 1);
}

#[tokio::test]
async fn test_completed_order_is_immutable() {
    let ctx = TestContext::new();
    let owner = customer(1);
    let operator = staff();
    let draft = ctx
        .platform
        .create_draft(&owner, vec![line(500, 1)], None)
        .await
        .expect("draft");
    ctx.platform.place_order(&owner, draft.id).await.expect("place");
    for target in [
        OrderState::InPreparation,
        OrderState::Ready,
        OrderState::Completed,
    ] {
        ctx.platform
            .transition_order(&operator, draft.id, target)
            .await
            .expect("advance");
    }

    for target in [OrderState::Placed, OrderState::InPreparation, OrderState::Ready] {
        let result = ctx
            .platform
            .transition_order(&operator, draft.id, target)
            .await;
        assert!(matches!(result, Err(CoreError::InvalidTransition)));
    }
    let result = ctx.platform.cancel_order(&operator, draft.id).await;
    assert!(matches!(result, Err(CoreError::InvalidTransition)));
}

#[tokio::test]
async fn test_customer_cannot_advance_orders() {
    let ctx = TestContext::new();
    let owner = customer(1);
    let draft = ctx
        .platform
        .create_draft(&owner, vec![line(500, 1)], None)
        .await
        .expect("draft");
    ctx.platform.place_order(&owner, draft.id).await.expect("place");

    let result = ctx
        .platform
        .transition_order(&owner, draft.id, OrderState::InPreparation)
        .await;
    assert!(matches!(result, Err(CoreError::Forbidden)));
}

#[tokio::test]
async fn test_policy_gate_on_facade() {
    let ctx = TestContext::new();
    assert!(ctx.platform.authorize(&staff(), Operation::OrderAdvance).is_ok());
    assert!(matches!(
        ctx.platform.authorize(&customer(1), Operation::CouponManage),
        Err(CoreError::Forbidden)
    ));
}

// =============================================================================
// Cancellation
// =============================================================================

#[tokio::test]
async fn test_owner_cancels_within_grace() {
    let ctx = TestContext::new();
    let owner = customer(1);
    let draft = ctx
        .platform
        .create_draft(&owner, vec![line(500, 1)], None)
        .await
        .expect("draft");
    ctx.platform.place_order(&owner, draft.id).await.expect("place");

    let cancelled = ctx
        .platform
        .cancel_order(&owner, draft.id)
        .await
        .expect("cancel");
    assert_eq!(cancelled.state, OrderState::Cancelled);

    // Cancellation reversed the loyalty increment.
    let loyalty = ctx
        .orders
        .fetch_loyalty(owner.id)
        .await
        .expect("loyalty");
    assert_eq!(loyalty.order_count, 0);
}

#[tokio::test]
async fn test_owner_cannot_cancel_once_in_preparation() {
    let ctx = TestContext::new();
    let owner = customer(1);
    let draft = ctx
        .platform
        .create_draft(&owner, vec![line(500, 1)], None)
        .await
        .expect("draft");
    ctx.platform.place_order(&owner, draft.id).await.expect("place");
    ctx.platform
        .transition_order(&staff(), draft.id, OrderState::InPreparation)
        .await
        .expect("advance");

    let result = ctx.platform.cancel_order(&owner, draft.id).await;
    assert!(matches!(result, Err(CoreError::Forbidden)));

    // Staff still can.
    let cancelled = ctx
        .platform
        .cancel_order(&staff(), draft.id)
        .await
        .expect("staff cancel");
    assert_eq!(cancelled.state, OrderState::Cancelled);
}

#[tokio::test]
async fn test_foreign_order_is_invisible_and_untouchable() {
    let ctx = TestContext::new();
    let owner = customer(1);
    let stranger = customer(2);
    let draft = ctx
        .platform
        .create_draft(&owner, vec![line(500, 1)], None)
        .await
        .expect("draft");

    let view = ctx.platform.fetch_order(&stranger, draft.id).await;
    assert!(matches!(view, Err(CoreError::Forbidden)));
    let place = ctx.platform.place_order(&stranger, draft.id).await;
    assert!(matches!(place, Err(CoreError::Forbidden)));
    let cancel = ctx.platform.cancel_order(&stranger, draft.id).await;
    assert!(matches!(cancel, Err(CoreError::Forbidden)));
}
