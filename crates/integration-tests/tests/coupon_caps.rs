//! Integration tests for coupon usage caps under concurrency.
//!
//! The quote-time cap check is advisory; these tests pin down that the
//! placement-time re-check inside the store transaction is what actually
//! enforces the cap.

use chrono::{TimeDelta, Utc};
use rust_decimal::Decimal;

use brewline_core::orders::LineItem;
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

fn lines() -> Vec<LineItem> {
    vec![LineItem {
        product_id: ProductId::new(1),
        quantity: 1,
        unit_price: Money::from_cents(1000),
    }]
}

fn capped(usage_cap: Option<u32>, per_customer_cap: Option<u32>) -> Coupon {
    Coupon {
        id: CouponId::new(1),
        code: "SCARCE".to_string(),
        discount: Discount::Percentage(Decimal::from(10)),
        valid_from: Utc::now() - TimeDelta::days(1),
        valid_until: None,
        usage_cap,
        per_customer_cap,
        active: true,
    }
}

#[tokio::test]
async fn test_concurrent_placements_respect_global_cap() {
    let ctx = TestContext::new();
    ctx.orders.add_coupon(capped(Some(1), None)).await;

    let first = customer(1);
    let second = customer(2);
    let draft_a = ctx
        .platform
        .create_draft(&first, lines(), Some("SCARCE".to_string()))
        .await
        .expect("draft a");
    let draft_b = ctx
        .platform
        .create_draft(&second, lines(), Some("SCARCE".to_string()))
        .await
        .expect("draft b");

    let (a, b) = tokio::join!(
        ctx.platform.place_order(&first, draft_a.id),
        ctx.platform.place_order(&second, draft_b.id),
    );

    // Exactly one placement wins the single remaining use.
    let successes = [&a, &b].iter().filter(|r| r.is_ok()).count();
    assert_eq!(successes, 1, "got {a:?} and {b:?}");
    for result in [a, b] {
        if let Err(err) = result {
            assert!(matches!(err, CoreError::UsageCapExceeded), "got {err:?}");
        }
    }
}

#[tokio::test]
async fn test_per_customer_cap_blocks_second_order() {
    let ctx = TestContext::new();
    ctx.orders.add_coupon(capped(None, Some(1))).await;
    let buyer = customer(1);

    let draft_a = ctx
        .platform
        .create_draft(&buyer, lines(), Some("SCARCE".to_string()))
        .await
        .expect("draft a");
    ctx.platform
        .place_order(&buyer, draft_a.id)
        .await
        .expect("first placement");

    let draft_b = ctx
        .platform
        .create_draft(&buyer, lines(), Some("SCARCE".to_string()))
        .await
        .expect("draft b");
    let result = ctx.platform.place_order(&buyer, draft_b.id).await;
    assert!(matches!(result, Err(CoreError::UsageCapExceeded)));

    // A different customer is unaffected.
    let other = customer(2);
    let draft_c = ctx
        .platform
        .create_draft(&other, lines(), Some("SCARCE".to_string()))
        .await
        .expect("draft c");
    ctx.platform
        .place_order(&other, draft_c.id)
        .await
        .expect("other customer placement");
}

#[tokio::test]
async fn test_cancellation_frees_a_cap_slot() {
    let ctx = TestContext::new();
    ctx.orders.add_coupon(capped(Some(1), None)).await;
    let first = customer(1);
    let second = customer(2);

    let draft_a = ctx
        .platform
        .create_draft(&first, lines(), Some("SCARCE".to_string()))
        .await
        .expect("draft a");
    ctx.platform
        .place_order(&first, draft_a.id)
        .await
        .expect("first placement");
    ctx.platform
        .cancel_order(&first, draft_a.id)
        .await
        .expect("cancel");

    // The reversed usage makes the slot available again.
    let draft_b = ctx
        .platform
        .create_draft(&second, lines(), Some("SCARCE".to_string()))
        .await
        .expect("draft b");
    ctx.platform
        .place_order(&second, draft_b.id)
        .await
        .expect("second placement after reversal");
}
