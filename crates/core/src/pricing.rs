//! Coupon and pricing engine.
//!
//! [`PricingEngine::quote`] is a pure computation over a snapshot of inputs:
//! line items, an optional coupon with its historical usage counts, and the
//! customer's loyalty record. It never mutates usage counters; cap
//! enforcement is re-checked atomically at order finalization by the order
//! store, so two concurrent quotes against a nearly-exhausted coupon cannot
//! both finalize.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::CoreError;
use crate::identity::{LoyaltyRecord, LoyaltyTiers};
use crate::orders::LineItem;
use crate::types::{CouponId, Money};

/// Discount carried by a coupon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Discount {
    /// Percent off the subtotal.
    Percentage(Decimal),
    /// Fixed amount off, capped at the subtotal.
    Fixed(Money),
}

/// A coupon definition. Never physically deleted while referenced by
/// historical orders; deactivation and the validity window end its life.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coupon {
    pub id: CouponId,
    pub code: String,
    pub discount: Discount,
    pub valid_from: DateTime<Utc>,
    pub valid_until: Option<DateTime<Utc>>,
    /// Total number of finalizations allowed across all customers.
    pub usage_cap: Option<u32>,
    /// Finalizations allowed per customer.
    pub per_customer_cap: Option<u32>,
    pub active: bool,
}

impl Coupon {
    /// Whether `now` falls inside the validity window.
    #[must_use]
    pub fn in_window(&self, now: DateTime<Utc>) -> bool {
        now >= self.valid_from && self.valid_until.is_none_or(|until| now < until)
    }
}

/// Historical applied-coupon counts, read from the durable store.
#[derive(Debug, Clone, Copy, Default)]
pub struct CouponUsage {
    /// Finalizations across all customers.
    pub total: u32,
    /// Finalizations by the quoting customer.
    pub by_customer: u32,
}

/// How a loyalty-tier discount combines with a coupon discount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DiscountStacking {
    /// Tier and coupon discounts add together (capped at the subtotal).
    #[default]
    Additive,
    /// Only the larger of the two applies.
    Exclusive,
}

/// Pricing configuration: stacking rule and loyalty tier table.
#[derive(Debug, Clone, Default)]
pub struct PricingConfig {
    pub stacking: DiscountStacking,
    pub tiers: LoyaltyTiers,
}

/// Quote result. `discount` is the combined amount actually applied;
/// the per-source breakdown mirrors what the durable order row records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PricingResult {
    pub subtotal: Money,
    pub discount: Money,
    pub total: Money,
    pub coupon_discount: Money,
    pub loyalty_discount: Money,
}

/// Pricing-domain rejections. Definitive: retrying without changing input
/// cannot succeed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PricingError {
    #[error("invalid coupon")]
    InvalidCoupon,
    #[error("expired coupon")]
    ExpiredCoupon,
    #[error("coupon usage cap exceeded")]
    UsageCapExceeded,
}

impl From<PricingError> for CoreError {
    fn from(err: PricingError) -> Self {
        match err {
            PricingError::InvalidCoupon => Self::InvalidCoupon,
            PricingError::ExpiredCoupon => Self::ExpiredCoupon,
            PricingError::UsageCapExceeded => Self::UsageCapExceeded,
        }
    }
}

/// The pricing engine. Stateless; all inputs are passed per quote.
#[derive(Debug, Clone, Default)]
pub struct PricingEngine {
    config: PricingConfig,
}

impl PricingEngine {
    /// Create an engine with the given configuration.
    #[must_use]
    pub const fn new(config: PricingConfig) -> Self {
        Self { config }
    }

    /// Compute an order's price.
    ///
    /// `coupon` pairs the coupon definition with its historical usage counts
    /// for the quoting customer; `None` means no code was supplied.
    ///
    /// # Errors
    ///
    /// Returns `InvalidCoupon`, `ExpiredCoupon`, or `UsageCapExceeded` per
    /// the coupon checks; a quote without a coupon cannot fail.
    pub fn quote(
        &self,
        line_items: &[LineItem],
        coupon: Option<(&Coupon, CouponUsage)>,
        loyalty: &LoyaltyRecord,
        now: DateTime<Utc>,
    ) -> Result<PricingResult, PricingError> {
        let subtotal = line_items
            .iter()
            .fold(Money::ZERO, |acc, item| acc.add(item.line_total()));

        let coupon_discount = match coupon {
            Some((coupon, usage)) => Self::coupon_discount(coupon, usage, subtotal, now)?,
            None => Money::ZERO,
        };

        let tier = self.config.tiers.tier_of(loyalty);
        let loyalty_discount = subtotal.percent(self.config.tiers.discount_pct(tier));

        let combined = match self.config.stacking {
            DiscountStacking::Additive => coupon_discount.add(loyalty_discount),
            DiscountStacking::Exclusive => {
                if coupon_discount >= loyalty_discount {
                    coupon_discount
                } else {
                    loyalty_discount
                }
            }
        };
        let discount = combined.min(subtotal);

        Ok(PricingResult {
            subtotal,
            discount,
            total: subtotal.saturating_sub(discount),
            coupon_discount,
            loyalty_discount,
        })
    }

    fn coupon_discount(
        coupon: &Coupon,
        usage: CouponUsage,
        subtotal: Money,
        now: DateTime<Utc>,
    ) -> Result<Money, PricingError> {
        if !coupon.active {
            return Err(PricingError::InvalidCoupon);
        }
        if !coupon.in_window(now) {
            return Err(PricingError::ExpiredCoupon);
        }
        if coupon.usage_cap.is_some_and(|cap| usage.total >= cap) {
            return Err(PricingError::UsageCapExceeded);
        }
        if coupon
            .per_customer_cap
            .is_some_and(|cap| usage.by_customer >= cap)
        {
            return Err(PricingError::UsageCapExceeded);
        }

        Ok(match coupon.discount {
            Discount::Percentage(pct) => subtotal.percent(pct),
            Discount::Fixed(amount) => amount.min(subtotal),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ProductId;
    use chrono::TimeDelta;

    fn item(cents: i64, quantity: u32) -> LineItem {
        LineItem {
            product_id: ProductId::new(1),
            quantity,
            unit_price: Money::from_cents(cents),
        }
    }

    fn coupon(discount: Discount) -> Coupon {
        Coupon {
            id: CouponId::new(1),
            code: "WELCOME".to_string(),
            discount,
            valid_from: Utc::now() - TimeDelta::days(1),
            valid_until: Some(Utc::now() + TimeDelta::days(1)),
            usage_cap: None,
            per_customer_cap: None,
            active: true,
        }
    }

    fn engine() -> PricingEngine {
        PricingEngine::new(PricingConfig::default())
    }

    #[test]
    fn test_ten_percent_off_twenty() {
        let items = [item(2000, 1)];
        let coupon = coupon(Discount::Percentage(Decimal::from(10)));
        let result = engine()
            .quote(
                &items,
                Some((&coupon, CouponUsage::default())),
                &LoyaltyRecord::default(),
                Utc::now(),
            )
            .expect("quote");

        assert_eq!(result.subtotal, Money::from_cents(2000));
        assert_eq!(result.discount, Money::from_cents(200));
        assert_eq!(result.total, Money::from_cents(1800));
    }

    #[test]
    fn test_fixed_discount_capped_at_subtotal() {
        let items = [item(500, 1)];
        let coupon = coupon(Discount::Fixed(Money::from_cents(800)));
        let result = engine()
            .quote(
                &items,
                Some((&coupon, CouponUsage::default())),
                &LoyaltyRecord::default(),
                Utc::now(),
            )
            .expect("quote");

        assert_eq!(result.discount, Money::from_cents(500));
        assert_eq!(result.total, Money::ZERO);
    }

    #[test]
    fn test_no_coupon_no_tier() {
        let items = [item(350, 2), item(500, 1)];
        let result = engine()
            .quote(&items, None, &LoyaltyRecord::default(), Utc::now())
            .expect("quote");

        assert_eq!(result.subtotal, Money::from_cents(1200));
        assert_eq!(result.discount, Money::ZERO);
        assert_eq!(result.total, Money::from_cents(1200));
    }

    #[test]
    fn test_unknown_handled_upstream_inactive_here() {
        let items = [item(1000, 1)];
        let mut coupon = coupon(Discount::Percentage(Decimal::from(10)));
        coupon.active = false;
        let result = engine().quote(
            &items,
            Some((&coupon, CouponUsage::default())),
            &LoyaltyRecord::default(),
            Utc::now(),
        );
        assert_eq!(result, Err(PricingError::InvalidCoupon));
    }

    #[test]
    fn test_expired_coupon() {
        let items = [item(1000, 1)];
        let mut coupon = coupon(Discount::Percentage(Decimal::from(10)));
        coupon.valid_until = Some(Utc::now() - TimeDelta::hours(1));
        let result = engine().quote(
            &items,
            Some((&coupon, CouponUsage::default())),
            &LoyaltyRecord::default(),
            Utc::now(),
        );
        assert_eq!(result, Err(PricingError::ExpiredCoupon));
    }

    #[test]
    fn test_not_yet_valid_coupon() {
        let items = [item(1000, 1)];
        let mut coupon = coupon(Discount::Percentage(Decimal::from(10)));
        coupon.valid_from = Utc::now() + TimeDelta::hours(1);
        let result = engine().quote(
            &items,
            Some((&coupon, CouponUsage::default())),
            &LoyaltyRecord::default(),
            Utc::now(),
        );
        assert_eq!(result, Err(PricingError::ExpiredCoupon));
    }

    #[test]
    fn test_global_cap_exhausted() {
        let items = [item(1000, 1)];
        let mut coupon = coupon(Discount::Percentage(Decimal::from(10)));
        coupon.usage_cap = Some(3);
        let usage = CouponUsage {
            total: 3,
            by_customer: 0,
        };
        let result = engine().quote(
            &items,
            Some((&coupon, usage)),
            &LoyaltyRecord::default(),
            Utc::now(),
        );
        assert_eq!(result, Err(PricingError::UsageCapExceeded));
    }

    #[test]
    fn test_per_customer_cap_exhausted() {
        let items = [item(1000, 1)];
        let mut coupon = coupon(Discount::Percentage(Decimal::from(10)));
        coupon.per_customer_cap = Some(1);
        let usage = CouponUsage {
            total: 5,
            by_customer: 1,
        };
        let result = engine().quote(
            &items,
            Some((&coupon, usage)),
            &LoyaltyRecord::default(),
            Utc::now(),
        );
        assert_eq!(result, Err(PricingError::UsageCapExceeded));
    }

    #[test]
    fn test_loyalty_stacks_additively_by_default() {
        // Gold customer: 10% tier discount on top of a 10% coupon.
        let items = [item(2000, 1)];
        let coupon = coupon(Discount::Percentage(Decimal::from(10)));
        let loyalty = LoyaltyRecord {
            order_count: 100,
            lifetime_spend: Money::from_cents(200_000),
        };
        let result = engine()
            .quote(
                &items,
                Some((&coupon, CouponUsage::default())),
                &loyalty,
                Utc::now(),
            )
            .expect("quote");

        assert_eq!(result.coupon_discount, Money::from_cents(200));
        assert_eq!(result.loyalty_discount, Money::from_cents(200));
        assert_eq!(result.discount, Money::from_cents(400));
        assert_eq!(result.total, Money::from_cents(1600));
    }

    #[test]
    fn test_exclusive_stacking_takes_larger() {
        let engine = PricingEngine::new(PricingConfig {
            stacking: DiscountStacking::Exclusive,
            tiers: LoyaltyTiers::default(),
        });
        let items = [item(2000, 1)];
        let coupon = coupon(Discount::Fixed(Money::from_cents(100)));
        let loyalty = LoyaltyRecord {
            order_count: 100,
            lifetime_spend: Money::from_cents(200_000),
        };
        let result = engine
            .quote(
                &items,
                Some((&coupon, CouponUsage::default())),
                &loyalty,
                Utc::now(),
            )
            .expect("quote");

        // Gold tier 10% (2.00) beats the fixed 1.00 coupon.
        assert_eq!(result.discount, Money::from_cents(200));
        assert_eq!(result.total, Money::from_cents(1800));
    }

    #[test]
    fn test_stacked_discount_capped_at_subtotal() {
        let items = [item(100, 1)];
        let coupon = coupon(Discount::Fixed(Money::from_cents(90)));
        let loyalty = LoyaltyRecord {
            order_count: 100,
            lifetime_spend: Money::from_cents(200_000),
        };
        let result = engine()
            .quote(
                &items,
                Some((&coupon, CouponUsage::default())),
                &loyalty,
                Utc::now(),
            )
            .expect("quote");

        assert!(result.discount <= result.subtotal);
        assert!(result.total >= Money::ZERO);
    }
}
