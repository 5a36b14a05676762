//! Monetary amounts with decimal arithmetic.
//!
//! All order math in the pricing engine runs on [`Money`], a thin wrapper
//! around `rust_decimal::Decimal` pinned to two decimal places. Rounding is
//! banker's rounding (round-half-even), which is what the currency columns in
//! the durable store expect.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// A monetary amount in the platform's single operating currency.
///
/// Construction normalizes to two decimal places with round-half-even, so two
/// `Money` values computed through different paths compare equal when they
/// represent the same amount of cash.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct Money(Decimal);

impl Money {
    /// Zero amount.
    pub const ZERO: Self = Self(Decimal::ZERO);

    /// Create a new amount, rounding to currency precision.
    #[must_use]
    pub fn new(amount: Decimal) -> Self {
        Self(amount.round_dp_with_strategy(2, RoundingStrategy::MidpointNearestEven))
    }

    /// Create an amount from a whole number of cents.
    #[must_use]
    pub fn from_cents(cents: i64) -> Self {
        Self(Decimal::new(cents, 2))
    }

    /// The underlying decimal value.
    #[must_use]
    pub const fn amount(&self) -> Decimal {
        self.0
    }

    /// Whether the amount is exactly zero.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Add two amounts.
    #[must_use]
    pub fn add(self, other: Self) -> Self {
        Self::new(self.0 + other.0)
    }

    /// Subtract, saturating at zero. A discount can never push a total
    /// negative.
    #[must_use]
    pub fn saturating_sub(self, other: Self) -> Self {
        if other.0 >= self.0 {
            Self::ZERO
        } else {
            Self::new(self.0 - other.0)
        }
    }

    /// Multiply by an integer quantity.
    #[must_use]
    pub fn times(self, quantity: u32) -> Self {
        Self::new(self.0 * Decimal::from(quantity))
    }

    /// Take a percentage of this amount, rounding half-even to currency
    /// precision.
    #[must_use]
    pub fn percent(self, pct: Decimal) -> Self {
        Self::new(self.0 * pct / Decimal::from(100))
    }

    /// The smaller of two amounts.
    #[must_use]
    pub fn min(self, other: Self) -> Self {
        if self.0 <= other.0 { self } else { other }
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

impl From<Decimal> for Money {
    fn from(amount: Decimal) -> Self {
        Self::new(amount)
    }
}
