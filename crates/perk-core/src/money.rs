//! # Money
//!
//! Integer cents for every amount a sale carries.
//!
//! ```text
//! Product.price_cents ──► SaleItem.unit_price (frozen) ──► line total
//!                                                             │
//!            subtotal ◄───────────────────────────────────────┘
//!               │
//!               ├──► discount (flat cents or basis points, clamped)
//!               ▼
//!            total
//! ```
//!
//! Percentages are basis points (1000 = 10%). No floating point is involved
//! anywhere between the cart and the stored sale.

use serde::{Deserialize, Serialize};
use std::ops::Sub;
use ts_rs::TS;

use crate::FULL_PERCENT_BPS;

/// An amount in cents.
///
/// ```rust
/// use perk_core::money::Money;
///
/// let line = Money::from_cents(350).checked_multiply_quantity(3).unwrap();
/// assert_eq!(line.cents(), 1050);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    /// True for zero and negative amounts, which never receive a discount.
    #[inline]
    pub const fn is_non_positive(&self) -> bool {
        self.0 <= 0
    }

    /// `None` on overflow.
    #[inline]
    pub const fn checked_multiply_quantity(&self, qty: i64) -> Option<Self> {
        match self.0.checked_mul(qty) {
            Some(cents) => Some(Money(cents)),
            None => None,
        }
    }

    /// `None` on overflow.
    #[inline]
    pub const fn checked_add(&self, other: Money) -> Option<Self> {
        match self.0.checked_add(other.0) {
            Some(cents) => Some(Money(cents)),
            None => None,
        }
    }

    /// `bps` basis points of this amount, half a cent rounding up.
    ///
    /// Computed in i128, so no cart total can overflow it.
    ///
    /// ```rust
    /// use perk_core::money::Money;
    ///
    /// // 10% of 9.25 is 0.925
    /// assert_eq!(Money::from_cents(925).percentage(1000).cents(), 93);
    /// ```
    pub fn percentage(&self, bps: u32) -> Money {
        let full = i128::from(FULL_PERCENT_BPS);
        let cents = (i128::from(self.0) * i128::from(bps) + full / 2) / full;
        Money(cents as i64)
    }
}

impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0 - other.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_multiplication() {
        assert_eq!(
            Money::from_cents(299).checked_multiply_quantity(3),
            Some(Money::from_cents(897))
        );
        assert!(Money::from_cents(i64::MAX / 2)
            .checked_multiply_quantity(3)
            .is_none());
    }

    #[test]
    fn test_subtotal_accumulation() {
        let subtotal = Money::zero()
            .checked_add(Money::from_cents(700))
            .and_then(|m| m.checked_add(Money::from_cents(225)))
            .unwrap();
        assert_eq!(subtotal.cents(), 925);
        assert!(Money::from_cents(i64::MAX)
            .checked_add(Money::from_cents(1))
            .is_none());
        assert_eq!((subtotal - Money::from_cents(93)).cents(), 832);
    }

    #[test]
    fn test_percentage_rounding() {
        assert_eq!(Money::from_cents(10000).percentage(1000).cents(), 1000);
        // 8.25% of 10.00 is 82.5 cents
        assert_eq!(Money::from_cents(1000).percentage(825).cents(), 83);
        // 33.33% of 3.00 is 99.99 cents
        assert_eq!(Money::from_cents(300).percentage(3333).cents(), 100);
        assert_eq!(Money::from_cents(777).percentage(10_000).cents(), 777);
        assert_eq!(Money::from_cents(777).percentage(0).cents(), 0);
    }

    #[test]
    fn test_non_positive() {
        assert!(Money::zero().is_non_positive());
        assert!(Money::from_cents(-1).is_non_positive());
        assert!(!Money::from_cents(1).is_non_positive());
    }
}
