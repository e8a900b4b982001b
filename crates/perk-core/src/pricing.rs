//! # Sale Pricing
//!
//! Line totals, discount clamping, and sale totals.
//!
//! ```text
//! lines ──► Σ unit_price × qty ──► subtotal
//!                                     │
//!            discount ──► clamp to [0, subtotal] ──► discount applied
//!                                     │
//!                                     ▼
//!                         total = subtotal − discount applied
//! ```
//!
//! Prices are read from the product at the moment its stock is taken and are
//! never recomputed afterwards.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::types::{Discount, SaleLine};
use crate::FULL_PERCENT_BPS;

/// Computed totals for a sale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SaleTotals {
    pub subtotal: Money,
    pub discount: Money,
    pub total: Money,
}

/// Validates a requested discount.
///
/// ## Rules
/// - Flat amounts must not be negative (amounts above the subtotal are clamped later)
/// - Percentages must be within 0-100% (0-10000 bps)
pub fn validate_discount(discount: &Discount) -> CoreResult<()> {
    match *discount {
        Discount::None => Ok(()),
        Discount::Flat { amount_cents } if amount_cents < 0 => Err(CoreError::invalid_input(
            "flat discount must not be negative",
        )),
        Discount::Flat { .. } => Ok(()),
        Discount::Percentage { bps } if bps > FULL_PERCENT_BPS => Err(CoreError::invalid_input(
            format!("percentage discount {bps} bps exceeds 100%"),
        )),
        Discount::Percentage { .. } => Ok(()),
    }
}

/// Returns the discount to apply to `subtotal`, always within `[0, subtotal]`.
pub fn discount_amount(subtotal: Money, discount: &Discount) -> Money {
    if subtotal.is_non_positive() {
        return Money::zero();
    }

    let raw = match *discount {
        Discount::None => Money::zero(),
        Discount::Flat { amount_cents } => Money::from_cents(amount_cents),
        Discount::Percentage { bps } => subtotal.percentage(bps.min(FULL_PERCENT_BPS)),
    };

    raw.clamp(Money::zero(), subtotal)
}

/// Line total for one item.
pub fn line_total(unit_price_cents: i64, quantity: i64) -> CoreResult<Money> {
    Money::from_cents(unit_price_cents)
        .checked_multiply_quantity(quantity)
        .ok_or_else(|| CoreError::invalid_input("line total overflows"))
}

/// Computes subtotal, discount and total from `(unit_price_cents, quantity)` pairs.
///
/// ## Example
/// ```rust
/// use perk_core::pricing::compute_totals;
/// use perk_core::Discount;
///
/// let totals = compute_totals([(500, 2)], &Discount::Flat { amount_cents: 5000 }).unwrap();
/// assert_eq!(totals.discount.cents(), 1000); // clamped to the subtotal
/// assert_eq!(totals.total.cents(), 0);
/// ```
pub fn compute_totals<I>(lines: I, discount: &Discount) -> CoreResult<SaleTotals>
where
    I: IntoIterator<Item = (i64, i64)>,
{
    validate_discount(discount)?;

    let mut subtotal = Money::zero();
    for (unit_price_cents, quantity) in lines {
        let line = line_total(unit_price_cents, quantity)?;
        subtotal = subtotal
            .checked_add(line)
            .ok_or_else(|| CoreError::invalid_input("subtotal overflows"))?;
    }

    let discount = discount_amount(subtotal, discount);
    Ok(SaleTotals {
        subtotal,
        discount,
        total: subtotal - discount,
    })
}

/// Sums quantities per product, keyed in ascending product-id order.
///
/// The ascending order is the order in which a sale takes stock, so two sales
/// with overlapping products always touch them in the same sequence.
pub fn demand_by_product(lines: &[SaleLine]) -> CoreResult<BTreeMap<String, i64>> {
    let mut demand: BTreeMap<String, i64> = BTreeMap::new();
    for line in lines {
        let entry = demand.entry(line.product_id.clone()).or_insert(0);
        *entry = entry
            .checked_add(line.quantity)
            .ok_or_else(|| CoreError::invalid_input("quantity overflows"))?;
    }
    Ok(demand)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_totals_without_discount() {
        let totals = compute_totals([(350, 2), (225, 1)], &Discount::None).unwrap();
        assert_eq!(totals.subtotal.cents(), 925);
        assert_eq!(totals.discount.cents(), 0);
        assert_eq!(totals.total.cents(), 925);
    }

    #[test]
    fn test_flat_discount_is_clamped_to_subtotal() {
        let totals =
            compute_totals([(100, 3)], &Discount::Flat { amount_cents: 1_000 }).unwrap();
        assert_eq!(totals.discount.cents(), 300);
        assert_eq!(totals.total.cents(), 0);
    }

    #[test]
    fn test_percentage_discount() {
        let totals = compute_totals([(2000, 1)], &Discount::Percentage { bps: 2500 }).unwrap();
        assert_eq!(totals.discount.cents(), 500);
        assert_eq!(totals.total.cents(), 1500);

        let full = compute_totals([(2000, 1)], &Discount::Percentage { bps: 10_000 }).unwrap();
        assert_eq!(full.total.cents(), 0);
    }

    #[test]
    fn test_malformed_discounts_rejected() {
        assert!(matches!(
            compute_totals([(100, 1)], &Discount::Flat { amount_cents: -1 }),
            Err(CoreError::InvalidInput(_))
        ));
        assert!(matches!(
            compute_totals([(100, 1)], &Discount::Percentage { bps: 10_001 }),
            Err(CoreError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_total_identity_holds_across_discounts() {
        let carts: [&[(i64, i64)]; 3] = [&[(199, 3)], &[(1, 1)], &[(0, 5), (1050, 2)]];
        let discounts = [
            Discount::None,
            Discount::Flat { amount_cents: 0 },
            Discount::Flat { amount_cents: 150 },
            Discount::Flat { amount_cents: 99_999 },
            Discount::Percentage { bps: 0 },
            Discount::Percentage { bps: 3333 },
            Discount::Percentage { bps: 10_000 },
        ];

        for cart in carts {
            for discount in &discounts {
                let t = compute_totals(cart.iter().copied(), discount).unwrap();
                assert_eq!(t.total, t.subtotal - t.discount);
                assert!(t.discount >= Money::zero());
                assert!(t.discount <= t.subtotal);
            }
        }
    }

    #[test]
    fn test_zero_subtotal_gets_no_discount() {
        assert_eq!(
            discount_amount(Money::zero(), &Discount::Flat { amount_cents: 50 }),
            Money::zero()
        );
    }

    #[test]
    fn test_line_total_overflow() {
        assert!(line_total(i64::MAX, 2).is_err());
        assert_eq!(line_total(250, 4).unwrap().cents(), 1000);
    }

    #[test]
    fn test_demand_merges_duplicate_lines_in_id_order() {
        let lines = vec![
            SaleLine::new("p-b", 2),
            SaleLine::new("p-a", 1),
            SaleLine::new("p-b", 3),
        ];
        let demand = demand_by_product(&lines).unwrap();
        let ordered: Vec<(&str, i64)> = demand.iter().map(|(k, v)| (k.as_str(), *v)).collect();
        assert_eq!(ordered, vec![("p-a", 1), ("p-b", 5)]);
    }
}
