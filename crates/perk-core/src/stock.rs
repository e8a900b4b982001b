//! # Stock Rules
//!
//! The rules every ledger operation applies before a movement is written.
//!
//! Each rule returns the lowest quantity the product may be left with after
//! the change (its *floor*). The database layer turns that floor into a
//! conditional update (`... WHERE quantity + delta >= floor`), so the check
//! and the write happen in one atomic statement.
//!
//! | Operation            | Delta     | Floor | Ceiling      |
//! |----------------------|-----------|-------|--------------|
//! | receive              | +n (n>0)  | 0     | STOCK_CEILING|
//! | adjust, positive     | +n        | 0     | STOCK_CEILING|
//! | adjust, negative     | −n        | 1     | STOCK_CEILING|
//! | sale decrement       | −n (n>0)  | 0     | NO_CEILING   |
//! | void restore         | +n        | 0     | NO_CEILING   |
//!
//! Manual write-offs keep at least one unit on hand; only sales may drain a
//! product to zero.
//!
//! Receives and adjustments also have a *ceiling*: no single change and no
//! resulting quantity may exceed [`MAX_STOCK_QUANTITY`]. Sales and void
//! restores only move stock that was already counted, so they use [`NO_CEILING`].

use crate::error::{CoreError, CoreResult};
use crate::types::StockMovement;
use crate::MAX_STOCK_QUANTITY;

/// Floor for changes that may drain a product completely.
pub const EMPTY_FLOOR: i64 = 0;

/// Floor for negative manual adjustments.
pub const WRITE_OFF_FLOOR: i64 = 1;

/// Ceiling for owner-entered stock (receives, adjustments).
pub const STOCK_CEILING: i64 = MAX_STOCK_QUANTITY;

/// Ceiling for sale decrements and void restores.
pub const NO_CEILING: i64 = i64::MAX;

/// Checks a receive quantity and returns the delta to record.
pub fn receive_delta(quantity: i64) -> CoreResult<i64> {
    if quantity <= 0 || quantity > MAX_STOCK_QUANTITY {
        return Err(CoreError::InvalidQuantity { quantity });
    }
    Ok(quantity)
}

/// Checks an adjustment delta and returns the floor it must respect.
pub fn adjustment_floor(delta: i64) -> CoreResult<i64> {
    if delta == 0 || delta.unsigned_abs() > MAX_STOCK_QUANTITY.unsigned_abs() {
        return Err(CoreError::InvalidQuantity { quantity: delta });
    }
    Ok(if delta < 0 { WRITE_OFF_FLOOR } else { EMPTY_FLOOR })
}

/// Checks a sale quantity and returns the (negative) delta to record.
pub fn sale_delta(quantity: i64) -> CoreResult<i64> {
    if quantity <= 0 {
        return Err(CoreError::InvalidQuantity { quantity });
    }
    Ok(-quantity)
}

/// Applies `delta` to `current`, enforcing `floor` and `ceiling`.
///
/// Used for building the error once the conditional update reports no row.
/// Going under the floor is `InsufficientStock`; going over the ceiling is
/// `InvalidQuantity`.
///
/// ## Example
/// ```rust
/// use perk_core::stock::{apply_delta, NO_CEILING, STOCK_CEILING};
///
/// assert_eq!(apply_delta("p", 10, -7, 0, NO_CEILING).unwrap(), 3);
/// assert!(apply_delta("p", 3, -5, 0, NO_CEILING).is_err());
/// assert!(apply_delta("p", STOCK_CEILING, 1, 0, STOCK_CEILING).is_err());
/// ```
pub fn apply_delta(
    product_id: &str,
    current: i64,
    delta: i64,
    floor: i64,
    ceiling: i64,
) -> CoreResult<i64> {
    match current.checked_add(delta) {
        Some(next) if next < floor => Err(insufficient(product_id, -delta, current)),
        Some(next) if next <= ceiling => Ok(next),
        _ => Err(CoreError::InvalidQuantity { quantity: delta }),
    }
}

/// Builds an `InsufficientStock` error.
pub fn insufficient(product_id: &str, requested: i64, available: i64) -> CoreError {
    CoreError::InsufficientStock {
        product_id: product_id.to_string(),
        requested,
        available,
    }
}

/// Quantity implied by a movement log.
pub fn replay<'a, I>(movements: I) -> i64
where
    I: IntoIterator<Item = &'a StockMovement>,
{
    movements.into_iter().map(|m| m.delta).sum()
}

/// Compensating `(product_id, delta)` pairs for a sale's SALE movements.
///
/// Every entry reverses exactly one original movement.
pub fn restore_plan(sale_movements: &[StockMovement]) -> Vec<(String, i64)> {
    sale_movements
        .iter()
        .map(|m| (m.product_id.clone(), -m.delta))
        .collect()
}

// =============================================================================
// Unit Tests
// =============================================================================
