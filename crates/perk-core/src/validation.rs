//! # Validation Module
//!
//! Input validation for owner and terminal requests.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: API route                                                    │
//! │  └── Shape checks (deserialization)                                    │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE                                                  │
//! │  └── Business rule validation, before any stock is touched             │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── CHECK (quantity >= 0), CHECK (delta <> 0)                         │
//! │  ├── UNIQUE (business_id, sku)                                         │
//! │  └── Append-only triggers on stock_movements                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::pricing::validate_discount;
use crate::types::{NewProduct, NewSale};
use crate::{MAX_CART_ITEMS, MAX_ITEM_QUANTITY, MAX_STOCK_QUANTITY};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// String Validators
// =============================================================================

/// Validates a product name (1-200 characters after trimming).
///
/// ## Example
/// ```rust
/// use perk_core::validation::validate_product_name;
///
/// assert!(validate_product_name("Flat White").is_ok());
/// assert!(validate_product_name("  ").is_err());
/// ```
pub fn validate_product_name(name: &str) -> ValidationResult<()> {
    let name = name.trim();

    if name.is_empty() {
        return Err(ValidationError::Required {
            field: "name".to_string(),
        });
    }

    if name.chars().count() > 200 {
        return Err(ValidationError::TooLong {
            field: "name".to_string(),
            max: 200,
        });
    }

    Ok(())
}

/// Validates a SKU: 1-50 letters, digits, hyphens, underscores.
pub fn validate_sku(sku: &str) -> ValidationResult<()> {
    let sku = sku.trim();

    if sku.is_empty() {
        return Err(ValidationError::Required {
            field: "sku".to_string(),
        });
    }

    if sku.len() > 50 {
        return Err(ValidationError::TooLong {
            field: "sku".to_string(),
            max: 50,
        });
    }

    if !sku
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ValidationError::InvalidFormat {
            field: "sku".to_string(),
            reason: "must contain only letters, numbers, hyphens, and underscores".to_string(),
        });
    }

    Ok(())
}

/// Validates a free-form reason or note (at most 500 characters).
pub fn validate_note(field: &str, note: &str) -> ValidationResult<()> {
    if note.chars().count() > 500 {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: 500,
        });
    }
    Ok(())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a price in cents (zero allowed: free items).
pub fn validate_price_cents(cents: i64) -> ValidationResult<()> {
    if cents < 0 {
        return Err(ValidationError::Negative {
            field: "price".to_string(),
        });
    }
    Ok(())
}

/// Validates a non-negative stock count (threshold, opening stock).
pub fn validate_stock_count(field: &str, count: i64) -> ValidationResult<()> {
    if count < 0 {
        return Err(ValidationError::Negative {
            field: field.to_string(),
        });
    }
    if count > MAX_STOCK_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0,
            max: MAX_STOCK_QUANTITY,
        });
    }
    Ok(())
}

// =============================================================================
// Request Validators
// =============================================================================

/// Validates an owner's new product.
pub fn validate_new_product(product: &NewProduct) -> ValidationResult<()> {
    validate_product_name(&product.name)?;
    if let Some(sku) = &product.sku {
        validate_sku(sku)?;
    }
    validate_price_cents(product.price_cents)?;
    validate_stock_count("initial_quantity", product.initial_quantity)?;
    validate_stock_count("low_stock_threshold", product.low_stock_threshold)?;
    Ok(())
}

/// Validates a cart before any stock is taken.
///
/// ## Rules
/// ```text
/// no items / > MAX_CART_ITEMS lines / empty product id  → InvalidInput
/// quantity ≤ 0                                          → InvalidQuantity
/// quantity > MAX_ITEM_QUANTITY                          → Validation(OutOfRange)
/// negative flat or > 100% discount                      → InvalidInput
/// ```
pub fn validate_new_sale(sale: &NewSale) -> CoreResult<()> {
    if sale.items.is_empty() {
        return Err(CoreError::invalid_input("sale has no items"));
    }

    if sale.items.len() > MAX_CART_ITEMS {
        return Err(CoreError::invalid_input(format!(
            "sale has {} items, at most {} allowed",
            sale.items.len(),
            MAX_CART_ITEMS
        )));
    }

    for line in &sale.items {
        if line.product_id.trim().is_empty() {
            return Err(CoreError::invalid_input("line item has no product id"));
        }
        if line.quantity <= 0 {
            return Err(CoreError::InvalidQuantity {
                quantity: line.quantity,
            });
        }
        if line.quantity > MAX_ITEM_QUANTITY {
            return Err(ValidationError::OutOfRange {
                field: "quantity".to_string(),
                min: 1,
                max: MAX_ITEM_QUANTITY,
            }
            .into());
        }
    }

    if let Some(discount) = &sale.discount {
        validate_discount(discount)?;
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Discount, PaymentMethod, SaleLine};

    fn cart(items: Vec<SaleLine>) -> NewSale {
        NewSale {
            items,
            payment_method: PaymentMethod::Card,
            discount: None,
        }
    }

    #[test]
    fn test_validate_product_name() {
        assert!(validate_product_name("Cold Brew 500ml").is_ok());
        assert!(validate_product_name("").is_err());
        assert!(validate_product_name(&"A".repeat(201)).is_err());
    }

    #[test]
    fn test_validate_sku() {
        assert!(validate_sku("BEAN-250G").is_ok());
        assert!(validate_sku("has space").is_err());
        assert!(validate_sku(&"A".repeat(51)).is_err());
    }

    #[test]
    fn test_validate_new_product() {
        let mut product = NewProduct {
            name: "Croissant".into(),
            sku: Some("CRS-1".into()),
            price_cents: 325,
            initial_quantity: 12,
            low_stock_threshold: 4,
        };
        assert!(validate_new_product(&product).is_ok());

        product.price_cents = -1;
        assert!(validate_new_product(&product).is_err());

        product.price_cents = 325;
        product.low_stock_threshold = -1;
        assert!(validate_new_product(&product).is_err());

        product.low_stock_threshold = 4;
        product.initial_quantity = MAX_STOCK_QUANTITY + 1;
        assert!(matches!(
            validate_new_product(&product),
            Err(ValidationError::OutOfRange { .. })
        ));
    }

    #[test]
    fn test_empty_cart_is_invalid_input() {
        assert!(matches!(
            validate_new_sale(&cart(vec![])),
            Err(CoreError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_non_positive_quantity_is_invalid_quantity() {
        assert!(matches!(
            validate_new_sale(&cart(vec![SaleLine::new("p", 0)])),
            Err(CoreError::InvalidQuantity { quantity: 0 })
        ));
        assert!(matches!(
            validate_new_sale(&cart(vec![SaleLine::new("p", 1), SaleLine::new("q", -2)])),
            Err(CoreError::InvalidQuantity { quantity: -2 })
        ));
    }

    #[test]
    fn test_oversized_cart_and_quantity() {
        let lines = (0..=MAX_CART_ITEMS)
            .map(|i| SaleLine::new(format!("p{i}"), 1))
            .collect();
        assert!(matches!(
            validate_new_sale(&cart(lines)),
            Err(CoreError::InvalidInput(_))
        ));
        assert!(matches!(
            validate_new_sale(&cart(vec![SaleLine::new("p", MAX_ITEM_QUANTITY + 1)])),
            Err(CoreError::Validation(ValidationError::OutOfRange { .. }))
        ));
    }

    #[test]
    fn test_discount_checked_with_cart() {
        let mut sale = cart(vec![SaleLine::new("p", 1)]);
        sale.discount = Some(Discount::Percentage { bps: 20_000 });
        assert!(matches!(
            validate_new_sale(&sale),
            Err(CoreError::InvalidInput(_))
        ));
    }
}
