//! # Domain Types
//!
//! Core domain types used throughout Perk POS.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Product      │◄──│ StockMovement   │   │      Sale       │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id, business   │   │  product_id     │   │  id, business   │       │
//! │  │  price_cents    │   │  delta (±)      │──►│  status         │       │
//! │  │  quantity ≥ 0   │   │  reason         │   │  items (owned)  │       │
//! │  │  threshold      │   │  sale_id?       │   │  totals         │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! │                                                                         │
//! │  Product.quantity == Σ StockMovement.delta (append-only log)            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every persisted entity carries the `business_id` of the tenant that owns
//! it. References between entities are by id only.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use ts_rs::TS;

// =============================================================================
// Product
// =============================================================================

/// A product a business sells and stocks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Product {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Business (tenant) this product belongs to.
    pub business_id: String,

    /// Optional stock keeping unit, unique per business.
    pub sku: Option<String>,

    /// Display name shown at the terminal and on receipts.
    pub name: String,

    /// Current unit price in cents.
    pub price_cents: i64,

    /// Units on hand. Never negative.
    pub quantity: i64,

    /// Low-stock alert level: the product is low when `quantity <= low_stock_threshold`.
    pub low_stock_threshold: i64,

    /// Soft-delete flag. Inactive products cannot be sold.
    pub is_active: bool,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,

    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Whether the product is at or under a threshold (its own if `None`).
    pub fn is_low_stock(&self, threshold_override: Option<i64>) -> bool {
        self.quantity <= threshold_override.unwrap_or(self.low_stock_threshold)
    }
}

/// Owner input for creating a product.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct NewProduct {
    pub name: String,
    pub sku: Option<String>,
    pub price_cents: i64,
    /// Opening stock, recorded as a RECEIVE movement when positive.
    #[serde(default)]
    pub initial_quantity: i64,
    #[serde(default)]
    pub low_stock_threshold: i64,
}

// =============================================================================
// Stock Movement
// =============================================================================

/// Why a product's quantity changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum MovementReason {
    /// Goods received from a supplier.
    Receive,
    /// Manual correction (shrinkage, count fix).
    Adjust,
    /// Consumed by a completed sale.
    Sale,
    /// Compensates a SALE movement when the sale is voided.
    VoidRestore,
}

impl MovementReason {
    /// Database/wire spelling.
    pub const fn as_str(&self) -> &'static str {
        match self {
            MovementReason::Receive => "receive",
            MovementReason::Adjust => "adjust",
            MovementReason::Sale => "sale",
            MovementReason::VoidRestore => "void_restore",
        }
    }
}

impl fmt::Display for MovementReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One immutable entry in the stock ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct StockMovement {
    pub id: String,
    pub business_id: String,
    pub product_id: String,
    /// Signed, never zero.
    pub delta: i64,
    pub reason: MovementReason,
    /// Sale that caused the movement (SALE / VOID_RESTORE only).
    pub sale_id: Option<String>,
    /// Free-form note (receipt reference, adjustment reason).
    pub note: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

/// A product whose stored quantity disagrees with its movement log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct LedgerDrift {
    pub product_id: String,
    pub stored_quantity: i64,
    pub ledger_quantity: i64,
}

// =============================================================================
// Sale Status
// =============================================================================

/// The status of a persisted sale.
///
/// ```text
/// (pending) ──► Completed ──► Voided
///     │
///     └──► (aborted: nothing persisted)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum SaleStatus {
    /// Paid and stock deducted.
    Completed,
    /// Reversed; stock restored. Terminal.
    Voided,
}

// =============================================================================
// Payment Method
// =============================================================================

#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    /// Card on an external terminal.
    Card,
    /// Wallet / bank transfer / QR payment.
    Digital,
}

// =============================================================================
// Discount
// =============================================================================

/// Sale-level discount requested at the terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Discount {
    None,
    /// Fixed amount off; clamped to the subtotal.
    Flat { amount_cents: i64 },
    /// Percentage off in basis points (1000 = 10%), at most 10000.
    Percentage { bps: u32 },
}

impl Default for Discount {
    fn default() -> Self {
        Discount::None
    }
}

impl Discount {
    /// Storage discriminator.
    pub const fn kind(&self) -> &'static str {
        match self {
            Discount::None => "none",
            Discount::Flat { .. } => "flat",
            Discount::Percentage { .. } => "percentage",
        }
    }

    /// Storage value (cents for flat, bps for percentage).
    pub fn value(&self) -> i64 {
        match self {
            Discount::None => 0,
            Discount::Flat { amount_cents } => *amount_cents,
            Discount::Percentage { bps } => i64::from(*bps),
        }
    }

    /// Rebuilds a discount from its stored `(kind, value)` pair.
    pub fn from_parts(kind: &str, value: i64) -> Option<Self> {
        match kind {
            "none" => Some(Discount::None),
            "flat" => Some(Discount::Flat {
                amount_cents: value,
            }),
            "percentage" => u32::try_from(value)
                .ok()
                .map(|bps| Discount::Percentage { bps }),
            _ => None,
        }
    }
}

// =============================================================================
// Sale Requests
// =============================================================================

/// One cart line as submitted by the terminal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct SaleLine {
    pub product_id: String,
    pub quantity: i64,
}

impl SaleLine {
    pub fn new(product_id: impl Into<String>, quantity: i64) -> Self {
        SaleLine {
            product_id: product_id.into(),
            quantity,
        }
    }
}

/// A cart submitted for checkout.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct NewSale {
    pub items: Vec<SaleLine>,
    pub payment_method: PaymentMethod,
    #[serde(default)]
    pub discount: Option<Discount>,
}

// =============================================================================
// Sale
// =============================================================================

/// A persisted sale with its line items.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Sale {
    pub id: String,
    pub business_id: String,
    pub status: SaleStatus,
    pub payment_method: PaymentMethod,
    /// Discount as requested.
    pub discount: Discount,
    pub subtotal_cents: i64,
    /// Discount actually applied, within `[0, subtotal_cents]`.
    pub discount_cents: i64,
    /// `subtotal_cents - discount_cents`.
    pub total_cents: i64,
    pub items: Vec<SaleItem>,
    pub void_reason: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "Option<String>")]
    pub voided_at: Option<DateTime<Utc>>,
}

impl Sale {
    #[inline]
    pub fn is_voided(&self) -> bool {
        self.status == SaleStatus::Voided
    }
}

// =============================================================================
// Sale Item
// =============================================================================

/// A line item in a sale.
/// Uses the snapshot pattern: name and unit price are frozen at sale time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct SaleItem {
    pub id: String,
    pub sale_id: String,
    pub product_id: String,
    /// Product name at time of sale (frozen).
    pub name_snapshot: String,
    pub quantity: i64,
    /// Unit price in cents at time of sale (frozen).
    pub unit_price_cents: i64,
    /// unit_price × quantity.
    pub line_total_cents: i64,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_discount_parts_roundtrip_for_each_kind() {
        for discount in [
            Discount::None,
            Discount::Flat { amount_cents: 250 },
            Discount::Percentage { bps: 1500 },
        ] {
            let rebuilt = Discount::from_parts(discount.kind(), discount.value());
            assert_eq!(rebuilt, Some(discount));
        }
        assert_eq!(Discount::from_parts("bogus", 1), None);
        assert_eq!(Discount::from_parts("percentage", -1), None);
    }

    #[test]
    fn test_discount_json_shape() {
        let json = serde_json::to_value(Discount::Percentage { bps: 500 }).unwrap();
        assert_eq!(json, serde_json::json!({ "kind": "percentage", "bps": 500 }));

        let parsed: Discount = serde_json::from_str(r#"{"kind":"flat","amount_cents":100}"#).unwrap();
        assert_eq!(parsed, Discount::Flat { amount_cents: 100 });
    }

    #[test]
    fn test_new_sale_deserializes_without_discount() {
        let json = r#"{"items":[{"productId":"p1","quantity":2}],"paymentMethod":"cash"}"#;
        let sale: NewSale = serde_json::from_str(json).unwrap();
        assert_eq!(sale.items, vec![SaleLine::new("p1", 2)]);
        assert_eq!(sale.payment_method, PaymentMethod::Cash);
        assert!(sale.discount.is_none());
    }

    #[test]
    fn test_movement_reason_spelling() {
        assert_eq!(MovementReason::VoidRestore.to_string(), "void_restore");
        assert_eq!(
            serde_json::to_string(&MovementReason::Receive).unwrap(),
            "\"receive\""
        );
    }

    #[test]
    fn test_low_stock_check() {
        let now = Utc::now();
        let product = Product {
            id: "p".into(),
            business_id: "b".into(),
            sku: None,
            name: "Oat Milk".into(),
            price_cents: 450,
            quantity: 3,
            low_stock_threshold: 5,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        assert!(product.is_low_stock(None));
        assert!(!product.is_low_stock(Some(2)));
        assert!(product.is_low_stock(Some(3)));
    }
}
