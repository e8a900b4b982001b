//! # perk-core: Pure Business Logic for Perk POS
//!
//! Stock rules, sale pricing, and loyalty card tokens as pure functions with
//! zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Perk POS Architecture                            │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │         API routes (owner dashboard, staff terminal)            │   │
//! │  │    create_sale, void_sale, receive_stock, scan_card, ...        │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ perk-core (THIS CRATE) ★                        │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   types   │  │  pricing  │  │   stock   │  │card_token │  │   │
//! │  │   │  Product  │  │ Discount  │  │  deltas   │  │ HMAC sign │  │   │
//! │  │   │   Sale    │  │  Totals   │  │  floors   │  │  verify   │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • NO CLOCK                  │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    perk-db (Database Layer)                     │   │
//! │  │        Inventory ledger, sale coordinator, migrations           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Product, StockMovement, Sale, ...)
//! - [`money`] - Money type with integer arithmetic (no floating point!)
//! - [`pricing`] - Line totals, discounts, sale totals
//! - [`stock`] - Stock mutation rules shared by every ledger operation
//! - [`card_token`] - Signed loyalty card tokens for QR scanning
//! - [`error`] - Domain error types
//! - [`validation`] - Input validation
//!
//! ## Example Usage
//!
//! ```rust
//! use perk_core::pricing::compute_totals;
//! use perk_core::Discount;
//!
//! // Two coffees at $3.50 and one muffin at $2.25, 10% off
//! let totals = compute_totals([(350, 2), (225, 1)], &Discount::Percentage { bps: 1000 }).unwrap();
//!
//! assert_eq!(totals.subtotal.cents(), 925);
//! assert_eq!(totals.discount.cents(), 93);
//! assert_eq!(totals.total.cents(), 832);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod card_token;
pub mod error;
pub mod money;
pub mod pricing;
pub mod stock;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use card_token::{CardClaims, CardTokenError, CardTokenSigner};
pub use error::{CoreError, CoreResult, ValidationError};
pub use money::Money;
pub use pricing::SaleTotals;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum line items allowed in a single sale.
///
/// ## Business Reason
/// Prevents runaway carts and keeps one sale inside one short transaction.
pub const MAX_CART_ITEMS: usize = 100;

/// Maximum quantity of a single line item.
///
/// ## Business Reason
/// Catches fat-finger entries at the terminal (1000 typed instead of 10).
pub const MAX_ITEM_QUANTITY: i64 = 999;

/// Largest quantity a product may hold, and the largest single receive or
/// adjustment.
///
/// ## Business Reason
/// Keeps every stock sum far from i64 overflow, which SQLite would silently
/// turn into a REAL.
pub const MAX_STOCK_QUANTITY: i64 = 1_000_000_000;

/// Basis points in 100%.
pub const FULL_PERCENT_BPS: u32 = 10_000;
