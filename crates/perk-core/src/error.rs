//! # Error Types
//!
//! Domain-specific error types for perk-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  perk-core errors (this file)                                          │
//! │  ├── CoreError        - Business rule violations                       │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  perk-db errors (separate crate)                                       │
//! │  ├── DbError          - Database operation failures                    │
//! │  └── ServiceError     - CoreError | DbError, returned by services      │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → ServiceError → API route          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Validation and not-found errors are raised before any stock is touched.
//! `InsufficientStock` can also surface mid-sale, after which the sale's
//! already-applied decrements are rolled back.

use thiserror::Error;

use crate::card_token::CardTokenError;

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Entity does not exist, is inactive where an active one is required,
    /// or belongs to another business.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Malformed request shape (empty cart, bad discount, ...).
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Non-positive quantity where a positive one is required, or a zero delta.
    #[error("Invalid quantity: {quantity}")]
    InvalidQuantity { quantity: i64 },

    /// Not enough stock to apply the requested decrement.
    ///
    /// ## User Workflow
    /// ```text
    /// Cart: Latte Beans × 5
    ///      │
    ///      ▼
    /// decrement: available=3
    ///      │
    ///      ▼
    /// InsufficientStock { product_id, requested: 5, available: 3 }
    ///      │
    ///      ▼
    /// Terminal shows: "Only 3 left", nothing was charged or deducted
    /// ```
    #[error("Insufficient stock for product {product_id}: requested {requested}, available {available}")]
    InsufficientStock {
        product_id: String,
        requested: i64,
        available: i64,
    },

    /// Sale was already voided; voiding is one-way.
    #[error("Sale {0} is already voided")]
    AlreadyVoided(String),

    /// Stock for this sale has already been restored.
    #[error("Stock for sale {0} was already restored")]
    AlreadyRestored(String),

    /// Stock restoration failed, so the void was not committed.
    #[error("Void of sale {sale_id} failed: {reason}")]
    VoidFailed { sale_id: String, reason: String },

    /// Rolling back a partially applied sale failed. Stock may be
    /// inconsistent and needs operator attention.
    #[error("Compensation for sale {sale_id} failed: {reason}")]
    CompensationFailed { sale_id: String, reason: String },

    /// Loyalty card token rejected.
    #[error("Card token rejected: {0}")]
    CardToken(#[from] CardTokenError),

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl CoreError {
    /// Creates a NotFound error for a given entity type and ID.
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        CoreError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Creates an InvalidInput error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        CoreError::InvalidInput(message.into())
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// Used for early validation before business logic runs.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must not be negative.
    #[error("{field} must not be negative")]
    Negative { field: String },

    /// Invalid format (e.g., invalid UUID).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insufficient_stock_message() {
        let err = CoreError::InsufficientStock {
            product_id: "p-1".to_string(),
            requested: 5,
            available: 3,
        };
        assert_eq!(
            err.to_string(),
            "Insufficient stock for product p-1: requested 5, available 3"
        );
    }

    #[test]
    fn test_validation_error_messages() {
        let err = ValidationError::Required {
            field: "name".to_string(),
        };
        assert_eq!(err.to_string(), "name is required");

        let err = ValidationError::Negative {
            field: "price".to_string(),
        };
        assert_eq!(err.to_string(), "price must not be negative");
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let validation_err = ValidationError::Required {
            field: "name".to_string(),
        };
        let core_err: CoreError = validation_err.into();
        assert!(matches!(core_err, CoreError::Validation(_)));
    }

    #[test]
    fn test_not_found_helper() {
        let err = CoreError::not_found("Sale", "s-9");
        assert_eq!(err.to_string(), "Sale not found: s-9");
    }
}
