//! # Database Error Types
//!
//! Error types for database operations and for the services built on them.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Propagation                                    │
//! │                                                                         │
//! │  SQLite Error (sqlx::Error)            Business rule (CoreError)       │
//! │       │                                       │                         │
//! │       ▼                                       │                         │
//! │  DbError (this module)                        │                         │
//! │       │                                       │                         │
//! │       └──────────────┬────────────────────────┘                         │
//! │                      ▼                                                  │
//! │  ServiceError ← returned by InventoryLedger / SaleCoordinator          │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  API route maps it to a status code and message                        │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use perk_core::{CoreError, ValidationError};
use thiserror::Error;

/// Database operation errors.
///
/// These errors wrap sqlx errors and provide additional context
/// for debugging and user feedback.
#[derive(Debug, Error)]
pub enum DbError {
    /// Entity not found in database.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Unique constraint violation.
    ///
    /// ## When This Occurs
    /// - Duplicate SKU within a business
    /// - A second SALE or VOID_RESTORE movement for the same sale and product
    #[error("Duplicate {field}: '{value}' already exists")]
    UniqueViolation { field: String, value: String },

    /// Foreign key constraint violation.
    #[error("Foreign key violation: {message}")]
    ForeignKeyViolation { message: String },

    /// A CHECK constraint or trigger rejected the write.
    ///
    /// ## When This Occurs
    /// - `quantity >= 0` would be broken (bypassing the ledger)
    /// - Updating or deleting a stock movement
    /// - Changing the status of a voided sale
    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    /// Database connection failed.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Migration failed.
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// Query execution failed.
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Pool exhausted (all connections in use).
    #[error("Connection pool exhausted")]
    PoolExhausted,

    /// A stored value could not be turned back into a domain type.
    #[error("Corrupt row: {0}")]
    CorruptRow(String),

    /// Internal database error.
    #[error("Internal database error: {0}")]
    Internal(String),
}

impl DbError {
    /// Creates a UniqueViolation error.
    pub fn duplicate(field: impl Into<String>, value: impl Into<String>) -> Self {
        DbError::UniqueViolation {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Whether this is a UNIQUE violation on the given `table.column` list.
    pub fn is_unique_violation_on(&self, columns: &str) -> bool {
        matches!(self, DbError::UniqueViolation { field, .. } if field.contains(columns))
    }
}

/// Convert sqlx errors to DbError.
///
/// ## Error Mapping
/// ```text
/// sqlx::Error::RowNotFound    → DbError::NotFound
/// sqlx::Error::Database       → Analyze message for constraint type
/// sqlx::Error::PoolTimedOut   → DbError::PoolExhausted
/// Other                       → DbError::Internal
/// ```
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DbError::NotFound {
                entity: "Record".to_string(),
                id: "unknown".to_string(),
            },

            sqlx::Error::Database(db_err) => {
                let msg = db_err.message();

                // "UNIQUE constraint failed: <table>.<column>, <table>.<column>"
                if msg.contains("UNIQUE constraint failed") {
                    let field = msg
                        .split("UNIQUE constraint failed: ")
                        .nth(1)
                        .unwrap_or("unknown")
                        .to_string();
                    DbError::UniqueViolation {
                        field,
                        value: "unknown".to_string(),
                    }
                } else if msg.contains("FOREIGN KEY constraint failed") {
                    DbError::ForeignKeyViolation {
                        message: msg.to_string(),
                    }
                } else if msg.contains("CHECK constraint failed")
                    || msg.contains("append-only")
                    || msg.contains("immutable")
                    || msg.contains("cannot")
                {
                    DbError::ConstraintViolation(msg.to_string())
                } else {
                    DbError::QueryFailed(msg.to_string())
                }
            }

            sqlx::Error::PoolTimedOut => DbError::PoolExhausted,

            sqlx::Error::PoolClosed => DbError::ConnectionFailed("Pool is closed".to_string()),

            sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => {
                DbError::CorruptRow(err.to_string())
            }

            _ => DbError::Internal(err.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::MigrationFailed(err.to_string())
    }
}

/// Result type for database operations.
pub type DbResult<T> = Result<T, DbError>;

// =============================================================================
// Service Error
// =============================================================================

/// Error returned by the ledger and sale services.
///
/// Business outcomes (`InsufficientStock`, `AlreadyVoided`, ...) arrive as
/// `Core`; storage failures arrive as `Db`.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Db(#[from] DbError),
}

impl ServiceError {
    /// The business error, if this is one.
    pub fn as_core(&self) -> Option<&CoreError> {
        match self {
            ServiceError::Core(err) => Some(err),
            ServiceError::Db(_) => None,
        }
    }
}

impl From<sqlx::Error> for ServiceError {
    fn from(err: sqlx::Error) -> Self {
        ServiceError::Db(err.into())
    }
}

impl From<ValidationError> for ServiceError {
    fn from(err: ValidationError) -> Self {
        ServiceError::Core(err.into())
    }
}

/// Result type for service operations.
pub type ServiceResult<T> = Result<T, ServiceError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_errors_map() {
        assert!(matches!(
            DbError::from(sqlx::Error::PoolTimedOut),
            DbError::PoolExhausted
        ));
        assert!(matches!(
            DbError::from(sqlx::Error::RowNotFound),
            DbError::NotFound { .. }
        ));
    }

    #[test]
    fn test_unique_violation_match() {
        let err = DbError::duplicate(
            "stock_movements.sale_id, stock_movements.product_id, stock_movements.reason",
            "unknown",
        );
        assert!(err.is_unique_violation_on("stock_movements.sale_id"));
        assert!(!err.is_unique_violation_on("products.sku"));
    }

    #[test]
    fn test_service_error_wraps_both_layers() {
        let err: ServiceError = CoreError::not_found("Sale", "s-1").into();
        assert!(matches!(err.as_core(), Some(CoreError::NotFound { .. })));
        assert_eq!(err.to_string(), "Sale not found: s-1");

        let err: ServiceError = DbError::PoolExhausted.into();
        assert!(err.as_core().is_none());
    }
}
