//! # perk-db: Database Layer for Perk POS
//!
//! SQLite storage for the inventory ledger and the sale coordinator, using
//! sqlx for async access.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Perk POS Data Flow                               │
//! │                                                                         │
//! │  API route (POST /sales, POST /sales/:id/void, PATCH /stock ...)       │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     perk-db (THIS CRATE)                        │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │   Services    │    │  Repositories │    │  Migrations  │  │   │
//! │  │   │               │    │               │    │  (embedded)  │  │   │
//! │  │   │ SaleCoordinator──► │ product.rs    │    │              │  │   │
//! │  │   │ InventoryLedger──► │ movement.rs   │    │ 001_...sql   │  │   │
//! │  │   │               │    │ sale.rs       │    │              │  │   │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘  │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     SQLite Database (WAL)                       │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`config`] - Pool configuration and environment loading
//! - [`pool`] - Connection pool and the [`Database`] handle
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database and service error types
//! - [`repository`] - SQL statements per table group
//! - [`ledger`] - Inventory ledger service
//! - [`coordinator`] - Sale transaction coordinator
//!
//! ## Usage
//!
//! ```rust,ignore
//! use perk_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::from_env()?).await?;
//!
//! let sale = db.sales().create_sale(&business_id, cart).await?;
//! let low = db.ledger().low_stock(&business_id, None).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod coordinator;
pub mod error;
pub mod ledger;
pub mod migrations;
pub mod pool;
pub mod repository;

#[cfg(test)]
mod test_support;

// =============================================================================
// Re-exports
// =============================================================================

pub use config::{ConfigError, DbConfig};
pub use coordinator::SaleCoordinator;
pub use error::{DbError, DbResult, ServiceError, ServiceResult};
pub use ledger::InventoryLedger;
pub use pool::Database;
