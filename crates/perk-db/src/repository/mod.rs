//! # Repository Module
//!
//! SQL statements for Perk POS, one module per table group.
//!
//! ## Statement Layer
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  InventoryLedger / SaleCoordinator                                     │
//! │       │                                                                 │
//! │       │  let mut tx = pool.begin().await?;                             │
//! │       │  product::apply_delta(&mut tx, ...)                            │
//! │       │  movement::insert(&mut tx, ...)                                │
//! │       │  sale::insert(&mut tx, ...)                                    │
//! │       │  tx.commit().await?;                                           │
//! │       ▼                                                                 │
//! │  repository functions (&mut SqliteConnection)                          │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite                                                                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Functions here take a connection rather than the pool, so the services
//! decide transaction boundaries and several statements can share one
//! transaction. Every statement is scoped by `business_id`.
//!
//! - [`product`] - Products and the atomic stock update
//! - [`movement`] - Append-only stock movements
//! - [`sale`] - Sales and their line items

pub mod movement;
pub mod product;
pub mod sale;
