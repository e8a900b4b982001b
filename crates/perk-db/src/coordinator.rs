//! # Sale Transaction Coordinator
//!
//! Turns a terminal's cart into a completed sale, all or nothing, and voids
//! sales by restoring their stock.
//!
//! ## Checkout Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       create_sale(business, cart)                       │
//! │                                                                         │
//! │  validate cart ──► merge lines per product ──► BEGIN                   │
//! │                                                 │                       │
//! │        ┌────────────────────────────────────────┘                       │
//! │        ▼                                                                │
//! │  for product in ascending id order:                                    │
//! │      take stock (conditional update + SALE movement)                   │
//! │      capture price and name ── fails? ──► ROLLBACK ──► error           │
//! │        │                                                                │
//! │        ▼                                                                │
//! │  subtotal, clamp discount, total                                       │
//! │        │                                                                │
//! │        ▼                                                                │
//! │  INSERT sale (COMPLETED) + items ──► COMMIT ──► Sale                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Taking stock in ascending product-id order gives every sale the same lock
//! order. If the caller drops the future before commit, the open transaction
//! is dropped with it and SQLite rolls it back.
//!
//! ## Void Flow
//! ```text
//! BEGIN ──► UPDATE sales SET status='voided' WHERE status='completed'
//!              │ no row ──► NotFound / AlreadyVoided
//!              ▼
//!           VOID_RESTORE movement per SALE movement
//!              │ fails ──► ROLLBACK ──► VoidFailed (sale stays COMPLETED)
//!              ▼
//!           COMMIT
//! ```

use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Utc};
use sqlx::{Sqlite, SqliteConnection, SqlitePool, Transaction};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::error::{ServiceError, ServiceResult};
use crate::ledger::{require_business, restore_sale, take_for_sale};
use crate::repository::product::StockLevel;
use crate::repository::sale as sale_repo;
use perk_core::pricing::{compute_totals, demand_by_product, line_total};
use perk_core::validation::{validate_new_sale, validate_note};
use perk_core::{CoreError, NewSale, Sale, SaleItem, SaleLine, SaleStatus};

/// Largest page returned by [`SaleCoordinator::list_sales`].
pub const MAX_SALES_PAGE: u32 = 500;

/// Sale transaction coordinator.
///
/// ## Usage
/// ```rust,ignore
/// let sales = db.sales();
/// let sale = sales.create_sale(&business_id, cart).await?;
/// let voided = sales.void_sale(&business_id, &sale.id, "customer returned").await?;
/// ```
#[derive(Debug, Clone)]
pub struct SaleCoordinator {
    pool: SqlitePool,
}

impl SaleCoordinator {
    /// Creates a new SaleCoordinator.
    pub fn new(pool: SqlitePool) -> Self {
        SaleCoordinator { pool }
    }

    /// Checks out a cart.
    ///
    /// ## Errors
    /// - `InvalidInput`: empty cart, too many lines, malformed discount
    /// - `InvalidQuantity`: a line with quantity <= 0
    /// - `NotFound`: a product is missing, inactive, or another business's
    /// - `InsufficientStock`: a product can't cover its line
    /// - `CompensationFailed`: the rollback after one of the above failed
    ///
    /// On any error no sale exists and no stock has moved.
    pub async fn create_sale(&self, business_id: &str, new_sale: NewSale) -> ServiceResult<Sale> {
        require_business(business_id)?;
        validate_new_sale(&new_sale)?;

        let demand = demand_by_product(&new_sale.items)?;
        let sale_id = Uuid::new_v4().to_string();
        let now = Utc::now();

        debug!(
            business_id = %business_id,
            sale_id = %sale_id,
            lines = new_sale.items.len(),
            products = demand.len(),
            "Starting sale"
        );

        let mut tx = self.pool.begin().await?;

        let built = build_sale(&mut tx, business_id, &sale_id, &new_sale, &demand, now).await;
        match built {
            Ok(sale) => {
                tx.commit().await?;
                info!(
                    business_id = %business_id,
                    sale_id = %sale.id,
                    total_cents = sale.total_cents,
                    items = sale.items.len(),
                    "Sale completed"
                );
                Ok(sale)
            }
            Err(cause) => Err(abort(tx, &sale_id, cause).await),
        }
    }

    /// Voids a completed sale and restores its stock in one transaction.
    ///
    /// ## Errors
    /// - `NotFound`: no such sale for this business
    /// - `AlreadyVoided`: the sale was voided before
    /// - `VoidFailed`: stock could not be restored; the sale stays COMPLETED
    pub async fn void_sale(
        &self,
        business_id: &str,
        sale_id: &str,
        reason: &str,
    ) -> ServiceResult<Sale> {
        validate_note("void_reason", reason)?;
        let now = Utc::now();

        let mut tx = self.pool.begin().await?;

        if !sale_repo::mark_voided(&mut tx, business_id, sale_id, reason, now).await? {
            let status = sale_repo::status(&mut tx, business_id, sale_id).await?;
            tx.rollback().await?;
            return Err(match status {
                Some(SaleStatus::Voided) => CoreError::AlreadyVoided(sale_id.to_string()),
                _ => CoreError::not_found("Sale", sale_id),
            }
            .into());
        }

        let restored = restore_sale(&mut tx, business_id, sale_id, now).await;
        if let Err(cause) = restored {
            let failure: ServiceError = CoreError::VoidFailed {
                sale_id: sale_id.to_string(),
                reason: cause.to_string(),
            }
            .into();
            return Err(abort(tx, sale_id, failure).await);
        }

        let sale = sale_repo::find(&mut tx, business_id, sale_id)
            .await?
            .ok_or_else(|| CoreError::not_found("Sale", sale_id))?;
        tx.commit().await?;

        info!(
            business_id = %business_id,
            sale_id = %sale_id,
            reason = %reason,
            "Sale voided"
        );
        Ok(sale)
    }

    /// Gets a sale with its items.
    pub async fn get_sale(&self, business_id: &str, sale_id: &str) -> ServiceResult<Sale> {
        let mut conn = self.pool.acquire().await?;
        sale_repo::find(&mut conn, business_id, sale_id)
            .await?
            .ok_or_else(|| CoreError::not_found("Sale", sale_id).into())
    }

    /// Most recent sales first. `limit` is capped at [`MAX_SALES_PAGE`].
    pub async fn list_sales(&self, business_id: &str, limit: u32) -> ServiceResult<Vec<Sale>> {
        let mut conn = self.pool.acquire().await?;
        let sales = sale_repo::list_recent(&mut conn, business_id, limit.min(MAX_SALES_PAGE)).await?;
        Ok(sales)
    }
}

// =============================================================================
// Internals
// =============================================================================

/// Takes stock for every product, then writes the sale. Runs inside the
/// caller's transaction and commits nothing.
async fn build_sale(
    conn: &mut SqliteConnection,
    business_id: &str,
    sale_id: &str,
    new_sale: &NewSale,
    demand: &BTreeMap<String, i64>,
    now: DateTime<Utc>,
) -> ServiceResult<Sale> {
    let mut taken: BTreeMap<&str, StockLevel> = BTreeMap::new();
    for (product_id, quantity) in demand {
        let (_, level) = take_for_sale(conn, business_id, product_id, *quantity, sale_id, now).await?;
        taken.insert(product_id.as_str(), level);
    }

    let items = snapshot_items(sale_id, &new_sale.items, demand, &taken)?;
    let discount = new_sale.discount.unwrap_or_default();
    let totals = compute_totals(
        items.iter().map(|i| (i.unit_price_cents, i.quantity)),
        &discount,
    )?;

    let sale = Sale {
        id: sale_id.to_string(),
        business_id: business_id.to_string(),
        status: SaleStatus::Completed,
        payment_method: new_sale.payment_method,
        discount,
        subtotal_cents: totals.subtotal.cents(),
        discount_cents: totals.discount.cents(),
        total_cents: totals.total.cents(),
        items,
        void_reason: None,
        created_at: now,
        voided_at: None,
    };
    sale_repo::insert(conn, &sale).await?;

    Ok(sale)
}

/// One item per product, in the order products first appear in the cart,
/// priced and named as they were when the stock was taken.
fn snapshot_items(
    sale_id: &str,
    lines: &[SaleLine],
    demand: &BTreeMap<String, i64>,
    taken: &BTreeMap<&str, StockLevel>,
) -> ServiceResult<Vec<SaleItem>> {
    let mut seen = HashSet::new();
    let mut items = Vec::with_capacity(demand.len());

    for line in lines {
        if !seen.insert(line.product_id.as_str()) {
            continue;
        }
        let (Some(quantity), Some(level)) = (
            demand.get(&line.product_id),
            taken.get(line.product_id.as_str()),
        ) else {
            return Err(CoreError::not_found("Product", line.product_id.as_str()).into());
        };

        items.push(SaleItem {
            id: Uuid::new_v4().to_string(),
            sale_id: sale_id.to_string(),
            product_id: line.product_id.clone(),
            name_snapshot: level.name.clone(),
            quantity: *quantity,
            unit_price_cents: level.price_cents,
            line_total_cents: line_total(level.price_cents, *quantity)?.cents(),
        });
    }

    Ok(items)
}

/// Rolls back a failed sale or void and returns the error to report.
///
/// A failed rollback means the applied stock changes could not be undone,
/// which is reported as `CompensationFailed`.
async fn abort(tx: Transaction<'_, Sqlite>, sale_id: &str, cause: ServiceError) -> ServiceError {
    match tx.rollback().await {
        Ok(()) => {
            warn!(sale_id = %sale_id, error = %cause, "Sale transaction aborted, stock changes rolled back");
            cause
        }
        Err(rollback_err) => {
            error!(
                sale_id = %sale_id,
                error = %cause,
                rollback_error = %rollback_err,
                "Rollback failed, stock may be inconsistent"
            );
            CoreError::CompensationFailed {
                sale_id: sale_id.to_string(),
                reason: format!("{cause}; rollback failed: {rollback_err}"),
            }
            .into()
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::*;
    use perk_core::{Discount, MovementReason, PaymentMethod};

    fn core_err(err: ServiceError) -> CoreError {
        match err {
            ServiceError::Core(err) => err,
            ServiceError::Db(err) => panic!("expected a business error, got {err}"),
        }
    }

    #[tokio::test]
    async fn test_sell_low_stock_then_void() {
        let db = memory_db().await;
        let biz = business();
        let p = product(&db, &biz, "Latte Beans", 1800, 10, 5).await;

        let first = db.sales().create_sale(&biz, cart(&[(&p.id, 7)])).await.unwrap();
        assert_eq!(first.status, SaleStatus::Completed);
        assert_eq!(first.subtotal_cents, 7 * 1800);
        assert_eq!(quantity(&db, &biz, &p.id).await, 3);

        let low = db.ledger().low_stock(&biz, None).await.unwrap();
        assert_eq!(low.len(), 1);
        assert_eq!(low[0].id, p.id);

        let err = db
            .sales()
            .create_sale(&biz, cart(&[(&p.id, 5)]))
            .await
            .unwrap_err();
        assert!(matches!(
            core_err(err),
            CoreError::InsufficientStock {
                requested: 5,
                available: 3,
                ..
            }
        ));
        assert_eq!(quantity(&db, &biz, &p.id).await, 3);

        let voided = db
            .sales()
            .void_sale(&biz, &first.id, "wrong order")
            .await
            .unwrap();
        assert!(voided.is_voided());
        assert_eq!(voided.void_reason.as_deref(), Some("wrong order"));
        assert!(voided.voided_at.is_some());
        assert_eq!(quantity(&db, &biz, &p.id).await, 10);

        let err = db
            .sales()
            .void_sale(&biz, &first.id, "again")
            .await
            .unwrap_err();
        assert!(matches!(core_err(err), CoreError::AlreadyVoided(id) if id == first.id));
        assert_eq!(quantity(&db, &biz, &p.id).await, 10);

        assert_ledger_consistent(&db, &biz).await;
    }

    #[tokio::test]
    async fn test_failed_line_aborts_whole_sale() {
        let db = memory_db().await;
        let biz = business();
        let a = product(&db, &biz, "Americano", 350, 5, 0).await;
        let b = product(&db, &biz, "Brownie", 300, 1, 0).await;

        let err = db
            .sales()
            .create_sale(&biz, cart(&[(&a.id, 2), (&b.id, 3)]))
            .await
            .unwrap_err();
        assert!(matches!(
            core_err(err),
            CoreError::InsufficientStock { ref product_id, .. } if *product_id == b.id
        ));

        assert_eq!(quantity(&db, &biz, &a.id).await, 5);
        assert_eq!(quantity(&db, &biz, &b.id).await, 1);
        assert!(db.sales().list_sales(&biz, 10).await.unwrap().is_empty());
        for id in [&a.id, &b.id] {
            assert!(db
                .ledger()
                .movements(&biz, id)
                .await
                .unwrap()
                .iter()
                .all(|m| m.reason != MovementReason::Sale));
        }
        assert_ledger_consistent(&db, &biz).await;
    }

    #[tokio::test]
    async fn test_unknown_inactive_and_foreign_products() {
        let db = memory_db().await;
        let biz = business();
        let other = business();
        let ok = product(&db, &biz, "Water", 200, 10, 0).await;
        let retired = product(&db, &biz, "Retired Cake", 400, 10, 0).await;
        let foreign = product(&db, &other, "Their Cookie", 150, 10, 0).await;
        db.ledger().deactivate_product(&biz, &retired.id).await.unwrap();

        for missing in ["no-such-product", retired.id.as_str(), foreign.id.as_str()] {
            let err = db
                .sales()
                .create_sale(&biz, cart(&[(&ok.id, 1), (missing, 1)]))
                .await
                .unwrap_err();
            assert!(matches!(core_err(err), CoreError::NotFound { .. }));
        }

        assert_eq!(quantity(&db, &biz, &ok.id).await, 10);
        assert_eq!(quantity(&db, &other, &foreign.id).await, 10);
    }

    #[tokio::test]
    async fn test_invalid_carts_rejected_before_stock_moves() {
        let db = memory_db().await;
        let biz = business();
        let p = product(&db, &biz, "Juice", 400, 10, 0).await;

        let err = db.sales().create_sale(&biz, cart(&[])).await.unwrap_err();
        assert!(matches!(core_err(err), CoreError::InvalidInput(_)));

        let err = db
            .sales()
            .create_sale(&biz, cart(&[(&p.id, 0)]))
            .await
            .unwrap_err();
        assert!(matches!(core_err(err), CoreError::InvalidQuantity { quantity: 0 }));

        let mut bad_discount = cart(&[(&p.id, 1)]);
        bad_discount.discount = Some(Discount::Flat { amount_cents: -10 });
        let err = db.sales().create_sale(&biz, bad_discount).await.unwrap_err();
        assert!(matches!(core_err(err), CoreError::InvalidInput(_)));

        assert_eq!(quantity(&db, &biz, &p.id).await, 10);
    }

    #[tokio::test]
    async fn test_prices_frozen_at_sale_time() {
        let db = memory_db().await;
        let biz = business();
        let p = product(&db, &biz, "Mocha", 500, 10, 0).await;

        let sale = db.sales().create_sale(&biz, cart(&[(&p.id, 2)])).await.unwrap();
        db.ledger().set_price(&biz, &p.id, 650).await.unwrap();

        let stored = db.sales().get_sale(&biz, &sale.id).await.unwrap();
        assert_eq!(stored.items.len(), 1);
        assert_eq!(stored.items[0].unit_price_cents, 500);
        assert_eq!(stored.items[0].line_total_cents, 1000);
        assert_eq!(stored.items[0].name_snapshot, "Mocha");
        assert_eq!(stored.total_cents, 1000);

        let next = db.sales().create_sale(&biz, cart(&[(&p.id, 1)])).await.unwrap();
        assert_eq!(next.items[0].unit_price_cents, 650);
    }

    #[tokio::test]
    async fn test_duplicate_lines_merge_into_one_item() {
        let db = memory_db().await;
        let biz = business();
        let a = product(&db, &biz, "Bun", 200, 10, 0).await;
        let b = product(&db, &biz, "Jam", 150, 10, 0).await;

        let sale = db
            .sales()
            .create_sale(&biz, cart(&[(&b.id, 1), (&a.id, 2), (&b.id, 2)]))
            .await
            .unwrap();

        let items: Vec<(&str, i64)> = sale
            .items
            .iter()
            .map(|i| (i.product_id.as_str(), i.quantity))
            .collect();
        assert_eq!(items, vec![(b.id.as_str(), 3), (a.id.as_str(), 2)]);
        assert_eq!(sale.subtotal_cents, 3 * 150 + 2 * 200);
        assert_eq!(quantity(&db, &biz, &b.id).await, 7);

        let stored = db.sales().get_sale(&biz, &sale.id).await.unwrap();
        assert_eq!(stored.items, sale.items);
    }

    #[tokio::test]
    async fn test_discounts_applied_and_clamped() {
        let db = memory_db().await;
        let biz = business();
        let p = product(&db, &biz, "Sandwich", 800, 10, 0).await;

        let mut flat = cart(&[(&p.id, 1)]);
        flat.discount = Some(Discount::Flat { amount_cents: 5_000 });
        let sale = db.sales().create_sale(&biz, flat).await.unwrap();
        assert_eq!(sale.discount_cents, 800);
        assert_eq!(sale.total_cents, 0);

        let mut pct = cart(&[(&p.id, 2)]);
        pct.discount = Some(Discount::Percentage { bps: 1250 });
        pct.payment_method = PaymentMethod::Digital;
        let sale = db.sales().create_sale(&biz, pct).await.unwrap();
        assert_eq!(sale.subtotal_cents, 1600);
        assert_eq!(sale.discount_cents, 200);
        assert_eq!(sale.total_cents, 1400);

        let stored = db.sales().get_sale(&biz, &sale.id).await.unwrap();
        assert_eq!(stored.discount, Discount::Percentage { bps: 1250 });
        assert_eq!(stored.payment_method, PaymentMethod::Digital);
        assert_eq!(stored.total_cents, stored.subtotal_cents - stored.discount_cents);
    }

    #[tokio::test]
    async fn test_void_of_missing_or_foreign_sale() {
        let db = memory_db().await;
        let biz = business();
        let p = product(&db, &biz, "Pretzel", 300, 4, 0).await;
        let sale = db.sales().create_sale(&biz, cart(&[(&p.id, 1)])).await.unwrap();

        let err = db.sales().void_sale(&biz, "nope", "x").await.unwrap_err();
        assert!(matches!(core_err(err), CoreError::NotFound { .. }));

        let other = business();
        let err = db.sales().void_sale(&other, &sale.id, "x").await.unwrap_err();
        assert!(matches!(core_err(err), CoreError::NotFound { .. }));
        let err = db.sales().get_sale(&other, &sale.id).await.unwrap_err();
        assert!(matches!(core_err(err), CoreError::NotFound { .. }));

        let stored = db.sales().get_sale(&biz, &sale.id).await.unwrap();
        assert_eq!(stored.status, SaleStatus::Completed);
        assert_eq!(quantity(&db, &biz, &p.id).await, 3);
    }

    #[tokio::test]
    async fn test_failed_restore_keeps_sale_completed() {
        let db = memory_db().await;
        let biz = business();
        let p = product(&db, &biz, "Smoothie", 600, 5, 0).await;
        let sale = db.sales().create_sale(&biz, cart(&[(&p.id, 2)])).await.unwrap();

        // Stock already handed back outside the void.
        db.ledger().restore_for_void(&biz, &sale.id).await.unwrap();
        assert_eq!(quantity(&db, &biz, &p.id).await, 5);

        let err = db
            .sales()
            .void_sale(&biz, &sale.id, "refund")
            .await
            .unwrap_err();
        assert!(matches!(core_err(err), CoreError::VoidFailed { ref sale_id, .. } if *sale_id == sale.id));

        let stored = db.sales().get_sale(&biz, &sale.id).await.unwrap();
        assert_eq!(stored.status, SaleStatus::Completed);
        assert!(stored.void_reason.is_none());
        assert_eq!(quantity(&db, &biz, &p.id).await, 5);
        assert_ledger_consistent(&db, &biz).await;
    }

    #[tokio::test]
    async fn test_list_sales_newest_first() {
        let db = memory_db().await;
        let biz = business();
        let p = product(&db, &biz, "Cookie", 150, 20, 0).await;

        let mut ids = Vec::new();
        for qty in 1..=3 {
            let sale = db.sales().create_sale(&biz, cart(&[(&p.id, qty)])).await.unwrap();
            ids.push(sale.id);
        }

        let listed: Vec<String> = db
            .sales()
            .list_sales(&biz, 2)
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.id)
            .collect();
        assert_eq!(listed, vec![ids[2].clone(), ids[1].clone()]);

        assert!(db.sales().list_sales(&business(), 10).await.unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_sales_never_oversell() {
        let (db, path) = file_db(8).await;
        let biz = business();
        let p = product(&db, &biz, "Limited Pastry", 450, 10, 0).await;

        let mut handles = Vec::new();
        for _ in 0..25 {
            let sales = db.sales();
            let biz = biz.clone();
            let id = p.id.clone();
            handles.push(tokio::spawn(async move {
                sales.create_sale(&biz, cart(&[(&id, 1)])).await
            }));
        }

        let mut completed = 0;
        let mut rejected = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => completed += 1,
                Err(ServiceError::Core(CoreError::InsufficientStock { .. })) => rejected += 1,
                Err(other) => panic!("unexpected error: {other}"),
            }
        }

        assert_eq!(completed, 10);
        assert_eq!(rejected, 15);
        assert_eq!(quantity(&db, &biz, &p.id).await, 0);
        assert_eq!(db.sales().list_sales(&biz, 100).await.unwrap().len(), 10);
        assert_ledger_consistent(&db, &biz).await;

        db.close().await;
        remove_db_files(&path);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_overlapping_carts_complete() {
        let (db, path) = file_db(6).await;
        let biz = business();
        let a = product(&db, &biz, "Tea A", 300, 100, 0).await;
        let b = product(&db, &biz, "Tea B", 300, 100, 0).await;

        let mut handles = Vec::new();
        for i in 0..20 {
            let sales = db.sales();
            let biz = biz.clone();
            let lines = if i % 2 == 0 {
                vec![(a.id.clone(), 2), (b.id.clone(), 1)]
            } else {
                vec![(b.id.clone(), 2), (a.id.clone(), 1)]
            };
            handles.push(tokio::spawn(async move {
                let lines: Vec<(&str, i64)> =
                    lines.iter().map(|(id, q)| (id.as_str(), *q)).collect();
                sales.create_sale(&biz, cart(&lines)).await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(quantity(&db, &biz, &a.id).await, 100 - 30);
        assert_eq!(quantity(&db, &biz, &b.id).await, 100 - 30);
        assert_ledger_consistent(&db, &biz).await;

        db.close().await;
        remove_db_files(&path);
    }
}
