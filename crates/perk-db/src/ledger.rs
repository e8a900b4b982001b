//! # Inventory Ledger
//!
//! The only way product quantities change. Every change writes one immutable
//! movement and updates the cached quantity in the same transaction.
//!
//! ## Operations
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        InventoryLedger                                  │
//! │                                                                         │
//! │  Owner dashboard                     Sale coordinator                  │
//! │  ├── create_product  (RECEIVE)       ├── decrement_for_sale (SALE)     │
//! │  ├── receive_stock   (RECEIVE)       └── restore_for_void (VOID_RESTORE)│
//! │  ├── adjust_stock    (ADJUST)                                          │
//! │  ├── set_price / deactivate_product                                    │
//! │  └── low_stock / movements / reconcile                                 │
//! │                                                                         │
//! │  ┌───────────────────────────── one transaction ────────────────────┐  │
//! │  │ UPDATE products ... WHERE floor <= quantity + delta <= ceiling   │  │
//! │  │     RETURNING quantity, price_cents, name                        │  │
//! │  │ INSERT INTO stock_movements (delta, reason, sale_id, note)       │  │
//! │  └──────────────────────────────────────────────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Stock changes open their transaction with the conditional update (a void
//! opens with its status flip), so SQLite takes the write lock up front and
//! concurrent writers wait on `busy_timeout` instead of failing on a stale
//! read snapshot.
//!
//! `take_for_sale` and `restore_sale` run on a caller-supplied connection so
//! the coordinator can fold them into its own transaction.

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{DbError, ServiceError, ServiceResult};
use crate::repository::product::StockLevel;
use crate::repository::{movement as movement_repo, product as product_repo};
use perk_core::stock::{self, EMPTY_FLOOR, NO_CEILING, STOCK_CEILING};
use perk_core::validation::{
    validate_new_product, validate_note, validate_price_cents, validate_stock_count,
};
use perk_core::{
    CoreError, LedgerDrift, MovementReason, NewProduct, Product, StockMovement, ValidationError,
};

/// Inventory ledger service.
///
/// ## Usage
/// ```rust,ignore
/// let ledger = db.ledger();
/// let beans = ledger.create_product(&business_id, new_product).await?;
/// ledger.receive_stock(&business_id, &beans.id, 24, Some("PO-1182")).await?;
/// let alerts = ledger.low_stock(&business_id, None).await?;
/// ```
#[derive(Debug, Clone)]
pub struct InventoryLedger {
    pool: SqlitePool,
}

impl InventoryLedger {
    /// Creates a new InventoryLedger.
    pub fn new(pool: SqlitePool) -> Self {
        InventoryLedger { pool }
    }

    // =========================================================================
    // Products
    // =========================================================================

    /// Creates a product. Positive opening stock is recorded as a RECEIVE
    /// movement in the same transaction.
    pub async fn create_product(
        &self,
        business_id: &str,
        new_product: NewProduct,
    ) -> ServiceResult<Product> {
        require_business(business_id)?;
        validate_new_product(&new_product)?;

        let now = Utc::now();
        let product = Product {
            id: Uuid::new_v4().to_string(),
            business_id: business_id.to_string(),
            sku: new_product.sku.map(|sku| sku.trim().to_string()),
            name: new_product.name.trim().to_string(),
            price_cents: new_product.price_cents,
            quantity: new_product.initial_quantity,
            low_stock_threshold: new_product.low_stock_threshold,
            is_active: true,
            created_at: now,
            updated_at: now,
        };

        let mut tx = self.pool.begin().await?;

        if let Err(err) = product_repo::insert(&mut tx, &product).await {
            return Err(match (&product.sku, err) {
                (Some(sku), err) if err.is_unique_violation_on("products.") => {
                    DbError::duplicate("sku", sku.clone()).into()
                }
                (_, err) => err.into(),
            });
        }

        if product.quantity > 0 {
            let opening = opening_stock(&product, now);
            movement_repo::insert(&mut tx, &opening).await?;
        }

        tx.commit().await?;

        info!(
            business_id = %business_id,
            product_id = %product.id,
            quantity = product.quantity,
            "Product created"
        );
        Ok(product)
    }

    /// Gets a product (active or not).
    pub async fn get_product(&self, business_id: &str, product_id: &str) -> ServiceResult<Product> {
        let mut conn = self.pool.acquire().await?;
        product_repo::find(&mut conn, business_id, product_id)
            .await?
            .ok_or_else(|| CoreError::not_found("Product", product_id).into())
    }

    /// Changes the current price. Past sale lines keep their frozen price.
    pub async fn set_price(
        &self,
        business_id: &str,
        product_id: &str,
        price_cents: i64,
    ) -> ServiceResult<Product> {
        validate_price_cents(price_cents)?;

        let mut conn = self.pool.acquire().await?;
        if !product_repo::set_price(&mut conn, business_id, product_id, price_cents, Utc::now())
            .await?
        {
            return Err(CoreError::not_found("Product", product_id).into());
        }

        info!(business_id = %business_id, product_id = %product_id, price_cents, "Price changed");
        product_repo::find(&mut conn, business_id, product_id)
            .await?
            .ok_or_else(|| CoreError::not_found("Product", product_id).into())
    }

    /// Soft-deletes a product. It can no longer be sold.
    pub async fn deactivate_product(&self, business_id: &str, product_id: &str) -> ServiceResult<()> {
        let mut conn = self.pool.acquire().await?;
        if !product_repo::deactivate(&mut conn, business_id, product_id, Utc::now()).await? {
            return Err(CoreError::not_found("Product", product_id).into());
        }

        info!(business_id = %business_id, product_id = %product_id, "Product deactivated");
        Ok(())
    }

    // =========================================================================
    // Stock Movements
    // =========================================================================

    /// Records goods received.
    ///
    /// ## Errors
    /// - `InvalidQuantity` if `quantity <= 0`, or if the product would hold
    ///   more than `MAX_STOCK_QUANTITY`
    /// - `NotFound` if the product doesn't exist for this business
    pub async fn receive_stock(
        &self,
        business_id: &str,
        product_id: &str,
        quantity: i64,
        note: Option<&str>,
    ) -> ServiceResult<StockMovement> {
        let delta = stock::receive_delta(quantity)?;
        if let Some(note) = note {
            validate_note("note", note)?;
        }

        let mut tx = self.pool.begin().await?;
        let movement = apply(
            &mut tx,
            business_id,
            product_id,
            Change {
                delta,
                floor: EMPTY_FLOOR,
                ceiling: STOCK_CEILING,
                reason: MovementReason::Receive,
                require_active: false,
                sale_id: None,
                note: note.map(str::to_string),
            },
            Utc::now(),
        )
        .await?
        .0;
        tx.commit().await?;

        info!(
            business_id = %business_id,
            product_id = %product_id,
            quantity,
            "Stock received"
        );
        Ok(movement)
    }

    /// Records a manual correction.
    ///
    /// ## Errors
    /// - `InvalidQuantity` if `delta == 0` or the result passes `MAX_STOCK_QUANTITY`
    /// - `InsufficientStock` if the result would be negative, or if a
    ///   negative adjustment would leave nothing on hand
    /// - `NotFound` if the product doesn't exist for this business
    pub async fn adjust_stock(
        &self,
        business_id: &str,
        product_id: &str,
        delta: i64,
        reason: &str,
    ) -> ServiceResult<StockMovement> {
        let floor = stock::adjustment_floor(delta)?;
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(ValidationError::Required {
                field: "reason".to_string(),
            }
            .into());
        }
        validate_note("reason", reason)?;

        let mut tx = self.pool.begin().await?;
        let movement = apply(
            &mut tx,
            business_id,
            product_id,
            Change {
                delta,
                floor,
                ceiling: STOCK_CEILING,
                reason: MovementReason::Adjust,
                require_active: false,
                sale_id: None,
                note: Some(reason.to_string()),
            },
            Utc::now(),
        )
        .await?
        .0;
        tx.commit().await?;

        info!(
            business_id = %business_id,
            product_id = %product_id,
            delta,
            reason = %reason,
            "Stock adjusted"
        );
        Ok(movement)
    }

    /// Takes stock for one product of a sale, in its own transaction.
    ///
    /// The check and the decrement are one conditional update, so concurrent
    /// callers can never oversell.
    pub async fn decrement_for_sale(
        &self,
        business_id: &str,
        product_id: &str,
        quantity: i64,
        sale_id: &str,
    ) -> ServiceResult<StockMovement> {
        let mut tx = self.pool.begin().await?;
        let (movement, _) =
            take_for_sale(&mut tx, business_id, product_id, quantity, sale_id, Utc::now()).await?;
        tx.commit().await?;
        Ok(movement)
    }

    /// Writes one VOID_RESTORE movement per SALE movement of `sale_id`.
    ///
    /// ## Errors
    /// - `AlreadyRestored` if the sale's stock was already restored
    /// - `NotFound` if the sale took no stock from this business
    pub async fn restore_for_void(
        &self,
        business_id: &str,
        sale_id: &str,
    ) -> ServiceResult<Vec<StockMovement>> {
        let mut tx = self.pool.begin().await?;
        let restored = restore_sale(&mut tx, business_id, sale_id, Utc::now()).await?;
        tx.commit().await?;
        Ok(restored)
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Active products at or under their own threshold, or under
    /// `threshold_override` when given. Lowest quantity first.
    pub async fn low_stock(
        &self,
        business_id: &str,
        threshold_override: Option<i64>,
    ) -> ServiceResult<Vec<Product>> {
        if let Some(threshold) = threshold_override {
            validate_stock_count("threshold", threshold)?;
        }

        let mut conn = self.pool.acquire().await?;
        let products = product_repo::list_low_stock(&mut conn, business_id, threshold_override).await?;

        debug!(business_id = %business_id, count = products.len(), "Low stock query");
        Ok(products)
    }

    /// A product's audit trail, oldest first.
    pub async fn movements(
        &self,
        business_id: &str,
        product_id: &str,
    ) -> ServiceResult<Vec<StockMovement>> {
        let mut conn = self.pool.acquire().await?;
        if product_repo::find(&mut conn, business_id, product_id).await?.is_none() {
            return Err(CoreError::not_found("Product", product_id).into());
        }
        Ok(movement_repo::list_for_product(&mut conn, business_id, product_id).await?)
    }

    /// Products whose stored quantity disagrees with their movement log.
    /// Empty when the ledger is healthy.
    pub async fn reconcile(&self, business_id: &str) -> ServiceResult<Vec<LedgerDrift>> {
        let mut conn = self.pool.acquire().await?;
        let drift = product_repo::ledger_drift(&mut conn, business_id).await?;

        for d in &drift {
            warn!(
                business_id = %business_id,
                product_id = %d.product_id,
                stored = d.stored_quantity,
                ledger = d.ledger_quantity,
                "Stock ledger drift"
            );
        }
        Ok(drift)
    }

    /// Counts active products of a business.
    pub async fn count_products(&self, business_id: &str) -> ServiceResult<i64> {
        let mut conn = self.pool.acquire().await?;
        Ok(product_repo::count_active(&mut conn, business_id).await?)
    }
}

// =============================================================================
// Transaction Helpers
// =============================================================================

/// Takes `quantity` of a product for `sale_id` on the caller's connection.
///
/// Returns the SALE movement and the product's price and name as they were
/// when the stock was taken.
pub(crate) async fn take_for_sale(
    conn: &mut SqliteConnection,
    business_id: &str,
    product_id: &str,
    quantity: i64,
    sale_id: &str,
    now: DateTime<Utc>,
) -> ServiceResult<(StockMovement, StockLevel)> {
    let delta = stock::sale_delta(quantity)?;

    let result = apply(
        conn,
        business_id,
        product_id,
        Change {
            delta,
            floor: EMPTY_FLOOR,
            ceiling: NO_CEILING,
            reason: MovementReason::Sale,
            require_active: true,
            sale_id: Some(sale_id.to_string()),
            note: None,
        },
        now,
    )
    .await;

    match result {
        Err(ServiceError::Db(err)) if err.is_unique_violation_on("stock_movements.sale_id") => {
            Err(CoreError::invalid_input(format!(
                "stock for product {product_id} was already taken by sale {sale_id}"
            ))
            .into())
        }
        other => other,
    }
}

/// Reverses every SALE movement of `sale_id` on the caller's connection.
pub(crate) async fn restore_sale(
    conn: &mut SqliteConnection,
    business_id: &str,
    sale_id: &str,
    now: DateTime<Utc>,
) -> ServiceResult<Vec<StockMovement>> {
    if movement_repo::exists_for_sale(conn, business_id, sale_id, MovementReason::VoidRestore)
        .await?
    {
        return Err(CoreError::AlreadyRestored(sale_id.to_string()).into());
    }

    let taken =
        movement_repo::list_for_sale(conn, business_id, sale_id, MovementReason::Sale).await?;
    if taken.is_empty() {
        return Err(CoreError::not_found("Sale", sale_id).into());
    }

    let mut restored = Vec::with_capacity(taken.len());
    for (product_id, delta) in stock::restore_plan(&taken) {
        let result = apply(
            conn,
            business_id,
            &product_id,
            Change {
                delta,
                floor: EMPTY_FLOOR,
                ceiling: NO_CEILING,
                reason: MovementReason::VoidRestore,
                require_active: false,
                sale_id: Some(sale_id.to_string()),
                note: None,
            },
            now,
        )
        .await;

        match result {
            Ok((movement, _)) => restored.push(movement),
            Err(ServiceError::Db(err)) if err.is_unique_violation_on("stock_movements.sale_id") => {
                return Err(CoreError::AlreadyRestored(sale_id.to_string()).into());
            }
            Err(err) => return Err(err),
        }
    }

    info!(
        business_id = %business_id,
        sale_id = %sale_id,
        products = restored.len(),
        "Sale stock restored"
    );
    Ok(restored)
}

// =============================================================================
// Internals
// =============================================================================

struct Change {
    delta: i64,
    floor: i64,
    ceiling: i64,
    reason: MovementReason,
    require_active: bool,
    sale_id: Option<String>,
    note: Option<String>,
}

/// Conditional update plus movement insert. The update goes first.
async fn apply(
    conn: &mut SqliteConnection,
    business_id: &str,
    product_id: &str,
    change: Change,
    now: DateTime<Utc>,
) -> ServiceResult<(StockMovement, StockLevel)> {
    let level = product_repo::apply_delta(
        conn,
        business_id,
        product_id,
        change.delta,
        change.floor,
        change.ceiling,
        change.require_active,
        now,
    )
    .await?;

    let Some(level) = level else {
        return Err(rejection(conn, business_id, product_id, &change).await);
    };

    let movement = StockMovement {
        id: Uuid::new_v4().to_string(),
        business_id: business_id.to_string(),
        product_id: product_id.to_string(),
        delta: change.delta,
        reason: change.reason,
        sale_id: change.sale_id,
        note: change.note,
        created_at: now,
    };
    movement_repo::insert(conn, &movement).await?;

    debug!(
        product_id = %product_id,
        delta = movement.delta,
        reason = %movement.reason,
        quantity = level.quantity,
        "Movement recorded"
    );
    Ok((movement, level))
}

/// Explains why the conditional update matched no row.
async fn rejection(
    conn: &mut SqliteConnection,
    business_id: &str,
    product_id: &str,
    change: &Change,
) -> ServiceError {
    match product_repo::find(conn, business_id, product_id).await {
        Ok(Some(product)) if product.is_active || !change.require_active => {
            match stock::apply_delta(
                product_id,
                product.quantity,
                change.delta,
                change.floor,
                change.ceiling,
            ) {
                Err(err) => {
                    debug!(
                        product_id = %product_id,
                        delta = change.delta,
                        available = product.quantity,
                        "Stock change rejected"
                    );
                    err.into()
                }
                Ok(_) => DbError::Internal(format!(
                    "stock update for product {product_id} matched no row"
                ))
                .into(),
            }
        }
        Ok(_) => CoreError::not_found("Product", product_id).into(),
        Err(err) => err.into(),
    }
}

fn opening_stock(product: &Product, now: DateTime<Utc>) -> StockMovement {
    StockMovement {
        id: Uuid::new_v4().to_string(),
        business_id: product.business_id.clone(),
        product_id: product.id.clone(),
        delta: product.quantity,
        reason: MovementReason::Receive,
        sale_id: None,
        note: Some("opening stock".to_string()),
        created_at: now,
    }
}

/// Rejects calls without a tenant.
pub(crate) fn require_business(business_id: &str) -> Result<(), ValidationError> {
    if business_id.trim().is_empty() {
        return Err(ValidationError::Required {
            field: "business_id".to_string(),
        });
    }
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
