//! # Product Repository
//!
//! Database operations for products.
//!
//! ## Atomic Stock Update
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  UPDATE products                                                        │
//! │     SET quantity = quantity + :delta                                    │
//! │   WHERE id = :id AND business_id = :business                            │
//! │     AND quantity + :delta >= :floor                                     │
//! │  RETURNING quantity, price_cents, name                                  │
//! │                                                                         │
//! │  Terminal A: sell 4 (qty 5) ──► row returned, qty 1                    │
//! │  Terminal B: sell 4 (qty 1) ──► no row, nothing written                │
//! │                                                                         │
//! │  The check and the write are one statement, so two terminals can      │
//! │  never both pass the check against the same quantity.                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;
use tracing::debug;

use crate::error::DbResult;
use perk_core::{LedgerDrift, Product};

const PRODUCT_COLUMNS: &str = "id, business_id, sku, name, price_cents, quantity, \
     low_stock_threshold, is_active, created_at, updated_at";

/// Product state returned by a successful stock update.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct StockLevel {
    /// Quantity after the update.
    pub quantity: i64,
    /// Unit price at the moment of the update.
    pub price_cents: i64,
    /// Name at the moment of the update.
    pub name: String,
}

/// Inserts a product row.
pub async fn insert(conn: &mut SqliteConnection, product: &Product) -> DbResult<()> {
    debug!(id = %product.id, business_id = %product.business_id, "Inserting product");

    sqlx::query(
        r#"
        INSERT INTO products (
            id, business_id, sku, name, price_cents, quantity,
            low_stock_threshold, is_active, created_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
        "#,
    )
    .bind(&product.id)
    .bind(&product.business_id)
    .bind(&product.sku)
    .bind(&product.name)
    .bind(product.price_cents)
    .bind(product.quantity)
    .bind(product.low_stock_threshold)
    .bind(product.is_active)
    .bind(product.created_at)
    .bind(product.updated_at)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Gets a product of `business_id` by id, active or not.
pub async fn find(
    conn: &mut SqliteConnection,
    business_id: &str,
    id: &str,
) -> DbResult<Option<Product>> {
    let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ?1 AND business_id = ?2");

    let product = sqlx::query_as::<_, Product>(&sql)
        .bind(id)
        .bind(business_id)
        .fetch_optional(&mut *conn)
        .await?;

    Ok(product)
}

/// Applies `delta` to a product's quantity if the result stays at or above
/// `floor`.
///
/// Returns `None` when no row was updated: the product is missing, belongs
/// to another business, is inactive while `require_active` is set, or the
/// result would fall outside `[floor, ceiling]`. The caller tells these apart
/// with [`find`].
pub async fn apply_delta(
    conn: &mut SqliteConnection,
    business_id: &str,
    id: &str,
    delta: i64,
    floor: i64,
    ceiling: i64,
    require_active: bool,
    now: DateTime<Utc>,
) -> DbResult<Option<StockLevel>> {
    let level = sqlx::query_as::<_, StockLevel>(
        r#"
        UPDATE products
        SET
            quantity = quantity + ?1,
            updated_at = ?2
        WHERE id = ?3
          AND business_id = ?4
          AND quantity + ?1 >= ?5
          AND quantity + ?1 <= ?7
          AND (?6 = 0 OR is_active = 1)
        RETURNING quantity, price_cents, name
        "#,
    )
    .bind(delta)
    .bind(now)
    .bind(id)
    .bind(business_id)
    .bind(floor)
    .bind(require_active)
    .bind(ceiling)
    .fetch_optional(&mut *conn)
    .await?;

    debug!(id = %id, delta, applied = level.is_some(), "Stock update");
    Ok(level)
}

/// Sets the current unit price. Returns false if no product matched.
pub async fn set_price(
    conn: &mut SqliteConnection,
    business_id: &str,
    id: &str,
    price_cents: i64,
    now: DateTime<Utc>,
) -> DbResult<bool> {
    let result = sqlx::query(
        "UPDATE products SET price_cents = ?1, updated_at = ?2 WHERE id = ?3 AND business_id = ?4",
    )
    .bind(price_cents)
    .bind(now)
    .bind(id)
    .bind(business_id)
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Soft-deletes a product. Returns false if no product matched.
///
/// Past sales and movements keep referencing the row.
pub async fn deactivate(
    conn: &mut SqliteConnection,
    business_id: &str,
    id: &str,
    now: DateTime<Utc>,
) -> DbResult<bool> {
    let result = sqlx::query(
        "UPDATE products SET is_active = 0, updated_at = ?1 WHERE id = ?2 AND business_id = ?3",
    )
    .bind(now)
    .bind(id)
    .bind(business_id)
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Active products at or under their threshold (or `threshold_override`),
/// lowest quantity first.
pub async fn list_low_stock(
    conn: &mut SqliteConnection,
    business_id: &str,
    threshold_override: Option<i64>,
) -> DbResult<Vec<Product>> {
    let sql = format!(
        "SELECT {PRODUCT_COLUMNS} FROM products \
         WHERE business_id = ?1 AND is_active = 1 \
           AND quantity <= COALESCE(?2, low_stock_threshold) \
         ORDER BY quantity ASC, name ASC"
    );

    let products = sqlx::query_as::<_, Product>(&sql)
        .bind(business_id)
        .bind(threshold_override)
        .fetch_all(&mut *conn)
        .await?;

    Ok(products)
}

/// Products whose stored quantity differs from the sum of their movements.
pub async fn ledger_drift(
    conn: &mut SqliteConnection,
    business_id: &str,
) -> DbResult<Vec<LedgerDrift>> {
    let drift = sqlx::query_as::<_, LedgerDrift>(
        r#"
        SELECT
            p.id AS product_id,
            p.quantity AS stored_quantity,
            COALESCE(SUM(m.delta), 0) AS ledger_quantity
        FROM products p
        LEFT JOIN stock_movements m ON m.product_id = p.id
        WHERE p.business_id = ?1
        GROUP BY p.id, p.quantity
        HAVING p.quantity <> COALESCE(SUM(m.delta), 0)
        ORDER BY p.id
        "#,
    )
    .bind(business_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(drift)
}

/// Counts active products of a business.
pub async fn count_active(conn: &mut SqliteConnection, business_id: &str) -> DbResult<i64> {
    let count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM products WHERE business_id = ?1 AND is_active = 1")
            .bind(business_id)
            .fetch_one(&mut *conn)
            .await?;

    Ok(count)
}
