//! # Stock Movement Repository
//!
//! Append-only access to `stock_movements`. There is no update or delete
//! here, and the table's triggers reject both.

use sqlx::SqliteConnection;

use crate::error::DbResult;
use perk_core::{MovementReason, StockMovement};

const MOVEMENT_COLUMNS: &str =
    "id, business_id, product_id, delta, reason, sale_id, note, created_at";

/// Appends one movement.
pub async fn insert(conn: &mut SqliteConnection, movement: &StockMovement) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO stock_movements (
            id, business_id, product_id, delta, reason, sale_id, note, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
        "#,
    )
    .bind(&movement.id)
    .bind(&movement.business_id)
    .bind(&movement.product_id)
    .bind(movement.delta)
    .bind(movement.reason)
    .bind(&movement.sale_id)
    .bind(&movement.note)
    .bind(movement.created_at)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// A product's movements, oldest first.
pub async fn list_for_product(
    conn: &mut SqliteConnection,
    business_id: &str,
    product_id: &str,
) -> DbResult<Vec<StockMovement>> {
    let sql = format!(
        "SELECT {MOVEMENT_COLUMNS} FROM stock_movements \
         WHERE business_id = ?1 AND product_id = ?2 \
         ORDER BY rowid ASC"
    );

    let movements = sqlx::query_as::<_, StockMovement>(&sql)
        .bind(business_id)
        .bind(product_id)
        .fetch_all(&mut *conn)
        .await?;

    Ok(movements)
}

/// A sale's movements of one reason, in product-id order.
pub async fn list_for_sale(
    conn: &mut SqliteConnection,
    business_id: &str,
    sale_id: &str,
    reason: MovementReason,
) -> DbResult<Vec<StockMovement>> {
    let sql = format!(
        "SELECT {MOVEMENT_COLUMNS} FROM stock_movements \
         WHERE business_id = ?1 AND sale_id = ?2 AND reason = ?3 \
         ORDER BY product_id ASC"
    );

    let movements = sqlx::query_as::<_, StockMovement>(&sql)
        .bind(business_id)
        .bind(sale_id)
        .bind(reason)
        .fetch_all(&mut *conn)
        .await?;

    Ok(movements)
}

/// Whether any movement of `reason` exists for the sale.
pub async fn exists_for_sale(
    conn: &mut SqliteConnection,
    business_id: &str,
    sale_id: &str,
    reason: MovementReason,
) -> DbResult<bool> {
    let exists: bool = sqlx::query_scalar(
        r#"
        SELECT EXISTS (
            SELECT 1 FROM stock_movements
            WHERE business_id = ?1 AND sale_id = ?2 AND reason = ?3
        )
        "#,
    )
    .bind(business_id)
    .bind(sale_id)
    .bind(reason)
    .fetch_one(&mut *conn)
    .await?;

    Ok(exists)
}
