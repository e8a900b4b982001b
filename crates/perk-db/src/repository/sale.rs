//! # Sale Repository
//!
//! Database operations for sales and sale items.
//!
//! ## Sale Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  (pending: open transaction, stock being taken)                        │
//! │       │                                                                 │
//! │       ├── any line fails ──► rollback, no row ever written             │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  insert() ──► COMPLETED  (sale + items written, then commit)           │
//! │                   │                                                     │
//! │                   ▼                                                     │
//! │  mark_voided() ──► VOIDED  (terminal; triggers block further changes)  │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;
use tracing::debug;

use crate::error::{DbError, DbResult};
use perk_core::{Discount, PaymentMethod, Sale, SaleItem, SaleStatus};

const SALE_COLUMNS: &str = "id, business_id, status, payment_method, discount_kind, \
     discount_value, subtotal_cents, discount_cents, total_cents, void_reason, \
     created_at, voided_at";

/// Row shape of `sales`; the discount is stored as two columns.
#[derive(Debug, sqlx::FromRow)]
struct SaleRow {
    id: String,
    business_id: String,
    status: SaleStatus,
    payment_method: PaymentMethod,
    discount_kind: String,
    discount_value: i64,
    subtotal_cents: i64,
    discount_cents: i64,
    total_cents: i64,
    void_reason: Option<String>,
    created_at: DateTime<Utc>,
    voided_at: Option<DateTime<Utc>>,
}

impl SaleRow {
    fn into_sale(self, items: Vec<SaleItem>) -> DbResult<Sale> {
        let discount = Discount::from_parts(&self.discount_kind, self.discount_value)
            .ok_or_else(|| {
                DbError::CorruptRow(format!(
                    "sale {} has discount {}:{}",
                    self.id, self.discount_kind, self.discount_value
                ))
            })?;

        Ok(Sale {
            id: self.id,
            business_id: self.business_id,
            status: self.status,
            payment_method: self.payment_method,
            discount,
            subtotal_cents: self.subtotal_cents,
            discount_cents: self.discount_cents,
            total_cents: self.total_cents,
            items,
            void_reason: self.void_reason,
            created_at: self.created_at,
            voided_at: self.voided_at,
        })
    }
}

/// Inserts a sale and all of its items.
pub async fn insert(conn: &mut SqliteConnection, sale: &Sale) -> DbResult<()> {
    debug!(id = %sale.id, items = sale.items.len(), "Inserting sale");

    sqlx::query(
        r#"
        INSERT INTO sales (
            id, business_id, status, payment_method, discount_kind, discount_value,
            subtotal_cents, discount_cents, total_cents, void_reason, created_at, voided_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
        "#,
    )
    .bind(&sale.id)
    .bind(&sale.business_id)
    .bind(sale.status)
    .bind(sale.payment_method)
    .bind(sale.discount.kind())
    .bind(sale.discount.value())
    .bind(sale.subtotal_cents)
    .bind(sale.discount_cents)
    .bind(sale.total_cents)
    .bind(&sale.void_reason)
    .bind(sale.created_at)
    .bind(sale.voided_at)
    .execute(&mut *conn)
    .await?;

    for (position, item) in sale.items.iter().enumerate() {
        sqlx::query(
            r#"
            INSERT INTO sale_items (
                id, sale_id, product_id, name_snapshot, quantity,
                unit_price_cents, line_total_cents, position
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(&item.id)
        .bind(&item.sale_id)
        .bind(&item.product_id)
        .bind(&item.name_snapshot)
        .bind(item.quantity)
        .bind(item.unit_price_cents)
        .bind(item.line_total_cents)
        .bind(position as i64)
        .execute(&mut *conn)
        .await?;
    }

    Ok(())
}

/// Gets a sale of `business_id` with its items.
pub async fn find(
    conn: &mut SqliteConnection,
    business_id: &str,
    id: &str,
) -> DbResult<Option<Sale>> {
    let sql = format!("SELECT {SALE_COLUMNS} FROM sales WHERE id = ?1 AND business_id = ?2");

    let row = sqlx::query_as::<_, SaleRow>(&sql)
        .bind(id)
        .bind(business_id)
        .fetch_optional(&mut *conn)
        .await?;

    match row {
        Some(row) => {
            let items = items_for(conn, &row.id).await?;
            Ok(Some(row.into_sale(items)?))
        }
        None => Ok(None),
    }
}

/// Status of a sale, without loading items.
pub async fn status(
    conn: &mut SqliteConnection,
    business_id: &str,
    id: &str,
) -> DbResult<Option<SaleStatus>> {
    let status = sqlx::query_scalar::<_, SaleStatus>(
        "SELECT status FROM sales WHERE id = ?1 AND business_id = ?2",
    )
    .bind(id)
    .bind(business_id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(status)
}

/// Most recent sales first, at most `limit`.
pub async fn list_recent(
    conn: &mut SqliteConnection,
    business_id: &str,
    limit: u32,
) -> DbResult<Vec<Sale>> {
    let sql = format!(
        "SELECT {SALE_COLUMNS} FROM sales WHERE business_id = ?1 \
         ORDER BY created_at DESC, rowid DESC LIMIT ?2"
    );

    let rows = sqlx::query_as::<_, SaleRow>(&sql)
        .bind(business_id)
        .bind(i64::from(limit))
        .fetch_all(&mut *conn)
        .await?;

    let mut sales = Vec::with_capacity(rows.len());
    for row in rows {
        let items = items_for(conn, &row.id).await?;
        sales.push(row.into_sale(items)?);
    }
    Ok(sales)
}

/// Flips a COMPLETED sale to VOIDED.
///
/// Returns false if the sale is missing, belongs to another business, or is
/// already voided.
pub async fn mark_voided(
    conn: &mut SqliteConnection,
    business_id: &str,
    id: &str,
    reason: &str,
    now: DateTime<Utc>,
) -> DbResult<bool> {
    let result = sqlx::query(
        r#"
        UPDATE sales
        SET
            status = 'voided',
            void_reason = ?1,
            voided_at = ?2
        WHERE id = ?3 AND business_id = ?4 AND status = 'completed'
        "#,
    )
    .bind(reason)
    .bind(now)
    .bind(id)
    .bind(business_id)
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected() > 0)
}

async fn items_for(conn: &mut SqliteConnection, sale_id: &str) -> DbResult<Vec<SaleItem>> {
    let items = sqlx::query_as::<_, SaleItem>(
        r#"
        SELECT id, sale_id, product_id, name_snapshot, quantity, unit_price_cents, line_total_cents
        FROM sale_items
        WHERE sale_id = ?1
        ORDER BY position ASC
        "#,
    )
    .bind(sale_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(items)
}
