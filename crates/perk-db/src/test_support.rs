//! Fixtures shared by the service tests.

use perk_core::{NewProduct, NewSale, PaymentMethod, Product, SaleLine};
use uuid::Uuid;

use crate::{Database, DbConfig};

pub async fn memory_db() -> Database {
    Database::new(DbConfig::in_memory()).await.unwrap()
}

/// A file-backed database with several connections, for tests that need
/// real concurrent writers. The file lives in the temp dir.
pub async fn file_db(connections: u32) -> (Database, std::path::PathBuf) {
    let path = std::env::temp_dir().join(format!("perk-test-{}.db", Uuid::new_v4()));
    let config = DbConfig::new(&path)
        .max_connections(connections)
        .busy_timeout(std::time::Duration::from_secs(30));
    (Database::new(config).await.unwrap(), path)
}

pub fn remove_db_files(path: &std::path::Path) {
    for suffix in ["", "-wal", "-shm"] {
        let mut file = path.as_os_str().to_owned();
        file.push(suffix);
        let _ = std::fs::remove_file(file);
    }
}

pub fn business() -> String {
    Uuid::new_v4().to_string()
}

pub async fn product(
    db: &Database,
    business_id: &str,
    name: &str,
    price_cents: i64,
    quantity: i64,
    threshold: i64,
) -> Product {
    db.ledger()
        .create_product(
            business_id,
            NewProduct {
                name: name.to_string(),
                sku: None,
                price_cents,
                initial_quantity: quantity,
                low_stock_threshold: threshold,
            },
        )
        .await
        .unwrap()
}

pub fn cart(lines: &[(&str, i64)]) -> NewSale {
    NewSale {
        items: lines
            .iter()
            .map(|(id, qty)| SaleLine::new(*id, *qty))
            .collect(),
        payment_method: PaymentMethod::Cash,
        discount: None,
    }
}

pub async fn quantity(db: &Database, business_id: &str, product_id: &str) -> i64 {
    db.ledger()
        .get_product(business_id, product_id)
        .await
        .unwrap()
        .quantity
}

/// Asserts the stored quantity of every product matches its movement log.
pub async fn assert_ledger_consistent(db: &Database, business_id: &str) {
    let drift = db.ledger().reconcile(business_id).await.unwrap();
    assert!(drift.is_empty(), "ledger drift: {drift:?}");
}
