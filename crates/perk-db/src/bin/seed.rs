//! # Seed Data Generator
//!
//! Populates a development database with a small café: a product catalog,
//! a delivery, a few sales and one voided sale, so the ledger has history
//! to look at.
//!
//! ## Usage
//! ```bash
//! # Seed ./perk_dev.db under a fresh business id
//! cargo run -p perk-db --bin seed
//!
//! # Specify database path and business
//! cargo run -p perk-db --bin seed -- --db ./data/perk.db --business 0b6f...
//!
//! # More logging
//! RUST_LOG=perk_db=debug cargo run -p perk-db --bin seed
//! ```

use std::env;

use perk_core::{Discount, NewProduct, NewSale, PaymentMethod, SaleLine};
use perk_db::config::DEFAULT_DATABASE_PATH;
use perk_db::{Database, DbConfig};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

/// (sku, name, price in cents, opening stock, low-stock threshold)
const CATALOG: &[(&str, &str, i64, i64, i64)] = &[
    ("ESP-01", "Espresso", 250, 200, 20),
    ("LAT-01", "Caffe Latte", 420, 150, 20),
    ("CAP-01", "Cappuccino", 400, 150, 20),
    ("TEA-01", "Chai Tea", 380, 80, 10),
    ("CRO-01", "Butter Croissant", 325, 24, 6),
    ("MUF-01", "Blueberry Muffin", 300, 18, 6),
    ("BAG-01", "Sesame Bagel", 275, 12, 4),
    ("BEA-01", "House Blend Beans 250g", 1450, 8, 5),
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("perk_db=warn")),
        )
        .init();

    // Parse command line arguments
    let args: Vec<String> = env::args().collect();

    let mut db_path = String::from(DEFAULT_DATABASE_PATH);
    let mut business_id = Uuid::new_v4().to_string();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--business" | "-b" => {
                if i + 1 < args.len() {
                    business_id = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Perk POS Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>        Database file path (default: {DEFAULT_DATABASE_PATH})");
                println!("  -b, --business <ID>    Business to seed (default: a new UUID)");
                println!("  -h, --help             Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("Perk POS Seed Data Generator");
    println!("============================");
    println!("Database: {db_path}");
    println!("Business: {business_id}");
    println!();

    let db = Database::new(DbConfig::new(&db_path)).await?;
    let ledger = db.ledger();
    let sales = db.sales();

    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    let existing = ledger.count_products(&business_id).await?;
    if existing > 0 {
        println!("⚠ Business already has {existing} products");
        println!("  Skipping seed to avoid duplicates.");
        return Ok(());
    }

    // Catalog
    println!();
    println!("Creating products...");
    let mut ids = Vec::with_capacity(CATALOG.len());
    for (sku, name, price_cents, quantity, threshold) in CATALOG {
        let product = ledger
            .create_product(
                &business_id,
                NewProduct {
                    name: name.to_string(),
                    sku: Some(sku.to_string()),
                    price_cents: *price_cents,
                    initial_quantity: *quantity,
                    low_stock_threshold: *threshold,
                },
            )
            .await?;
        println!("  {} {:<24} {:>4} on hand", sku, product.name, product.quantity);
        ids.push(product.id);
    }

    // Stock movements besides opening stock
    ledger
        .receive_stock(&business_id, &ids[4], 12, Some("morning bakery delivery"))
        .await?;
    ledger
        .adjust_stock(&business_id, &ids[5], -2, "dropped on the floor")
        .await?;

    // Sales
    println!();
    println!("Ringing up sales...");
    // (catalog index, quantity) per line
    let carts: Vec<(Vec<(usize, i64)>, PaymentMethod, Option<Discount>)> = vec![
        (vec![(0, 2), (4, 2)], PaymentMethod::Cash, None),
        (vec![(1, 1), (5, 1)], PaymentMethod::Card, None),
        (
            vec![(2, 3), (6, 2), (4, 1)],
            PaymentMethod::Digital,
            Some(Discount::Percentage { bps: 1000 }),
        ),
        (vec![(7, 4)], PaymentMethod::Card, Some(Discount::Flat { amount_cents: 500 })),
        (vec![(3, 2)], PaymentMethod::Cash, None),
    ];

    let mut completed = Vec::new();
    for (lines, payment_method, discount) in carts {
        let cart = NewSale {
            items: lines
                .into_iter()
                .map(|(idx, qty)| SaleLine::new(ids[idx].as_str(), qty))
                .collect(),
            payment_method,
            discount,
        };
        let sale = sales.create_sale(&business_id, cart).await?;
        println!(
            "  {} {:>2} items  total {:>7}",
            &sale.id[..8],
            sale.items.len(),
            format!("{:.2}", sale.total_cents as f64 / 100.0)
        );
        completed.push(sale.id);
    }

    if let Some(last) = completed.last() {
        sales.void_sale(&business_id, last, "customer changed mind").await?;
        println!("  {} voided", &last[..8]);
    }

    // Summary
    println!();
    let low = ledger.low_stock(&business_id, None).await?;
    println!("Low stock ({}):", low.len());
    for product in &low {
        println!(
            "  {:<24} {:>4} (threshold {})",
            product.name, product.quantity, product.low_stock_threshold
        );
    }

    let drift = ledger.reconcile(&business_id).await?;
    if drift.is_empty() {
        println!("✓ Ledger consistent");
    } else {
        println!("⚠ Ledger drift on {} products", drift.len());
    }

    println!();
    println!("✓ Seed complete!");

    db.close().await;
    Ok(())
}
