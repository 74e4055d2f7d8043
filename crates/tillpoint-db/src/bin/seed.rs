//! # Seed Data Generator
//!
//! Populates a development database with a small phone-repair shop.
//!
//! ## Usage
//! ```bash
//! # Seed ./tillpoint_dev.db
//! cargo run -p tillpoint-db --bin seed
//!
//! # Specify database path and exchange rate
//! cargo run -p tillpoint-db --bin seed -- --db ./data/shop.db --rate 36.50
//! ```
//!
//! ## Generated Data
//! - Catalog of accessories and spare parts, each with stock and a reorder level
//! - Customers with 15 and 30 day terms, one parts supplier
//! - An active exchange rate effective today

use chrono::Utc;
use std::env;
use tillpoint_core::{Money, Rate};
use tillpoint_db::{Database, DbConfig, DbResult};

/// (sku, name, price cents, cost cents, quantity, reorder level)
const CATALOG: &[(&str, &str, i64, i64, i64, i64)] = &[
    ("CBL-USBC-1M", "USB-C cable 1m", 900, 300, 40, 10),
    ("CBL-LTN-1M", "Lightning cable 1m", 1100, 350, 25, 10),
    ("CHG-20W", "20W wall charger", 1800, 700, 15, 5),
    ("CSE-IP13", "iPhone 13 case", 1500, 400, 12, 4),
    ("CSE-A54", "Galaxy A54 case", 1200, 350, 9, 4),
    ("SCR-IP13", "iPhone 13 screen protector", 1000, 200, 30, 8),
    ("SCR-A54", "Galaxy A54 screen protector", 800, 180, 3, 8),
    ("BAT-IP11", "iPhone 11 battery", 3500, 1400, 6, 2),
    ("LCD-A54", "Galaxy A54 display assembly", 9500, 5200, 2, 1),
    ("SIM-TOOL", "SIM eject tool", 100, 10, 200, 20),
];

const CUSTOMERS: &[(&str, i64)] =
    &[("Rosa Díaz", 30), ("Repairs Inc.", 15), ("Tomás Ortega", 30)];

#[tokio::main]
async fn main() -> DbResult<()> {
    let args: Vec<String> = env::args().collect();
    let mut db_path = "./tillpoint_dev.db".to_string();
    let mut rate_input = "36.50".to_string();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--rate" | "-r" => {
                if i + 1 < args.len() {
                    rate_input = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Tillpoint Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>     Database file path (default: ./tillpoint_dev.db)");
                println!("  -r, --rate <RATE>   Secondary units per base unit (default: 36.50)");
                println!("  -h, --help          Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    let rate = match Rate::parse(&rate_input) {
        Ok(rate) => rate,
        Err(e) => {
            eprintln!("Invalid --rate '{}': {}", rate_input, e);
            return Ok(());
        }
    };

    println!("🌱 Tillpoint Seed Data Generator");
    println!("================================");
    println!("Database: {}", db_path);
    println!("Rate:     {}", rate);
    println!();

    let db = Database::new(DbConfig::new(&db_path)).await?;
    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    let mut uow = db.begin().await?;

    if !uow.products().list_active(1).await?.is_empty() {
        println!("⚠ Database already has products");
        println!("  Skipping seed to avoid duplicates.");
        println!("  Delete the database file to regenerate.");
        return Ok(());
    }

    for (sku, name, price, cost, quantity, reorder) in CATALOG {
        let product = uow
            .products()
            .insert(sku, name, Money::from_cents(*price), Money::from_cents(*cost))
            .await?;
        uow.stock().create(&product.id, *quantity, *reorder, "seed").await?;
    }
    println!("✓ {} products with stock", CATALOG.len());

    for (name, terms) in CUSTOMERS {
        let customer = uow.customers().insert(name, *terms).await?;
        println!("  customer {} ({} days) → {}", customer.name, terms, customer.id);
    }
    let supplier = uow.suppliers().insert("Parts Wholesale", 15).await?;
    println!("  supplier {} → {}", supplier.name, supplier.id);

    uow.rates()
        .set_active(rate, "USD", "VES", "seed", Utc::now().date_naive())
        .await?;
    println!("✓ Active rate {}", rate);

    let low = uow.stock().low_stock().await?;
    uow.commit().await?;

    println!();
    println!("Low stock after seeding: {}", low.len());
    for item in low {
        println!("  {} {} ({} ≤ {})", item.sku, item.name, item.quantity, item.reorder_level);
    }

    println!();
    println!("✓ Seed complete!");
    Ok(())
}
