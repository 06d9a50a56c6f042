//! # Demo Data Seeder
//!
//! Populates a database with demo products and runs one sale through the
//! inventory coordinator.
//!
//! ## Usage
//! ```bash
//! # Seed ./tally.db (or $TALLY_DATABASE_PATH)
//! cargo run -p tally-db --bin seed
//!
//! # Specify database path
//! cargo run -p tally-db --bin seed -- --db ./data/tally.db
//! ```
//!
//! ## What It Does
//! 1. Creates catalog rows and provisions stock for each demo product
//! 2. Reserves and confirms a two-line sale (`demo-sale-1`)
//! 3. Attempts an over-reservation batch (`demo-sale-2`), which rolls back
//! 4. Prints the low-stock report, reconciliation and movement summary

use std::env;
use tracing_subscriber::EnvFilter;

use tally_core::{
    BatchLine, MovementFilter, OperationContext, Page, StockFilter, DEFAULT_TENANT_ID,
};
use tally_db::{Database, ErrorResponse, Settings};

/// (sku, name, initial quantity, reorder level)
const DEMO_PRODUCTS: &[(&str, &str, i64, i64)] = &[
    ("BEV-COLA-330", "Cola 330ml", 48, 12),
    ("BEV-COLA-2L", "Cola 2L", 6, 8),
    ("BEV-WATER-500", "Still Water 500ml", 120, 24),
    ("BEV-OJ-1L", "Orange Juice 1L", 0, 6),
    ("SNK-CHIPS-SALT", "Salted Chips", 30, 10),
    ("SNK-CHOC-BAR", "Chocolate Bar", 9, 15),
    ("DAI-MILK-1L", "Whole Milk 1L", 18, 10),
    ("DAI-YOG-PLAIN", "Plain Yogurt", 4, 5),
    ("GRO-RICE-1KG", "Rice 1kg", 25, 5),
    ("GRO-PASTA-500", "Pasta 500g", 40, 8),
];

const SEED_ACTOR: &str = "seed";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut settings = Settings::load()?;

    let args: Vec<String> = env::args().collect();
    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    settings.database_path = args[i + 1].clone().into();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Tally Inventory Demo Seeder");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>    Database file path (default: $TALLY_DATABASE_PATH or ./tally.db)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&settings.log_filter)),
        )
        .init();

    println!("🌱 Tally Inventory Seeder");
    println!("=========================");
    println!("Database: {}", settings.database_path.display());
    println!();

    let db = Database::new(settings.db_config()).await?;
    let inventory = db
        .inventory()
        .with_max_batch_lines(settings.max_batch_lines);

    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    let existing = db.products().count_active(DEFAULT_TENANT_ID).await?;
    if existing > 0 {
        println!("⚠ Database already has {} products", existing);
        println!("  Skipping seed to avoid duplicates.");
        println!("  Delete the database file to regenerate.");
        return Ok(());
    }

    // -------------------------------------------------------------------------
    // Catalog + stock
    // -------------------------------------------------------------------------

    println!();
    println!("Provisioning products...");

    let receiving = OperationContext::new(SEED_ACTOR).with_notes("demo data");
    let mut ids = Vec::with_capacity(DEMO_PRODUCTS.len());
    for (sku, name, qty, reorder) in DEMO_PRODUCTS {
        let product = db.products().insert(DEFAULT_TENANT_ID, sku, name, None).await?;
        inventory
            .provision(&product.id, *qty, *reorder, &receiving)
            .await?;
        println!("  {:<16} {:>4} on hand (reorder at {})", sku, qty, reorder);
        ids.push(product.id);
    }

    // -------------------------------------------------------------------------
    // A sale that completes
    // -------------------------------------------------------------------------

    println!();
    println!("Running demo-sale-1 (reserve → confirm)...");

    let sale = OperationContext::new(SEED_ACTOR).with_reference("demo-sale-1");
    let lines = vec![BatchLine::new(ids[0].clone(), 6), BatchLine::new(ids[4].clone(), 2)];
    inventory.reserve_batch(&lines, &sale).await?;
    let confirmed = inventory.confirm_batch(&lines, &sale).await?;
    for change in &confirmed {
        println!(
            "  {} → available {}, total {}",
            change.record.product_id(),
            change.record.available_qty(),
            change.record.total_qty()
        );
    }

    // -------------------------------------------------------------------------
    // A sale that cannot be reserved
    // -------------------------------------------------------------------------

    println!();
    println!("Running demo-sale-2 (over-reservation)...");

    let sale = OperationContext::new(SEED_ACTOR).with_reference("demo-sale-2");
    let lines = vec![BatchLine::new(ids[2].clone(), 5), BatchLine::new(ids[1].clone(), 1_000)];
    match inventory.reserve_batch(&lines, &sale).await {
        Ok(_) => println!("  ⚠ unexpectedly reserved"),
        Err(err) => {
            println!("  ✓ rejected, nothing reserved");
            println!("  {}", serde_json::to_string(&ErrorResponse::from(&err))?);
        }
    }

    // -------------------------------------------------------------------------
    // Reports
    // -------------------------------------------------------------------------

    println!();
    println!("Low-stock report:");
    let low_filter = StockFilter::low_stock().for_tenant(DEFAULT_TENANT_ID);
    let low = inventory.list_stock(&low_filter, Page::default()).await?;
    for row in &low {
        println!(
            "  {:<16} {:>4} available / reorder {:<3} {}",
            row.sku.as_deref().unwrap_or("?"),
            row.stock.available_qty(),
            row.stock.reorder_level(),
            row.stock.stock_status()
        );
    }
    println!("  {} of {} products low", low.len(), ids.len());

    let mut drifted = 0;
    for id in &ids {
        if !inventory.reconcile(id).await?.in_sync {
            drifted += 1;
        }
    }
    println!();
    println!("✓ Reconciled {} products, {} drifted", ids.len(), drifted);

    println!();
    println!("Movement summary:");
    let summary = db.movements().summarize(&MovementFilter::default()).await?;
    println!("{}", serde_json::to_string_pretty(&summary)?);

    println!();
    println!("✓ Seed complete!");

    db.close().await;
    Ok(())
}
