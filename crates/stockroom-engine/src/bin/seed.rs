//! # Seed Data Generator
//!
//! Populates a database with one tenant's worth of locations, products and
//! stock for development.
//!
//! ## Usage
//! ```bash
//! # 50 products for tenant "demo" (default)
//! cargo run -p stockroom-engine --bin seed
//!
//! # Custom amount, tenant and database
//! cargo run -p stockroom-engine --bin seed -- --count 500 --tenant acme --db ./data/stockroom.db
//! ```
//!
//! ## What Gets Created
//! - Three locations: `WH-MAIN` (primary), `WH-EAST`, `STORE-01`
//! - `count` products with SKU `{CATEGORY}-{INDEX}` and opening stock at
//!   `WH-MAIN`
//! - A reservation against a fake order for every third product
//! - A transfer to `STORE-01` for every fifth product
//! - One scheduled cycle count per location
//! - A tenant-wide balancing run at the end

use chrono::Utc;
use std::env;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use stockroom_core::{new_id, LocationType, Product, ReconciliationSource, ReservationRef};
use stockroom_engine::{
    InventoryConfig, InventoryService, NewLocation, ReserveRequest, TransferRequest,
};

const ACTOR: &str = "seed";

/// Product categories for test data.
const CATEGORIES: &[(&str, &[&str])] = &[
    ("BEV", &["Sparkling Water", "Cola", "Orange Juice", "Iced Tea", "Cold Brew"]),
    ("SNK", &["Potato Chips", "Pretzels", "Trail Mix", "Granola Bar", "Crackers"]),
    ("HWR", &["Hex Bolt M8", "Wood Screw 40mm", "Wall Anchor", "Hinge", "Cable Tie"]),
    ("PKG", &["Carton Small", "Carton Large", "Bubble Wrap", "Tape Roll", "Pallet Wrap"]),
];

const LOCATIONS: &[(&str, &str, LocationType, bool)] = &[
    ("WH-MAIN", "Main Warehouse", LocationType::Warehouse, true),
    ("WH-EAST", "East Warehouse", LocationType::Warehouse, false),
    ("STORE-01", "Downtown Store", LocationType::Store, false),
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Parse command line arguments
    let args: Vec<String> = env::args().collect();

    let mut count: usize = 50;
    let mut tenant = String::from("demo");
    let mut db_path: Option<PathBuf> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--count" | "-c" => {
                if i + 1 < args.len() {
                    count = args[i + 1].parse().unwrap_or(50);
                    i += 1;
                }
            }
            "--tenant" | "-t" => {
                if i + 1 < args.len() {
                    tenant = args[i + 1].clone();
                    i += 1;
                }
            }
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Stockroom Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -c, --count <N>      Number of products to generate (default: 50)");
                println!("  -t, --tenant <ID>    Tenant to seed (default: demo)");
                println!("  -d, --db <PATH>      Database file path (default: from stockroom.toml)");
                println!("  -h, --help           Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    let mut config = InventoryConfig::load_or_default(None);
    if let Some(path) = db_path {
        config.database.path = path;
    }

    println!("🌱 Stockroom Seed Data Generator");
    println!("================================");
    println!("Database: {}", config.database.path.display());
    println!("Tenant:   {}", tenant);
    println!("Products: {}", count);
    println!();

    let service = InventoryService::connect(config).await?;
    println!("✓ Connected to database");

    if !service.list_locations(&tenant, true).await?.is_empty() {
        println!("⚠ Tenant {} already has locations", tenant);
        println!("  Skipping seed to avoid duplicates.");
        return Ok(());
    }

    // Locations
    let mut location_ids = Vec::new();
    for (code, name, location_type, is_primary) in LOCATIONS {
        let location = service
            .create_location(
                &tenant,
                NewLocation {
                    code: code.to_string(),
                    name: name.to_string(),
                    location_type: *location_type,
                    description: None,
                    is_primary: *is_primary,
                },
                ACTOR,
            )
            .await?;
        location_ids.push(location.id);
    }
    println!("✓ Created {} locations", location_ids.len());
    let (main, store) = (&location_ids[0], &location_ids[2]);

    // Products and stock
    println!();
    println!("Generating products...");
    let start = std::time::Instant::now();
    let mut reserved = 0;
    let mut transferred = 0;

    for seed in 0..count {
        let product = generate_product(&tenant, seed);
        {
            let mut uow = service.database().begin().await?;
            uow.products().insert(&product).await?;
            uow.commit().await?;
        }

        let opening = ((seed * 37) % 120) as f64;
        service
            .set_location_stock(&tenant, &product.id, main, opening, ACTOR, "opening count")
            .await?;

        if seed % 3 == 0 && opening >= 4.0 {
            service
                .reserve_stock(
                    &tenant,
                    ReserveRequest {
                        product_id: product.id.clone(),
                        quantity: (opening / 4.0).floor(),
                        location_id: Some(main.clone()),
                        reference: ReservationRef::new("order", format!("SO-{:05}", seed)),
                        expires_at: None,
                    },
                    ACTOR,
                )
                .await?;
            reserved += 1;
        }

        if seed % 5 == 0 && opening >= 10.0 {
            service
                .transfer_stock(
                    &tenant,
                    TransferRequest {
                        product_id: product.id.clone(),
                        from_location_id: main.clone(),
                        to_location_id: store.clone(),
                        quantity: 5.0,
                        reason: "store replenishment".to_string(),
                    },
                    ACTOR,
                )
                .await?;
            transferred += 1;
        }

        if (seed + 1) % 25 == 0 {
            println!("  Generated {} products...", seed + 1);
        }
    }

    let elapsed = start.elapsed();
    println!();
    println!("✓ Generated {} products in {:?}", count, elapsed);
    println!("  Reservations: {}", reserved);
    println!("  Transfers:    {}", transferred);

    for location_id in &location_ids {
        service
            .schedule_cycle_count(&tenant, location_id, ACTOR, None)
            .await?;
    }
    println!("✓ Scheduled {} cycle counts", location_ids.len());

    println!();
    println!("Balancing tenant...");
    let summary = service
        .run_balancing_for_tenant(&tenant, ACTOR, ReconciliationSource::Scheduled)
        .await?;
    println!("  Items checked: {}", summary.items_checked);
    println!("  Cases opened:  {}", summary.cases_opened);

    let alerts = service.list_open_alerts(&tenant, None).await?;
    println!("  Open alerts:   {}", alerts.len());

    println!();
    println!("✓ Seed complete!");

    Ok(())
}

/// Generates a single catalog product.
fn generate_product(tenant: &str, seed: usize) -> Product {
    let now = Utc::now();
    let (category, names) = CATEGORIES[seed % CATEGORIES.len()];
    let name = names[(seed / CATEGORIES.len()) % names.len()];

    // $0.50 - $12.49
    let vendor_price = 0.5 + ((seed * 13) % 1200) as f64 / 100.0;

    Product {
        id: new_id(),
        tenant_id: tenant.to_string(),
        sku: format!("{}-{:05}", category, seed),
        name: format!("{} #{}", name, seed),
        description: None,
        vendor_price: Some(vendor_price),
        stock_quantity: 0,
        low_stock_threshold: if seed % 4 == 0 { None } else { Some(10) },
        created_at: now,
        updated_at: now,
    }
}
