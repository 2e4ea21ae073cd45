//! # Seed Data Generator
//!
//! Populates a development database with a small demo store.
//!
//! ## Usage
//! ```bash
//! cargo run -p mostrador-db --bin seed
//!
//! # Specify database path and admin password
//! cargo run -p mostrador-db --bin seed -- --db ./data/mostrador.db --password s3creto123
//! ```
//!
//! ## Generated Data
//! - Catalog of groceries with normal and wholesale prices
//! - Opening stock for every product (adjustment entries)
//! - One supplier and one walk-in client
//! - An `admin` user

use std::env;

use mostrador_core::{PriceType, UserRole};
use mostrador_db::repository::client::ClientInput;
use mostrador_db::repository::inventory::AdjustmentInput;
use mostrador_db::repository::product::{ProductFilter, ProductInput};
use mostrador_db::repository::supplier::SupplierInput;
use mostrador_db::repository::user::NewUser;
use mostrador_db::{Database, DbConfig};

/// (sku, name, unit, tax bps, min stock, normal cents, wholesale cents, stock)
const CATALOG: &[(&str, &str, &str, i64, i64, i64, i64, i64)] = &[
    ("BEB-COCA-600", "Coca-Cola 600 ml", "pza", 1600, 24, 1850, 1650, 120),
    ("BEB-AGUA-1L", "Agua natural 1 L", "pza", 0, 24, 1200, 1000, 96),
    ("BEB-JUGO-1L", "Jugo de naranja 1 L", "pza", 0, 6, 3200, 2900, 18),
    ("ABA-ARROZ-1K", "Arroz extra 1 kg", "pza", 0, 10, 3400, 3050, 40),
    ("ABA-FRIJOL-1K", "Frijol negro 1 kg", "pza", 0, 10, 3900, 3500, 35),
    ("ABA-ACEITE-1L", "Aceite vegetal 1 L", "pza", 0, 6, 4500, 4100, 20),
    ("ABA-AZUCAR-1K", "Azúcar estándar 1 kg", "pza", 0, 10, 3100, 2800, 30),
    ("BOT-PAPAS-45", "Papas fritas 45 g", "pza", 1600, 12, 2100, 1900, 60),
    ("BOT-GALLE-PQ", "Galletas de avena paquete", "pza", 1600, 12, 2400, 2150, 48),
    ("LIM-JABON-1K", "Detergente en polvo 1 kg", "pza", 1600, 6, 4800, 4400, 15),
    ("LIM-CLORO-1L", "Cloro 1 L", "pza", 1600, 6, 2200, 1950, 24),
    ("GRA-HUEVO-KG", "Huevo blanco", "kg", 0, 5, 4600, 4300, 25),
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();

    let mut db_path = String::from("./mostrador_dev.db");
    let mut password = String::from("admin12345");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--password" | "-p" => {
                if i + 1 < args.len() {
                    password = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Mostrador Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>          Database file path (default: ./mostrador_dev.db)");
                println!("  -p, --password <PASS>    Password of the admin user (default: admin12345)");
                println!("  -h, --help               Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("🌱 Mostrador Seed Data Generator");
    println!("================================");
    println!("Database: {}", db_path);
    println!();

    let db = Database::new(DbConfig::new(&db_path)).await?;
    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    let existing = db
        .products()
        .list(&ProductFilter {
            limit: Some(1),
            ..Default::default()
        })
        .await?;
    if !existing.is_empty() {
        println!("⚠ Database already has products");
        println!("  Skipping seed to avoid duplicates.");
        println!("  Delete the database file to regenerate.");
        return Ok(());
    }

    println!();
    println!("Creating catalog...");
    let start = std::time::Instant::now();

    for &(sku, name, unit, tax_rate_bps, min_stock, normal, wholesale, stock) in CATALOG {
        let product = db
            .products()
            .create(&ProductInput {
                sku: sku.to_string(),
                name: name.to_string(),
                description: None,
                unit: unit.to_string(),
                tax_rate_bps,
                min_stock,
            })
            .await?;

        db.products()
            .set_price(&product.id, PriceType::Normal, normal)
            .await?;
        db.products()
            .set_price(&product.id, PriceType::Wholesale, wholesale)
            .await?;

        db.inventory()
            .adjust(&AdjustmentInput {
                product_id: product.id.clone(),
                quantity: stock,
                notes: Some("Inventario inicial".to_string()),
            })
            .await?;

        println!("  {} {} ({} en existencia)", sku, name, stock);
    }

    db.suppliers()
        .create(&SupplierInput {
            name: "Distribuidora del Centro".to_string(),
            tax_id: Some("DCE010203AB1".to_string()),
            contact_name: Some("Marta Ruiz".to_string()),
            email: Some("pedidos@distcentro.mx".to_string()),
            phone: Some("5551234567".to_string()),
        })
        .await?;
    println!("✓ Supplier created");

    db.clients()
        .create(&ClientInput {
            name: "Público en general".to_string(),
            tax_id: Some("XAXX010101000".to_string()),
            email: None,
            phone: None,
            address: None,
        })
        .await?;
    println!("✓ Walk-in client created");

    db.users()
        .create(&NewUser {
            username: "admin".to_string(),
            password,
            role: UserRole::Admin,
            employee_id: None,
        })
        .await?;
    println!("✓ User 'admin' created");

    println!();
    println!(
        "✓ Seed complete: {} products in {:?}",
        CATALOG.len(),
        start.elapsed()
    );

    Ok(())
}
