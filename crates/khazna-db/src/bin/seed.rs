//! # Seed Data Generator
//!
//! Populates a register database with demo products, customers and sales.
//!
//! ## Usage
//! ```bash
//! # Seed with 3 demo sales (default)
//! cargo run -p khazna-db --bin seed
//!
//! # More sales
//! cargo run -p khazna-db --bin seed -- --sales 20
//!
//! # Specify database path
//! cargo run -p khazna-db --bin seed -- --db ./data/khazna.db
//! ```
//!
//! Every write goes through the ledgers, so the seeded database passes the
//! ledger audit.

use std::env;

use khazna_core::request::CreateSaleRequest;
use khazna_core::{Currency, Money, NewProduct, NewSaleItem, PaymentMethod, Product};
use khazna_db::{Database, DbConfig, LedgerSettings};

/// (sku, name, cost, price, opening stock)
const PRODUCTS: &[(&str, &str, i64, i64, i64)] = &[
    ("TEA-GRN-250", "Green Tea 250g", 600, 1000, 40),
    ("TEA-BLK-500", "Black Tea 500g", 950, 1500, 30),
    ("COF-ARB-250", "Arabica Coffee 250g", 1800, 2750, 25),
    ("SUG-WHT-1K", "White Sugar 1kg", 350, 500, 120),
    ("RIC-BAS-5K", "Basmati Rice 5kg", 2600, 3800, 20),
    ("OIL-OLV-1L", "Olive Oil 1L", 2100, 3200, 18),
    ("PAS-SPG-500", "Spaghetti 500g", 180, 300, 80),
    ("TOM-PST-400", "Tomato Paste 400g", 220, 375, 60),
    ("MLK-PWD-900", "Milk Powder 900g", 3100, 4500, 15),
    ("DAT-DGL-1K", "Deglet Nour Dates 1kg", 1500, 2400, 35),
];

const CUSTOMERS: &[(&str, Option<&str>)] = &[
    ("Salem Trading", Some("091-555-0101")),
    ("Amal Bakery", Some("092-555-0144")),
    ("Huda Mini Market", None),
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();

    let mut sales: usize = 3;
    let mut db_path = String::from("./khazna_dev.db");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--sales" | "-s" => {
                if i + 1 < args.len() {
                    sales = args[i + 1].parse().unwrap_or(3);
                    i += 1;
                }
            }
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Khazna POS Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -s, --sales <N>    Number of demo sales to ring up (default: 3)");
                println!("  -d, --db <PATH>    Database file path (default: ./khazna_dev.db)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("Khazna POS Seed Data Generator");
    println!("==============================");
    println!("Database: {}", db_path);
    println!();

    let db = Database::new(DbConfig::new(&db_path)).await?;
    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    let existing = db.inventory().list_products().await?;
    if !existing.is_empty() {
        println!("⚠ Database already has {} products", existing.len());
        println!("  Skipping seed to avoid duplicates.");
        println!("  Delete the database file to regenerate.");
        return Ok(());
    }

    let mut products: Vec<Product> = Vec::with_capacity(PRODUCTS.len());
    for (sku, name, cost, price, stock) in PRODUCTS {
        let product = db
            .inventory()
            .register_product(
                &NewProduct {
                    sku: sku.to_string(),
                    name: name.to_string(),
                    cost_price_cents: *cost,
                    selling_price_cents: *price,
                    opening_stock: *stock,
                    low_stock_threshold: 5,
                },
                Some("seed"),
            )
            .await?;
        products.push(product);
    }
    println!("✓ Registered {} products", products.len());

    let mut customer_ids = Vec::with_capacity(CUSTOMERS.len());
    for (name, phone) in CUSTOMERS {
        customer_ids.push(db.customers().register_customer(name, *phone).await?.id);
    }
    println!("✓ Registered {} customers", customer_ids.len());

    db.cashbox()
        .deposit("main", Currency::Lyd, Money::from_cents(50_000), "Opening float", Some("seed"))
        .await?;
    println!("✓ Opening float deposited");

    let orchestrator = db.orchestrator(LedgerSettings::default());
    let mut rung_up = 0;
    for n in 0..sales {
        let first = &products[n % products.len()];
        let second = &products[(n * 3 + 1) % products.len()];
        let items = vec![
            NewSaleItem::priced(&first.id, 1 + (n % 3) as i64, first.selling_price_cents, first.cost_price_cents),
            NewSaleItem::priced(&second.id, 1, second.selling_price_cents, second.cost_price_cents),
        ];
        let total: i64 = items.iter().map(|item| item.total_price_cents).sum();

        // Every third sale goes half on account.
        let on_account = n % 3 == 2;
        let request = CreateSaleRequest {
            customer_id: on_account.then(|| customer_ids[n % customer_ids.len()].clone()),
            items,
            discount_cents: 0,
            amount_paid_cents: if on_account { total / 2 } else { total },
            payment_method: if on_account { PaymentMethod::Partial } else { PaymentMethod::Cash },
            currency: Currency::Lyd,
            exchange_rate: None,
            cashbox_id: None,
            created_by: "seed".to_string(),
            notes: None,
            expected_total_cents: Some(total),
        };

        match orchestrator.create_sale(&request).await {
            Ok(created) => {
                rung_up += 1;
                println!(
                    "  {} {}",
                    created.sale.sale_number,
                    created.sale.currency.format(created.sale.total())
                );
            }
            Err(e) => eprintln!("Failed to ring up sale {}: {}", n + 1, e),
        }
    }
    println!("✓ Rang up {} sales", rung_up);

    let report = db.auditor().audit().await?;
    println!();
    if report.is_consistent() {
        println!("✓ Ledger audit clean");
    } else {
        println!("⚠ Ledger audit found {} discrepancies", report.discrepancies.len());
    }

    println!();
    println!("✓ Seed complete!");
    Ok(())
}
