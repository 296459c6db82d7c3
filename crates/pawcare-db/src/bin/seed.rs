//! # Seed Data Generator
//!
//! Populates the database with demo reference data for development.
//!
//! ## Usage
//! ```bash
//! # Seed the default dev database
//! cargo run -p pawcare-db --bin seed
//!
//! # Specify database path
//! cargo run -p pawcare-db --bin seed -- --db ./data/pawcare.db
//! ```
//!
//! ## Generated Data
//! - 3 branches with independent stock
//! - Customers with pets
//! - Service catalog (exam, grooming, vaccination visit) offered per branch
//! - Products (food, accessories, medicines) and vaccines
//! - One vaccination package with per-vaccine dose counts
//! - Stock received into each branch
//!
//! The reference catalog is written directly with SQL; the engine itself
//! treats those tables as read-only. A short demo flow then exercises the
//! engine: one booking and one cart add against the seeded data.

use std::env;

use pawcare_core::StockItemKind;
use pawcare_db::{Database, DbConfig};

const BRANCHES: &[(&str, &str)] = &[
    ("br-01", "Pawcare Downtown"),
    ("br-02", "Pawcare Riverside"),
    ("br-03", "Pawcare Hillcrest"),
];

const CUSTOMERS: &[(&str, &str, Option<&str>)] = &[
    ("cus-anna", "Anna Keller", Some("gold")),
    ("cus-ben", "Ben Osei", Some("silver")),
    ("cus-chloe", "Chloe Tran", None),
];

const PETS: &[(&str, &str, &str, &str)] = &[
    ("pet-milo", "cus-anna", "Milo", "dog"),
    ("pet-luna", "cus-anna", "Luna", "cat"),
    ("pet-rex", "cus-ben", "Rex", "dog"),
    ("pet-kiwi", "cus-chloe", "Kiwi", "parrot"),
];

/// (id, name, price_cents); every service is offered at every branch
/// except grooming, which Hillcrest does not do.
const SERVICES: &[(&str, &str, i64)] = &[
    ("svc-exam", "General Examination", 4_000),
    ("svc-groom", "Full Grooming", 6_500),
    ("svc-vaccination", "Vaccination Visit", 2_000),
];

const PRODUCTS: &[(&str, &str, Option<&str>, i64)] = &[
    ("prd-food-dog", "Premium Dog Food 5kg", Some("food"), 3_200),
    ("prd-food-cat", "Premium Cat Food 3kg", Some("food"), 2_800),
    ("prd-leash", "Reflective Leash", Some("accessory"), 1_500),
    ("prd-amoxicillin", "Amoxicillin 250mg", Some("medicine"), 900),
    ("prd-dewormer", "Broad-Spectrum Dewormer", Some("medicine"), 1_200),
];

const VACCINES: &[(&str, &str, i64)] = &[
    ("vac-rabies", "Rabies", 2_500),
    ("vac-parvo", "Parvovirus", 2_200),
    ("vac-distemper", "Distemper", 2_400),
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Parse command line arguments
    let args: Vec<String> = env::args().collect();

    let mut db_path = String::from("./pawcare_dev.db");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Pawcare Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>    Database file path (default: ./pawcare_dev.db)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("🌱 Pawcare Seed Data Generator");
    println!("==============================");
    println!("Database: {}", db_path);
    println!();

    let db = Database::new(DbConfig::new(&db_path)).await?;

    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    let existing =
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM branches")
            .fetch_one(db.pool())
            .await?;
    if existing > 0 {
        println!("⚠ Database already has {} branches", existing);
        println!("  Skipping seed to avoid duplicates.");
        println!("  Delete the database file to regenerate.");
        return Ok(());
    }

    println!();
    println!("Seeding reference catalog...");

    for (id, name) in BRANCHES {
        sqlx::query("INSERT INTO branches (id, name) VALUES (?1, ?2)")
            .bind(id)
            .bind(name)
            .execute(db.pool())
            .await?;
    }

    for (id, name, tier) in CUSTOMERS {
        sqlx::query("INSERT INTO customers (id, name, tier, points) VALUES (?1, ?2, ?3, 0)")
            .bind(id)
            .bind(name)
            .bind(tier)
            .execute(db.pool())
            .await?;
    }

    for (id, customer_id, name, species) in PETS {
        sqlx::query(
            "INSERT INTO pets (id, customer_id, name, species, breed) \
             VALUES (?1, ?2, ?3, ?4, NULL)",
        )
        .bind(id)
        .bind(customer_id)
        .bind(name)
        .bind(species)
        .execute(db.pool())
        .await?;
    }

    for (id, name, price_cents) in SERVICES {
        sqlx::query("INSERT INTO services (id, name, price_cents) VALUES (?1, ?2, ?3)")
            .bind(id)
            .bind(name)
            .bind(price_cents)
            .execute(db.pool())
            .await?;

        for (branch_id, _) in BRANCHES {
            if *id == "svc-groom" && *branch_id == "br-03" {
                continue;
            }
            sqlx::query(
                "INSERT INTO service_offerings (branch_id, service_id) VALUES (?1, ?2)",
            )
            .bind(branch_id)
            .bind(id)
            .execute(db.pool())
            .await?;
        }
    }

    for (id, name, category, price_cents) in PRODUCTS {
        sqlx::query(
            "INSERT INTO products (id, name, category, price_cents) VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(id)
        .bind(name)
        .bind(category)
        .bind(price_cents)
        .execute(db.pool())
        .await?;
    }

    for (id, name, price_cents) in VACCINES {
        sqlx::query("INSERT INTO vaccines (id, name, price_cents) VALUES (?1, ?2, ?3)")
            .bind(id)
            .bind(name)
            .bind(price_cents)
            .execute(db.pool())
            .await?;
    }

    sqlx::query(
        "INSERT INTO packages (id, name, price_cents, validity_months) \
         VALUES ('pkg-puppy', 'Puppy Starter Package', 9000, 6)",
    )
    .execute(db.pool())
    .await?;
    for (vaccine_id, dose_count) in [("vac-rabies", 1_i64), ("vac-parvo", 2), ("vac-distemper", 2)]
    {
        sqlx::query(
            "INSERT INTO package_items (package_id, vaccine_id, dose_count) \
             VALUES ('pkg-puppy', ?1, ?2)",
        )
        .bind(vaccine_id)
        .bind(dose_count)
        .execute(db.pool())
        .await?;
    }

    println!("✓ Catalog seeded");
    println!();
    println!("Receiving stock...");

    for (i, (branch_id, _)) in BRANCHES.iter().enumerate() {
        for (product_id, _, _, _) in PRODUCTS {
            db.stock()
                .receive(branch_id, StockItemKind::Product, product_id, 20 + 5 * i as i64)
                .await?;
        }
        for (vaccine_id, _, _) in VACCINES {
            db.stock()
                .receive(branch_id, StockItemKind::Vaccine, vaccine_id, 10)
                .await?;
        }
    }

    println!("✓ Stock received into {} branches", BRANCHES.len());
    println!();
    println!("Running demo flow...");

    let session = db
        .sessions()
        .book("cus-anna", "pet-milo", "svc-exam", None)
        .await?;
    println!("  Booked {} at branch {}", session.id, session.branch_id);

    let invoice = db.retail().add_to_cart("cus-anna", "prd-food-dog", 2, None).await?;
    println!(
        "  Cart add: invoice {} total {} cents",
        invoice.id, invoice.total_cents
    );

    println!();
    println!("✓ Seed complete!");

    Ok(())
}
