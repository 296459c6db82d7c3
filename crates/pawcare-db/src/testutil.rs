//! Shared fixtures for repository tests.
//!
//! Seeds a small reference catalog directly with SQL (those tables are
//! read-only to the engine) so each test only sets up the stock and
//! balances it cares about.

use crate::pool::{Database, DbConfig};

/// Captures engine tracing in test output when RUST_LOG is set.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// In-memory database with migrations applied and the standard catalog.
pub(crate) async fn seeded_db() -> Database {
    init_tracing();
    let db = Database::new(DbConfig::in_memory()).await.unwrap();
    seed_catalog(&db).await;
    db
}

/// File-backed database for tests that need real connection concurrency
/// (`:memory:` pools are pinned to a single connection). The caller gets a
/// unique throwaway path under the system temp dir.
pub(crate) async fn seeded_file_db() -> (Database, std::path::PathBuf) {
    init_tracing();
    let path = std::env::temp_dir().join(format!("pawcare-test-{}.db", uuid::Uuid::new_v4()));
    let db = Database::new(DbConfig::new(&path).max_connections(5))
        .await
        .unwrap();
    seed_catalog(&db).await;
    (db, path)
}

/// Standard catalog:
/// - branches `br-01`, `br-02`
/// - `cus-1` owning `pet-1`; `cus-2` owning `pet-2`
/// - `svc-exam` (10 000c, both branches), `svc-groom` (6 000c, br-02 only)
/// - products `prd-food` (2 000c) and `prd-med` (900c, medicine)
/// - vaccines `vac-rabies` (2 500c), `vac-parvo` (2 200c)
/// - package `pkg-1` (9 000c, 6 months): 1× rabies, 3× parvo
pub(crate) async fn seed_catalog(db: &Database) {
    let pool = db.pool();

    let statements = [
        "INSERT INTO branches (id, name) VALUES ('br-01', 'Downtown'), ('br-02', 'Riverside')",
        "INSERT INTO customers (id, name, tier, points) VALUES \
             ('cus-1', 'Anna Keller', 'gold', 0), ('cus-2', 'Ben Osei', NULL, 0)",
        "INSERT INTO pets (id, customer_id, name, species, breed) VALUES \
             ('pet-1', 'cus-1', 'Milo', 'dog', NULL), \
             ('pet-2', 'cus-2', 'Rex', 'dog', NULL)",
        "INSERT INTO services (id, name, price_cents) VALUES \
             ('svc-exam', 'General Examination', 10000), \
             ('svc-groom', 'Full Grooming', 6000)",
        "INSERT INTO service_offerings (branch_id, service_id) VALUES \
             ('br-01', 'svc-exam'), ('br-02', 'svc-exam'), ('br-02', 'svc-groom')",
        "INSERT INTO products (id, name, category, price_cents) VALUES \
             ('prd-food', 'Premium Dog Food 5kg', 'food', 2000), \
             ('prd-med', 'Amoxicillin 250mg', 'medicine', 900)",
        "INSERT INTO vaccines (id, name, price_cents) VALUES \
             ('vac-rabies', 'Rabies', 2500), ('vac-parvo', 'Parvovirus', 2200)",
        "INSERT INTO packages (id, name, price_cents, validity_months) VALUES \
             ('pkg-1', 'Puppy Starter Package', 9000, 6)",
        "INSERT INTO package_items (package_id, vaccine_id, dose_count) VALUES \
             ('pkg-1', 'vac-rabies', 1), ('pkg-1', 'vac-parvo', 3)",
    ];

    for sql in statements {
        sqlx::query(sql).execute(pool).await.unwrap();
    }
}
