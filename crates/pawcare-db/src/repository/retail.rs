//! # Retail Cart
//!
//! Over-the-counter product sales attached to the customer's open invoice.
//!
//! ## Add-to-Cart Pipeline
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │ add_to_cart(customer, product, qty, branch?)                 │
//! │                                                              │
//! │  1. validate quantity (1..=999)                              │
//! │  2. load product (price snapshot source)                     │
//! │  3. resolve fulfilling branch (explicit or best-stocked)     │
//! │  4. find-or-create open invoice                              │
//! │  5. find-or-create retail session on (invoice, branch)       │
//! │  6. upsert line: same product merges, quantity accumulates   │
//! │  7. decrement branch stock (conditional, may fail)           │
//! │  8. recalculate invoice total                                │
//! │                                                              │
//! │  One transaction. A stock shortfall at step 7 unwinds        │
//! │  everything including a freshly created invoice.             │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Retail sessions are bookkeeping containers: they are born
//! `done_service` with a zero price and never pass through the service
//! lifecycle. The invoice total counts their lines, not the session.

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::info;
use uuid::Uuid;

use crate::error::{DbError, EngineResult};
use crate::repository::{catalog, invoice, resolver, stock};
use pawcare_core::validation::{validate_id, validate_quantity};
use pawcare_core::{CoreError, Invoice, RetailLine, StockItemKind};

/// Repository for retail cart operations.
#[derive(Debug, Clone)]
pub struct RetailRepository {
    pool: SqlitePool,
}

impl RetailRepository {
    /// Creates a new RetailRepository.
    pub fn new(pool: SqlitePool) -> Self {
        RetailRepository { pool }
    }

    /// Adds `quantity` of a product to the customer's open invoice.
    ///
    /// With `branch` set, that branch must hold enough stock; otherwise the
    /// resolver picks the best-stocked branch. Returns the refreshed invoice.
    pub async fn add_to_cart(
        &self,
        customer_id: &str,
        product_id: &str,
        quantity: i64,
        branch: Option<&str>,
    ) -> EngineResult<Invoice> {
        validate_id("customer_id", customer_id)?;
        validate_id("product_id", product_id)?;
        validate_quantity(quantity)?;

        let mut tx = self.pool.begin().await?;

        let product = catalog::get_product(&mut tx, product_id).await?;
        let branch_id = match branch {
            Some(id) => {
                catalog::branch_exists(&mut tx, id).await?;
                id.to_string()
            }
            None => resolver::resolve_for_product(&mut tx, product_id, quantity).await?,
        };

        let inv = invoice::find_or_create_open(&mut tx, customer_id).await?;
        let session_id = find_or_create_retail_session(&mut tx, &inv.id, &branch_id).await?;

        // Merge repeated adds of the same product into one line. The unit
        // price is snapshotted on first insert and kept on merge, so a later
        // catalog price change never rewrites an existing cart line.
        sqlx::query(
            "INSERT INTO retail_lines \
                 (id, session_id, product_id, quantity, unit_price_cents, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6) \
             ON CONFLICT (session_id, product_id) \
             DO UPDATE SET quantity = quantity + excluded.quantity",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(&session_id)
        .bind(product_id)
        .bind(quantity)
        .bind(product.price_cents)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        stock::adjust(&mut tx, &branch_id, StockItemKind::Product, product_id, -quantity).await?;

        invoice::recalculate(&mut tx, &inv.id).await?;
        let refreshed = invoice::get_invoice(&mut tx, &inv.id).await?;

        tx.commit().await?;

        info!(
            customer_id = %customer_id,
            product_id = %product_id,
            quantity = %quantity,
            branch_id = %branch_id,
            invoice_id = %refreshed.id,
            "Product added to cart"
        );
        Ok(refreshed)
    }

    /// All retail lines on an invoice, across its retail sessions.
    pub async fn get_lines(&self, invoice_id: &str) -> EngineResult<Vec<RetailLine>> {
        let lines = sqlx::query_as::<_, RetailLine>(
            "SELECT rl.id, rl.session_id, rl.product_id, rl.quantity, \
                    rl.unit_price_cents, rl.created_at \
             FROM retail_lines rl \
             JOIN service_sessions s ON s.id = rl.session_id \
             WHERE s.invoice_id = ?1 \
             ORDER BY rl.id",
        )
        .bind(invoice_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(lines)
    }
}

/// Finds the invoice's retail session for a branch, creating it if absent.
///
/// At most one retail session exists per (invoice, branch); the partial
/// unique index backs this up if two adds race.
pub(crate) async fn find_or_create_retail_session(
    conn: &mut SqliteConnection,
    invoice_id: &str,
    branch_id: &str,
) -> EngineResult<String> {
    let existing = sqlx::query_scalar::<_, String>(
        "SELECT id FROM service_sessions \
         WHERE invoice_id = ?1 AND branch_id = ?2 AND is_retail = 1",
    )
    .bind(invoice_id)
    .bind(branch_id)
    .fetch_optional(&mut *conn)
    .await?;

    if let Some(id) = existing {
        return Ok(id);
    }

    let id = Uuid::new_v4().to_string();
    let inserted = sqlx::query(
        "INSERT INTO service_sessions \
             (id, invoice_id, branch_id, pet_id, service_id, is_retail, \
              price_cents, status, created_at) \
         VALUES (?1, ?2, ?3, NULL, NULL, 1, 0, 'done_service', ?4)",
    )
    .bind(&id)
    .bind(invoice_id)
    .bind(branch_id)
    .bind(Utc::now())
    .execute(&mut *conn)
    .await;

    match inserted {
        Ok(_) => Ok(id),
        // ux_sessions_retail fired: a concurrent add created the session
        // first. The loser re-reads the winner's row.
        Err(err) => match DbError::from(err) {
            DbError::UniqueViolation { .. } => sqlx::query_scalar::<_, String>(
                "SELECT id FROM service_sessions \
                 WHERE invoice_id = ?1 AND branch_id = ?2 AND is_retail = 1",
            )
            .bind(invoice_id)
            .bind(branch_id)
            .fetch_optional(&mut *conn)
            .await?
            .ok_or_else(|| {
                CoreError::conflict(format!(
                    "retail session on invoice {invoice_id} changed concurrently"
                ))
                .into()
            }),
            other => Err(other.into()),
        },
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngineError;
    use crate::testutil::seeded_db;

    #[tokio::test]
    async fn test_repeated_adds_merge_into_one_line() {
        let db = seeded_db().await;
        db.stock().receive("br-01", StockItemKind::Product, "prd-food", 10).await.unwrap();

        let repo = db.retail();
        repo.add_to_cart("cus-1", "prd-food", 2, None).await.unwrap();
        let invoice = repo.add_to_cart("cus-1", "prd-food", 3, None).await.unwrap();

        let lines = repo.get_lines(&invoice.id).await.unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].quantity, 5);
        assert_eq!(lines[0].unit_price_cents, 2000);
        assert_eq!(invoice.total_cents, 10_000);

        // Both adds share the invoice's single retail session for br-01.
        let sessions = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM service_sessions WHERE invoice_id = ?1 AND is_retail = 1",
        )
        .bind(&invoice.id)
        .fetch_one(db.pool())
        .await
        .unwrap();
        assert_eq!(sessions, 1);

        assert_eq!(
            db.stock().quantity("br-01", StockItemKind::Product, "prd-food").await.unwrap(),
            5
        );
    }

    #[tokio::test]
    async fn test_unit_price_is_frozen_at_first_add() {
        let db = seeded_db().await;
        db.stock().receive("br-01", StockItemKind::Product, "prd-food", 10).await.unwrap();

        let repo = db.retail();
        repo.add_to_cart("cus-1", "prd-food", 1, None).await.unwrap();

        sqlx::query("UPDATE products SET price_cents = 9999 WHERE id = 'prd-food'")
            .execute(db.pool())
            .await
            .unwrap();

        let invoice = repo.add_to_cart("cus-1", "prd-food", 1, None).await.unwrap();
        let lines = repo.get_lines(&invoice.id).await.unwrap();
        assert_eq!(lines[0].unit_price_cents, 2000);
        assert_eq!(invoice.total_cents, 4000);
    }

    #[tokio::test]
    async fn test_shortfall_rolls_back_the_whole_add() {
        let db = seeded_db().await;
        db.stock().receive("br-01", StockItemKind::Product, "prd-food", 1).await.unwrap();

        let err = db
            .retail()
            .add_to_cart("cus-2", "prd-food", 2, Some("br-01"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::Domain(CoreError::InsufficientStock { available: 1, .. })
        ));

        // No invoice, session or line survived the rollback; stock intact.
        let invoices = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM invoices WHERE customer_id = 'cus-2'",
        )
        .fetch_one(db.pool())
        .await
        .unwrap();
        assert_eq!(invoices, 0);
        assert_eq!(
            db.stock().quantity("br-01", StockItemKind::Product, "prd-food").await.unwrap(),
            1
        );
    }

    #[tokio::test]
    async fn test_resolver_routes_to_stocked_branch() {
        let db = seeded_db().await;
        db.stock().receive("br-02", StockItemKind::Product, "prd-med", 6).await.unwrap();

        let invoice = db.retail().add_to_cart("cus-1", "prd-med", 4, None).await.unwrap();
        let lines = db.retail().get_lines(&invoice.id).await.unwrap();

        let branch = sqlx::query_scalar::<_, String>(
            "SELECT branch_id FROM service_sessions WHERE id = ?1",
        )
        .bind(&lines[0].session_id)
        .fetch_one(db.pool())
        .await
        .unwrap();
        assert_eq!(branch, "br-02");

        // Nobody holds 7 units.
        let err = db.retail().add_to_cart("cus-1", "prd-med", 7, None).await.unwrap_err();
        assert!(matches!(
            err,
            EngineError::Domain(CoreError::OutOfStock { requested: 7, .. })
        ));
    }

    #[tokio::test]
    async fn test_quantity_bounds_are_enforced() {
        let db = seeded_db().await;
        for bad in [0, -1, 1000] {
            let err = db.retail().add_to_cart("cus-1", "prd-food", bad, None).await.unwrap_err();
            assert!(matches!(err, EngineError::Domain(CoreError::Validation(_))));
        }
    }

    #[tokio::test]
    async fn test_blank_ids_are_rejected_before_touching_the_db() {
        let db = seeded_db().await;

        for (customer, product) in [("  ", "prd-food"), ("cus-1", "")] {
            let err = db.retail().add_to_cart(customer, product, 1, None).await.unwrap_err();
            assert!(matches!(err, EngineError::Domain(CoreError::Validation(_))));
        }
    }

    #[tokio::test]
    async fn test_explicit_unknown_branch_is_not_found() {
        let db = seeded_db().await;
        db.stock().receive("br-01", StockItemKind::Product, "prd-food", 5).await.unwrap();

        let err = db
            .retail()
            .add_to_cart("cus-1", "prd-food", 1, Some("br-ghost"))
            .await
            .unwrap_err();
        assert!(err.is_business());
        assert!(matches!(
            err,
            EngineError::Domain(CoreError::NotFound { entity: "Branch", .. })
        ));

        // Nothing was sold and no invoice was opened.
        let invoices = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM invoices WHERE customer_id = 'cus-1'",
        )
        .fetch_one(db.pool())
        .await
        .unwrap();
        assert_eq!(invoices, 0);
        assert_eq!(
            db.stock().quantity("br-01", StockItemKind::Product, "prd-food").await.unwrap(),
            5
        );
    }

    #[tokio::test]
    async fn test_concurrent_adds_share_one_retail_session() {
        let (db, path) = crate::testutil::seeded_file_db().await;
        db.stock().receive("br-01", StockItemKind::Product, "prd-food", 8).await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let repo = db.retail();
            handles.push(tokio::spawn(async move {
                // A losing writer reports a retryable error; retry as a
                // caller would until the add lands.
                loop {
                    match repo.add_to_cart("cus-1", "prd-food", 1, Some("br-01")).await {
                        Ok(invoice) => break invoice,
                        Err(err) if err.is_retryable() => continue,
                        Err(err) => panic!("unexpected error: {err}"),
                    }
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let invoice = db.invoices().open_for("cus-1").await.unwrap().unwrap();
        let lines = db.retail().get_lines(&invoice.id).await.unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].quantity, 8);

        let sessions = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM service_sessions WHERE invoice_id = ?1 AND is_retail = 1",
        )
        .bind(&invoice.id)
        .fetch_one(db.pool())
        .await
        .unwrap();
        assert_eq!(sessions, 1);

        db.close().await;
        for suffix in ["", "-wal", "-shm"] {
            let _ = std::fs::remove_file(format!("{}{}", path.display(), suffix));
        }
    }
}
