//! # Package Purchases & Dose Ledger
//!
//! Prepaid vaccination packages: purchase seeds a per-vaccine dose ledger,
//! administration draws it down.
//!
//! ## Dose Ledger
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  purchase(customer, package)                                    │
//! │     package_items ──seed──► dose_balances                       │
//! │       (vaccine, dose_count)   (remaining = original = count)    │
//! │                                                                 │
//! │  consume(customer, package, vaccine, n)                         │
//! │     pick OLDEST non-expired purchase with remaining >= n,       │
//! │     then one conditional update:                                │
//! │       UPDATE dose_balances SET remaining = remaining - n        │
//! │        WHERE purchase_id = ? AND vaccine_id = ?                 │
//! │          AND remaining >= n                                     │
//! │                                                                 │
//! │  remaining only ever decreases after the seed; a shortfall      │
//! │  reports InsufficientDose and rolls the caller's transaction    │
//! │  back untouched.                                                │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Expiry is computed from `purchased_at + validity_months`, never stored;
//! an expired purchase's doses are forfeit and skipped by consumption.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::EngineResult;
use crate::repository::{catalog, invoice};
use pawcare_core::package::{is_expired, purchase_status, PurchaseStatus};
use pawcare_core::validation::{validate_doses, validate_id};
use pawcare_core::{CoreError, DoseBalance, PackagePurchase};

/// A purchase with its computed status, balances and fulfilment warnings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageOverview {
    pub purchase: PackagePurchase,
    pub status: PurchaseStatus,
    pub balances: Vec<DoseBalance>,
    /// Vaccines with doses still owed to the customer but zero stock on
    /// hand across every branch. Advisory only; consumption still fails
    /// at administration time if nothing arrived.
    pub unfulfillable_vaccines: Vec<String>,
}

/// Repository for package purchase and dose-ledger operations.
#[derive(Debug, Clone)]
pub struct PackageRepository {
    pool: SqlitePool,
}

impl PackageRepository {
    /// Creates a new PackageRepository.
    pub fn new(pool: SqlitePool) -> Self {
        PackageRepository { pool }
    }

    /// Purchases a package onto the customer's open invoice.
    ///
    /// Seeds one dose balance per package item and recomputes the invoice
    /// total with the package price.
    pub async fn purchase(
        &self,
        customer_id: &str,
        package_id: &str,
    ) -> EngineResult<PackagePurchase> {
        validate_id("customer_id", customer_id)?;
        validate_id("package_id", package_id)?;

        let mut tx = self.pool.begin().await?;

        catalog::get_package(&mut tx, package_id).await?;
        let items = catalog::get_package_items(&mut tx, package_id).await?;
        let inv = invoice::find_or_create_open(&mut tx, customer_id).await?;

        let purchase = PackagePurchase {
            id: Uuid::new_v4().to_string(),
            invoice_id: inv.id.clone(),
            customer_id: customer_id.to_string(),
            package_id: package_id.to_string(),
            purchased_at: Utc::now(),
        };

        sqlx::query(
            "INSERT INTO package_purchases \
                 (id, invoice_id, customer_id, package_id, purchased_at) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(&purchase.id)
        .bind(&purchase.invoice_id)
        .bind(customer_id)
        .bind(package_id)
        .bind(purchase.purchased_at)
        .execute(&mut *tx)
        .await?;

        for item in &items {
            sqlx::query(
                "INSERT INTO dose_balances (purchase_id, vaccine_id, remaining, original) \
                 VALUES (?1, ?2, ?3, ?3)",
            )
            .bind(&purchase.id)
            .bind(&item.vaccine_id)
            .bind(item.dose_count)
            .execute(&mut *tx)
            .await?;
        }

        invoice::recalculate(&mut tx, &inv.id).await?;
        tx.commit().await?;

        info!(
            purchase_id = %purchase.id,
            customer_id = %customer_id,
            package_id = %package_id,
            vaccines = items.len(),
            "Package purchased"
        );
        Ok(purchase)
    }

    /// Draws `amount` doses of a vaccine from the customer's oldest
    /// non-expired purchase of the package. Returns the updated balance.
    pub async fn consume(
        &self,
        customer_id: &str,
        package_id: &str,
        vaccine_id: &str,
        amount: i64,
    ) -> EngineResult<DoseBalance> {
        validate_doses(amount)?;

        let mut tx = self.pool.begin().await?;
        let purchase_id =
            consume_doses(&mut tx, customer_id, package_id, vaccine_id, amount).await?;

        let balance = sqlx::query_as::<_, DoseBalance>(
            "SELECT purchase_id, vaccine_id, remaining, original FROM dose_balances \
             WHERE purchase_id = ?1 AND vaccine_id = ?2",
        )
        .bind(&purchase_id)
        .bind(vaccine_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(balance)
    }

    /// All dose balances under one purchase.
    pub async fn balances(&self, purchase_id: &str) -> EngineResult<Vec<DoseBalance>> {
        let balances = sqlx::query_as::<_, DoseBalance>(
            "SELECT purchase_id, vaccine_id, remaining, original FROM dose_balances \
             WHERE purchase_id = ?1 ORDER BY vaccine_id",
        )
        .bind(purchase_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(balances)
    }

    /// A customer's purchases, newest first.
    pub async fn purchases_of(&self, customer_id: &str) -> EngineResult<Vec<PackagePurchase>> {
        let purchases = sqlx::query_as::<_, PackagePurchase>(
            "SELECT id, invoice_id, customer_id, package_id, purchased_at \
             FROM package_purchases WHERE customer_id = ?1 \
             ORDER BY purchased_at DESC, id DESC",
        )
        .bind(customer_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(purchases)
    }

    /// One purchase with computed status and fulfilment warnings.
    pub async fn overview(&self, purchase_id: &str) -> EngineResult<PackageOverview> {
        let purchase = sqlx::query_as::<_, PackagePurchase>(
            "SELECT id, invoice_id, customer_id, package_id, purchased_at \
             FROM package_purchases WHERE id = ?1",
        )
        .bind(purchase_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| CoreError::not_found("PackagePurchase", purchase_id))?;

        let validity_months = sqlx::query_scalar::<_, i64>(
            "SELECT validity_months FROM packages WHERE id = ?1",
        )
        .bind(&purchase.package_id)
        .fetch_one(&self.pool)
        .await?;

        let balances = self.balances(purchase_id).await?;
        let status =
            purchase_status(purchase.purchased_at, validity_months, &balances, Utc::now());

        // Doses still owed but with zero stock anywhere in the network.
        let unfulfillable_vaccines = sqlx::query_scalar::<_, String>(
            "SELECT db.vaccine_id FROM dose_balances db \
             WHERE db.purchase_id = ?1 AND db.remaining > 0 \
               AND NOT EXISTS (SELECT 1 FROM branch_stock bs \
                               WHERE bs.item_kind = 'vaccine' \
                                 AND bs.item_id = db.vaccine_id \
                                 AND bs.quantity > 0) \
             ORDER BY db.vaccine_id",
        )
        .bind(purchase_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(PackageOverview {
            purchase,
            status,
            balances,
            unfulfillable_vaccines,
        })
    }
}

// =============================================================================
// Transaction-scoped consumption (shared with session completion)
// =============================================================================

/// Consumes doses inside the caller's transaction; returns the purchase id
/// the doses came from.
///
/// Candidate purchases are the customer's purchases of the package holding
/// a balance for the vaccine, oldest first. Expired purchases are skipped
/// (their doses are forfeit), as are purchases whose remaining balance
/// cannot cover the full amount; a single administration never splits
/// across purchases.
pub(crate) async fn consume_doses(
    conn: &mut SqliteConnection,
    customer_id: &str,
    package_id: &str,
    vaccine_id: &str,
    amount: i64,
) -> EngineResult<String> {
    let candidates = sqlx::query_as::<_, (String, DateTime<Utc>, i64, i64)>(
        "SELECT pp.id, pp.purchased_at, p.validity_months, db.remaining \
         FROM package_purchases pp \
         JOIN packages p ON p.id = pp.package_id \
         JOIN dose_balances db \
           ON db.purchase_id = pp.id AND db.vaccine_id = ?3 \
         WHERE pp.customer_id = ?1 AND pp.package_id = ?2 \
         ORDER BY pp.purchased_at ASC, pp.id ASC",
    )
    .bind(customer_id)
    .bind(package_id)
    .bind(vaccine_id)
    .fetch_all(&mut *conn)
    .await?;

    let now = Utc::now();
    let mut best_remaining = 0;
    let mut chosen: Option<&str> = None;

    for (id, purchased_at, validity_months, remaining) in &candidates {
        if is_expired(*purchased_at, *validity_months, now) {
            continue;
        }
        best_remaining = best_remaining.max(*remaining);
        if chosen.is_none() && *remaining >= amount {
            chosen = Some(id.as_str());
        }
    }

    let purchase_id = match chosen {
        Some(id) => id.to_string(),
        None => {
            return Err(CoreError::InsufficientDose {
                package_id: package_id.to_string(),
                vaccine_id: vaccine_id.to_string(),
                remaining: best_remaining,
                requested: amount,
            }
            .into());
        }
    };

    let result = sqlx::query(
        "UPDATE dose_balances SET remaining = remaining - ?3 \
         WHERE purchase_id = ?1 AND vaccine_id = ?2 AND remaining >= ?3",
    )
    .bind(&purchase_id)
    .bind(vaccine_id)
    .bind(amount)
    .execute(&mut *conn)
    .await?;

    // A concurrent consumer got there first between the read and the
    // conditional update.
    if result.rows_affected() == 0 {
        let remaining = sqlx::query_scalar::<_, i64>(
            "SELECT remaining FROM dose_balances \
             WHERE purchase_id = ?1 AND vaccine_id = ?2",
        )
        .bind(&purchase_id)
        .bind(vaccine_id)
        .fetch_optional(&mut *conn)
        .await?
        .unwrap_or(0);

        return Err(CoreError::InsufficientDose {
            package_id: package_id.to_string(),
            vaccine_id: vaccine_id.to_string(),
            remaining,
            requested: amount,
        }
        .into());
    }

    debug!(
        purchase_id = %purchase_id,
        vaccine_id = %vaccine_id,
        amount = %amount,
        "Doses consumed"
    );
    Ok(purchase_id)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngineError;
    use crate::testutil::seeded_db;
    use pawcare_core::StockItemKind;

    async fn backdate(db: &crate::pool::Database, purchase_id: &str, months_ago: u32) {
        let when = Utc::now().checked_sub_months(chrono::Months::new(months_ago)).unwrap();
        sqlx::query("UPDATE package_purchases SET purchased_at = ?2 WHERE id = ?1")
            .bind(purchase_id)
            .bind(when)
            .execute(db.pool())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_purchase_seeds_balances_and_invoice_total() {
        let db = seeded_db().await;

        let purchase = db.packages().purchase("cus-1", "pkg-1").await.unwrap();
        let balances = db.packages().balances(&purchase.id).await.unwrap();

        assert_eq!(balances.len(), 2);
        for balance in &balances {
            assert_eq!(balance.remaining, balance.original);
        }
        let parvo = balances.iter().find(|b| b.vaccine_id == "vac-parvo").unwrap();
        assert_eq!(parvo.original, 3);

        let invoice = db.invoices().get_by_id(&purchase.invoice_id).await.unwrap();
        assert_eq!(invoice.total_cents, 9000);
    }

    #[tokio::test]
    async fn test_consume_decrements_and_rejects_shortfall() {
        let db = seeded_db().await;
        db.packages().purchase("cus-1", "pkg-1").await.unwrap();

        let balance = db
            .packages()
            .consume("cus-1", "pkg-1", "vac-parvo", 1)
            .await
            .unwrap();
        assert_eq!(balance.remaining, 2);

        // A single administration never splits across what's left.
        let err = db
            .packages()
            .consume("cus-1", "pkg-1", "vac-parvo", 3)
            .await
            .unwrap_err();
        match err {
            EngineError::Domain(CoreError::InsufficientDose {
                remaining,
                requested,
                ..
            }) => {
                assert_eq!(remaining, 2);
                assert_eq!(requested, 3);
            }
            other => panic!("unexpected error: {other}"),
        }

        // The failed draw changed nothing.
        let purchases = db.packages().purchases_of("cus-1").await.unwrap();
        let balances = db.packages().balances(&purchases[0].id).await.unwrap();
        let parvo = balances.iter().find(|b| b.vaccine_id == "vac-parvo").unwrap();
        assert_eq!(parvo.remaining, 2);
    }

    #[tokio::test]
    async fn test_consume_draws_from_oldest_covering_purchase() {
        let db = seeded_db().await;

        let older = db.packages().purchase("cus-1", "pkg-1").await.unwrap();
        let newer = db.packages().purchase("cus-1", "pkg-1").await.unwrap();
        backdate(&db, &older.id, 2).await;

        db.packages().consume("cus-1", "pkg-1", "vac-rabies", 1).await.unwrap();

        let drained = db.packages().balances(&older.id).await.unwrap();
        let rabies = drained.iter().find(|b| b.vaccine_id == "vac-rabies").unwrap();
        assert_eq!(rabies.remaining, 0);

        let untouched = db.packages().balances(&newer.id).await.unwrap();
        let rabies = untouched.iter().find(|b| b.vaccine_id == "vac-rabies").unwrap();
        assert_eq!(rabies.remaining, 1);

        // The drained balance no longer covers rabies; the newer one does.
        db.packages().consume("cus-1", "pkg-1", "vac-rabies", 1).await.unwrap();
        let drained = db.packages().balances(&newer.id).await.unwrap();
        let rabies = drained.iter().find(|b| b.vaccine_id == "vac-rabies").unwrap();
        assert_eq!(rabies.remaining, 0);
    }

    #[tokio::test]
    async fn test_expired_doses_are_forfeit() {
        let db = seeded_db().await;

        let purchase = db.packages().purchase("cus-1", "pkg-1").await.unwrap();
        backdate(&db, &purchase.id, 7).await; // validity is 6 months

        let err = db
            .packages()
            .consume("cus-1", "pkg-1", "vac-parvo", 1)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::Domain(CoreError::InsufficientDose { remaining: 0, .. })
        ));

        let overview = db.packages().overview(&purchase.id).await.unwrap();
        assert_eq!(overview.status, PurchaseStatus::Expired);
    }

    #[tokio::test]
    async fn test_fully_consumed_purchase_stays_completed_past_expiry() {
        let db = seeded_db().await;

        let purchase = db.packages().purchase("cus-1", "pkg-1").await.unwrap();
        db.packages().consume("cus-1", "pkg-1", "vac-rabies", 1).await.unwrap();
        db.packages().consume("cus-1", "pkg-1", "vac-parvo", 3).await.unwrap();

        backdate(&db, &purchase.id, 12).await;

        let overview = db.packages().overview(&purchase.id).await.unwrap();
        assert_eq!(overview.status, PurchaseStatus::Completed);
        assert!(overview.unfulfillable_vaccines.is_empty());
    }

    #[tokio::test]
    async fn test_overview_flags_vaccines_with_no_stock_anywhere() {
        let db = seeded_db().await;

        let purchase = db.packages().purchase("cus-1", "pkg-1").await.unwrap();

        let overview = db.packages().overview(&purchase.id).await.unwrap();
        assert_eq!(
            overview.unfulfillable_vaccines,
            vec!["vac-parvo".to_string(), "vac-rabies".to_string()]
        );
        assert_eq!(overview.status, PurchaseStatus::Active);

        db.stock().receive("br-02", StockItemKind::Vaccine, "vac-rabies", 1).await.unwrap();

        let overview = db.packages().overview(&purchase.id).await.unwrap();
        assert_eq!(overview.unfulfillable_vaccines, vec!["vac-parvo".to_string()]);
    }

    #[tokio::test]
    async fn test_unknown_package_is_not_found() {
        let db = seeded_db().await;
        let err = db.packages().purchase("cus-1", "pkg-ghost").await.unwrap_err();
        assert!(matches!(
            err,
            EngineError::Domain(CoreError::NotFound { entity: "Package", .. })
        ));

        let err = db.packages().purchase("cus-1", "").await.unwrap_err();
        assert!(matches!(err, EngineError::Domain(CoreError::Validation(_))));
    }
}
