//! # Stock Ledger
//!
//! Per-branch quantity-on-hand for products and vaccines.
//!
//! ## Atomic Conditional Updates
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    Decrement Strategy                           │
//! │                                                                 │
//! │  ❌ WRONG: read-then-write (loses the race, oversells)          │
//! │     SELECT quantity ... ; UPDATE ... SET quantity = 3           │
//! │                                                                 │
//! │  ✅ CORRECT: single conditional update                          │
//! │     UPDATE branch_stock                                         │
//! │        SET quantity = quantity + :delta                         │
//! │      WHERE ... AND quantity + :delta >= 0                       │
//! │                                                                 │
//! │  Two concurrent sales of the last unit: exactly one update      │
//! │  matches, the other reports InsufficientStock and its whole     │
//! │  transaction rolls back.                                        │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Increments upsert the row, so receiving stock for a branch/item pair
//! that never held any creates it.

use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};

use crate::error::EngineResult;
use crate::repository::catalog;
use pawcare_core::validation::{validate_id, validate_quantity};
use pawcare_core::{CoreError, StockItemKind};

/// Repository for stock-ledger operations.
#[derive(Debug, Clone)]
pub struct StockRepository {
    pool: SqlitePool,
}

impl StockRepository {
    /// Creates a new StockRepository.
    pub fn new(pool: SqlitePool) -> Self {
        StockRepository { pool }
    }

    /// Adjusts a branch's quantity-on-hand by `delta`.
    ///
    /// Positive deltas always succeed (and create the row if missing);
    /// negative deltas fail with `InsufficientStock` when coverage is
    /// short, leaving the quantity untouched.
    pub async fn adjust(
        &self,
        branch_id: &str,
        kind: StockItemKind,
        item_id: &str,
        delta: i64,
    ) -> EngineResult<()> {
        let mut tx = self.pool.begin().await?;
        adjust(&mut tx, branch_id, kind, item_id, delta).await?;
        tx.commit().await?;
        Ok(())
    }

    /// Receives stock into a branch (delta > 0 convenience wrapper).
    pub async fn receive(
        &self,
        branch_id: &str,
        kind: StockItemKind,
        item_id: &str,
        quantity: i64,
    ) -> EngineResult<()> {
        validate_id("branch_id", branch_id)?;
        validate_id("item_id", item_id)?;
        validate_quantity(quantity)?;

        let mut tx = self.pool.begin().await?;
        adjust(&mut tx, branch_id, kind, item_id, quantity).await?;
        tx.commit().await?;

        info!(branch_id = %branch_id, item_id = %item_id, quantity = %quantity, "Stock received");
        Ok(())
    }

    /// Current quantity-on-hand (0 when the row doesn't exist).
    pub async fn quantity(
        &self,
        branch_id: &str,
        kind: StockItemKind,
        item_id: &str,
    ) -> EngineResult<i64> {
        let quantity = sqlx::query_scalar::<_, i64>(
            "SELECT quantity FROM branch_stock \
             WHERE branch_id = ?1 AND item_kind = ?2 AND item_id = ?3",
        )
        .bind(branch_id)
        .bind(kind)
        .bind(item_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(quantity.unwrap_or(0))
    }
}

// =============================================================================
// Transaction-scoped adjustment (shared with engine operations)
// =============================================================================

/// Applies a stock delta inside the caller's transaction.
///
/// All sale-side decrements run through here, inside the same transaction
/// as the invoice line they support, so a shortfall rolls back the whole
/// purchase.
pub(crate) async fn adjust(
    conn: &mut SqliteConnection,
    branch_id: &str,
    kind: StockItemKind,
    item_id: &str,
    delta: i64,
) -> EngineResult<()> {
    if delta >= 0 {
        // Receiving: upsert so unseen branch/item pairs start existing.
        // The branch itself must exist; a typo'd branch id is a caller
        // mistake, not a foreign-key incident.
        catalog::branch_exists(&mut *conn, branch_id).await?;

        sqlx::query(
            "INSERT INTO branch_stock (branch_id, item_kind, item_id, quantity) \
             VALUES (?1, ?2, ?3, ?4) \
             ON CONFLICT (branch_id, item_kind, item_id) \
             DO UPDATE SET quantity = quantity + excluded.quantity",
        )
        .bind(branch_id)
        .bind(kind)
        .bind(item_id)
        .bind(delta)
        .execute(&mut *conn)
        .await?;

        debug!(branch_id = %branch_id, item_id = %item_id, delta = %delta, "Stock incremented");
        return Ok(());
    }

    // Selling/dispensing: conditional single-statement decrement.
    let result = sqlx::query(
        "UPDATE branch_stock SET quantity = quantity + ?4 \
         WHERE branch_id = ?1 AND item_kind = ?2 AND item_id = ?3 \
           AND quantity + ?4 >= 0",
    )
    .bind(branch_id)
    .bind(kind)
    .bind(item_id)
    .bind(delta)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        let available = sqlx::query_scalar::<_, i64>(
            "SELECT quantity FROM branch_stock \
             WHERE branch_id = ?1 AND item_kind = ?2 AND item_id = ?3",
        )
        .bind(branch_id)
        .bind(kind)
        .bind(item_id)
        .fetch_optional(&mut *conn)
        .await?
        .unwrap_or(0);

        return Err(CoreError::InsufficientStock {
            branch_id: branch_id.to_string(),
            item: item_id.to_string(),
            available,
            requested: -delta,
        }
        .into());
    }

    debug!(branch_id = %branch_id, item_id = %item_id, delta = %delta, "Stock decremented");
    Ok(())
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
    async fn test_receive_creates_then_accumulates() {
        let db = seeded_db().await;
        let repo = db.stock();

        repo.receive("br-01", StockItemKind::Product, "prd-food", 5).await.unwrap();
        repo.receive("br-01", StockItemKind::Product, "prd-food", 3).await.unwrap();

        assert_eq!(
            repo.quantity("br-01", StockItemKind::Product, "prd-food").await.unwrap(),
            8
        );
        // Other branches are untouched.
        assert_eq!(
            repo.quantity("br-02", StockItemKind::Product, "prd-food").await.unwrap(),
            0
        );
    }

    #[tokio::test]
    async fn test_decrement_never_goes_negative() {
        let db = seeded_db().await;
        let repo = db.stock();

        repo.receive("br-01", StockItemKind::Vaccine, "vac-rabies", 2).await.unwrap();

        let err = repo
            .adjust("br-01", StockItemKind::Vaccine, "vac-rabies", -3)
            .await
            .unwrap_err();
        match err {
            EngineError::Domain(CoreError::InsufficientStock {
                available,
                requested,
                ..
            }) => {
                assert_eq!(available, 2);
                assert_eq!(requested, 3);
            }
            other => panic!("unexpected error: {other}"),
        }

        // The failed decrement left the quantity untouched.
        assert_eq!(
            repo.quantity("br-01", StockItemKind::Vaccine, "vac-rabies").await.unwrap(),
            2
        );

        repo.adjust("br-01", StockItemKind::Vaccine, "vac-rabies", -2).await.unwrap();
        assert_eq!(
            repo.quantity("br-01", StockItemKind::Vaccine, "vac-rabies").await.unwrap(),
            0
        );
    }

    #[tokio::test]
    async fn test_decrement_on_missing_row_reports_zero_available() {
        let db = seeded_db().await;

        let err = db
            .stock()
            .adjust("br-01", StockItemKind::Product, "prd-med", -1)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::Domain(CoreError::InsufficientStock { available: 0, .. })
        ));
    }

    #[tokio::test]
    async fn test_receive_into_unknown_branch_is_not_found() {
        let db = seeded_db().await;

        let err = db
            .stock()
            .receive("br-ghost", StockItemKind::Product, "prd-food", 5)
            .await
            .unwrap_err();
        assert!(err.is_business());
        assert!(matches!(
            err,
            EngineError::Domain(CoreError::NotFound { entity: "Branch", .. })
        ));
    }

    #[tokio::test]
    async fn test_receive_rejects_blank_ids() {
        let db = seeded_db().await;

        for (branch, item) in [("  ", "prd-food"), ("br-01", "")] {
            let err = db
                .stock()
                .receive(branch, StockItemKind::Product, item, 5)
                .await
                .unwrap_err();
            assert!(matches!(err, EngineError::Domain(CoreError::Validation(_))));
        }
    }

    #[tokio::test]
    async fn test_receive_rejects_nonpositive_quantity() {
        let db = seeded_db().await;

        for bad in [0, -4] {
            let err = db
                .stock()
                .receive("br-01", StockItemKind::Product, "prd-food", bad)
                .await
                .unwrap_err();
            assert!(matches!(err, EngineError::Domain(CoreError::Validation(_))));
        }
    }
}
