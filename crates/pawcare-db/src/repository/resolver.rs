//! # Branch Resolver
//!
//! Picks the physical branch that fulfils a purchase or service request.
//! Read-only: the decision is handed back to the caller, which performs
//! the subsequent writes in its own transaction.
//!
//! ## Resolution Policies
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  Product: branch with quantity >= requested, most stock first,  │
//! │           ties broken by branch id ascending.                   │
//! │           None qualifies → OutOfStock naming the product.       │
//! │                                                                 │
//! │  Service: explicit branch  → validate against offerings         │
//! │           no branch given  → lowest offering branch id          │
//! │           nothing offers it → ServiceNotOffered                 │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::EngineResult;
use crate::repository::catalog;
use pawcare_core::{CoreError, StockItemKind};

/// Read-only branch resolution.
#[derive(Debug, Clone)]
pub struct BranchResolver {
    pool: SqlitePool,
}

impl BranchResolver {
    /// Creates a new BranchResolver.
    pub fn new(pool: SqlitePool) -> Self {
        BranchResolver { pool }
    }

    /// Picks the branch to fulfil `quantity` units of a product.
    pub async fn for_product(&self, product_id: &str, quantity: i64) -> EngineResult<String> {
        let mut conn = self.pool.acquire().await?;
        resolve_for_product(&mut conn, product_id, quantity).await
    }

    /// Picks (or validates) the branch to fulfil a service request.
    pub async fn for_service(
        &self,
        service_id: &str,
        branch_id: Option<&str>,
    ) -> EngineResult<String> {
        let mut conn = self.pool.acquire().await?;
        resolve_for_service(&mut conn, service_id, branch_id).await
    }
}

// =============================================================================
// Transaction-scoped resolution (shared with engine operations)
// =============================================================================

/// Branch with the most stock covering the request; ties by branch id.
pub(crate) async fn resolve_for_product(
    conn: &mut SqliteConnection,
    product_id: &str,
    quantity: i64,
) -> EngineResult<String> {
    let branch = sqlx::query_scalar::<_, String>(
        "SELECT branch_id FROM branch_stock \
         WHERE item_kind = ?1 AND item_id = ?2 AND quantity >= ?3 \
         ORDER BY quantity DESC, branch_id ASC LIMIT 1",
    )
    .bind(StockItemKind::Product)
    .bind(product_id)
    .bind(quantity)
    .fetch_optional(&mut *conn)
    .await?;

    match branch {
        Some(branch_id) => {
            debug!(product_id = %product_id, quantity = %quantity, branch_id = %branch_id, "Resolved product branch");
            Ok(branch_id)
        }
        None => {
            // The error must name the product, not just its id.
            let product = catalog::get_product(&mut *conn, product_id).await?;
            Err(CoreError::OutOfStock {
                product: product.name,
                requested: quantity,
            }
            .into())
        }
    }
}

/// Explicit branch validated against offerings, or the lowest offering
/// branch id when unspecified.
pub(crate) async fn resolve_for_service(
    conn: &mut SqliteConnection,
    service_id: &str,
    branch_id: Option<&str>,
) -> EngineResult<String> {
    catalog::get_service(&mut *conn, service_id).await?;

    match branch_id {
        Some(explicit) => {
            // Distinguish "no such branch" from "branch does not offer it".
            catalog::branch_exists(&mut *conn, explicit).await?;

            let offered = sqlx::query_scalar::<_, i64>(
                "SELECT 1 FROM service_offerings WHERE branch_id = ?1 AND service_id = ?2",
            )
            .bind(explicit)
            .bind(service_id)
            .fetch_optional(&mut *conn)
            .await?;

            if offered.is_none() {
                return Err(CoreError::ServiceNotOffered {
                    service_id: service_id.to_string(),
                    branch_id: Some(explicit.to_string()),
                }
                .into());
            }
            Ok(explicit.to_string())
        }
        None => {
            let branch = sqlx::query_scalar::<_, String>(
                "SELECT branch_id FROM service_offerings \
                 WHERE service_id = ?1 ORDER BY branch_id ASC LIMIT 1",
            )
            .bind(service_id)
            .fetch_optional(&mut *conn)
            .await?;

            branch.ok_or_else(|| {
                CoreError::ServiceNotOffered {
                    service_id: service_id.to_string(),
                    branch_id: None,
                }
                .into()
            })
        }
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
    async fn test_product_picks_best_stocked_branch() {
        let db = seeded_db().await;
        db.stock().receive("br-01", StockItemKind::Product, "prd-food", 5).await.unwrap();
        db.stock().receive("br-02", StockItemKind::Product, "prd-food", 9).await.unwrap();

        let branch = db.resolver().for_product("prd-food", 3).await.unwrap();
        assert_eq!(branch, "br-02");

        // br-02 cannot cover 10 units either; nobody can.
        let err = db.resolver().for_product("prd-food", 10).await.unwrap_err();
        match err {
            EngineError::Domain(CoreError::OutOfStock { product, requested }) => {
                assert_eq!(product, "Premium Dog Food 5kg");
                assert_eq!(requested, 10);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_product_ties_break_on_branch_id() {
        let db = seeded_db().await;
        db.stock().receive("br-02", StockItemKind::Product, "prd-med", 4).await.unwrap();
        db.stock().receive("br-01", StockItemKind::Product, "prd-med", 4).await.unwrap();

        let branch = db.resolver().for_product("prd-med", 2).await.unwrap();
        assert_eq!(branch, "br-01");
    }

    #[tokio::test]
    async fn test_unknown_product_is_not_found() {
        let db = seeded_db().await;
        let err = db.resolver().for_product("prd-ghost", 1).await.unwrap_err();
        assert!(matches!(
            err,
            EngineError::Domain(CoreError::NotFound { entity: "Product", .. })
        ));
    }

    #[tokio::test]
    async fn test_service_explicit_branch_is_validated() {
        let db = seeded_db().await;
        let resolver = db.resolver();

        // Grooming is only offered at br-02.
        let branch = resolver.for_service("svc-groom", Some("br-02")).await.unwrap();
        assert_eq!(branch, "br-02");

        let err = resolver.for_service("svc-groom", Some("br-01")).await.unwrap_err();
        assert!(matches!(
            err,
            EngineError::Domain(CoreError::ServiceNotOffered { branch_id: Some(_), .. })
        ));

        // A branch that does not exist at all is NotFound, not "not offered".
        let err = resolver.for_service("svc-groom", Some("br-ghost")).await.unwrap_err();
        assert!(matches!(
            err,
            EngineError::Domain(CoreError::NotFound { entity: "Branch", .. })
        ));
    }

    #[tokio::test]
    async fn test_service_defaults_to_lowest_offering_branch() {
        let db = seeded_db().await;
        let branch = db.resolver().for_service("svc-exam", None).await.unwrap();
        assert_eq!(branch, "br-01");

        let branch = db.resolver().for_service("svc-groom", None).await.unwrap();
        assert_eq!(branch, "br-02");
    }
}
