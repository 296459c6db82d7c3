//! # Catalog Repository
//!
//! Read-only reference lookups: customers, pets, branches, services,
//! products, vaccines, packages and service offerings. These tables are
//! written by external collaborators; the engine only reads them.
//!
//! The `pub(crate)` connection-level functions at the bottom are the same
//! lookups scoped to an open transaction, so an engine operation validates
//! its references under the same snapshot it writes in.

use sqlx::{SqliteConnection, SqlitePool};

use crate::error::EngineResult;
use pawcare_core::{
    Branch, CoreError, Customer, Package, PackageItem, Pet, Product, Service, Vaccine,
};

/// Repository for reference/catalog lookups.
#[derive(Debug, Clone)]
pub struct CatalogRepository {
    pool: SqlitePool,
}

impl CatalogRepository {
    /// Creates a new CatalogRepository.
    pub fn new(pool: SqlitePool) -> Self {
        CatalogRepository { pool }
    }

    /// Gets a customer by id.
    pub async fn customer(&self, id: &str) -> EngineResult<Customer> {
        let customer = sqlx::query_as::<_, Customer>(
            "SELECT id, name, tier, points FROM customers WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| CoreError::not_found("Customer", id))?;

        Ok(customer)
    }

    /// Lists a customer's pets.
    pub async fn pets_of(&self, customer_id: &str) -> EngineResult<Vec<Pet>> {
        let pets = sqlx::query_as::<_, Pet>(
            "SELECT id, customer_id, name, species, breed FROM pets WHERE customer_id = ?1 ORDER BY name",
        )
        .bind(customer_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(pets)
    }

    /// Gets a pet and validates it belongs to the requesting customer.
    pub async fn pet_owned(&self, pet_id: &str, customer_id: &str) -> EngineResult<Pet> {
        let mut conn = self.pool.acquire().await?;
        pet_owned(&mut conn, pet_id, customer_id).await
    }

    /// Gets a service by id.
    pub async fn service(&self, id: &str) -> EngineResult<Service> {
        let mut conn = self.pool.acquire().await?;
        get_service(&mut conn, id).await
    }

    /// Gets a product by id.
    pub async fn product(&self, id: &str) -> EngineResult<Product> {
        let mut conn = self.pool.acquire().await?;
        get_product(&mut conn, id).await
    }

    /// Gets a vaccine by id.
    pub async fn vaccine(&self, id: &str) -> EngineResult<Vaccine> {
        let mut conn = self.pool.acquire().await?;
        get_vaccine(&mut conn, id).await
    }

    /// Gets a package template by id.
    pub async fn package(&self, id: &str) -> EngineResult<Package> {
        let mut conn = self.pool.acquire().await?;
        get_package(&mut conn, id).await
    }

    /// Lists the vaccine entitlements of a package template.
    pub async fn package_items(&self, package_id: &str) -> EngineResult<Vec<PackageItem>> {
        let mut conn = self.pool.acquire().await?;
        get_package_items(&mut conn, package_id).await
    }

    /// Lists all branches, ordered by id.
    pub async fn branches(&self) -> EngineResult<Vec<Branch>> {
        let branches =
            sqlx::query_as::<_, Branch>("SELECT id, name FROM branches ORDER BY id")
                .fetch_all(&self.pool)
                .await?;

        Ok(branches)
    }

    /// Lists the branch ids offering a service, ordered by id.
    pub async fn offering_branches(&self, service_id: &str) -> EngineResult<Vec<String>> {
        let ids = sqlx::query_scalar::<_, String>(
            "SELECT branch_id FROM service_offerings WHERE service_id = ?1 ORDER BY branch_id",
        )
        .bind(service_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(ids)
    }
}

// =============================================================================
// Connection-level lookups (shared with engine transactions)
// =============================================================================

/// Fetches a pet and checks ownership.
///
/// An existing pet with a different owner is an `Ownership` error, not a
/// `NotFound` - the caller must be able to tell the two apart.
pub(crate) async fn pet_owned(
    conn: &mut SqliteConnection,
    pet_id: &str,
    customer_id: &str,
) -> EngineResult<Pet> {
    let pet = sqlx::query_as::<_, Pet>(
        "SELECT id, customer_id, name, species, breed FROM pets WHERE id = ?1",
    )
    .bind(pet_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| CoreError::not_found("Pet", pet_id))?;

    if pet.customer_id != customer_id {
        return Err(CoreError::Ownership {
            pet_id: pet_id.to_string(),
            customer_id: customer_id.to_string(),
        }
        .into());
    }

    Ok(pet)
}

pub(crate) async fn customer_exists(
    conn: &mut SqliteConnection,
    customer_id: &str,
) -> EngineResult<()> {
    let found = sqlx::query_scalar::<_, i64>("SELECT 1 FROM customers WHERE id = ?1")
        .bind(customer_id)
        .fetch_optional(&mut *conn)
        .await?;

    if found.is_none() {
        return Err(CoreError::not_found("Customer", customer_id).into());
    }
    Ok(())
}

pub(crate) async fn branch_exists(
    conn: &mut SqliteConnection,
    branch_id: &str,
) -> EngineResult<()> {
    let found = sqlx::query_scalar::<_, i64>("SELECT 1 FROM branches WHERE id = ?1")
        .bind(branch_id)
        .fetch_optional(&mut *conn)
        .await?;

    if found.is_none() {
        return Err(CoreError::not_found("Branch", branch_id).into());
    }
    Ok(())
}

pub(crate) async fn get_service(
    conn: &mut SqliteConnection,
    id: &str,
) -> EngineResult<Service> {
    let service =
        sqlx::query_as::<_, Service>("SELECT id, name, price_cents FROM services WHERE id = ?1")
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?
            .ok_or_else(|| CoreError::not_found("Service", id))?;

    Ok(service)
}

pub(crate) async fn get_product(
    conn: &mut SqliteConnection,
    id: &str,
) -> EngineResult<Product> {
    let product = sqlx::query_as::<_, Product>(
        "SELECT id, name, category, price_cents FROM products WHERE id = ?1",
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| CoreError::not_found("Product", id))?;

    Ok(product)
}

pub(crate) async fn get_vaccine(
    conn: &mut SqliteConnection,
    id: &str,
) -> EngineResult<Vaccine> {
    let vaccine =
        sqlx::query_as::<_, Vaccine>("SELECT id, name, price_cents FROM vaccines WHERE id = ?1")
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?
            .ok_or_else(|| CoreError::not_found("Vaccine", id))?;

    Ok(vaccine)
}

pub(crate) async fn get_package(
    conn: &mut SqliteConnection,
    id: &str,
) -> EngineResult<Package> {
    let package = sqlx::query_as::<_, Package>(
        "SELECT id, name, price_cents, validity_months FROM packages WHERE id = ?1",
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| CoreError::not_found("Package", id))?;

    Ok(package)
}

pub(crate) async fn get_package_items(
    conn: &mut SqliteConnection,
    package_id: &str,
) -> EngineResult<Vec<PackageItem>> {
    let items = sqlx::query_as::<_, PackageItem>(
        "SELECT package_id, vaccine_id, dose_count FROM package_items \
         WHERE package_id = ?1 ORDER BY vaccine_id",
    )
    .bind(package_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(items)
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
    async fn test_pet_ownership_is_distinct_from_not_found() {
        let db = seeded_db().await;
        let repo = db.catalog();

        let pet = repo.pet_owned("pet-1", "cus-1").await.unwrap();
        assert_eq!(pet.name, "Milo");

        let err = repo.pet_owned("pet-1", "cus-2").await.unwrap_err();
        assert!(matches!(err, EngineError::Domain(CoreError::Ownership { .. })));

        let err = repo.pet_owned("pet-ghost", "cus-1").await.unwrap_err();
        assert!(matches!(
            err,
            EngineError::Domain(CoreError::NotFound { entity: "Pet", .. })
        ));
    }

    #[tokio::test]
    async fn test_catalog_lookups() {
        let db = seeded_db().await;
        let repo = db.catalog();

        assert_eq!(repo.customer("cus-1").await.unwrap().tier.as_deref(), Some("gold"));
        assert_eq!(repo.pets_of("cus-1").await.unwrap().len(), 1);
        assert_eq!(repo.service("svc-exam").await.unwrap().price_cents, 10_000);
        assert_eq!(repo.package("pkg-1").await.unwrap().validity_months, 6);
        assert_eq!(repo.package_items("pkg-1").await.unwrap().len(), 2);
        assert_eq!(repo.branches().await.unwrap().len(), 2);
        assert_eq!(
            repo.offering_branches("svc-exam").await.unwrap(),
            vec!["br-01".to_string(), "br-02".to_string()]
        );
    }
}
