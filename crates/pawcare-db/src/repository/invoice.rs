//! # Invoice Repository
//!
//! The open-invoice cart and invoice total recalculation.
//!
//! ## Open-Invoice Cart
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │              get_or_create_open(customer)                       │
//! │                                                                 │
//! │  SELECT latest invoice WHERE payment_method IS NULL             │
//! │       │                                                         │
//! │       ├── found ──────────────────────────► return it           │
//! │       │                                                         │
//! │       ▼ none                                                    │
//! │  INSERT new empty invoice                                       │
//! │       │                                                         │
//! │       ├── ok ─────────────────────────────► return it           │
//! │       │                                                         │
//! │       ▼ UNIQUE(ux_invoices_open) failed                         │
//! │  a concurrent call won the race ──► re-run the lookup           │
//! │       │                                                         │
//! │       └── still none ──► ConflictError (caller retries)         │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The partial unique index makes the find-or-create atomic without a
//! separate read-then-write pair; the loser of a double-click race simply
//! reads the winner's invoice.

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{DbError, EngineError, EngineResult};
use crate::repository::catalog;
use pawcare_core::validation::validate_score;
use pawcare_core::{CoreError, Invoice, InvoiceReview, PaymentMethod};

/// Repository for invoice operations.
#[derive(Debug, Clone)]
pub struct InvoiceRepository {
    pool: SqlitePool,
}

impl InvoiceRepository {
    /// Creates a new InvoiceRepository.
    pub fn new(pool: SqlitePool) -> Self {
        InvoiceRepository { pool }
    }

    /// Finds the customer's open invoice, creating an empty one if none
    /// exists. Safe under concurrent calls for the same customer.
    pub async fn get_or_create_open(&self, customer_id: &str) -> EngineResult<Invoice> {
        let mut tx = self.pool.begin().await?;
        let invoice = find_or_create_open(&mut tx, customer_id).await?;
        tx.commit().await?;
        Ok(invoice)
    }

    /// Gets an invoice by id.
    pub async fn get_by_id(&self, id: &str) -> EngineResult<Invoice> {
        let mut conn = self.pool.acquire().await?;
        get_invoice(&mut conn, id).await
    }

    /// The customer's open invoice, if any (read-only peek).
    pub async fn open_for(&self, customer_id: &str) -> EngineResult<Option<Invoice>> {
        let mut conn = self.pool.acquire().await?;
        Ok(find_open(&mut conn, customer_id).await?)
    }

    /// Recomputes an open invoice's total from its current line items.
    ///
    /// Engine operations call the transaction-scoped [`recalculate`]
    /// themselves; this entry point exists for collaborators that changed
    /// line items out of band.
    pub async fn recalculate_total(&self, invoice_id: &str) -> EngineResult<i64> {
        let mut tx = self.pool.begin().await?;
        let total = recalculate(&mut tx, invoice_id).await?;
        tx.commit().await?;
        Ok(total)
    }

    /// Sets the promotional discount on an open invoice and recomputes.
    pub async fn set_discount(&self, invoice_id: &str, discount_cents: i64) -> EngineResult<i64> {
        if discount_cents < 0 {
            return Err(pawcare_core::ValidationError::MustBePositive {
                field: "discount_cents",
                value: discount_cents,
            }
            .into());
        }

        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            "UPDATE invoices SET discount_cents = ?2 WHERE id = ?1 AND payment_method IS NULL",
        )
        .bind(invoice_id)
        .bind(discount_cents)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(open_invoice_gone(&mut tx, invoice_id).await);
        }

        let total = recalculate(&mut tx, invoice_id).await?;
        tx.commit().await?;

        debug!(invoice_id = %invoice_id, discount = %discount_cents, total = %total, "Discount applied");
        Ok(total)
    }

    /// Closes an open invoice by setting its payment method.
    ///
    /// This is the engine's view of the external payment-confirmation
    /// step; after it succeeds the total is frozen.
    pub async fn close(&self, invoice_id: &str, method: PaymentMethod) -> EngineResult<Invoice> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            "UPDATE invoices SET payment_method = ?2 WHERE id = ?1 AND payment_method IS NULL",
        )
        .bind(invoice_id)
        .bind(method)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(open_invoice_gone(&mut tx, invoice_id).await);
        }

        let invoice = get_invoice(&mut tx, invoice_id).await?;
        tx.commit().await?;

        info!(invoice_id = %invoice_id, method = ?method, total = %invoice.total_cents, "Invoice closed");
        Ok(invoice)
    }

    /// Records (or replaces) a customer's review of their invoice.
    ///
    /// Idempotent per (invoice, customer): a second submission overwrites
    /// the first instead of duplicating it.
    pub async fn upsert_review(&self, review: &InvoiceReview) -> EngineResult<()> {
        validate_score("service_score", review.service_score)?;
        validate_score("satisfaction", review.satisfaction)?;

        let mut tx = self.pool.begin().await?;

        let invoice = get_invoice(&mut tx, &review.invoice_id).await?;
        if invoice.customer_id != review.customer_id {
            // Reviewing someone else's invoice reads as "no such invoice".
            return Err(CoreError::not_found("Invoice", &review.invoice_id).into());
        }

        sqlx::query(
            "INSERT INTO invoice_reviews \
             (invoice_id, customer_id, service_score, satisfaction, staff_attitude, comment) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6) \
             ON CONFLICT (invoice_id, customer_id) DO UPDATE SET \
                 service_score = excluded.service_score, \
                 satisfaction = excluded.satisfaction, \
                 staff_attitude = excluded.staff_attitude, \
                 comment = excluded.comment",
        )
        .bind(&review.invoice_id)
        .bind(&review.customer_id)
        .bind(review.service_score)
        .bind(review.satisfaction)
        .bind(&review.staff_attitude)
        .bind(&review.comment)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        debug!(invoice_id = %review.invoice_id, "Review recorded");
        Ok(())
    }
}

// =============================================================================
// Transaction-scoped operations (shared with other repositories)
// =============================================================================

const INVOICE_COLUMNS: &str =
    "id, customer_id, created_at, payment_method, discount_cents, total_cents";

pub(crate) async fn get_invoice(
    conn: &mut SqliteConnection,
    id: &str,
) -> EngineResult<Invoice> {
    let invoice = sqlx::query_as::<_, Invoice>(&format!(
        "SELECT {INVOICE_COLUMNS} FROM invoices WHERE id = ?1"
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| CoreError::not_found("Invoice", id))?;

    Ok(invoice)
}

async fn find_open(
    conn: &mut SqliteConnection,
    customer_id: &str,
) -> EngineResult<Option<Invoice>> {
    let invoice = sqlx::query_as::<_, Invoice>(&format!(
        "SELECT {INVOICE_COLUMNS} FROM invoices \
         WHERE customer_id = ?1 AND payment_method IS NULL \
         ORDER BY created_at DESC LIMIT 1"
    ))
    .bind(customer_id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(invoice)
}

/// Atomic read-latest-or-insert for the customer's open invoice.
///
/// Must run inside the caller's transaction so the supplied invoice and
/// the line items attached to it commit or roll back together.
pub(crate) async fn find_or_create_open(
    conn: &mut SqliteConnection,
    customer_id: &str,
) -> EngineResult<Invoice> {
    if let Some(existing) = find_open(&mut *conn, customer_id).await? {
        return Ok(existing);
    }

    catalog::customer_exists(&mut *conn, customer_id).await?;

    let invoice = Invoice {
        id: Uuid::new_v4().to_string(),
        customer_id: customer_id.to_string(),
        created_at: Utc::now(),
        payment_method: None,
        discount_cents: 0,
        total_cents: 0,
    };

    let inserted = sqlx::query(
        "INSERT INTO invoices (id, customer_id, created_at, payment_method, discount_cents, total_cents) \
         VALUES (?1, ?2, ?3, NULL, 0, 0)",
    )
    .bind(&invoice.id)
    .bind(&invoice.customer_id)
    .bind(invoice.created_at)
    .execute(&mut *conn)
    .await;

    match inserted {
        Ok(_) => {
            debug!(invoice_id = %invoice.id, customer_id = %customer_id, "Opened new invoice");
            Ok(invoice)
        }
        // ux_invoices_open fired: a concurrent call created the open
        // invoice first. The loser re-reads the winner's row.
        Err(err) => match DbError::from(err) {
            DbError::UniqueViolation { .. } => find_open(&mut *conn, customer_id)
                .await?
                .ok_or_else(|| {
                    CoreError::conflict(format!(
                        "open invoice for customer {customer_id} changed concurrently"
                    ))
                    .into()
                }),
            other => Err(other.into()),
        },
    }
}

/// Recomputes the invoice total from its current line items.
///
/// total = Σ non-retail, non-cancelled session prices
///       + Σ retail quantity × unit price
///       + Σ package prices
///       − discount, floored at 0.
///
/// Only ever touches open invoices; a closed invoice's total is frozen
/// and an attempt to recompute it fails the enclosing transaction.
pub(crate) async fn recalculate(
    conn: &mut SqliteConnection,
    invoice_id: &str,
) -> EngineResult<i64> {
    let result = sqlx::query(
        "UPDATE invoices SET total_cents = MAX(0, \
             COALESCE((SELECT SUM(s.price_cents) FROM service_sessions s \
                       WHERE s.invoice_id = invoices.id \
                         AND s.is_retail = 0 \
                         AND s.status <> 'cancelled'), 0) \
           + COALESCE((SELECT SUM(rl.quantity * rl.unit_price_cents) \
                       FROM retail_lines rl \
                       JOIN service_sessions s ON s.id = rl.session_id \
                       WHERE s.invoice_id = invoices.id), 0) \
           + COALESCE((SELECT SUM(p.price_cents) FROM package_purchases pp \
                       JOIN packages p ON p.id = pp.package_id \
                       WHERE pp.invoice_id = invoices.id), 0) \
           - discount_cents) \
         WHERE id = ?1 AND payment_method IS NULL",
    )
    .bind(invoice_id)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(open_invoice_gone(&mut *conn, invoice_id).await);
    }

    let total =
        sqlx::query_scalar::<_, i64>("SELECT total_cents FROM invoices WHERE id = ?1")
            .bind(invoice_id)
            .fetch_one(&mut *conn)
            .await?;

    debug!(invoice_id = %invoice_id, total = %total, "Invoice total recomputed");
    Ok(total)
}

/// Disambiguates a zero-rows conditional update on an open invoice:
/// the invoice is either closed (Conflict, total frozen) or absent.
pub(crate) async fn open_invoice_gone(
    conn: &mut SqliteConnection,
    invoice_id: &str,
) -> EngineError {
    match sqlx::query_scalar::<_, i64>("SELECT 1 FROM invoices WHERE id = ?1")
        .bind(invoice_id)
        .fetch_optional(&mut *conn)
        .await
    {
        Ok(Some(_)) => {
            CoreError::conflict(format!("invoice {invoice_id} is closed, total is frozen")).into()
        }
        Ok(None) => CoreError::not_found("Invoice", invoice_id).into(),
        Err(err) => DbError::from(err).into(),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
