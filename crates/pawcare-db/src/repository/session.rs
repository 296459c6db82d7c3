//! # Service Session Lifecycle
//!
//! Booking, check-in, completion and cancellation of service visits.
//!
//! ## Conditional Transition Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  Every transition is one conditional update:                    │
//! │                                                                 │
//! │    UPDATE service_sessions                                      │
//! │       SET status = :target, ...timestamps                       │
//! │     WHERE id = :id AND status = :expected_from                  │
//! │                                                                 │
//! │  rows_affected == 1  →  transition happened, exactly once       │
//! │  rows_affected == 0  →  re-read the row and map through the     │
//! │                         state machine for the precise error     │
//! │                         (NotFound vs InvalidTransition)         │
//! │                                                                 │
//! │  Two staff members completing the same visit: one wins, the     │
//! │  other gets InvalidTransition { from: DoneService }.            │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Completion applies the whole [`VisitOutcome`] in the transition's
//! transaction: examination record, dispensed medicines (product stock at
//! the session's branch), vaccinations (package dose balance or loose
//! vaccine stock). A shortfall anywhere rolls the transition back too.

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::info;
use uuid::Uuid;

use crate::error::EngineResult;
use crate::repository::{catalog, invoice, package, resolver, stock};
use pawcare_core::validation::{validate_doses, validate_id, validate_quantity};
use pawcare_core::{
    CoreError, ServiceSession, SessionAction, SessionStatus, StockItemKind, VisitOutcome,
};

/// Repository for service-session lifecycle operations.
#[derive(Debug, Clone)]
pub struct SessionRepository {
    pool: SqlitePool,
}

impl SessionRepository {
    /// Creates a new SessionRepository.
    pub fn new(pool: SqlitePool) -> Self {
        SessionRepository { pool }
    }

    /// Books a service visit for a customer's pet.
    ///
    /// Verifies pet ownership, resolves the fulfilling branch, snapshots
    /// the current service price onto the session and attaches it to the
    /// customer's open invoice (created on demand).
    pub async fn book(
        &self,
        customer_id: &str,
        pet_id: &str,
        service_id: &str,
        branch: Option<&str>,
    ) -> EngineResult<ServiceSession> {
        validate_id("customer_id", customer_id)?;
        validate_id("pet_id", pet_id)?;
        validate_id("service_id", service_id)?;

        let mut tx = self.pool.begin().await?;

        catalog::pet_owned(&mut tx, pet_id, customer_id).await?;
        let branch_id = resolver::resolve_for_service(&mut tx, service_id, branch).await?;
        let service = catalog::get_service(&mut tx, service_id).await?;
        let inv = invoice::find_or_create_open(&mut tx, customer_id).await?;

        let session = ServiceSession {
            id: Uuid::new_v4().to_string(),
            invoice_id: inv.id.clone(),
            pet_id: Some(pet_id.to_string()),
            service_id: Some(service_id.to_string()),
            branch_id,
            price_cents: service.price_cents,
            status: SessionStatus::Booking,
            is_retail: false,
            started_at: None,
            ended_at: None,
            created_at: Utc::now(),
        };

        sqlx::query(
            "INSERT INTO service_sessions \
                 (id, invoice_id, pet_id, service_id, branch_id, price_cents, \
                  status, is_retail, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 0, ?8)",
        )
        .bind(&session.id)
        .bind(&session.invoice_id)
        .bind(pet_id)
        .bind(service_id)
        .bind(&session.branch_id)
        .bind(session.price_cents)
        .bind(session.status)
        .bind(session.created_at)
        .execute(&mut *tx)
        .await?;

        invoice::recalculate(&mut tx, &inv.id).await?;
        tx.commit().await?;

        info!(
            session_id = %session.id,
            customer_id = %customer_id,
            service_id = %service_id,
            branch_id = %session.branch_id,
            "Service session booked"
        );
        Ok(session)
    }

    /// Checks a booked session in (`Booking → InService`).
    pub async fn check_in(&self, session_id: &str) -> EngineResult<ServiceSession> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            "UPDATE service_sessions SET status = ?2, started_at = ?3 \
             WHERE id = ?1 AND status = ?4",
        )
        .bind(session_id)
        .bind(SessionStatus::InService)
        .bind(Utc::now())
        .bind(SessionStatus::Booking)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(rejected_transition(&mut tx, session_id, SessionAction::CheckIn).await);
        }

        let session = get_session(&mut tx, session_id).await?;
        tx.commit().await?;

        info!(session_id = %session_id, "Session checked in");
        Ok(session)
    }

    /// Cancels a booked session (`Booking → Cancelled`).
    ///
    /// The invoice total is recomputed without the cancelled session's
    /// price. Cancelling after the invoice closed is rejected; the total
    /// is frozen and the transition rolls back with it.
    pub async fn cancel(&self, session_id: &str) -> EngineResult<ServiceSession> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            "UPDATE service_sessions SET status = ?2, ended_at = ?3 \
             WHERE id = ?1 AND status = ?4",
        )
        .bind(session_id)
        .bind(SessionStatus::Cancelled)
        .bind(Utc::now())
        .bind(SessionStatus::Booking)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(rejected_transition(&mut tx, session_id, SessionAction::Cancel).await);
        }

        let session = get_session(&mut tx, session_id).await?;
        invoice::recalculate(&mut tx, &session.invoice_id).await?;
        tx.commit().await?;

        info!(session_id = %session_id, invoice_id = %session.invoice_id, "Session cancelled");
        Ok(session)
    }

    /// Completes an in-service visit (`InService → DoneService`), applying
    /// the recorded outcome atomically with the transition.
    ///
    /// Dispensed medicines decrement product stock at the session's branch;
    /// vaccinations draw on the customer's package balance when a package is
    /// named, otherwise on the branch's loose vaccine stock. None of these
    /// change the invoice total.
    pub async fn complete(
        &self,
        session_id: &str,
        outcome: &VisitOutcome,
    ) -> EngineResult<ServiceSession> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            "UPDATE service_sessions SET status = ?2, ended_at = ?3 \
             WHERE id = ?1 AND status = ?4",
        )
        .bind(session_id)
        .bind(SessionStatus::DoneService)
        .bind(Utc::now())
        .bind(SessionStatus::InService)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(rejected_transition(&mut tx, session_id, SessionAction::Complete).await);
        }

        let session = get_session(&mut tx, session_id).await?;
        let customer_id = sqlx::query_scalar::<_, String>(
            "SELECT customer_id FROM invoices WHERE id = ?1",
        )
        .bind(&session.invoice_id)
        .fetch_one(&mut *tx)
        .await?;

        if let Some(exam) = &outcome.examination {
            sqlx::query(
                "INSERT INTO examinations (session_id, vet_id, diagnosis, follow_up_on) \
                 VALUES (?1, ?2, ?3, ?4)",
            )
            .bind(session_id)
            .bind(&exam.vet_id)
            .bind(&exam.diagnosis)
            .bind(exam.follow_up_on)
            .execute(&mut *tx)
            .await?;
        }

        for line in &outcome.prescriptions {
            validate_quantity(line.quantity)?;
            catalog::get_product(&mut tx, &line.product_id).await?;

            sqlx::query(
                "INSERT INTO prescription_lines (id, session_id, product_id, quantity) \
                 VALUES (?1, ?2, ?3, ?4)",
            )
            .bind(Uuid::new_v4().to_string())
            .bind(session_id)
            .bind(&line.product_id)
            .bind(line.quantity)
            .execute(&mut *tx)
            .await?;

            stock::adjust(
                &mut tx,
                &session.branch_id,
                StockItemKind::Product,
                &line.product_id,
                -line.quantity,
            )
            .await?;
        }

        for shot in &outcome.vaccinations {
            validate_doses(shot.doses)?;
            catalog::get_vaccine(&mut tx, &shot.vaccine_id).await?;

            match &shot.package_id {
                Some(package_id) => {
                    package::consume_doses(
                        &mut tx,
                        &customer_id,
                        package_id,
                        &shot.vaccine_id,
                        shot.doses,
                    )
                    .await?;
                }
                None => {
                    stock::adjust(
                        &mut tx,
                        &session.branch_id,
                        StockItemKind::Vaccine,
                        &shot.vaccine_id,
                        -shot.doses,
                    )
                    .await?;
                }
            }

            sqlx::query(
                "INSERT INTO vaccinations \
                     (id, session_id, vaccine_id, package_id, doses, administered_on, vet_id) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            )
            .bind(Uuid::new_v4().to_string())
            .bind(session_id)
            .bind(&shot.vaccine_id)
            .bind(&shot.package_id)
            .bind(shot.doses)
            .bind(shot.administered_on)
            .bind(&shot.vet_id)
            .execute(&mut *tx)
            .await?;
        }

        let session = get_session(&mut tx, session_id).await?;
        tx.commit().await?;

        info!(
            session_id = %session_id,
            prescriptions = outcome.prescriptions.len(),
            vaccinations = outcome.vaccinations.len(),
            "Session completed"
        );
        Ok(session)
    }

    /// Loads a session by id.
    pub async fn get_by_id(&self, session_id: &str) -> EngineResult<ServiceSession> {
        let mut conn = self.pool.acquire().await?;
        get_session(&mut conn, session_id).await
    }

    /// All sessions on an invoice, oldest first.
    pub async fn for_invoice(&self, invoice_id: &str) -> EngineResult<Vec<ServiceSession>> {
        let sessions = sqlx::query_as::<_, ServiceSession>(&format!(
            "SELECT {SESSION_COLUMNS} FROM service_sessions \
             WHERE invoice_id = ?1 ORDER BY created_at ASC, id ASC"
        ))
        .bind(invoice_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(sessions)
    }
}

// =============================================================================
// Transaction-scoped helpers
// =============================================================================

const SESSION_COLUMNS: &str = "id, invoice_id, pet_id, service_id, branch_id, \
     price_cents, status, is_retail, started_at, ended_at, created_at";

pub(crate) async fn get_session(
    conn: &mut SqliteConnection,
    session_id: &str,
) -> EngineResult<ServiceSession> {
    let session = sqlx::query_as::<_, ServiceSession>(&format!(
        "SELECT {SESSION_COLUMNS} FROM service_sessions WHERE id = ?1"
    ))
    .bind(session_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| CoreError::not_found("ServiceSession", session_id))?;

    Ok(session)
}

/// Maps a zero-rows conditional transition back to the precise error.
async fn rejected_transition(
    conn: &mut SqliteConnection,
    session_id: &str,
    action: SessionAction,
) -> crate::error::EngineError {
    match get_session(&mut *conn, session_id).await {
        // The row exists but was not in the expected source state.
        Ok(session) => match session.status.apply(session_id, action) {
            Err(err) => err.into(),
            // Unreachable unless the row changed between update and read;
            // surface it as a conflict rather than succeed spuriously.
            Ok(_) => CoreError::conflict(format!(
                "session {session_id} changed state concurrently"
            ))
            .into(),
        },
        Err(err) => err,
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
