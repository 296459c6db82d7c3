//! # Database Error Types
//!
//! Error types for database operations and the combined engine error.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    Error Propagation                            │
//! │                                                                 │
//! │  SQLite error (sqlx::Error)                                     │
//! │       │                                                         │
//! │       ▼                                                         │
//! │  DbError (this module)  ← infrastructure failures               │
//! │       │                                                         │
//! │       │        CoreError (pawcare-core) ← business outcomes     │
//! │       ▼              │                                          │
//! │  EngineError ◄───────┘                                          │
//! │       │                                                         │
//! │       ▼                                                         │
//! │  Caller matches is_business() to decide retry-vs-report         │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

use pawcare_core::CoreError;

// =============================================================================
// Db Error
// =============================================================================

/// Infrastructure-level database failures.
///
/// These wrap sqlx errors and never encode a business outcome; a stock
/// shortfall is a [`CoreError`], a lost connection is a `DbError`.
#[derive(Debug, Error)]
pub enum DbError {
    /// Entity not found where one row was required.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Unique constraint violation.
    ///
    /// ## When This Occurs
    /// - Two concurrent open-invoice creations (partial unique index)
    /// - Duplicate retail line insert racing an upsert
    #[error("Duplicate {constraint}")]
    UniqueViolation { constraint: String },

    /// Foreign key constraint violation.
    #[error("Foreign key violation: {message}")]
    ForeignKeyViolation { message: String },

    /// CHECK constraint violation - a conditional update was bypassed or
    /// raced; the enclosing transaction must roll back.
    #[error("Check constraint violation: {message}")]
    CheckViolation { message: String },

    /// Database connection failed.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Migration failed.
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// The database was locked past the busy timeout; the caller should
    /// retry the whole operation.
    #[error("Database busy: lock wait timed out")]
    Busy,

    /// Pool exhausted (all connections in use).
    #[error("Connection pool exhausted")]
    PoolExhausted,

    /// Query execution failed.
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Internal database error.
    #[error("Internal database error: {0}")]
    Internal(String),
}

impl DbError {
    /// Creates a NotFound error for a given entity type and id.
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        DbError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// True for failures worth retrying after a short backoff.
    pub fn is_retryable(&self) -> bool {
        matches!(self, DbError::Busy | DbError::PoolExhausted)
    }
}

/// Convert sqlx errors to DbError.
///
/// ## Error Mapping
/// ```text
/// sqlx::Error::RowNotFound   → DbError::NotFound
/// sqlx::Error::Database      → analyze message for constraint type
/// "database is locked"       → DbError::Busy (retryable)
/// sqlx::Error::PoolTimedOut  → DbError::PoolExhausted
/// Other                      → DbError::Internal
/// ```
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DbError::NotFound {
                entity: "Record".to_string(),
                id: "unknown".to_string(),
            },

            sqlx::Error::Database(db_err) => {
                let msg = db_err.message().to_string();

                if msg.contains("UNIQUE constraint failed") {
                    let constraint = msg
                        .split("UNIQUE constraint failed: ")
                        .nth(1)
                        .unwrap_or("unknown")
                        .to_string();
                    DbError::UniqueViolation { constraint }
                } else if msg.contains("FOREIGN KEY constraint failed") {
                    DbError::ForeignKeyViolation { message: msg }
                } else if msg.contains("CHECK constraint failed") {
                    DbError::CheckViolation { message: msg }
                } else if msg.contains("database is locked") {
                    DbError::Busy
                } else {
                    DbError::QueryFailed(msg)
                }
            }

            sqlx::Error::PoolTimedOut => DbError::PoolExhausted,

            sqlx::Error::PoolClosed => DbError::ConnectionFailed("Pool is closed".to_string()),

            _ => DbError::Internal(err.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::MigrationFailed(err.to_string())
    }
}

/// Result type for low-level database operations.
pub type DbResult<T> = Result<T, DbError>;

// =============================================================================
// Engine Error
// =============================================================================

/// The error type of every engine operation.
///
/// Splits business-expected outcomes from infrastructure failures so a
/// caller can decide retry-vs-report without string matching.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Business rule violation - report to the user, do not retry.
    #[error(transparent)]
    Domain(#[from] CoreError),

    /// Infrastructure failure - possibly transient.
    #[error(transparent)]
    Db(#[from] DbError),
}

impl EngineError {
    /// True when the failure is a business-expected outcome (out of stock,
    /// invalid transition, ...) rather than infrastructure trouble.
    pub fn is_business(&self) -> bool {
        matches!(self, EngineError::Domain(_))
    }

    /// True when retrying the whole operation may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            EngineError::Domain(CoreError::Conflict { .. }) => true,
            EngineError::Db(db) => db.is_retryable(),
            _ => false,
        }
    }
}

impl From<sqlx::Error> for EngineError {
    fn from(err: sqlx::Error) -> Self {
        EngineError::Db(DbError::from(err))
    }
}

impl From<pawcare_core::ValidationError> for EngineError {
    fn from(err: pawcare_core::ValidationError) -> Self {
        EngineError::Domain(CoreError::Validation(err))
    }
}

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_business_vs_infrastructure() {
        let business: EngineError = CoreError::conflict("open invoice race").into();
        assert!(business.is_business());
        assert!(business.is_retryable());

        let infra: EngineError = DbError::Busy.into();
        assert!(!infra.is_business());
        assert!(infra.is_retryable());

        let fatal: EngineError = DbError::QueryFailed("syntax".to_string()).into();
        assert!(!fatal.is_retryable());
    }
}
