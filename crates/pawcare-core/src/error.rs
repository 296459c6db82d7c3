//! # Error Types
//!
//! Domain-specific error types for pawcare-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         Error Types                             │
//! │                                                                 │
//! │  pawcare-core errors (this file)                                │
//! │  ├── CoreError        - Business rule violations                │
//! │  └── ValidationError  - Input validation failures               │
//! │                                                                 │
//! │  pawcare-db errors (separate crate)                             │
//! │  ├── DbError          - Infrastructure failures                 │
//! │  └── EngineError      - Domain(CoreError) | Db(DbError)         │
//! │                                                                 │
//! │  Flow: ValidationError → CoreError → EngineError → caller       │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//! 1. Use `thiserror` for derive macros (not manual impl)
//! 2. Include context in error messages (customer, branch, item ids)
//! 3. Errors are enum variants, never String
//! 4. Business-expected outcomes (stock/dose shortfalls) are ordinary
//!    variants a caller can match on, distinct from infrastructure failures

use thiserror::Error;

use crate::session::SessionStatus;

// =============================================================================
// Core Error
// =============================================================================

/// Business rule violations raised by the consolidation engine.
///
/// Every variant carries the identifiers a caller needs to render a
/// user-facing message. None of these indicate infrastructure trouble;
/// a request that hits one should be reported, not retried.
#[derive(Debug, Error)]
pub enum CoreError {
    /// An entity referenced by the request does not exist.
    ///
    /// ## When This Occurs
    /// - Unknown customer/pet/product/service/branch/invoice id
    /// - Row deleted between lookup and use
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// The pet exists but belongs to a different customer.
    #[error("Pet {pet_id} does not belong to customer {customer_id}")]
    Ownership { pet_id: String, customer_id: String },

    /// Service session state machine violation.
    ///
    /// ## When This Occurs
    /// - Cancelling a session that is not in `Booking`
    /// - Completing a session that is not in `InService`
    /// - Checking in a session twice
    #[error("Session {session_id} is {from:?}, cannot {action}")]
    InvalidTransition {
        session_id: String,
        from: SessionStatus,
        action: &'static str,
    },

    /// No branch holds enough stock of the product to fulfil the request.
    ///
    /// The message must name the product so the front office can tell the
    /// customer what exactly is unavailable.
    #[error("Product '{product}' is out of stock: no branch can fulfil {requested} unit(s)")]
    OutOfStock { product: String, requested: i64 },

    /// A specific branch cannot cover the requested quantity.
    ///
    /// ## User Workflow
    /// ```text
    /// Dispense medicine (qty: 5)
    ///      │
    ///      ▼
    /// branch_stock: available=3
    ///      │
    ///      ▼
    /// InsufficientStock { branch, item, available: 3, requested: 5 }
    /// ```
    #[error("Insufficient stock of {item} at branch {branch_id}: available {available}, requested {requested}")]
    InsufficientStock {
        branch_id: String,
        item: String,
        available: i64,
        requested: i64,
    },

    /// The customer's package balance cannot cover the administered doses.
    #[error("Insufficient doses of vaccine {vaccine_id} under package {package_id}: remaining {remaining}, requested {requested}")]
    InsufficientDose {
        package_id: String,
        vaccine_id: String,
        remaining: i64,
        requested: i64,
    },

    /// The branch does not offer the requested service.
    #[error("Service {service_id} is not offered{}", branch_id.as_ref().map(|b| format!(" at branch {b}")).unwrap_or_default())]
    ServiceNotOffered {
        service_id: String,
        branch_id: Option<String>,
    },

    /// Concurrent-modification race the caller should retry or re-read.
    ///
    /// ## When This Occurs
    /// - Two concurrent open-invoice creations for one customer
    /// - Mutating an invoice that was closed by a concurrent confirmation
    #[error("Conflict: {reason}")]
    Conflict { reason: String },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl CoreError {
    /// Creates a NotFound error for a given entity type and id.
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        CoreError::NotFound {
            entity,
            id: id.into(),
        }
    }

    /// Creates a Conflict error with a reason.
    pub fn conflict(reason: impl Into<String>) -> Self {
        CoreError::Conflict {
            reason: reason.into(),
        }
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These occur when caller input doesn't meet requirements, before any
/// business logic runs.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: &'static str },

    /// Value must be strictly positive.
    #[error("{field} must be positive, got {value}")]
    MustBePositive { field: &'static str, value: i64 },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}, got {value}")]
    OutOfRange {
        field: &'static str,
        min: i64,
        max: i64,
        value: i64,
    },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: &'static str, max: usize },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages_name_the_item() {
        let err = CoreError::OutOfStock {
            product: "Royal Canin Puppy 2kg".to_string(),
            requested: 6,
        };
        assert!(err.to_string().contains("Royal Canin Puppy 2kg"));

        let err = CoreError::InsufficientStock {
            branch_id: "br-01".to_string(),
            item: "amoxicillin-250".to_string(),
            available: 3,
            requested: 5,
        };
        assert_eq!(
            err.to_string(),
            "Insufficient stock of amoxicillin-250 at branch br-01: available 3, requested 5"
        );
    }

    #[test]
    fn test_service_not_offered_message() {
        let with_branch = CoreError::ServiceNotOffered {
            service_id: "svc-groom".to_string(),
            branch_id: Some("br-02".to_string()),
        };
        assert_eq!(
            with_branch.to_string(),
            "Service svc-groom is not offered at branch br-02"
        );

        let no_branch = CoreError::ServiceNotOffered {
            service_id: "svc-groom".to_string(),
            branch_id: None,
        };
        assert_eq!(no_branch.to_string(), "Service svc-groom is not offered");
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let validation_err = ValidationError::MustBePositive {
            field: "quantity",
            value: -1,
        };
        let core_err: CoreError = validation_err.into();
        assert!(matches!(core_err, CoreError::Validation(_)));
    }
}
