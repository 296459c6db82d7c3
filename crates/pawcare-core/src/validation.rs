//! # Validation Module
//!
//! Input validation for engine operations.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                          │
//! │                                                                 │
//! │  Layer 1: Caller (API / UI)                                     │
//! │  ├── Basic format checks (empty, length)                        │
//! │  └── Immediate user feedback                                    │
//! │           │                                                     │
//! │           ▼                                                     │
//! │  Layer 2: THIS MODULE - business rule validation                │
//! │           │                                                     │
//! │           ▼                                                     │
//! │  Layer 3: Database (SQLite)                                     │
//! │  ├── CHECK (quantity >= 0, remaining <= original)               │
//! │  ├── UNIQUE (one open invoice, one line per product)            │
//! │  └── Foreign key constraints                                    │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

use crate::error::ValidationError;
use crate::{MAX_DOSES_PER_VACCINATION, MAX_LINE_QUANTITY};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Validates a retail or stock quantity.
///
/// ## Rules
/// - Must be strictly positive
/// - Must not exceed [`MAX_LINE_QUANTITY`]
pub fn validate_quantity(quantity: i64) -> ValidationResult<()> {
    if quantity <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity",
            value: quantity,
        });
    }
    if quantity > MAX_LINE_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity",
            min: 1,
            max: MAX_LINE_QUANTITY,
            value: quantity,
        });
    }
    Ok(())
}

/// Validates an administered dose count.
pub fn validate_doses(doses: i64) -> ValidationResult<()> {
    if doses <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "doses",
            value: doses,
        });
    }
    if doses > MAX_DOSES_PER_VACCINATION {
        return Err(ValidationError::OutOfRange {
            field: "doses",
            min: 1,
            max: MAX_DOSES_PER_VACCINATION,
            value: doses,
        });
    }
    Ok(())
}

/// Validates a 1..=5 review score.
pub fn validate_score(field: &'static str, score: i64) -> ValidationResult<()> {
    if !(1..=5).contains(&score) {
        return Err(ValidationError::OutOfRange {
            field,
            min: 1,
            max: 5,
            value: score,
        });
    }
    Ok(())
}

/// Validates an entity identifier is present.
pub fn validate_id(field: &'static str, id: &str) -> ValidationResult<()> {
    if id.trim().is_empty() {
        return Err(ValidationError::Required { field });
    }
    if id.len() > 64 {
        return Err(ValidationError::TooLong { field, max: 64 });
    }
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quantity_bounds() {
        assert!(validate_quantity(1).is_ok());
        assert!(validate_quantity(MAX_LINE_QUANTITY).is_ok());
        assert!(validate_quantity(0).is_err());
        assert!(validate_quantity(-3).is_err());
        assert!(validate_quantity(MAX_LINE_QUANTITY + 1).is_err());
    }

    #[test]
    fn test_doses_bounds() {
        assert!(validate_doses(1).is_ok());
        assert!(validate_doses(0).is_err());
        assert!(validate_doses(MAX_DOSES_PER_VACCINATION + 1).is_err());
    }

    #[test]
    fn test_score_bounds() {
        assert!(validate_score("service_score", 1).is_ok());
        assert!(validate_score("service_score", 5).is_ok());
        assert!(validate_score("service_score", 0).is_err());
        assert!(validate_score("service_score", 6).is_err());
    }

    #[test]
    fn test_id_rules() {
        assert!(validate_id("customer_id", "cus-1").is_ok());
        assert!(validate_id("customer_id", "  ").is_err());
        assert!(validate_id("customer_id", &"x".repeat(65)).is_err());
    }
}
