//! # Package Status
//!
//! Pure computation of a package purchase's state. Expiry is computed,
//! never stored:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                 Purchase Status Decision                        │
//! │                                                                 │
//! │  every balance at remaining = 0 ──────────────► Completed       │
//! │       │ no                                                      │
//! │       ▼                                                         │
//! │  now >= purchased_at + validity_months ───────► Expired         │
//! │       │ no                              (unused doses forfeit)  │
//! │       ▼                                                         │
//! │                                                 Active          │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A purchase fully consumed before its expiry date stays `Completed`
//! afterwards; `Expired` only ever marks forfeited remaining doses.

use chrono::{DateTime, Months, Utc};
use serde::{Deserialize, Serialize};

use crate::types::DoseBalance;

// =============================================================================
// Purchase Status
// =============================================================================

/// Computed state of one package purchase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PurchaseStatus {
    /// Doses remain and the validity window is still open.
    Active,
    /// Every vaccine in the package reached `remaining = 0`.
    Completed,
    /// The validity window passed with doses still remaining.
    Expired,
}

/// The instant a purchase expires, or None if the validity arithmetic
/// overflows (treated as never expiring).
pub fn expires_at(purchased_at: DateTime<Utc>, validity_months: i64) -> Option<DateTime<Utc>> {
    let months = u32::try_from(validity_months).ok()?;
    purchased_at.checked_add_months(Months::new(months))
}

/// True once `purchased_at + validity_months` has passed.
pub fn is_expired(purchased_at: DateTime<Utc>, validity_months: i64, now: DateTime<Utc>) -> bool {
    matches!(expires_at(purchased_at, validity_months), Some(e) if now >= e)
}

/// Computes the purchase status from its seed data and balances.
pub fn purchase_status(
    purchased_at: DateTime<Utc>,
    validity_months: i64,
    balances: &[DoseBalance],
    now: DateTime<Utc>,
) -> PurchaseStatus {
    if balances.iter().all(|b| b.remaining == 0) {
        return PurchaseStatus::Completed;
    }
    if is_expired(purchased_at, validity_months, now) {
        return PurchaseStatus::Expired;
    }
    PurchaseStatus::Active
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn balance(vaccine: &str, remaining: i64, original: i64) -> DoseBalance {
        DoseBalance {
            purchase_id: "pp-1".to_string(),
            vaccine_id: vaccine.to_string(),
            remaining,
            original,
        }
    }

    fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_active_within_window() {
        let status = purchase_status(
            at(2026, 1, 10),
            6,
            &[balance("vac-rabies", 2, 3)],
            at(2026, 3, 1),
        );
        assert_eq!(status, PurchaseStatus::Active);
    }

    #[test]
    fn test_expired_with_remaining_doses() {
        let status = purchase_status(
            at(2026, 1, 10),
            6,
            &[balance("vac-rabies", 2, 3)],
            at(2026, 7, 11),
        );
        assert_eq!(status, PurchaseStatus::Expired);
    }

    #[test]
    fn test_completed_survives_expiry() {
        let balances = [balance("vac-rabies", 0, 3), balance("vac-parvo", 0, 2)];
        let status = purchase_status(at(2026, 1, 10), 6, &balances, at(2027, 1, 1));
        assert_eq!(status, PurchaseStatus::Completed);
    }

    #[test]
    fn test_partial_consumption_stays_active() {
        let balances = [balance("vac-rabies", 0, 3), balance("vac-parvo", 1, 2)];
        let status = purchase_status(at(2026, 1, 10), 6, &balances, at(2026, 2, 1));
        assert_eq!(status, PurchaseStatus::Active);
    }

    #[test]
    fn test_expiry_boundary() {
        // Expires exactly at purchased_at + 6 months, inclusive.
        assert!(!is_expired(at(2026, 1, 10), 6, at(2026, 7, 9)));
        assert!(is_expired(at(2026, 1, 10), 6, at(2026, 7, 10)));
    }
}
