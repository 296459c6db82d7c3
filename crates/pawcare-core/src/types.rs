//! # Domain Types
//!
//! Core domain types of the pet-care back office.
//!
//! ## Entity Ownership
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                       Entity Graph                              │
//! │                                                                 │
//! │  Customer ──owns──► Pet                                         │
//! │     │                                                           │
//! │     └──has at most one OPEN──► Invoice                          │
//! │                                  │                              │
//! │              ┌───────────────────┼──────────────────┐           │
//! │              ▼                   ▼                  ▼           │
//! │        ServiceSession     PackagePurchase     (discount/total)  │
//! │              │                   │                              │
//! │     ┌────────┼────────┐          └──seeds──► DoseBalance        │
//! │     ▼        ▼        ▼                                         │
//! │  RetailLine Exam  Vaccination / PrescriptionLine                │
//! │                                                                 │
//! │  BranchStock and DoseBalance are SHARED counters referenced     │
//! │  by many invoices over time - never owned by a single one.      │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Dual-Key Identity Pattern
//! Every entity has a UUID v4 `id` (immutable, used for relations); business
//! identifiers live in the reference catalog and are read-only to this core.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::money::Money;
use crate::session::SessionStatus;

// =============================================================================
// Reference Catalog (read-only to the engine)
// =============================================================================

/// A customer. Loyalty fields are mutated by external loyalty logic;
/// the engine only reads them.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Customer {
    pub id: String,
    pub name: String,
    /// Loyalty tier label (e.g. "silver", "gold").
    pub tier: Option<String>,
    /// Accumulated loyalty points.
    pub points: i64,
}

/// A pet, owned by exactly one customer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Pet {
    pub id: String,
    pub customer_id: String,
    pub name: String,
    pub species: Option<String>,
    pub breed: Option<String>,
}

/// A physical branch with its own independent stock.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Branch {
    pub id: String,
    pub name: String,
}

/// A bookable service (exam, grooming, vaccination visit).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Service {
    pub id: String,
    pub name: String,
    /// Current list price; snapshotted onto the session at booking time.
    pub price_cents: i64,
}

impl Service {
    #[inline]
    pub fn price(&self) -> Money {
        Money::from_cents(self.price_cents)
    }
}

/// A retail product. Medicines are products with a `category` of
/// "medicine"; the stock ledger treats them identically.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Product {
    pub id: String,
    pub name: String,
    pub category: Option<String>,
    pub price_cents: i64,
}

impl Product {
    #[inline]
    pub fn price(&self) -> Money {
        Money::from_cents(self.price_cents)
    }
}

/// A vaccine, stocked per branch and bundled into packages.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Vaccine {
    pub id: String,
    pub name: String,
    /// Price of a loose (non-package) dose.
    pub price_cents: i64,
}

/// A prepaid vaccination package template.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Package {
    pub id: String,
    pub name: String,
    pub price_cents: i64,
    /// A purchase expires this many months after the purchase date,
    /// regardless of remaining balance.
    pub validity_months: i64,
}

/// One vaccine entitlement line in a package template.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct PackageItem {
    pub package_id: String,
    pub vaccine_id: String,
    /// Doses granted per purchase; seeds `DoseBalance.remaining`.
    pub dose_count: i64,
}

/// Static many-to-many of which branches provide which services.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct ServiceOffering {
    pub branch_id: String,
    pub service_id: String,
}

// =============================================================================
// Payment Method
// =============================================================================

/// How a closed invoice was paid.
///
/// `NULL` in the database means the invoice is still open (the customer's
/// active cart); setting a method closes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    Card,
    Transfer,
}

// =============================================================================
// Invoice
// =============================================================================

/// One commercial transaction aggregating sessions, retail lines and
/// package purchases.
///
/// ## Invariant
/// At most one invoice per customer may be open (`payment_method` unset)
/// at a time; the open-invoice cart enforces find-or-create-one semantics.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Invoice {
    pub id: String,
    pub customer_id: String,
    pub created_at: DateTime<Utc>,
    /// None while the invoice is open; set once, by the external
    /// payment-confirmation step.
    pub payment_method: Option<PaymentMethod>,
    /// Promotional discount, subtracted from the line sum (floored at 0).
    pub discount_cents: i64,
    /// Derived total; recomputed after every line-item change while open,
    /// frozen once closed.
    pub total_cents: i64,
}

impl Invoice {
    /// An open invoice is the customer's active cart.
    #[inline]
    pub fn is_open(&self) -> bool {
        self.payment_method.is_none()
    }

    #[inline]
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents)
    }
}

// =============================================================================
// Service Session
// =============================================================================

/// One requested service occurrence on an invoice.
///
/// A synthetic retail session (`is_retail`, one per invoice per branch)
/// carries the invoice's shopping-cart lines for that branch; its own price
/// is zero and excluded from the total.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct ServiceSession {
    pub id: String,
    pub invoice_id: String,
    /// None for the synthetic retail session.
    pub pet_id: Option<String>,
    /// None for the synthetic retail session.
    pub service_id: Option<String>,
    /// Fulfilling branch, resolved at booking/add-to-cart time.
    pub branch_id: String,
    /// Price snapshotted from the service catalog at booking time;
    /// never recomputed automatically.
    pub price_cents: i64,
    pub status: SessionStatus,
    pub is_retail: bool,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl ServiceSession {
    #[inline]
    pub fn price(&self) -> Money {
        Money::from_cents(self.price_cents)
    }
}

/// Product + quantity attached to a retail session.
///
/// Unique per (session, product): re-adding the same product accumulates
/// quantity on the existing line instead of creating a second one.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct RetailLine {
    pub id: String,
    pub session_id: String,
    pub product_id: String,
    pub quantity: i64,
    /// Unit price frozen at first add.
    pub unit_price_cents: i64,
    pub created_at: DateTime<Utc>,
}

impl RetailLine {
    #[inline]
    pub fn line_total(&self) -> Money {
        Money::from_cents(self.unit_price_cents * self.quantity)
    }
}

/// Examination outcome recorded when a session completes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Examination {
    pub session_id: String,
    pub vet_id: Option<String>,
    pub diagnosis: Option<String>,
    pub follow_up_on: Option<NaiveDate>,
}

/// Medicine dispensed at completion; decrements product stock at the
/// session's branch.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct PrescriptionLine {
    pub id: String,
    pub session_id: String,
    pub product_id: String,
    pub quantity: i64,
}

/// A vaccine administration recorded at completion.
///
/// With `package_id` set the doses come out of the customer's package
/// balance; without it this is a loose sale decrementing vaccine stock.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Vaccination {
    pub id: String,
    pub session_id: String,
    pub vaccine_id: String,
    pub package_id: Option<String>,
    pub doses: i64,
    pub administered_on: NaiveDate,
    pub vet_id: Option<String>,
}

// =============================================================================
// Packages & Doses
// =============================================================================

/// A customer's purchase of a package, attached to an invoice.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct PackagePurchase {
    pub id: String,
    pub invoice_id: String,
    pub customer_id: String,
    pub package_id: String,
    pub purchased_at: DateTime<Utc>,
}

/// Remaining-dose counter for one vaccine under one package purchase.
///
/// ## Invariant
/// `0 <= remaining <= original`, and `remaining` only ever decreases after
/// the initial seed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct DoseBalance {
    pub purchase_id: String,
    pub vaccine_id: String,
    pub remaining: i64,
    pub original: i64,
}

// =============================================================================
// Stock
// =============================================================================

/// What kind of item a stock row counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum StockItemKind {
    Product,
    Vaccine,
}

/// Per (branch, item) quantity-on-hand.
///
/// ## Invariant
/// `quantity >= 0` always; mutated only by stock-ledger operations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct BranchStock {
    pub branch_id: String,
    pub item_kind: StockItemKind,
    pub item_id: String,
    pub quantity: i64,
}

// =============================================================================
// Reviews
// =============================================================================

/// Customer review of a closed invoice (idempotent upsert).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct InvoiceReview {
    pub invoice_id: String,
    pub customer_id: String,
    /// 1..=5 rating of the service itself.
    pub service_score: i64,
    /// 1..=5 overall satisfaction.
    pub satisfaction: i64,
    pub staff_attitude: Option<String>,
    pub comment: Option<String>,
}

// =============================================================================
// Completion Input
// =============================================================================

/// Everything staff record when completing a visit; applied atomically
/// with the `InService → DoneService` transition.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VisitOutcome {
    pub examination: Option<ExaminationInput>,
    pub prescriptions: Vec<PrescriptionInput>,
    pub vaccinations: Vec<VaccinationInput>,
}

/// Examination fields for [`VisitOutcome`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExaminationInput {
    pub vet_id: Option<String>,
    pub diagnosis: Option<String>,
    pub follow_up_on: Option<NaiveDate>,
}

/// One dispensed medicine line for [`VisitOutcome`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrescriptionInput {
    pub product_id: String,
    pub quantity: i64,
}

/// One administered vaccine for [`VisitOutcome`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VaccinationInput {
    pub vaccine_id: String,
    /// Doses administered; decremented from the package balance or from
    /// loose vaccine stock depending on `package_id`.
    pub doses: i64,
    pub package_id: Option<String>,
    pub administered_on: NaiveDate,
    pub vet_id: Option<String>,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invoice_open_state() {
        let mut invoice = Invoice {
            id: "inv-1".to_string(),
            customer_id: "cus-1".to_string(),
            created_at: Utc::now(),
            payment_method: None,
            discount_cents: 0,
            total_cents: 0,
        };
        assert!(invoice.is_open());

        invoice.payment_method = Some(PaymentMethod::Cash);
        assert!(!invoice.is_open());
    }

    #[test]
    fn test_retail_line_total() {
        let line = RetailLine {
            id: "rl-1".to_string(),
            session_id: "ss-1".to_string(),
            product_id: "prd-1".to_string(),
            quantity: 3,
            unit_price_cents: 2000,
            created_at: Utc::now(),
        };
        assert_eq!(line.line_total().cents(), 6000);
    }
}
