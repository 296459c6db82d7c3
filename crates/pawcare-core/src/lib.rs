//! # pawcare-core: Pure Business Logic for Pawcare
//!
//! This crate is the **heart** of the Pawcare back office. It contains the
//! business rules of the order & inventory consolidation engine as pure
//! functions with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                     Pawcare Architecture                        │
//! │                                                                 │
//! │  ┌───────────────────────────────────────────────────────────┐  │
//! │  │        Customer / staff facing API (external)             │  │
//! │  │   book service, add to cart, buy package, dispense        │  │
//! │  └────────────────────────────┬──────────────────────────────┘  │
//! │                               │                                 │
//! │  ┌────────────────────────────▼──────────────────────────────┐  │
//! │  │              ★ pawcare-core (THIS CRATE) ★                │  │
//! │  │                                                           │  │
//! │  │   ┌─────────┐ ┌─────────┐ ┌──────────┐ ┌────────────┐     │  │
//! │  │   │  types  │ │  money  │ │ session  │ │  package   │     │  │
//! │  │   │ Invoice │ │  Money  │ │ lifecycle│ │ dose/expiry│     │  │
//! │  │   │ Session │ │  cents  │ │  table   │ │  status    │     │  │
//! │  │   └─────────┘ └─────────┘ └──────────┘ └────────────┘     │  │
//! │  │                                                           │  │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS      │  │
//! │  └────────────────────────────┬──────────────────────────────┘  │
//! │                               │                                 │
//! │  ┌────────────────────────────▼──────────────────────────────┐  │
//! │  │                pawcare-db (Database Layer)                │  │
//! │  │        SQLite queries, migrations, repositories           │  │
//! │  └───────────────────────────────────────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Invoice, ServiceSession, DoseBalance, etc.)
//! - [`money`] - Money type with integer arithmetic (no floating point!)
//! - [`session`] - Service session state machine (closed transition table)
//! - [`package`] - Vaccination package status computation
//! - [`error`] - Domain error taxonomy
//! - [`validation`] - Business rule validation
//!
//! ## Design Principles
//!
//! 1. **Pure Functions**: Every function is deterministic - same input = same output
//! 2. **No I/O**: Database, network, file system access is FORBIDDEN here
//! 3. **Integer Money**: All monetary values are in cents (i64) to avoid float errors
//! 4. **Explicit Errors**: All errors are typed, never strings or panics

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod money;
pub mod package;
pub mod session;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ValidationError};
pub use money::Money;
pub use package::PurchaseStatus;
pub use session::{SessionAction, SessionStatus};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum quantity accepted on a single retail line or stock movement.
///
/// ## Business Reason
/// Prevents accidental over-ordering (e.g., typing 1000 instead of 10).
/// Can be made configurable per-branch in future versions.
pub const MAX_LINE_QUANTITY: i64 = 999;

/// Maximum doses administered in one vaccination entry.
///
/// ## Business Reason
/// A single visit never legitimately administers more than a handful of
/// doses of one vaccine; anything larger is a data-entry mistake.
pub const MAX_DOSES_PER_VACCINATION: i64 = 10;
