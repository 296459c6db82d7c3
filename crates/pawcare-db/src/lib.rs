//! # pawcare-db: Storage Engine for the Pawcare Back Office
//!
//! SQLite persistence and the atomic order & inventory operations of a
//! multi-branch pet-care business: the open-invoice cart, service-session
//! lifecycle, per-branch stock ledger and prepaid vaccination packages.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Pawcare Data Flow                                │
//! │                                                                         │
//! │  Caller (API layer, back-office tooling)                                │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    pawcare-db (THIS CRATE)                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │  Repositories │    │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │    │ (invoice.rs,  │    │  (embedded)  │  │   │
//! │  │   │               │    │  session.rs,  │    │              │  │   │
//! │  │   │ SqlitePool    │◄───│  stock.rs...) │    │ 001_init.sql │  │   │
//! │  │   │ WAL, FKs on   │    │               │    │              │  │   │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘  │   │
//! │  │                                                                 │   │
//! │  │   Domain rules (state machine, money, expiry) live in          │   │
//! │  │   pawcare-core; this crate makes them atomic.                  │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite database (one file per deployment, or :memory: in tests)       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database and engine error types
//! - [`repository`] - Repository implementations (invoice, session, stock, ...)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use pawcare_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("pawcare.db")).await?;
//!
//! // Book a grooming visit; branch resolved automatically.
//! let session = db.sessions().book("cus-1", "pet-1", "svc-groom", None).await?;
//!
//! // Sell two bags of food onto the same open invoice.
//! let invoice = db.retail().add_to_cart("cus-1", "prd-food", 2, None).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

#[cfg(test)]
mod testutil;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, EngineError, EngineResult};
pub use pool::{Database, DbConfig};

// Repository re-exports for convenience
pub use repository::catalog::CatalogRepository;
pub use repository::invoice::InvoiceRepository;
pub use repository::package::{PackageOverview, PackageRepository};
pub use repository::resolver::BranchResolver;
pub use repository::retail::RetailRepository;
pub use repository::session::SessionRepository;
pub use repository::stock::StockRepository;
