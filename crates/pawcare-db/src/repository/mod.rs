//! # Repository Module
//!
//! Database repository implementations for the Pawcare engine.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Repository Layout                                 │
//! │                                                                         │
//! │  Caller                                                                 │
//! │       │                                                                 │
//! │       │  db.retail().add_to_cart("cus-1", "prd-1", 2, None)            │
//! │       ▼                                                                 │
//! │  RetailRepository ──────────────┐                                       │
//! │       │ begins ONE transaction  │  pub(crate) conn-level helpers       │
//! │       ▼                         ▼  shared across repositories:         │
//! │  invoice::find_or_create_open   catalog::get_product                    │
//! │  resolver::resolve_for_product  stock::adjust                           │
//! │  invoice::recalculate           package::consume_doses                  │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite (conditional updates, partial unique indexes)                   │
//! │                                                                         │
//! │  Each repository method is one atomic operation: every row it          │
//! │  touches commits or rolls back together.                               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`CatalogRepository`](catalog::CatalogRepository) - Read-only reference data
//! - [`InvoiceRepository`](invoice::InvoiceRepository) - Open-invoice cart, totals, close, reviews
//! - [`BranchResolver`](resolver::BranchResolver) - Fulfilling-branch selection
//! - [`SessionRepository`](session::SessionRepository) - Service-session lifecycle
//! - [`RetailRepository`](retail::RetailRepository) - Product cart on the open invoice
//! - [`StockRepository`](stock::StockRepository) - Per-branch stock ledger
//! - [`PackageRepository`](package::PackageRepository) - Package purchases and dose ledger

pub mod catalog;
pub mod invoice;
pub mod package;
pub mod resolver;
pub mod retail;
pub mod session;
pub mod stock;
