//! # Repository Module
//!
//! One repository per table family, each borrowed from a [`UnitOfWork`].
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  InventoryService                                                       │
//! │       │                                                                 │
//! │       │  uow.ledger().find(tenant, item_id, location_id)                │
//! │       ▼                                                                 │
//! │  LedgerRepository<'c> { conn: &'c mut SqliteConnection }                │
//! │       │                                                                 │
//! │       │  SQL on the unit of work's transaction                          │
//! │       ▼                                                                 │
//! │  SQLite Database                                                        │
//! │                                                                         │
//! │  Every query takes tenant_id and filters on it.                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`product::ProductRepository`] - External product read + stock mirror
//! - [`location::LocationRepository`] - Location registry
//! - [`item::ItemRepository`] - Items, cached aggregates, row lock
//! - [`ledger::LedgerRepository`] - Per-location ledger rows
//! - [`reservation::ReservationRepository`] - Holds
//! - [`journal::JournalRepository`] - Movements and adjustments
//! - [`reconciliation::ReconciliationRepository`] - Variance cases
//! - [`alert::AlertRepository`] - Stock alerts
//! - [`count::CountRepository`] - Cycle count headers
//!
//! [`UnitOfWork`]: crate::UnitOfWork

pub mod alert;
pub mod count;
pub mod item;
pub mod journal;
pub mod ledger;
pub mod location;
pub mod product;
pub mod reconciliation;
pub mod reservation;
