//! # stockroom-core: Pure Inventory Ledger Logic
//!
//! This crate holds every rule of the multi-location inventory ledger that
//! can be expressed without touching storage.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Stockroom Architecture                           │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │        Order / negotiation use cases (external callers)         │   │
//! │  │        reserve_stock, release_reservation, set/adjust, ...      │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                stockroom-engine (InventoryService)              │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │             ★ stockroom-core (THIS CRATE) ★                     │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌────────────┐  ┌──────────┐  │   │
//! │  │   │   types   │  │  ledger   │  │ reconcile  │  │  alert   │  │   │
//! │  │   │  entities │  │ snapshot  │  │  variance  │  │  plans   │  │   │
//! │  │   └───────────┘  └───────────┘  └────────────┘  └──────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                stockroom-db (Database Layer)                    │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Entities (items, locations, ledger rows, reservations, ...)
//! - [`ledger`] - Available-stock invariant, row mutations, item snapshots
//! - [`reconcile`] - Variance between cached aggregates and ledger truth
//! - [`alert`] - Low-stock / out-of-stock alert planning
//! - [`validation`] - Input validation run before any database access
//! - [`error`] - Domain error types
//!
//! ## Example Usage
//!
//! ```rust
//! use stockroom_core::ledger::derive_available;
//!
//! // 100 on hand, 30 reserved, 5 damaged
//! assert_eq!(derive_available(100.0, 30.0, 5.0), 65.0);
//!
//! // Never negative
//! assert_eq!(derive_available(10.0, 30.0, 0.0), 0.0);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod alert;
pub mod error;
pub mod ledger;
pub mod reconcile;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ValidationError};
pub use ledger::{ItemSnapshot, StockAggregates};
pub use reconcile::VarianceReport;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Smallest quantity difference treated as a real change.
///
/// Adjustments below this are not journaled, and reconciliation treats
/// variances below it as balanced.
pub const VARIANCE_EPSILON: f64 = 0.0001;

/// Default number of items balanced per page in a tenant-wide run.
pub const DEFAULT_BALANCING_BATCH_SIZE: u32 = 50;

/// Default lead time for a scheduled cycle count (one day out).
pub const DEFAULT_CYCLE_COUNT_LEAD_HOURS: i64 = 24;

/// Generates a new entity ID (UUID v4).
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
