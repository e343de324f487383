//! # stockroom-engine: Inventory Service
//!
//! Every operation external callers use against the inventory ledger. Each
//! call runs inside one unit of work: either all of its ledger, journal,
//! aggregate and alert writes land, or none do.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Stockroom Architecture                           │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │     Callers: order, negotiation and admin use cases, seed bin   │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │            ★ stockroom-engine (THIS CRATE) ★                    │   │
//! │  │                                                                 │   │
//! │  │   locations   items   stock   reservations   transfer          │   │
//! │  │   balancing   counts  queries                                   │   │
//! │  │                                                                 │   │
//! │  │   aggregate ──► alerts   (run after every stock change)         │   │
//! │  └────────────┬───────────────────────────────────┬────────────────┘   │
//! │               │                                   │                     │
//! │  ┌────────────▼──────────────┐      ┌─────────────▼─────────────────┐  │
//! │  │  stockroom-core           │      │  stockroom-db                 │  │
//! │  │  rules, snapshots, plans  │      │  SQLite, UnitOfWork, repos    │  │
//! │  └───────────────────────────┘      └───────────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//! ```rust,no_run
//! use stockroom_core::ReservationRef;
//! use stockroom_engine::{InventoryConfig, InventoryService, ReserveRequest};
//!
//! # async fn run() -> stockroom_engine::InventoryResult<()> {
//! let service = InventoryService::connect(InventoryConfig::load_or_default(None)).await?;
//!
//! service
//!     .set_location_stock("tenant-1", "product-1", "location-1", 100.0, "user-1", "opening count")
//!     .await?;
//! service
//!     .reserve_stock(
//!         "tenant-1",
//!         ReserveRequest {
//!             product_id: "product-1".to_string(),
//!             quantity: 30.0,
//!             location_id: Some("location-1".to_string()),
//!             reference: ReservationRef::new("order", "O-1001"),
//!             expires_at: None,
//!         },
//!         "user-1",
//!     )
//!     .await?;
//! # Ok(())
//! # }
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod balancing;
pub mod config;
pub mod counts;
pub mod error;
pub mod items;
pub mod locations;
pub mod queries;
pub mod reservations;
pub mod stock;
pub mod transfer;

mod aggregate;
mod alerts;
mod service;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use balancing::{BalancingOutcome, BalancingSummary};
pub use config::InventoryConfig;
pub use error::{ConfigError, InventoryError, InventoryResult};
pub use locations::{LocationUpdate, NewLocation};
pub use reservations::ReserveRequest;
pub use service::InventoryService;
pub use stock::StockChange;
pub use transfer::{TransferOutcome, TransferRequest};
