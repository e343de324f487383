//! # Domain Types
//!
//! Entities of the inventory ledger.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  Product (external) ──1:1──► InventoryItem ◄──── InventoryLocation     │
//! │                                │  cached aggregates        │            │
//! │                                │                           │            │
//! │                                ▼                           ▼            │
//! │                     InventoryItemLocation (ledger row, item × location) │
//! │                      on_hand / reserved / available / damaged / transit │
//! │                                │                                        │
//! │        ┌───────────────┬───────┴────────┬──────────────────┐           │
//! │        ▼               ▼                ▼                  ▼           │
//! │  Reservation      Movement         Adjustment       Reconciliation     │
//! │  (holds)          (append-only)    (before/after)   (variance case)    │
//! │                                                                         │
//! │  InventoryAlert (low/out of stock)   InventoryCount (scheduled count)  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Identity
//! Every entity has a UUID v4 `id` and a `tenant_id`. All queries are scoped
//! by tenant; there is no cross-tenant reference anywhere in the model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use ts_rs::TS;

use crate::ledger::StockAggregates;

// =============================================================================
// Enumerations
// =============================================================================

/// Lifecycle of items, locations and ledger rows.
///
/// Retired rows are restored instead of recreated so ledger history and
/// foreign keys stay stable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum Lifecycle {
    #[default]
    Active,
    Retired,
}

impl Lifecycle {
    pub fn is_active(&self) -> bool {
        matches!(self, Lifecycle::Active)
    }
}

/// Physical or virtual kind of a stock location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum LocationType {
    #[default]
    Warehouse,
    Store,
    Production,
    QualityControl,
    Shipping,
    Returns,
    Showroom,
    Staging,
    MicroFulfillment,
    /// Non-physical bucket (drop-ship, consignment, ...).
    Virtual,
}

/// Costing method recorded on the item. Informational for this core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum ValuationMethod {
    #[default]
    Fifo,
    Lifo,
    WeightedAverage,
    Standard,
}

impl std::str::FromStr for ValuationMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "fifo" => Ok(ValuationMethod::Fifo),
            "lifo" => Ok(ValuationMethod::Lifo),
            "weighted_average" | "average" => Ok(ValuationMethod::WeightedAverage),
            "standard" => Ok(ValuationMethod::Standard),
            other => Err(format!(
                "Unknown valuation method: '{}'. Valid options: fifo, lifo, weighted_average, standard",
                other
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum ReservationStatus {
    Active,
    Released,
}

impl fmt::Display for ReservationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReservationStatus::Active => write!(f, "active"),
            ReservationStatus::Released => write!(f, "released"),
        }
    }
}

/// Kind of journal entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum MovementType {
    AdjustmentIncrease,
    AdjustmentDecrease,
    Transfer,
    /// Zero-quantity audit entry; no physical stock moved.
    ReservationRelease,
}

impl MovementType {
    /// Picks the adjustment direction for a signed difference.
    pub fn for_adjustment(difference: f64) -> Self {
        if difference > 0.0 {
            MovementType::AdjustmentIncrease
        } else {
            MovementType::AdjustmentDecrease
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum AdjustmentType {
    /// Absolute set (`set_location_stock`).
    Manual,
    /// Signed delta (`adjust_location_stock`).
    CycleCount,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum AdjustmentStatus {
    Pending,
    Approved,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum ReconciliationStatus {
    Open,
    Resolved,
}

/// Who triggered a balancing run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum ReconciliationSource {
    #[default]
    Manual,
    Scheduled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum AlertType {
    LowStock,
    OutOfStock,
}

impl AlertType {
    pub const ALL: [AlertType; 2] = [AlertType::LowStock, AlertType::OutOfStock];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum AlertSeverity {
    Warning,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum CountType {
    Cycle,
    Full,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum CountStatus {
    Scheduled,
    InProgress,
    Completed,
}

// =============================================================================
// Product (external)
// =============================================================================

/// The external catalog product.
///
/// The core only reads `tenant_id`, `sku`, `low_stock_threshold` and the
/// costing fields, and writes back `stock_quantity` (rounded) plus a default
/// `low_stock_threshold`.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Product {
    pub id: String,
    pub tenant_id: String,
    pub sku: String,
    pub name: String,
    pub description: Option<String>,
    /// Purchase price per unit; seeds standard/average cost.
    pub vendor_price: Option<f64>,
    /// Displayed whole-unit quantity mirrored from the item.
    pub stock_quantity: i64,
    pub low_stock_threshold: Option<i64>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Inventory Location
// =============================================================================

/// A tenant-owned place where stock physically or virtually resides.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct InventoryLocation {
    pub id: String,
    pub tenant_id: String,
    /// Business identifier, unique per tenant (e.g. "WH-A").
    pub code: String,
    pub name: String,
    pub location_type: LocationType,
    pub description: Option<String>,
    pub is_primary: bool,
    pub lifecycle: Lifecycle,
    pub created_by: String,
    pub updated_by: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Inventory Item
// =============================================================================

/// One per product per tenant. Holds the cached aggregates.
///
/// ## Cached Aggregates
/// `current_stock`, `reserved_stock` and `available_stock` duplicate what
/// the ledger rows say. Only the aggregator writes them; reconciliation is
/// the authority when they disagree with the rows.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct InventoryItem {
    pub id: String,
    pub tenant_id: String,
    pub product_id: String,
    /// Copied from the product SKU at creation.
    pub item_code: String,
    pub item_name: String,
    pub description: Option<String>,
    pub item_type: String,
    pub unit_of_measure: String,
    pub current_stock: f64,
    pub reserved_stock: f64,
    pub available_stock: f64,
    pub on_order_stock: f64,
    pub minimum_stock_level: f64,
    pub reorder_point: f64,
    pub reorder_quantity: f64,
    pub standard_cost: f64,
    pub average_cost: f64,
    pub valuation_method: ValuationMethod,
    pub lifecycle: Lifecycle,
    /// Bumped by every row lock taken on the item.
    pub lock_version: i64,
    pub created_by: String,
    pub updated_by: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl InventoryItem {
    /// Returns the cached aggregates as stored.
    pub fn aggregates(&self) -> StockAggregates {
        StockAggregates {
            current_stock: self.current_stock,
            reserved_stock: self.reserved_stock,
            available_stock: self.available_stock,
        }
    }

    /// Overwrites the cached aggregates.
    pub fn apply_aggregates(&mut self, aggregates: &StockAggregates) {
        self.current_stock = aggregates.current_stock;
        self.reserved_stock = aggregates.reserved_stock;
        self.available_stock = aggregates.available_stock.max(0.0);
    }
}

// =============================================================================
// Ledger Row
// =============================================================================

/// The per-location ledger row for one item.
///
/// ## Invariant
/// `stock_available = max(stock_on_hand - stock_reserved - stock_damaged, 0)`
/// on every write. See [`crate::ledger`] for the mutations that keep it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct InventoryItemLocation {
    pub id: String,
    pub tenant_id: String,
    pub inventory_item_id: String,
    pub inventory_location_id: String,
    pub stock_on_hand: f64,
    pub stock_reserved: f64,
    pub stock_available: f64,
    pub stock_damaged: f64,
    pub stock_in_transit: f64,
    #[ts(as = "Option<String>")]
    pub last_reconciled_at: Option<DateTime<Utc>>,
    pub lifecycle: Lifecycle,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Reservation
// =============================================================================

/// Tagged reference to whatever holds a reservation (an order, a quote...).
///
/// The core stores and reports it; it never dereferences it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ReservationRef {
    /// e.g. "order"
    pub kind: String,
    /// e.g. "O-1001"
    pub id: String,
}

impl ReservationRef {
    pub fn new(kind: impl Into<String>, id: impl Into<String>) -> Self {
        ReservationRef {
            kind: kind.into(),
            id: id.into(),
        }
    }
}

impl fmt::Display for ReservationRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.id)
    }
}

/// A hold against one location, or against the item globally when
/// `inventory_location_id` is `None`.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct InventoryReservation {
    pub id: String,
    pub tenant_id: String,
    pub inventory_item_id: String,
    pub inventory_location_id: Option<String>,
    pub quantity: f64,
    pub status: ReservationStatus,
    pub reserved_for_type: String,
    pub reserved_for_id: String,
    #[ts(as = "String")]
    pub reserved_at: DateTime<Utc>,
    /// Advisory only; expiry sweeping is done by an external job.
    #[ts(as = "Option<String>")]
    pub expires_at: Option<DateTime<Utc>>,
    pub reserved_by: String,
    #[ts(as = "Option<String>")]
    pub released_at: Option<DateTime<Utc>>,
    pub released_by: Option<String>,
    pub release_reason: Option<String>,
}

impl InventoryReservation {
    pub fn reference(&self) -> ReservationRef {
        ReservationRef::new(&self.reserved_for_type, &self.reserved_for_id)
    }

    pub fn is_active(&self) -> bool {
        self.status == ReservationStatus::Active
    }

    /// Active and past its advisory expiry.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.is_active() && self.expires_at.is_some_and(|at| at <= now)
    }
}

// =============================================================================
// Journal
// =============================================================================

/// Immutable journal entry. Never updated or deleted.
///
/// `quantity` is stored as an absolute value; direction is carried by which
/// of `from_location_id` / `to_location_id` is set.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct InventoryMovement {
    pub id: String,
    pub tenant_id: String,
    pub inventory_item_id: String,
    pub from_location_id: Option<String>,
    pub to_location_id: Option<String>,
    pub quantity: f64,
    pub movement_type: MovementType,
    pub reason: String,
    /// JSON text.
    pub metadata: Option<String>,
    pub performed_by: String,
    #[ts(as = "String")]
    pub performed_at: DateTime<Utc>,
}

impl InventoryMovement {
    /// Builds an adjustment or release entry from a signed quantity at one
    /// location: negative leaves `location`, positive enters it, zero
    /// touches neither side.
    #[allow(clippy::too_many_arguments)]
    pub fn signed(
        tenant_id: &str,
        item_id: &str,
        location_id: Option<&str>,
        signed_quantity: f64,
        movement_type: MovementType,
        reason: &str,
        metadata: Option<serde_json::Value>,
        actor: &str,
        now: DateTime<Utc>,
    ) -> Self {
        let from_location_id = location_id
            .filter(|_| signed_quantity < 0.0)
            .map(str::to_string);
        let to_location_id = location_id
            .filter(|_| signed_quantity > 0.0)
            .map(str::to_string);

        InventoryMovement {
            id: crate::new_id(),
            tenant_id: tenant_id.to_string(),
            inventory_item_id: item_id.to_string(),
            from_location_id,
            to_location_id,
            quantity: signed_quantity.abs(),
            movement_type,
            reason: reason.to_string(),
            metadata: metadata.map(|m| m.to_string()),
            performed_by: actor.to_string(),
            performed_at: now,
        }
    }

    pub fn metadata_json(&self) -> Option<serde_json::Value> {
        self.metadata
            .as_deref()
            .and_then(|m| serde_json::from_str(m).ok())
    }
}

/// Structured before/after record for a non-transfer change.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct InventoryAdjustment {
    pub id: String,
    pub tenant_id: String,
    pub inventory_item_id: String,
    pub inventory_location_id: String,
    pub adjustment_type: AdjustmentType,
    pub quantity_before: f64,
    pub quantity_after: f64,
    pub difference: f64,
    pub reason: String,
    pub status: AdjustmentStatus,
    pub created_by: String,
    pub approved_by: Option<String>,
    #[ts(as = "Option<String>")]
    pub approved_at: Option<DateTime<Utc>>,
    pub metadata: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Reconciliation
// =============================================================================

/// A variance case between cached aggregates and ledger truth.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct InventoryReconciliation {
    pub id: String,
    pub tenant_id: String,
    pub inventory_item_id: String,
    /// Always `None` for item-level balancing.
    pub inventory_location_id: Option<String>,
    pub expected_quantity: f64,
    pub counted_quantity: f64,
    pub variance_quantity: f64,
    /// `variance_quantity × average_cost`.
    pub variance_value: f64,
    pub status: ReconciliationStatus,
    pub source: ReconciliationSource,
    pub initiated_by: String,
    #[ts(as = "String")]
    pub initiated_at: DateTime<Utc>,
    pub resolved_by: Option<String>,
    #[ts(as = "Option<String>")]
    pub resolved_at: Option<DateTime<Utc>>,
    pub metadata: Option<String>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl InventoryReconciliation {
    pub fn is_open(&self) -> bool {
        self.status == ReconciliationStatus::Open
    }

    pub fn metadata_json(&self) -> Option<serde_json::Value> {
        self.metadata
            .as_deref()
            .and_then(|m| serde_json::from_str(m).ok())
    }
}

// =============================================================================
// Alert
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct InventoryAlert {
    pub id: String,
    pub tenant_id: String,
    pub inventory_item_id: String,
    pub inventory_location_id: Option<String>,
    pub alert_type: AlertType,
    pub severity: AlertSeverity,
    pub message: String,
    pub triggered_quantity: f64,
    pub threshold_quantity: f64,
    pub resolved: bool,
    #[ts(as = "Option<String>")]
    pub resolved_at: Option<DateTime<Utc>>,
    pub resolved_by: Option<String>,
    pub metadata: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Cycle Count
// =============================================================================

/// Scheduled physical count header.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct InventoryCount {
    pub id: String,
    pub tenant_id: String,
    pub inventory_location_id: String,
    pub count_type: CountType,
    pub status: CountStatus,
    #[ts(as = "String")]
    pub scheduled_for: DateTime<Utc>,
    pub total_items: i64,
    pub items_counted: i64,
    pub variance_quantity: f64,
    pub variance_value: f64,
    pub created_by: String,
    pub metadata: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Unit Tests
// =============================================================================
