//! # Reconciliation
//!
//! Compares an item's cached aggregates with a fresh ledger snapshot and
//! decides what happens to the item's open reconciliation case.
//!
//! ## Decision Table
//! ```text
//! ┌──────────────────────┬───────────────────────┬──────────────────────────┐
//! │ variance             │ open case exists      │ action                   │
//! ├──────────────────────┼───────────────────────┼──────────────────────────┤
//! │ all three negligible │ no                    │ Balanced (nothing)       │
//! │ all three negligible │ yes                   │ AutoResolve the case     │
//! │ any one significant  │ yes                   │ UpdateOpen (counted,     │
//! │                      │                       │ variance, merge meta)    │
//! │ any one significant  │ no                    │ OpenNew                  │
//! └──────────────────────┴───────────────────────┴──────────────────────────┘
//! ```
//!
//! At most one open item-level case exists per item. Variances are never
//! errors: they are recorded and the triggering operation carries on.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::ledger::{round_quantity, ItemSnapshot, StockAggregates};
use crate::types::{InventoryItem, InventoryReconciliation, ReconciliationSource, ReconciliationStatus};
use crate::VARIANCE_EPSILON;

// =============================================================================
// Variance
// =============================================================================

/// Snapshot minus cached aggregates, each rounded to 4 decimals.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VarianceReport {
    pub on_hand: f64,
    pub reserved: f64,
    pub available: f64,
}

impl VarianceReport {
    pub fn between(previous: &StockAggregates, snapshot: &ItemSnapshot) -> Self {
        VarianceReport {
            on_hand: round_quantity(snapshot.on_hand - previous.current_stock),
            reserved: round_quantity(snapshot.reserved - previous.reserved_stock),
            available: round_quantity(snapshot.available - previous.available_stock),
        }
    }

    /// True when every component is within the epsilon.
    pub fn is_negligible(&self) -> bool {
        self.on_hand.abs() <= VARIANCE_EPSILON
            && self.reserved.abs() <= VARIANCE_EPSILON
            && self.available.abs() <= VARIANCE_EPSILON
    }

    /// Monetary value of the on-hand variance.
    pub fn value_at(&self, average_cost: f64) -> f64 {
        self.on_hand * average_cost
    }
}

// =============================================================================
// Decision
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileAction {
    Balanced,
    AutoResolve,
    UpdateOpen,
    OpenNew,
}

pub fn decide(report: &VarianceReport, has_open_case: bool) -> ReconcileAction {
    match (report.is_negligible(), has_open_case) {
        (true, false) => ReconcileAction::Balanced,
        (true, true) => ReconcileAction::AutoResolve,
        (false, true) => ReconcileAction::UpdateOpen,
        (false, false) => ReconcileAction::OpenNew,
    }
}

// =============================================================================
// Case Mutations
// =============================================================================

/// Metadata recorded on an open case: previous aggregates, the snapshot
/// and the three variances.
pub fn case_metadata(
    previous: &StockAggregates,
    snapshot: &ItemSnapshot,
    report: &VarianceReport,
) -> Value {
    json!({
        "previous": previous,
        "snapshot": snapshot.to_json(),
        "variance": report,
    })
}

/// Shallow merge: top-level keys of `incoming` overwrite `existing`.
pub fn merge_metadata(existing: Option<Value>, incoming: Value) -> Value {
    let mut merged = match existing {
        Some(Value::Object(map)) => map,
        _ => Map::new(),
    };
    if let Value::Object(map) = incoming {
        for (key, value) in map {
            merged.insert(key, value);
        }
    }
    Value::Object(merged)
}

/// Builds a new open case.
pub fn open_case(
    item: &InventoryItem,
    previous: &StockAggregates,
    snapshot: &ItemSnapshot,
    report: &VarianceReport,
    source: ReconciliationSource,
    actor: &str,
    now: DateTime<Utc>,
) -> InventoryReconciliation {
    InventoryReconciliation {
        id: crate::new_id(),
        tenant_id: item.tenant_id.clone(),
        inventory_item_id: item.id.clone(),
        inventory_location_id: None,
        expected_quantity: previous.current_stock,
        counted_quantity: snapshot.on_hand,
        variance_quantity: report.on_hand,
        variance_value: report.value_at(item.average_cost),
        status: ReconciliationStatus::Open,
        source,
        initiated_by: actor.to_string(),
        initiated_at: now,
        resolved_by: None,
        resolved_at: None,
        metadata: Some(case_metadata(previous, snapshot, report).to_string()),
        updated_at: now,
    }
}

/// Refreshes an open case with the latest count and variance.
///
/// `expected_quantity` keeps the value recorded when the case was opened.
pub fn update_open_case(
    case: &mut InventoryReconciliation,
    item: &InventoryItem,
    previous: &StockAggregates,
    snapshot: &ItemSnapshot,
    report: &VarianceReport,
    now: DateTime<Utc>,
) {
    case.counted_quantity = snapshot.on_hand;
    case.variance_quantity = report.on_hand;
    case.variance_value = report.value_at(item.average_cost);
    let merged = merge_metadata(case.metadata_json(), case_metadata(previous, snapshot, report));
    case.metadata = Some(merged.to_string());
    case.updated_at = now;
}

/// Closes an open case whose variance has disappeared.
pub fn auto_resolve_case(
    case: &mut InventoryReconciliation,
    snapshot: &ItemSnapshot,
    actor: &str,
    now: DateTime<Utc>,
) {
    let resolution = json!({
        "resolution": {
            "type": "auto",
            "resolved_at": now.to_rfc3339(),
        },
        "last_snapshot": snapshot.to_json(),
    });
    let merged = merge_metadata(case.metadata_json(), resolution);

    case.status = ReconciliationStatus::Resolved;
    case.resolved_by = Some(actor.to_string());
    case.resolved_at = Some(now);
    case.variance_quantity = 0.0;
    case.variance_value = 0.0;
    case.metadata = Some(merged.to_string());
    case.updated_at = now;
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Lifecycle, ValuationMethod};

    fn item(average_cost: f64) -> InventoryItem {
        let now = Utc::now();
        InventoryItem {
            id: "item-1".into(),
            tenant_id: "t".into(),
            product_id: "p".into(),
            item_code: "SKU-1".into(),
            item_name: "Widget".into(),
            description: None,
            item_type: "material".into(),
            unit_of_measure: "unit".into(),
            current_stock: 50.0,
            reserved_stock: 0.0,
            available_stock: 50.0,
            on_order_stock: 0.0,
            minimum_stock_level: 0.0,
            reorder_point: 0.0,
            reorder_quantity: 0.0,
            standard_cost: average_cost,
            average_cost,
            valuation_method: ValuationMethod::Fifo,
            lifecycle: Lifecycle::Active,
            lock_version: 0,
            created_by: "u".into(),
            updated_by: "u".into(),
            created_at: now,
            updated_at: now,
        }
    }

    fn snapshot(on_hand: f64, reserved: f64) -> ItemSnapshot {
        ItemSnapshot {
            on_hand,
            reserved,
            location_reserved: reserved,
            available: (on_hand - reserved).max(0.0),
            ..ItemSnapshot::default()
        }
    }

    fn cached(current: f64, reserved: f64) -> StockAggregates {
        StockAggregates {
            current_stock: current,
            reserved_stock: reserved,
            available_stock: (current - reserved).max(0.0),
        }
    }

    #[test]
    fn test_variance_rounds_to_four_decimals() {
        let report = VarianceReport::between(&cached(10.0, 0.0), &snapshot(10.123_456, 0.0));
        assert_eq!(report.on_hand, 0.1235);
    }

    #[test]
    fn test_negligible_needs_all_three_components() {
        let report = VarianceReport::between(&cached(10.0, 0.0), &snapshot(10.000_04, 0.0));
        assert!(report.is_negligible());

        // on-hand matches but reserved drifted
        let report = VarianceReport::between(&cached(10.0, 0.0), &snapshot(10.0, 2.0));
        assert!(!report.is_negligible());
        assert_eq!(report.reserved, 2.0);
        assert_eq!(report.available, -2.0);
    }

    #[test]
    fn test_decide_table() {
        let quiet = VarianceReport { on_hand: 0.0, reserved: 0.0, available: 0.0 };
        let loud = VarianceReport { on_hand: -5.0, reserved: 0.0, available: -5.0 };
        assert_eq!(decide(&quiet, false), ReconcileAction::Balanced);
        assert_eq!(decide(&quiet, true), ReconcileAction::AutoResolve);
        assert_eq!(decide(&loud, true), ReconcileAction::UpdateOpen);
        assert_eq!(decide(&loud, false), ReconcileAction::OpenNew);
    }

    #[test]
    fn test_open_case_for_drifted_cache() {
        // cached 50, ledger says 45
        let item = item(2.0);
        let previous = cached(50.0, 0.0);
        let snap = snapshot(45.0, 0.0);
        let report = VarianceReport::between(&previous, &snap);
        let case = open_case(
            &item,
            &previous,
            &snap,
            &report,
            ReconciliationSource::Manual,
            "auditor",
            Utc::now(),
        );

        assert_eq!(case.expected_quantity, 50.0);
        assert_eq!(case.counted_quantity, 45.0);
        assert_eq!(case.variance_quantity, -5.0);
        assert_eq!(case.variance_value, -10.0);
        assert!(case.is_open());
        assert_eq!(case.inventory_location_id, None);

        let meta = case.metadata_json().unwrap();
        assert_eq!(meta["previous"]["current_stock"], 50.0);
        assert_eq!(meta["snapshot"]["on_hand"], 45.0);
        assert_eq!(meta["variance"]["on_hand"], -5.0);
    }

    #[test]
    fn test_update_keeps_expected_and_merges_metadata() {
        let item = item(1.0);
        let previous = cached(50.0, 0.0);
        let report = VarianceReport::between(&previous, &snapshot(45.0, 0.0));
        let mut case = open_case(
            &item,
            &previous,
            &snapshot(45.0, 0.0),
            &report,
            ReconciliationSource::Scheduled,
            "u",
            Utc::now(),
        );
        let mut meta = case.metadata_json().unwrap();
        meta["note"] = json!("kept");
        case.metadata = Some(meta.to_string());

        let previous = cached(45.0, 0.0);
        let snap = snapshot(42.0, 0.0);
        let report = VarianceReport::between(&previous, &snap);
        update_open_case(&mut case, &item, &previous, &snap, &report, Utc::now());

        assert_eq!(case.expected_quantity, 50.0);
        assert_eq!(case.counted_quantity, 42.0);
        assert_eq!(case.variance_quantity, -3.0);
        let meta = case.metadata_json().unwrap();
        assert_eq!(meta["note"], "kept");
        assert_eq!(meta["previous"]["current_stock"], 45.0);
    }

    #[test]
    fn test_auto_resolve_zeroes_variance() {
        let item = item(1.0);
        let previous = cached(50.0, 0.0);
        let snap = snapshot(45.0, 0.0);
        let report = VarianceReport::between(&previous, &snap);
        let mut case = open_case(
            &item,
            &previous,
            &snap,
            &report,
            ReconciliationSource::Manual,
            "u",
            Utc::now(),
        );

        auto_resolve_case(&mut case, &snap, "balancer", Utc::now());
        assert_eq!(case.status, ReconciliationStatus::Resolved);
        assert_eq!(case.variance_quantity, 0.0);
        assert_eq!(case.variance_value, 0.0);
        assert_eq!(case.resolved_by.as_deref(), Some("balancer"));
        let meta = case.metadata_json().unwrap();
        assert_eq!(meta["resolution"]["type"], "auto");
        assert_eq!(meta["last_snapshot"]["on_hand"], 45.0);
        assert!(meta.get("variance").is_some());
    }

    #[test]
    fn test_merge_metadata_tolerates_non_objects() {
        let merged = merge_metadata(Some(json!("junk")), json!({"a": 1}));
        assert_eq!(merged, json!({"a": 1}));
        let merged = merge_metadata(None, json!({"a": 1}));
        assert_eq!(merged, json!({"a": 1}));
    }
}
