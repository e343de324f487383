//! # Alert Planning
//!
//! Decides which stock alerts to raise and which to resolve after a stock
//! change. The engine applies the plan; nothing here touches storage.
//!
//! ## Conditions
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  low_stock     current_stock ≤ minimum_stock_level                      │
//! │                severity = critical if current ≤ 0, else warning         │
//! │  out_of_stock  current_stock ≤ 0                                        │
//! │                severity = critical                                      │
//! │                                                                         │
//! │  Resolve: every unresolved alert of the ITEM whose condition is false. │
//! │  Raise:   one alert per true condition, only if none is unresolved for │
//! │           the same (item, location, type).                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Conditions read the item's cached aggregate, not the ledger row at the
//! location that triggered the evaluation. The location is only recorded.

use serde_json::json;

use crate::types::{AlertSeverity, AlertType, InventoryAlert, InventoryItem};

/// Which alert conditions hold for an item right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlertConditions {
    pub low_stock: bool,
    pub out_of_stock: bool,
}

impl AlertConditions {
    pub fn evaluate(current_stock: f64, minimum_stock_level: f64) -> Self {
        AlertConditions {
            low_stock: current_stock <= minimum_stock_level,
            out_of_stock: current_stock <= 0.0,
        }
    }

    pub fn holds(&self, alert_type: AlertType) -> bool {
        match alert_type {
            AlertType::LowStock => self.low_stock,
            AlertType::OutOfStock => self.out_of_stock,
        }
    }
}

/// An alert to create.
#[derive(Debug, Clone, PartialEq)]
pub struct AlertDraft {
    pub alert_type: AlertType,
    pub severity: AlertSeverity,
    pub message: String,
    pub triggered_quantity: f64,
    pub threshold_quantity: f64,
    pub metadata: serde_json::Value,
}

/// What the engine must do to bring the alert table in line.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AlertPlan {
    /// IDs of unresolved alerts to mark resolved.
    pub resolve: Vec<String>,
    /// Alerts to insert at the evaluated location.
    pub raise: Vec<AlertDraft>,
}

impl AlertPlan {
    pub fn is_empty(&self) -> bool {
        self.resolve.is_empty() && self.raise.is_empty()
    }
}

/// Human-readable alert text.
pub fn alert_message(item_code: &str, alert_type: AlertType) -> String {
    match alert_type {
        AlertType::OutOfStock => format!("Item {} is out of stock", item_code),
        AlertType::LowStock => format!("Item {} reached low stock threshold", item_code),
    }
}

/// Plans alert changes for `item` evaluated at `location_id`.
///
/// `unresolved` must hold every unresolved alert of the item, at any
/// location.
pub fn plan_alerts(
    item: &InventoryItem,
    location_id: Option<&str>,
    unresolved: &[InventoryAlert],
) -> AlertPlan {
    let conditions = AlertConditions::evaluate(item.current_stock, item.minimum_stock_level);
    let mut plan = AlertPlan::default();

    for alert in unresolved.iter().filter(|a| !a.resolved) {
        if !conditions.holds(alert.alert_type) {
            plan.resolve.push(alert.id.clone());
        }
    }

    for alert_type in AlertType::ALL {
        if !conditions.holds(alert_type) {
            continue;
        }
        let already_open = unresolved.iter().any(|a| {
            !a.resolved
                && a.alert_type == alert_type
                && a.inventory_location_id.as_deref() == location_id
        });
        if already_open {
            continue;
        }
        plan.raise.push(draft(item, alert_type));
    }

    plan
}

fn draft(item: &InventoryItem, alert_type: AlertType) -> AlertDraft {
    let (severity, metadata) = match alert_type {
        AlertType::LowStock => (
            if item.current_stock <= 0.0 {
                AlertSeverity::Critical
            } else {
                AlertSeverity::Warning
            },
            json!({
                "current_stock": item.current_stock,
                "threshold": item.minimum_stock_level,
            }),
        ),
        AlertType::OutOfStock => (AlertSeverity::Critical, json!({ "current_stock": 0 })),
    };

    AlertDraft {
        alert_type,
        severity,
        message: alert_message(&item.item_code, alert_type),
        triggered_quantity: item.current_stock,
        threshold_quantity: item.minimum_stock_level,
        metadata,
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
