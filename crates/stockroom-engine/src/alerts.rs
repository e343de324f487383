//! # Alert Evaluator
//!
//! Applies [`stockroom_core::alert::plan_alerts`] to the alert table.
//! Resolution spans every location of the item; new alerts are raised at
//! the location being evaluated (`None` for item-wide runs).

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::error::InventoryResult;
use stockroom_core::alert::plan_alerts;
use stockroom_core::{new_id, InventoryAlert, InventoryItem};
use stockroom_db::UnitOfWork;

pub(crate) async fn evaluate_alerts(
    uow: &mut UnitOfWork,
    item: &InventoryItem,
    location_id: Option<&str>,
    actor: &str,
    now: DateTime<Utc>,
) -> InventoryResult<()> {
    let unresolved = uow
        .alerts()
        .list_unresolved_for_item(&item.tenant_id, &item.id)
        .await?;
    let plan = plan_alerts(item, location_id, &unresolved);
    if plan.is_empty() {
        return Ok(());
    }

    for alert_id in &plan.resolve {
        if uow
            .alerts()
            .resolve(&item.tenant_id, alert_id, actor, now)
            .await?
        {
            debug!(alert_id = %alert_id, item_id = %item.id, "Resolved alert");
        }
    }

    for draft in plan.raise {
        let alert = InventoryAlert {
            id: new_id(),
            tenant_id: item.tenant_id.clone(),
            inventory_item_id: item.id.clone(),
            inventory_location_id: location_id.map(str::to_string),
            alert_type: draft.alert_type,
            severity: draft.severity,
            message: draft.message,
            triggered_quantity: draft.triggered_quantity,
            threshold_quantity: draft.threshold_quantity,
            resolved: false,
            resolved_at: None,
            resolved_by: None,
            metadata: Some(draft.metadata.to_string()),
            created_at: now,
        };
        uow.alerts().insert(&alert).await?;
        info!(
            item_id = %item.id,
            alert_type = ?alert.alert_type,
            severity = ?alert.severity,
            current = item.current_stock,
            "Stock alert raised"
        );
    }

    Ok(())
}
