//! # Reconciliation Engine
//!
//! Recomputes an item's truth from its ledger rows and global holds,
//! compares it with the cached aggregates and heals the difference.
//!
//! ## Balancing One Item
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  1. snapshot   Σ active ledger rows + Σ active global holds             │
//! │                (drifted row.available corrected in place)               │
//! │                                                                         │
//! │  2. variance   snapshot − cached (on_hand, reserved, available)         │
//! │                                                                         │
//! │  3. decide     negligible + open case   ──► auto-resolve case           │
//! │                negligible + no case     ──► balanced                    │
//! │                significant + open case  ──► update case                 │
//! │                significant + no case    ──► open case                   │
//! │                                                                         │
//! │  4. write back snapshot → item aggregates → product quantity            │
//! │                                                                         │
//! │  5. alerts     item-wide (no location)                                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Tenant Runs
//! Items are read in keyset pages of `balancing.batch_size`; every item is
//! balanced in its own unit of work, so one run never holds a long
//! transaction. Retired items are skipped.

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::aggregate::{apply_snapshot, collect_snapshot};
use crate::alerts::evaluate_alerts;
use crate::error::InventoryResult;
use crate::service::{require_product, InventoryService};
use stockroom_core::reconcile::{
    auto_resolve_case, decide, open_case, update_open_case, ReconcileAction,
};
use stockroom_core::validation::validate_actor;
use stockroom_core::{
    CoreError, InventoryReconciliation, ItemSnapshot, ReconciliationSource, VarianceReport,
};

/// Result of balancing one item.
#[derive(Debug, Clone)]
pub struct BalancingOutcome {
    pub action: ReconcileAction,
    pub variance: VarianceReport,
    pub snapshot: ItemSnapshot,
    /// The case opened, updated or resolved by this run.
    pub case: Option<InventoryReconciliation>,
}

/// Totals of a tenant-wide run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BalancingSummary {
    pub items_checked: usize,
    pub cases_opened: usize,
    pub cases_updated: usize,
    pub cases_resolved: usize,
}

impl BalancingSummary {
    fn record(&mut self, action: ReconcileAction) {
        self.items_checked += 1;
        match action {
            ReconcileAction::Balanced => {}
            ReconcileAction::OpenNew => self.cases_opened += 1,
            ReconcileAction::UpdateOpen => self.cases_updated += 1,
            ReconcileAction::AutoResolve => self.cases_resolved += 1,
        }
    }
}

impl InventoryService {
    /// Balances one item against its ledger.
    pub async fn run_balancing_for_item(
        &self,
        tenant_id: &str,
        item_id: &str,
        actor: &str,
        source: ReconciliationSource,
    ) -> InventoryResult<BalancingOutcome> {
        validate_actor(tenant_id, actor)?;

        let now = Utc::now();
        let mut uow = self.db.begin().await?;
        let mut item = uow
            .items()
            .get(tenant_id, item_id)
            .await?
            .ok_or_else(|| CoreError::not_found("InventoryItem", item_id))?;
        let product = require_product(&mut uow, tenant_id, &item.product_id).await?;

        let previous = item.aggregates();
        let snapshot = collect_snapshot(&mut uow, &item, now).await?;
        let variance = VarianceReport::between(&previous, &snapshot);
        let open = uow.reconciliations().find_open(tenant_id, &item.id).await?;
        let action = decide(&variance, open.is_some());

        let case = match (action, open) {
            (ReconcileAction::Balanced, _) => None,
            (ReconcileAction::AutoResolve, Some(mut case)) => {
                auto_resolve_case(&mut case, &snapshot, actor, now);
                uow.reconciliations().save(&case).await?;
                info!(tenant_id, item_id, case_id = %case.id, "Reconciliation case auto-resolved");
                Some(case)
            }
            (ReconcileAction::UpdateOpen, Some(mut case)) => {
                update_open_case(&mut case, &item, &previous, &snapshot, &variance, now);
                uow.reconciliations().save(&case).await?;
                warn!(
                    tenant_id,
                    item_id,
                    case_id = %case.id,
                    on_hand = variance.on_hand,
                    reserved = variance.reserved,
                    available = variance.available,
                    "Variance persists on open reconciliation case"
                );
                Some(case)
            }
            (ReconcileAction::OpenNew, _) => {
                let case = open_case(&item, &previous, &snapshot, &variance, source, actor, now);
                uow.reconciliations().insert(&case).await?;
                warn!(
                    tenant_id,
                    item_id,
                    case_id = %case.id,
                    on_hand = variance.on_hand,
                    reserved = variance.reserved,
                    available = variance.available,
                    value = case.variance_value,
                    "Variance found, reconciliation case opened"
                );
                Some(case)
            }
            // decide() only yields these two with an open case
            (ReconcileAction::AutoResolve | ReconcileAction::UpdateOpen, None) => None,
        };

        apply_snapshot(&mut uow, &mut item, &product, &snapshot, actor, now).await?;
        evaluate_alerts(&mut uow, &item, None, actor, now).await?;
        uow.commit().await?;

        debug!(tenant_id, item_id, ?action, "Item balanced");
        Ok(BalancingOutcome {
            action,
            variance,
            snapshot,
            case,
        })
    }

    /// Balances every active item of a tenant, page by page.
    ///
    /// Stops at the first failing item; items balanced before it stay
    /// committed.
    pub async fn run_balancing_for_tenant(
        &self,
        tenant_id: &str,
        actor: &str,
        source: ReconciliationSource,
    ) -> InventoryResult<BalancingSummary> {
        validate_actor(tenant_id, actor)?;

        let batch_size = self.config.balancing.batch_size;
        let mut summary = BalancingSummary::default();
        let mut after: Option<String> = None;

        loop {
            let mut uow = self.db.begin_read().await?;
            let page = uow
                .items()
                .page_after(tenant_id, after.as_deref(), batch_size)
                .await?;
            uow.rollback().await?;

            let Some(last) = page.last() else {
                break;
            };
            after = Some(last.id.clone());

            for item in page.iter().filter(|i| i.lifecycle.is_active()) {
                let outcome = self
                    .run_balancing_for_item(tenant_id, &item.id, actor, source)
                    .await?;
                summary.record(outcome.action);
            }

            if page.len() < batch_size as usize {
                break;
            }
        }

        info!(
            tenant_id,
            items_checked = summary.items_checked,
            cases_opened = summary.cases_opened,
            cases_updated = summary.cases_updated,
            cases_resolved = summary.cases_resolved,
            "Tenant balancing finished"
        );
        Ok(summary)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
