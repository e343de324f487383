//! # Stock Ledger Operations
//!
//! Absolute sets and signed adjustments of on-hand stock at one location.
//!
//! ```text
//! set_location_stock(qty)          adjust_location_stock(delta)
//!        │                                   │
//!        ▼                                   ▼
//!  on_hand = qty                      on_hand += delta   (NegativeStock if < 0)
//!        │                                   │
//!        └──────────────┬────────────────────┘
//!                       ▼
//!       |difference| > epsilon ?  ── no ──► skip journal
//!                       │ yes
//!                       ▼
//!   InventoryAdjustment (manual | cycle_count, approved by actor)
//!   InventoryMovement   (adjustment_increase | adjustment_decrease)
//!                       │
//!                       ▼
//!          re-aggregate item ──► evaluate alerts at location
//! ```

use chrono::{DateTime, Utc};
use serde_json::json;
use tracing::info;

use crate::aggregate::refresh_aggregates;
use crate::alerts::evaluate_alerts;
use crate::error::InventoryResult;
use crate::items::lock_item_for_product;
use crate::service::{ensure_ledger_row, require_active_location, InventoryService};
use stockroom_core::ledger::exceeds_epsilon;
use stockroom_core::validation::{
    validate_actor, validate_delta, validate_non_negative_quantity, validate_reason,
};
use stockroom_core::{
    new_id, AdjustmentStatus, AdjustmentType, CoreError, InventoryAdjustment, InventoryItem,
    InventoryItemLocation, InventoryMovement, Lifecycle, MovementType, VARIANCE_EPSILON,
};
use stockroom_db::UnitOfWork;

/// Result of a set or adjust.
#[derive(Debug, Clone)]
pub struct StockChange {
    /// The item with refreshed aggregates.
    pub item: InventoryItem,
    pub ledger: InventoryItemLocation,
    pub previous_on_hand: f64,
    /// Signed; zero when nothing was journaled.
    pub difference: f64,
}

/// Writes the adjustment record and its movement for one location.
#[allow(clippy::too_many_arguments)]
async fn journal_adjustment(
    uow: &mut UnitOfWork,
    item: &InventoryItem,
    location_id: &str,
    before: f64,
    after: f64,
    adjustment_type: AdjustmentType,
    reason: &str,
    actor: &str,
    now: DateTime<Utc>,
) -> InventoryResult<()> {
    let difference = after - before;

    let adjustment = InventoryAdjustment {
        id: new_id(),
        tenant_id: item.tenant_id.clone(),
        inventory_item_id: item.id.clone(),
        inventory_location_id: location_id.to_string(),
        adjustment_type,
        quantity_before: before,
        quantity_after: after,
        difference,
        reason: reason.to_string(),
        status: AdjustmentStatus::Approved,
        created_by: actor.to_string(),
        approved_by: Some(actor.to_string()),
        approved_at: Some(now),
        metadata: None,
        created_at: now,
    };
    uow.journal().record_adjustment(&adjustment).await?;

    let movement = InventoryMovement::signed(
        &item.tenant_id,
        &item.id,
        Some(location_id),
        difference,
        MovementType::for_adjustment(difference),
        reason,
        Some(json!({ "previous": before, "current": after })),
        actor,
        now,
    );
    uow.journal().record_movement(&movement).await?;
    Ok(())
}

impl InventoryService {
    /// Sets on-hand at a location to an absolute, non-negative quantity.
    pub async fn set_location_stock(
        &self,
        tenant_id: &str,
        product_id: &str,
        location_id: &str,
        quantity: f64,
        actor: &str,
        reason: &str,
    ) -> InventoryResult<StockChange> {
        validate_actor(tenant_id, actor)?;
        validate_non_negative_quantity("quantity", quantity)?;
        validate_reason(reason)?;

        let now = Utc::now();
        let mut uow = self.db.begin().await?;
        let location =
            require_active_location(&mut uow, tenant_id, location_id, "set stock").await?;
        let (product, mut item) =
            lock_item_for_product(&mut uow, &self.config.items, tenant_id, product_id, actor, now)
                .await?;
        let mut row = ensure_ledger_row(&mut uow, tenant_id, &item.id, location_id, now).await?;

        let previous = row.set_on_hand(quantity, now);
        uow.ledger().save(&row).await?;

        let difference = row.stock_on_hand - previous;
        let journaled = exceeds_epsilon(difference);
        if journaled {
            journal_adjustment(
                &mut uow,
                &item,
                location_id,
                previous,
                row.stock_on_hand,
                AdjustmentType::Manual,
                reason,
                actor,
                now,
            )
            .await?;
        }

        refresh_aggregates(&mut uow, &mut item, &product, actor, now).await?;
        evaluate_alerts(&mut uow, &item, Some(location_id), actor, now).await?;
        uow.commit().await?;

        info!(
            tenant_id,
            sku = %product.sku,
            location = %location.code,
            previous,
            quantity,
            "Location stock set"
        );
        Ok(StockChange {
            item,
            ledger: row,
            previous_on_hand: previous,
            difference: if journaled { difference } else { 0.0 },
        })
    }

    /// Applies a signed delta to on-hand at a location.
    ///
    /// Fails with `NegativeStock` and writes nothing if the result would go
    /// below zero.
    pub async fn adjust_location_stock(
        &self,
        tenant_id: &str,
        product_id: &str,
        location_id: &str,
        delta: f64,
        actor: &str,
        reason: &str,
    ) -> InventoryResult<StockChange> {
        validate_actor(tenant_id, actor)?;
        validate_delta("delta", delta)?;
        validate_reason(reason)?;

        let now = Utc::now();
        let mut uow = self.db.begin().await?;
        let location =
            require_active_location(&mut uow, tenant_id, location_id, "adjust stock").await?;
        let (product, mut item) =
            lock_item_for_product(&mut uow, &self.config.items, tenant_id, product_id, actor, now)
                .await?;
        let mut row = ensure_ledger_row(&mut uow, tenant_id, &item.id, location_id, now).await?;

        let previous = row
            .apply_delta(delta, now)
            .map_err(|shortfall| CoreError::NegativeStock {
                sku: product.sku.clone(),
                location: location.code.clone(),
                current: shortfall.available,
                delta,
            })?;
        uow.ledger().save(&row).await?;

        let difference = row.stock_on_hand - previous;
        let journaled = exceeds_epsilon(difference);
        if journaled {
            journal_adjustment(
                &mut uow,
                &item,
                location_id,
                previous,
                row.stock_on_hand,
                AdjustmentType::CycleCount,
                reason,
                actor,
                now,
            )
            .await?;
        }

        refresh_aggregates(&mut uow, &mut item, &product, actor, now).await?;
        evaluate_alerts(&mut uow, &item, Some(location_id), actor, now).await?;
        uow.commit().await?;

        info!(
            tenant_id,
            sku = %product.sku,
            location = %location.code,
            previous,
            delta,
            "Location stock adjusted"
        );
        Ok(StockChange {
            item,
            ledger: row,
            previous_on_hand: previous,
            difference: if journaled { difference } else { 0.0 },
        })
    }

    /// Retires the (item, location) ledger row. Its quantities drop out of
    /// the item totals until a later stock operation restores the row.
    pub async fn retire_location_ledger(
        &self,
        tenant_id: &str,
        product_id: &str,
        location_id: &str,
        actor: &str,
    ) -> InventoryResult<InventoryItemLocation> {
        validate_actor(tenant_id, actor)?;

        let now = Utc::now();
        let mut uow = self.db.begin().await?;
        let (product, mut item) =
            lock_item_for_product(&mut uow, &self.config.items, tenant_id, product_id, actor, now)
                .await?;
        let mut row = uow
            .ledger()
            .find(tenant_id, &item.id, location_id)
            .await?
            .ok_or_else(|| CoreError::not_found("InventoryItemLocation", location_id))?;
        if row.lifecycle == Lifecycle::Retired {
            return Ok(row);
        }
        if row.stock_reserved > VARIANCE_EPSILON {
            return Err(CoreError::invalid_state(
                "InventoryItemLocation",
                &row.id,
                format!("holding {} reserved", row.stock_reserved),
                "retire",
            )
            .into());
        }

        row.lifecycle = Lifecycle::Retired;
        row.updated_at = now;
        uow.ledger().save(&row).await?;

        refresh_aggregates(&mut uow, &mut item, &product, actor, now).await?;
        evaluate_alerts(&mut uow, &item, Some(location_id), actor, now).await?;
        uow.commit().await?;

        info!(tenant_id, sku = %product.sku, location_id, "Ledger row retired");
        Ok(row)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
