//! # Aggregator
//!
//! Rolls the ledger rows of one item up into its cached aggregates and the
//! product's displayed quantity.
//!
//! ```text
//! ledger rows (active) ─┐
//!                       ├─► ItemSnapshot ──► item.current/reserved/available
//! global holds (sum) ───┘        │                        │
//!                                │                        ▼
//!                                │            product.stock_quantity
//!                                ▼            (rounded, + default threshold)
//!                  drifted stock_available
//!                  rows corrected in place
//! ```
//!
//! Every writer goes through here; nothing else touches the cached fields.

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::error::InventoryResult;
use stockroom_core::ledger::round_to_units;
use stockroom_core::{InventoryItem, ItemSnapshot, Product, ReservationStatus};
use stockroom_db::UnitOfWork;

/// Recomputes an item snapshot from its active ledger rows and global
/// holds, correcting any row whose stored available has drifted.
pub(crate) async fn collect_snapshot(
    uow: &mut UnitOfWork,
    item: &InventoryItem,
    now: DateTime<Utc>,
) -> InventoryResult<ItemSnapshot> {
    let rows = uow
        .ledger()
        .list_for_item(&item.tenant_id, &item.id, false)
        .await?;
    let global_reserved = uow
        .reservations()
        .sum_active_global(&item.tenant_id, &item.id)
        .await?;

    let (mut snapshot, corrections) = ItemSnapshot::collect(&rows, global_reserved);

    for correction in &corrections {
        uow.ledger()
            .correct_available(&item.tenant_id, &correction.ledger_id, correction.derived, now)
            .await?;
        debug!(
            item_id = %item.id,
            location_id = %correction.location_id,
            stored = correction.stored,
            derived = correction.derived,
            "Corrected drifted available stock"
        );
    }

    // Expired holds stay reserved; releasing them is the sweeper's job.
    let expired = uow
        .reservations()
        .list_for_item(&item.tenant_id, &item.id, Some(ReservationStatus::Active))
        .await?
        .iter()
        .filter(|r| r.is_expired(now))
        .count();
    if expired > 0 {
        warn!(
            item_id = %item.id,
            expired,
            "Item has expired reservations that are still active"
        );
    }
    snapshot.expired_active_reservations = expired;

    Ok(snapshot)
}

/// Writes the snapshot totals to the item and mirrors on-hand to the
/// product.
pub(crate) async fn apply_snapshot(
    uow: &mut UnitOfWork,
    item: &mut InventoryItem,
    product: &Product,
    snapshot: &ItemSnapshot,
    actor: &str,
    now: DateTime<Utc>,
) -> InventoryResult<()> {
    item.apply_aggregates(&snapshot.aggregates());
    item.updated_by = actor.to_string();
    item.updated_at = now;
    uow.items().save(item).await?;

    let threshold = match product.low_stock_threshold {
        None | Some(0) => Some(round_to_units(item.minimum_stock_level)),
        Some(_) => None,
    };
    uow.products()
        .mirror_stock(
            &product.tenant_id,
            &product.id,
            round_to_units(item.current_stock),
            threshold,
            now,
        )
        .await?;

    debug!(
        item_id = %item.id,
        current = item.current_stock,
        reserved = item.reserved_stock,
        available = item.available_stock,
        "Aggregates updated"
    );
    Ok(())
}

/// Collect then apply.
pub(crate) async fn refresh_aggregates(
    uow: &mut UnitOfWork,
    item: &mut InventoryItem,
    product: &Product,
    actor: &str,
    now: DateTime<Utc>,
) -> InventoryResult<ItemSnapshot> {
    let snapshot = collect_snapshot(uow, item, now).await?;
    apply_snapshot(uow, item, product, &snapshot, actor, now).await?;
    Ok(snapshot)
}
