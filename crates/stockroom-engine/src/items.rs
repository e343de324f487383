//! # Item Resolver
//!
//! Exactly one inventory item per product. The item is created on the
//! first stock touch and restored (not recreated) when a retired one is
//! touched again.

use chrono::{DateTime, Utc};
use tracing::info;

use crate::config::ItemDefaults;
use crate::error::InventoryResult;
use crate::service::{require_product, InventoryService};
use stockroom_core::validation::validate_actor;
use stockroom_core::{new_id, CoreError, InventoryItem, Lifecycle, Product, VARIANCE_EPSILON};
use stockroom_db::UnitOfWork;

/// Builds a fresh item from the catalog product.
pub(crate) fn item_from_product(
    product: &Product,
    defaults: &ItemDefaults,
    actor: &str,
    now: DateTime<Utc>,
) -> InventoryItem {
    let stock = product.stock_quantity as f64;
    let threshold = product.low_stock_threshold.unwrap_or(0) as f64;
    let cost = product.vendor_price.unwrap_or(0.0);

    InventoryItem {
        id: new_id(),
        tenant_id: product.tenant_id.clone(),
        product_id: product.id.clone(),
        item_code: product.sku.clone(),
        item_name: product.name.clone(),
        description: product.description.clone(),
        item_type: defaults.item_type.clone(),
        unit_of_measure: defaults.unit_of_measure.clone(),
        current_stock: stock,
        reserved_stock: 0.0,
        available_stock: stock,
        on_order_stock: 0.0,
        minimum_stock_level: threshold,
        reorder_point: threshold,
        reorder_quantity: 0.0,
        standard_cost: cost,
        average_cost: cost,
        valuation_method: defaults.valuation_method,
        lifecycle: Lifecycle::Active,
        lock_version: 0,
        created_by: actor.to_string(),
        updated_by: actor.to_string(),
        created_at: now,
        updated_at: now,
    }
}

/// Returns the product's item, creating or restoring it as needed.
pub(crate) async fn resolve_item(
    uow: &mut UnitOfWork,
    defaults: &ItemDefaults,
    product: &Product,
    actor: &str,
    now: DateTime<Utc>,
) -> InventoryResult<InventoryItem> {
    match uow
        .items()
        .get_by_product(&product.tenant_id, &product.id)
        .await?
    {
        Some(mut item) => {
            if item.lifecycle == Lifecycle::Retired {
                uow.items()
                    .set_lifecycle(&item.tenant_id, &item.id, Lifecycle::Active, actor, now)
                    .await?;
                item.lifecycle = Lifecycle::Active;
                info!(item_id = %item.id, sku = %product.sku, "Inventory item restored");
            }
            Ok(item)
        }
        None => {
            let item = item_from_product(product, defaults, actor, now);
            uow.items().insert(&item).await?;
            info!(item_id = %item.id, sku = %product.sku, "Inventory item created");
            Ok(item)
        }
    }
}

/// Resolves the product's item and takes its row lock.
///
/// Every mutation of an item's stock starts here, so concurrent calls on
/// the same item serialize on the lock.
pub(crate) async fn lock_item_for_product(
    uow: &mut UnitOfWork,
    defaults: &ItemDefaults,
    tenant_id: &str,
    product_id: &str,
    actor: &str,
    now: DateTime<Utc>,
) -> InventoryResult<(Product, InventoryItem)> {
    let product = require_product(uow, tenant_id, product_id).await?;
    let item = resolve_item(uow, defaults, &product, actor, now).await?;
    let item = uow.items().lock_for_update(tenant_id, &item.id).await?;
    Ok((product, item))
}

impl InventoryService {
    pub async fn ensure_inventory_item(
        &self,
        tenant_id: &str,
        product_id: &str,
        actor: &str,
    ) -> InventoryResult<InventoryItem> {
        validate_actor(tenant_id, actor)?;

        let now = Utc::now();
        let mut uow = self.db.begin().await?;
        let product = require_product(&mut uow, tenant_id, product_id).await?;
        let item = resolve_item(&mut uow, &self.config.items, &product, actor, now).await?;
        uow.commit().await?;
        Ok(item)
    }

    /// Retires the product's item. Refused while stock is reserved; the
    /// next stock operation on the product restores it.
    pub async fn retire_item(
        &self,
        tenant_id: &str,
        product_id: &str,
        actor: &str,
    ) -> InventoryResult<InventoryItem> {
        validate_actor(tenant_id, actor)?;

        let now = Utc::now();
        let mut uow = self.db.begin().await?;
        let item_id = uow
            .items()
            .get_by_product(tenant_id, product_id)
            .await?
            .ok_or_else(|| CoreError::not_found("InventoryItem", product_id))?
            .id;
        let mut item = uow.items().lock_for_update(tenant_id, &item_id).await?;
        if !item.lifecycle.is_active() {
            return Ok(item);
        }
        if item.reserved_stock > VARIANCE_EPSILON {
            return Err(CoreError::invalid_state(
                "InventoryItem",
                &item.item_code,
                format!("holding {} reserved", item.reserved_stock),
                "retire",
            )
            .into());
        }

        uow.items()
            .set_lifecycle(tenant_id, &item.id, Lifecycle::Retired, actor, now)
            .await?;
        uow.commit().await?;

        item.lifecycle = Lifecycle::Retired;
        item.updated_by = actor.to_string();
        item.updated_at = now;
        info!(tenant_id, item_id = %item.id, "Inventory item retired");
        Ok(item)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
