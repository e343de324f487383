//! # Item Repository
//!
//! Inventory items, their cached aggregates and the item row lock.
//!
//! ## Row Lock
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  lock_for_update(item)                                                  │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  UPDATE inventory_items SET lock_version = lock_version + 1            │
//! │       │   the unit of work opened with BEGIN IMMEDIATE, so this        │
//! │       │   connection already holds the database write lock             │
//! │       ▼                                                                 │
//! │  SELECT the item (now stable for the rest of the unit of work)         │
//! │                                                                         │
//! │  A second writer waits in Database::begin (busy timeout) and then      │
//! │  sees the first one's committed state.                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;
use tracing::debug;

use crate::error::{DbError, DbResult};
use stockroom_core::{InventoryItem, Lifecycle};

const ITEM_COLUMNS: &str = r#"
    id, tenant_id, product_id, item_code, item_name, description, item_type,
    unit_of_measure, current_stock, reserved_stock, available_stock,
    on_order_stock, minimum_stock_level, reorder_point, reorder_quantity,
    standard_cost, average_cost, valuation_method, lifecycle, lock_version,
    created_by, updated_by, created_at, updated_at
"#;

#[derive(Debug)]
pub struct ItemRepository<'c> {
    conn: &'c mut SqliteConnection,
}

impl<'c> ItemRepository<'c> {
    pub fn new(conn: &'c mut SqliteConnection) -> Self {
        ItemRepository { conn }
    }

    pub async fn get(&mut self, tenant_id: &str, id: &str) -> DbResult<Option<InventoryItem>> {
        let sql = format!(
            "SELECT {} FROM inventory_items WHERE tenant_id = ?1 AND id = ?2",
            ITEM_COLUMNS
        );
        let item = sqlx::query_as::<_, InventoryItem>(&sql)
            .bind(tenant_id)
            .bind(id)
            .fetch_optional(&mut *self.conn)
            .await?;
        Ok(item)
    }

    /// The item for a product, retired or not.
    pub async fn get_by_product(
        &mut self,
        tenant_id: &str,
        product_id: &str,
    ) -> DbResult<Option<InventoryItem>> {
        let sql = format!(
            "SELECT {} FROM inventory_items WHERE tenant_id = ?1 AND product_id = ?2",
            ITEM_COLUMNS
        );
        let item = sqlx::query_as::<_, InventoryItem>(&sql)
            .bind(tenant_id)
            .bind(product_id)
            .fetch_optional(&mut *self.conn)
            .await?;
        Ok(item)
    }

    pub async fn insert(&mut self, item: &InventoryItem) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO inventory_items (
                id, tenant_id, product_id, item_code, item_name, description, item_type,
                unit_of_measure, current_stock, reserved_stock, available_stock,
                on_order_stock, minimum_stock_level, reorder_point, reorder_quantity,
                standard_cost, average_cost, valuation_method, lifecycle, lock_version,
                created_by, updated_by, created_at, updated_at
            ) VALUES (
                ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12,
                ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24
            )
            "#,
        )
        .bind(&item.id)
        .bind(&item.tenant_id)
        .bind(&item.product_id)
        .bind(&item.item_code)
        .bind(&item.item_name)
        .bind(&item.description)
        .bind(&item.item_type)
        .bind(&item.unit_of_measure)
        .bind(item.current_stock)
        .bind(item.reserved_stock)
        .bind(item.available_stock)
        .bind(item.on_order_stock)
        .bind(item.minimum_stock_level)
        .bind(item.reorder_point)
        .bind(item.reorder_quantity)
        .bind(item.standard_cost)
        .bind(item.average_cost)
        .bind(item.valuation_method)
        .bind(item.lifecycle)
        .bind(item.lock_version)
        .bind(&item.created_by)
        .bind(&item.updated_by)
        .bind(item.created_at)
        .bind(item.updated_at)
        .execute(&mut *self.conn)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { .. } => DbError::duplicate("product_id", &item.product_id),
            other => other,
        })?;

        debug!(item_id = %item.id, code = %item.item_code, "Inserted inventory item");
        Ok(())
    }

    /// Takes the item row lock and returns the item as of that moment.
    pub async fn lock_for_update(&mut self, tenant_id: &str, id: &str) -> DbResult<InventoryItem> {
        let result = sqlx::query(
            r#"
            UPDATE inventory_items
            SET lock_version = lock_version + 1
            WHERE tenant_id = ?1 AND id = ?2
            "#,
        )
        .bind(tenant_id)
        .bind(id)
        .execute(&mut *self.conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("InventoryItem", id));
        }

        self.get(tenant_id, id)
            .await?
            .ok_or_else(|| DbError::not_found("InventoryItem", id))
    }

    /// Saves aggregates, thresholds, lifecycle and audit columns.
    pub async fn save(&mut self, item: &InventoryItem) -> DbResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE inventory_items
            SET current_stock = ?3,
                reserved_stock = ?4,
                available_stock = ?5,
                minimum_stock_level = ?6,
                reorder_point = ?7,
                lifecycle = ?8,
                updated_by = ?9,
                updated_at = ?10
            WHERE tenant_id = ?1 AND id = ?2
            "#,
        )
        .bind(&item.tenant_id)
        .bind(&item.id)
        .bind(item.current_stock)
        .bind(item.reserved_stock)
        .bind(item.available_stock)
        .bind(item.minimum_stock_level)
        .bind(item.reorder_point)
        .bind(item.lifecycle)
        .bind(&item.updated_by)
        .bind(item.updated_at)
        .execute(&mut *self.conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("InventoryItem", &item.id));
        }
        Ok(())
    }

    pub async fn set_lifecycle(
        &mut self,
        tenant_id: &str,
        id: &str,
        lifecycle: Lifecycle,
        actor: &str,
        now: DateTime<Utc>,
    ) -> DbResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE inventory_items
            SET lifecycle = ?3, updated_by = ?4, updated_at = ?5
            WHERE tenant_id = ?1 AND id = ?2
            "#,
        )
        .bind(tenant_id)
        .bind(id)
        .bind(lifecycle)
        .bind(actor)
        .bind(now)
        .execute(&mut *self.conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("InventoryItem", id));
        }
        Ok(())
    }

    /// Keyset page of the tenant's items ordered by id.
    ///
    /// Pass the last id of the previous page as `after_id`; `None` starts
    /// from the beginning.
    pub async fn page_after(
        &mut self,
        tenant_id: &str,
        after_id: Option<&str>,
        limit: u32,
    ) -> DbResult<Vec<InventoryItem>> {
        let sql = format!(
            r#"
            SELECT {} FROM inventory_items
            WHERE tenant_id = ?1 AND (?2 IS NULL OR id > ?2)
            ORDER BY id
            LIMIT ?3
            "#,
            ITEM_COLUMNS
        );
        let items = sqlx::query_as::<_, InventoryItem>(&sql)
            .bind(tenant_id)
            .bind(after_id)
            .bind(limit)
            .fetch_all(&mut *self.conn)
            .await?;
        Ok(items)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
