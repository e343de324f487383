//! # Count Repository
//!
//! Cycle count headers. Only creation and reads are supported.

use sqlx::SqliteConnection;
use tracing::debug;

use crate::error::DbResult;
use stockroom_core::InventoryCount;

const COUNT_COLUMNS: &str = r#"
    id, tenant_id, inventory_location_id, count_type, status, scheduled_for,
    total_items, items_counted, variance_quantity, variance_value, created_by,
    metadata, created_at
"#;

#[derive(Debug)]
pub struct CountRepository<'c> {
    conn: &'c mut SqliteConnection,
}

impl<'c> CountRepository<'c> {
    pub fn new(conn: &'c mut SqliteConnection) -> Self {
        CountRepository { conn }
    }

    pub async fn insert(&mut self, count: &InventoryCount) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO inventory_counts (
                id, tenant_id, inventory_location_id, count_type, status, scheduled_for,
                total_items, items_counted, variance_quantity, variance_value, created_by,
                metadata, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
            "#,
        )
        .bind(&count.id)
        .bind(&count.tenant_id)
        .bind(&count.inventory_location_id)
        .bind(count.count_type)
        .bind(count.status)
        .bind(count.scheduled_for)
        .bind(count.total_items)
        .bind(count.items_counted)
        .bind(count.variance_quantity)
        .bind(count.variance_value)
        .bind(&count.created_by)
        .bind(&count.metadata)
        .bind(count.created_at)
        .execute(&mut *self.conn)
        .await?;

        debug!(
            count_id = %count.id,
            location_id = %count.inventory_location_id,
            total_items = count.total_items,
            "Scheduled count"
        );
        Ok(())
    }

    pub async fn get(&mut self, tenant_id: &str, id: &str) -> DbResult<Option<InventoryCount>> {
        let sql = format!(
            "SELECT {} FROM inventory_counts WHERE tenant_id = ?1 AND id = ?2",
            COUNT_COLUMNS
        );
        let count = sqlx::query_as::<_, InventoryCount>(&sql)
            .bind(tenant_id)
            .bind(id)
            .fetch_optional(&mut *self.conn)
            .await?;
        Ok(count)
    }

    pub async fn list_for_location(
        &mut self,
        tenant_id: &str,
        location_id: &str,
    ) -> DbResult<Vec<InventoryCount>> {
        let sql = format!(
            r#"
            SELECT {} FROM inventory_counts
            WHERE tenant_id = ?1 AND inventory_location_id = ?2
            ORDER BY rowid
            "#,
            COUNT_COLUMNS
        );
        let counts = sqlx::query_as::<_, InventoryCount>(&sql)
            .bind(tenant_id)
            .bind(location_id)
            .fetch_all(&mut *self.conn)
            .await?;
        Ok(counts)
    }
}
