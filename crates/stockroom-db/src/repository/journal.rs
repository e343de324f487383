//! # Journal Repository
//!
//! Append-only movements and the adjustment records written next to them.
//! There is no update or delete here; the schema rejects both for
//! movements with triggers.

use sqlx::SqliteConnection;
use tracing::debug;

use crate::error::DbResult;
use stockroom_core::{InventoryAdjustment, InventoryMovement};

const MOVEMENT_COLUMNS: &str = r#"
    id, tenant_id, inventory_item_id, from_location_id, to_location_id, quantity,
    movement_type, reason, metadata, performed_by, performed_at
"#;

const ADJUSTMENT_COLUMNS: &str = r#"
    id, tenant_id, inventory_item_id, inventory_location_id, adjustment_type,
    quantity_before, quantity_after, difference, reason, status, created_by,
    approved_by, approved_at, metadata, created_at
"#;

#[derive(Debug)]
pub struct JournalRepository<'c> {
    conn: &'c mut SqliteConnection,
}

impl<'c> JournalRepository<'c> {
    pub fn new(conn: &'c mut SqliteConnection) -> Self {
        JournalRepository { conn }
    }

    pub async fn record_movement(&mut self, movement: &InventoryMovement) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO inventory_movements (
                id, tenant_id, inventory_item_id, from_location_id, to_location_id, quantity,
                movement_type, reason, metadata, performed_by, performed_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
        )
        .bind(&movement.id)
        .bind(&movement.tenant_id)
        .bind(&movement.inventory_item_id)
        .bind(&movement.from_location_id)
        .bind(&movement.to_location_id)
        .bind(movement.quantity)
        .bind(movement.movement_type)
        .bind(&movement.reason)
        .bind(&movement.metadata)
        .bind(&movement.performed_by)
        .bind(movement.performed_at)
        .execute(&mut *self.conn)
        .await?;

        debug!(
            movement_id = %movement.id,
            movement_type = ?movement.movement_type,
            quantity = movement.quantity,
            "Recorded movement"
        );
        Ok(())
    }

    pub async fn record_adjustment(&mut self, adjustment: &InventoryAdjustment) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO inventory_adjustments (
                id, tenant_id, inventory_item_id, inventory_location_id, adjustment_type,
                quantity_before, quantity_after, difference, reason, status, created_by,
                approved_by, approved_at, metadata, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
            "#,
        )
        .bind(&adjustment.id)
        .bind(&adjustment.tenant_id)
        .bind(&adjustment.inventory_item_id)
        .bind(&adjustment.inventory_location_id)
        .bind(adjustment.adjustment_type)
        .bind(adjustment.quantity_before)
        .bind(adjustment.quantity_after)
        .bind(adjustment.difference)
        .bind(&adjustment.reason)
        .bind(adjustment.status)
        .bind(&adjustment.created_by)
        .bind(&adjustment.approved_by)
        .bind(adjustment.approved_at)
        .bind(&adjustment.metadata)
        .bind(adjustment.created_at)
        .execute(&mut *self.conn)
        .await?;

        debug!(
            adjustment_id = %adjustment.id,
            difference = adjustment.difference,
            "Recorded adjustment"
        );
        Ok(())
    }

    /// Movements of an item in insertion order.
    pub async fn list_movements(
        &mut self,
        tenant_id: &str,
        item_id: &str,
    ) -> DbResult<Vec<InventoryMovement>> {
        let sql = format!(
            r#"
            SELECT {} FROM inventory_movements
            WHERE tenant_id = ?1 AND inventory_item_id = ?2
            ORDER BY rowid
            "#,
            MOVEMENT_COLUMNS
        );
        let movements = sqlx::query_as::<_, InventoryMovement>(&sql)
            .bind(tenant_id)
            .bind(item_id)
            .fetch_all(&mut *self.conn)
            .await?;
        Ok(movements)
    }

    /// Adjustments of an item in insertion order.
    pub async fn list_adjustments(
        &mut self,
        tenant_id: &str,
        item_id: &str,
    ) -> DbResult<Vec<InventoryAdjustment>> {
        let sql = format!(
            r#"
            SELECT {} FROM inventory_adjustments
            WHERE tenant_id = ?1 AND inventory_item_id = ?2
            ORDER BY rowid
            "#,
            ADJUSTMENT_COLUMNS
        );
        let adjustments = sqlx::query_as::<_, InventoryAdjustment>(&sql)
            .bind(tenant_id)
            .bind(item_id)
            .fetch_all(&mut *self.conn)
            .await?;
        Ok(adjustments)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::fixtures::{self, OTHER_TENANT, TENANT};
    use crate::DbError;
    use chrono::Utc;
    use stockroom_core::MovementType;

    #[tokio::test]
    async fn test_movements_are_append_only() {
        let db = fixtures::db().await;
        let mut uow = db.begin().await.unwrap();
        let (_, item, location) = fixtures::seed(&mut uow, TENANT).await;

        let movement = InventoryMovement::signed(
            TENANT,
            &item.id,
            Some(&location.id),
            -3.0,
            MovementType::AdjustmentDecrease,
            "breakage",
            Some(serde_json::json!({"previous": 10.0, "current": 7.0})),
            "tester",
            Utc::now(),
        );
        uow.journal().record_movement(&movement).await.unwrap();

        let listed = uow.journal().list_movements(TENANT, &item.id).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].quantity, 3.0);
        assert_eq!(listed[0].from_location_id.as_deref(), Some(location.id.as_str()));
        assert_eq!(listed[0].metadata_json().unwrap()["current"], 7.0);
        assert!(uow
            .journal()
            .list_movements(OTHER_TENANT, &item.id)
            .await
            .unwrap()
            .is_empty());

        let mut journal = uow.journal();
        let update = sqlx::query("UPDATE inventory_movements SET quantity = 0")
            .execute(&mut *journal.conn)
            .await;
        assert!(matches!(update.map_err(DbError::from), Err(DbError::QueryFailed(_))));
    }
}
