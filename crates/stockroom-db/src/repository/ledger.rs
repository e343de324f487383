//! # Ledger Repository
//!
//! Per (item, location) ledger rows. There is exactly one row per pair over
//! the pair's whole history: retiring sets `lifecycle = retired`, the next
//! stock touch restores the same row.

use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;
use tracing::debug;

use crate::error::{DbError, DbResult};
use stockroom_core::InventoryItemLocation;

const LEDGER_COLUMNS: &str = r#"
    id, tenant_id, inventory_item_id, inventory_location_id, stock_on_hand,
    stock_reserved, stock_available, stock_damaged, stock_in_transit,
    last_reconciled_at, lifecycle, created_at, updated_at
"#;

#[derive(Debug)]
pub struct LedgerRepository<'c> {
    conn: &'c mut SqliteConnection,
}

impl<'c> LedgerRepository<'c> {
    pub fn new(conn: &'c mut SqliteConnection) -> Self {
        LedgerRepository { conn }
    }

    /// The row for (item, location), retired or not.
    pub async fn find(
        &mut self,
        tenant_id: &str,
        item_id: &str,
        location_id: &str,
    ) -> DbResult<Option<InventoryItemLocation>> {
        let sql = format!(
            r#"
            SELECT {} FROM inventory_item_locations
            WHERE tenant_id = ?1 AND inventory_item_id = ?2 AND inventory_location_id = ?3
            "#,
            LEDGER_COLUMNS
        );
        let row = sqlx::query_as::<_, InventoryItemLocation>(&sql)
            .bind(tenant_id)
            .bind(item_id)
            .bind(location_id)
            .fetch_optional(&mut *self.conn)
            .await?;
        Ok(row)
    }

    pub async fn insert(&mut self, row: &InventoryItemLocation) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO inventory_item_locations (
                id, tenant_id, inventory_item_id, inventory_location_id, stock_on_hand,
                stock_reserved, stock_available, stock_damaged, stock_in_transit,
                last_reconciled_at, lifecycle, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
            "#,
        )
        .bind(&row.id)
        .bind(&row.tenant_id)
        .bind(&row.inventory_item_id)
        .bind(&row.inventory_location_id)
        .bind(row.stock_on_hand)
        .bind(row.stock_reserved)
        .bind(row.stock_available)
        .bind(row.stock_damaged)
        .bind(row.stock_in_transit)
        .bind(row.last_reconciled_at)
        .bind(row.lifecycle)
        .bind(row.created_at)
        .bind(row.updated_at)
        .execute(&mut *self.conn)
        .await?;

        debug!(
            item_id = %row.inventory_item_id,
            location_id = %row.inventory_location_id,
            "Created ledger row"
        );
        Ok(())
    }

    /// Writes quantities, reconcile stamp and lifecycle back.
    pub async fn save(&mut self, row: &InventoryItemLocation) -> DbResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE inventory_item_locations
            SET stock_on_hand = ?3,
                stock_reserved = ?4,
                stock_available = ?5,
                stock_damaged = ?6,
                stock_in_transit = ?7,
                last_reconciled_at = ?8,
                lifecycle = ?9,
                updated_at = ?10
            WHERE tenant_id = ?1 AND id = ?2
            "#,
        )
        .bind(&row.tenant_id)
        .bind(&row.id)
        .bind(row.stock_on_hand)
        .bind(row.stock_reserved)
        .bind(row.stock_available)
        .bind(row.stock_damaged)
        .bind(row.stock_in_transit)
        .bind(row.last_reconciled_at)
        .bind(row.lifecycle)
        .bind(row.updated_at)
        .execute(&mut *self.conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("InventoryItemLocation", &row.id));
        }
        Ok(())
    }

    /// Overwrites a drifted `stock_available` and re-stamps the row.
    pub async fn correct_available(
        &mut self,
        tenant_id: &str,
        id: &str,
        available: f64,
        now: DateTime<Utc>,
    ) -> DbResult<()> {
        sqlx::query(
            r#"
            UPDATE inventory_item_locations
            SET stock_available = ?3, last_reconciled_at = ?4, updated_at = ?4
            WHERE tenant_id = ?1 AND id = ?2
            "#,
        )
        .bind(tenant_id)
        .bind(id)
        .bind(available)
        .bind(now)
        .execute(&mut *self.conn)
        .await?;
        Ok(())
    }

    /// Every row of an item, ordered by location.
    pub async fn list_for_item(
        &mut self,
        tenant_id: &str,
        item_id: &str,
        include_retired: bool,
    ) -> DbResult<Vec<InventoryItemLocation>> {
        let sql = format!(
            r#"
            SELECT {} FROM inventory_item_locations
            WHERE tenant_id = ?1 AND inventory_item_id = ?2
              AND (?3 OR lifecycle = 'active')
            ORDER BY inventory_location_id
            "#,
            LEDGER_COLUMNS
        );
        let rows = sqlx::query_as::<_, InventoryItemLocation>(&sql)
            .bind(tenant_id)
            .bind(item_id)
            .bind(include_retired)
            .fetch_all(&mut *self.conn)
            .await?;
        Ok(rows)
    }

    /// Active rows stocked at a location.
    pub async fn list_for_location(
        &mut self,
        tenant_id: &str,
        location_id: &str,
    ) -> DbResult<Vec<InventoryItemLocation>> {
        let sql = format!(
            r#"
            SELECT {} FROM inventory_item_locations
            WHERE tenant_id = ?1 AND inventory_location_id = ?2 AND lifecycle = 'active'
            ORDER BY inventory_item_id
            "#,
            LEDGER_COLUMNS
        );
        let rows = sqlx::query_as::<_, InventoryItemLocation>(&sql)
            .bind(tenant_id)
            .bind(location_id)
            .fetch_all(&mut *self.conn)
            .await?;
        Ok(rows)
    }

    pub async fn count_active_at_location(
        &mut self,
        tenant_id: &str,
        location_id: &str,
    ) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM inventory_item_locations
            WHERE tenant_id = ?1 AND inventory_location_id = ?2 AND lifecycle = 'active'
            "#,
        )
        .bind(tenant_id)
        .bind(location_id)
        .fetch_one(&mut *self.conn)
        .await?;
        Ok(count)
    }

    /// Sum of reserved stock at a location, across items.
    pub async fn total_reserved_at_location(
        &mut self,
        tenant_id: &str,
        location_id: &str,
    ) -> DbResult<f64> {
        let total: f64 = sqlx::query_scalar(
            r#"
            SELECT TOTAL(stock_reserved) FROM inventory_item_locations
            WHERE tenant_id = ?1 AND inventory_location_id = ?2 AND lifecycle = 'active'
            "#,
        )
        .bind(tenant_id)
        .bind(location_id)
        .fetch_one(&mut *self.conn)
        .await?;
        Ok(total)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::fixtures::{self, OTHER_TENANT, TENANT};
    use stockroom_core::Lifecycle;

    #[tokio::test]
    async fn test_one_row_per_pair() {
        let db = fixtures::db().await;
        let mut uow = db.begin().await.unwrap();
        let (_, item, location) = fixtures::seed(&mut uow, TENANT).await;

        let row = InventoryItemLocation::empty(TENANT, &item.id, &location.id, Utc::now());
        uow.ledger().insert(&row).await.unwrap();

        let again = InventoryItemLocation::empty(TENANT, &item.id, &location.id, Utc::now());
        assert!(matches!(
            uow.ledger().insert(&again).await,
            Err(DbError::UniqueViolation { .. })
        ));
    }

    #[tokio::test]
    async fn test_save_and_find_round_trip_quantities() {
        let db = fixtures::db().await;
        let mut uow = db.begin().await.unwrap();
        let (_, item, location) = fixtures::seed(&mut uow, TENANT).await;

        let now = Utc::now();
        let mut row = InventoryItemLocation::empty(TENANT, &item.id, &location.id, now);
        uow.ledger().insert(&row).await.unwrap();
        row.set_on_hand(100.0, now);
        row.reserve(30.0, now).unwrap();
        uow.ledger().save(&row).await.unwrap();

        let stored = uow
            .ledger()
            .find(TENANT, &item.id, &location.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.stock_on_hand, 100.0);
        assert_eq!(stored.stock_reserved, 30.0);
        assert_eq!(stored.stock_available, 70.0);
        assert!(stored.last_reconciled_at.is_some());

        assert!(uow
            .ledger()
            .find(OTHER_TENANT, &item.id, &location.id)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_retired_rows_drop_out_of_active_lists() {
        let db = fixtures::db().await;
        let mut uow = db.begin().await.unwrap();
        let (_, item, location) = fixtures::seed(&mut uow, TENANT).await;

        let mut row = InventoryItemLocation::empty(TENANT, &item.id, &location.id, Utc::now());
        uow.ledger().insert(&row).await.unwrap();
        assert_eq!(
            uow.ledger()
                .count_active_at_location(TENANT, &location.id)
                .await
                .unwrap(),
            1
        );

        row.lifecycle = Lifecycle::Retired;
        uow.ledger().save(&row).await.unwrap();

        assert_eq!(
            uow.ledger()
                .count_active_at_location(TENANT, &location.id)
                .await
                .unwrap(),
            0
        );
        assert!(uow
            .ledger()
            .list_for_item(TENANT, &item.id, false)
            .await
            .unwrap()
            .is_empty());
        assert_eq!(
            uow.ledger()
                .list_for_item(TENANT, &item.id, true)
                .await
                .unwrap()
                .len(),
            1
        );
    }

    #[tokio::test]
    async fn test_total_reserved_on_empty_location_is_zero() {
        let db = fixtures::db().await;
        let mut uow = db.begin().await.unwrap();
        let (_, _, location) = fixtures::seed(&mut uow, TENANT).await;
        let total = uow
            .ledger()
            .total_reserved_at_location(TENANT, &location.id)
            .await
            .unwrap();
        assert_eq!(total, 0.0);
    }
}
