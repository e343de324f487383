//! # Reconciliation Repository
//!
//! Variance cases. A partial unique index keeps at most one open
//! item-level case (null location) per item.

use sqlx::SqliteConnection;
use tracing::debug;

use crate::error::{DbError, DbResult};
use stockroom_core::{InventoryReconciliation, ReconciliationStatus};

const RECONCILIATION_COLUMNS: &str = r#"
    id, tenant_id, inventory_item_id, inventory_location_id, expected_quantity,
    counted_quantity, variance_quantity, variance_value, status, source,
    initiated_by, initiated_at, resolved_by, resolved_at, metadata, updated_at
"#;

#[derive(Debug)]
pub struct ReconciliationRepository<'c> {
    conn: &'c mut SqliteConnection,
}

impl<'c> ReconciliationRepository<'c> {
    pub fn new(conn: &'c mut SqliteConnection) -> Self {
        ReconciliationRepository { conn }
    }

    /// The open item-level case of an item, if any.
    pub async fn find_open(
        &mut self,
        tenant_id: &str,
        item_id: &str,
    ) -> DbResult<Option<InventoryReconciliation>> {
        let sql = format!(
            r#"
            SELECT {} FROM inventory_reconciliations
            WHERE tenant_id = ?1 AND inventory_item_id = ?2
              AND inventory_location_id IS NULL AND status = 'open'
            "#,
            RECONCILIATION_COLUMNS
        );
        let case = sqlx::query_as::<_, InventoryReconciliation>(&sql)
            .bind(tenant_id)
            .bind(item_id)
            .fetch_optional(&mut *self.conn)
            .await?;
        Ok(case)
    }

    pub async fn insert(&mut self, case: &InventoryReconciliation) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO inventory_reconciliations (
                id, tenant_id, inventory_item_id, inventory_location_id, expected_quantity,
                counted_quantity, variance_quantity, variance_value, status, source,
                initiated_by, initiated_at, resolved_by, resolved_at, metadata, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)
            "#,
        )
        .bind(&case.id)
        .bind(&case.tenant_id)
        .bind(&case.inventory_item_id)
        .bind(&case.inventory_location_id)
        .bind(case.expected_quantity)
        .bind(case.counted_quantity)
        .bind(case.variance_quantity)
        .bind(case.variance_value)
        .bind(case.status)
        .bind(case.source)
        .bind(&case.initiated_by)
        .bind(case.initiated_at)
        .bind(&case.resolved_by)
        .bind(case.resolved_at)
        .bind(&case.metadata)
        .bind(case.updated_at)
        .execute(&mut *self.conn)
        .await?;

        debug!(
            case_id = %case.id,
            item_id = %case.inventory_item_id,
            variance = case.variance_quantity,
            "Opened reconciliation case"
        );
        Ok(())
    }

    /// Saves counts, variance, status, resolution and metadata.
    pub async fn save(&mut self, case: &InventoryReconciliation) -> DbResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE inventory_reconciliations
            SET counted_quantity = ?3,
                variance_quantity = ?4,
                variance_value = ?5,
                status = ?6,
                resolved_by = ?7,
                resolved_at = ?8,
                metadata = ?9,
                updated_at = ?10
            WHERE tenant_id = ?1 AND id = ?2
            "#,
        )
        .bind(&case.tenant_id)
        .bind(&case.id)
        .bind(case.counted_quantity)
        .bind(case.variance_quantity)
        .bind(case.variance_value)
        .bind(case.status)
        .bind(&case.resolved_by)
        .bind(case.resolved_at)
        .bind(&case.metadata)
        .bind(case.updated_at)
        .execute(&mut *self.conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("InventoryReconciliation", &case.id));
        }
        Ok(())
    }

    /// Cases of the tenant, optionally for one item and/or one status,
    /// oldest first.
    pub async fn list(
        &mut self,
        tenant_id: &str,
        item_id: Option<&str>,
        status: Option<ReconciliationStatus>,
    ) -> DbResult<Vec<InventoryReconciliation>> {
        let sql = format!(
            r#"
            SELECT {} FROM inventory_reconciliations
            WHERE tenant_id = ?1
              AND (?2 IS NULL OR inventory_item_id = ?2)
              AND (?3 IS NULL OR status = ?3)
            ORDER BY rowid
            "#,
            RECONCILIATION_COLUMNS
        );
        let cases = sqlx::query_as::<_, InventoryReconciliation>(&sql)
            .bind(tenant_id)
            .bind(item_id)
            .bind(status)
            .fetch_all(&mut *self.conn)
            .await?;
        Ok(cases)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::fixtures::{self, TENANT};
    use chrono::Utc;
    use stockroom_core::{new_id, ReconciliationSource};

    fn open_case(item_id: &str) -> InventoryReconciliation {
        let now = Utc::now();
        InventoryReconciliation {
            id: new_id(),
            tenant_id: TENANT.to_string(),
            inventory_item_id: item_id.to_string(),
            inventory_location_id: None,
            expected_quantity: 50.0,
            counted_quantity: 45.0,
            variance_quantity: -5.0,
            variance_value: -12.5,
            status: ReconciliationStatus::Open,
            source: ReconciliationSource::Manual,
            initiated_by: "tester".to_string(),
            initiated_at: now,
            resolved_by: None,
            resolved_at: None,
            metadata: None,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_only_one_open_case_per_item() {
        let db = fixtures::db().await;
        let mut uow = db.begin().await.unwrap();
        let (_, item, _) = fixtures::seed(&mut uow, TENANT).await;

        let mut first = open_case(&item.id);
        uow.reconciliations().insert(&first).await.unwrap();
        let second = uow.reconciliations().insert(&open_case(&item.id)).await;
        assert!(matches!(second, Err(DbError::UniqueViolation { .. })));

        // once resolved, a new case may open
        first.status = ReconciliationStatus::Resolved;
        first.resolved_at = Some(Utc::now());
        uow.reconciliations().save(&first).await.unwrap();
        uow.reconciliations()
            .insert(&open_case(&item.id))
            .await
            .unwrap();

        let open = uow
            .reconciliations()
            .find_open(TENANT, &item.id)
            .await
            .unwrap()
            .unwrap();
        assert_ne!(open.id, first.id);

        let all = uow
            .reconciliations()
            .list(TENANT, Some(&item.id), None)
            .await
            .unwrap();
        assert_eq!(all.len(), 2);
        let resolved = uow
            .reconciliations()
            .list(TENANT, None, Some(ReconciliationStatus::Resolved))
            .await
            .unwrap();
        assert_eq!(resolved.len(), 1);
    }
}
