//! # Alert Repository
//!
//! Low-stock and out-of-stock alerts. The expression index
//! `(item, COALESCE(location, ''), type) WHERE resolved = 0` keeps one
//! unresolved alert per tuple even if two evaluations race.

use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;
use tracing::debug;

use crate::error::DbResult;
use stockroom_core::InventoryAlert;

const ALERT_COLUMNS: &str = r#"
    id, tenant_id, inventory_item_id, inventory_location_id, alert_type, severity,
    message, triggered_quantity, threshold_quantity, resolved, resolved_at,
    resolved_by, metadata, created_at
"#;

#[derive(Debug)]
pub struct AlertRepository<'c> {
    conn: &'c mut SqliteConnection,
}

impl<'c> AlertRepository<'c> {
    pub fn new(conn: &'c mut SqliteConnection) -> Self {
        AlertRepository { conn }
    }

    /// Every unresolved alert of an item, at any location.
    pub async fn list_unresolved_for_item(
        &mut self,
        tenant_id: &str,
        item_id: &str,
    ) -> DbResult<Vec<InventoryAlert>> {
        let sql = format!(
            r#"
            SELECT {} FROM inventory_alerts
            WHERE tenant_id = ?1 AND inventory_item_id = ?2 AND resolved = 0
            ORDER BY rowid
            "#,
            ALERT_COLUMNS
        );
        let alerts = sqlx::query_as::<_, InventoryAlert>(&sql)
            .bind(tenant_id)
            .bind(item_id)
            .fetch_all(&mut *self.conn)
            .await?;
        Ok(alerts)
    }

    /// Every unresolved alert of the tenant, oldest first.
    pub async fn list_unresolved(&mut self, tenant_id: &str) -> DbResult<Vec<InventoryAlert>> {
        let sql = format!(
            r#"
            SELECT {} FROM inventory_alerts
            WHERE tenant_id = ?1 AND resolved = 0
            ORDER BY rowid
            "#,
            ALERT_COLUMNS
        );
        let alerts = sqlx::query_as::<_, InventoryAlert>(&sql)
            .bind(tenant_id)
            .fetch_all(&mut *self.conn)
            .await?;
        Ok(alerts)
    }

    /// Full alert history of an item.
    pub async fn list_for_item(
        &mut self,
        tenant_id: &str,
        item_id: &str,
    ) -> DbResult<Vec<InventoryAlert>> {
        let sql = format!(
            r#"
            SELECT {} FROM inventory_alerts
            WHERE tenant_id = ?1 AND inventory_item_id = ?2
            ORDER BY rowid
            "#,
            ALERT_COLUMNS
        );
        let alerts = sqlx::query_as::<_, InventoryAlert>(&sql)
            .bind(tenant_id)
            .bind(item_id)
            .fetch_all(&mut *self.conn)
            .await?;
        Ok(alerts)
    }

    pub async fn insert(&mut self, alert: &InventoryAlert) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO inventory_alerts (
                id, tenant_id, inventory_item_id, inventory_location_id, alert_type, severity,
                message, triggered_quantity, threshold_quantity, resolved, resolved_at,
                resolved_by, metadata, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
            "#,
        )
        .bind(&alert.id)
        .bind(&alert.tenant_id)
        .bind(&alert.inventory_item_id)
        .bind(&alert.inventory_location_id)
        .bind(alert.alert_type)
        .bind(alert.severity)
        .bind(&alert.message)
        .bind(alert.triggered_quantity)
        .bind(alert.threshold_quantity)
        .bind(alert.resolved)
        .bind(alert.resolved_at)
        .bind(&alert.resolved_by)
        .bind(&alert.metadata)
        .bind(alert.created_at)
        .execute(&mut *self.conn)
        .await?;

        debug!(
            alert_id = %alert.id,
            alert_type = ?alert.alert_type,
            item_id = %alert.inventory_item_id,
            "Raised alert"
        );
        Ok(())
    }

    /// Marks one unresolved alert resolved. Returns whether it changed.
    pub async fn resolve(
        &mut self,
        tenant_id: &str,
        id: &str,
        actor: &str,
        now: DateTime<Utc>,
    ) -> DbResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE inventory_alerts
            SET resolved = 1, resolved_at = ?3, resolved_by = ?4
            WHERE tenant_id = ?1 AND id = ?2 AND resolved = 0
            "#,
        )
        .bind(tenant_id)
        .bind(id)
        .bind(now)
        .bind(actor)
        .execute(&mut *self.conn)
        .await?;
        Ok(result.rows_affected() == 1)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
