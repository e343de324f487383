//! # Location Repository
//!
//! Registry of stock locations per tenant. Codes are unique per tenant,
//! retired locations keep their row and can be restored.

use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;
use tracing::debug;

use crate::error::{DbError, DbResult};
use stockroom_core::{InventoryLocation, Lifecycle};

const LOCATION_COLUMNS: &str = r#"
    id, tenant_id, code, name, location_type, description, is_primary,
    lifecycle, created_by, updated_by, created_at, updated_at
"#;

#[derive(Debug)]
pub struct LocationRepository<'c> {
    conn: &'c mut SqliteConnection,
}

impl<'c> LocationRepository<'c> {
    pub fn new(conn: &'c mut SqliteConnection) -> Self {
        LocationRepository { conn }
    }

    pub async fn get(&mut self, tenant_id: &str, id: &str) -> DbResult<Option<InventoryLocation>> {
        let sql = format!(
            "SELECT {} FROM inventory_locations WHERE tenant_id = ?1 AND id = ?2",
            LOCATION_COLUMNS
        );
        let location = sqlx::query_as::<_, InventoryLocation>(&sql)
            .bind(tenant_id)
            .bind(id)
            .fetch_optional(&mut *self.conn)
            .await?;
        Ok(location)
    }

    pub async fn get_by_code(
        &mut self,
        tenant_id: &str,
        code: &str,
    ) -> DbResult<Option<InventoryLocation>> {
        let sql = format!(
            "SELECT {} FROM inventory_locations WHERE tenant_id = ?1 AND code = ?2",
            LOCATION_COLUMNS
        );
        let location = sqlx::query_as::<_, InventoryLocation>(&sql)
            .bind(tenant_id)
            .bind(code)
            .fetch_optional(&mut *self.conn)
            .await?;
        Ok(location)
    }

    /// Lists the tenant's locations ordered by code.
    pub async fn list(
        &mut self,
        tenant_id: &str,
        include_retired: bool,
    ) -> DbResult<Vec<InventoryLocation>> {
        let sql = format!(
            r#"
            SELECT {} FROM inventory_locations
            WHERE tenant_id = ?1 AND (?2 OR lifecycle = 'active')
            ORDER BY code
            "#,
            LOCATION_COLUMNS
        );
        let locations = sqlx::query_as::<_, InventoryLocation>(&sql)
            .bind(tenant_id)
            .bind(include_retired)
            .fetch_all(&mut *self.conn)
            .await?;
        Ok(locations)
    }

    pub async fn insert(&mut self, location: &InventoryLocation) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO inventory_locations (
                id, tenant_id, code, name, location_type, description, is_primary,
                lifecycle, created_by, updated_by, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            "#,
        )
        .bind(&location.id)
        .bind(&location.tenant_id)
        .bind(&location.code)
        .bind(&location.name)
        .bind(location.location_type)
        .bind(&location.description)
        .bind(location.is_primary)
        .bind(location.lifecycle)
        .bind(&location.created_by)
        .bind(&location.updated_by)
        .bind(location.created_at)
        .bind(location.updated_at)
        .execute(&mut *self.conn)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { .. } => DbError::duplicate("code", &location.code),
            other => other,
        })?;

        debug!(location_id = %location.id, code = %location.code, "Inserted location");
        Ok(())
    }

    /// Saves every mutable column. `code` and `tenant_id` never change.
    pub async fn save(&mut self, location: &InventoryLocation) -> DbResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE inventory_locations
            SET name = ?3,
                location_type = ?4,
                description = ?5,
                is_primary = ?6,
                lifecycle = ?7,
                updated_by = ?8,
                updated_at = ?9
            WHERE tenant_id = ?1 AND id = ?2
            "#,
        )
        .bind(&location.tenant_id)
        .bind(&location.id)
        .bind(&location.name)
        .bind(location.location_type)
        .bind(&location.description)
        .bind(location.is_primary)
        .bind(location.lifecycle)
        .bind(&location.updated_by)
        .bind(location.updated_at)
        .execute(&mut *self.conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Location", &location.id));
        }
        Ok(())
    }

    /// Clears the primary flag on every other location of the tenant.
    pub async fn clear_primary_except(
        &mut self,
        tenant_id: &str,
        keep_id: &str,
        actor: &str,
        now: DateTime<Utc>,
    ) -> DbResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE inventory_locations
            SET is_primary = 0, updated_by = ?3, updated_at = ?4
            WHERE tenant_id = ?1 AND id <> ?2 AND is_primary = 1
            "#,
        )
        .bind(tenant_id)
        .bind(keep_id)
        .bind(actor)
        .bind(now)
        .execute(&mut *self.conn)
        .await?;
        Ok(result.rows_affected())
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
            UPDATE inventory_locations
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
            return Err(DbError::not_found("Location", id));
        }
        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
