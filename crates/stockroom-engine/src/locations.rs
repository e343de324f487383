//! # Location Registry
//!
//! Tenant-owned stock locations. Codes are unique per tenant; at most one
//! location per tenant carries the primary flag. Locations are retired,
//! never deleted, so ledger rows keep pointing at them.

use chrono::Utc;
use tracing::info;

use crate::error::{InventoryError, InventoryResult};
use crate::service::{require_location, InventoryService};
use stockroom_core::validation::{validate_actor, validate_location_code, validate_location_name};
use stockroom_core::{
    new_id, CoreError, InventoryLocation, Lifecycle, LocationType, ValidationError,
    VARIANCE_EPSILON,
};
use stockroom_db::DbError;

/// Fields for a new location.
#[derive(Debug, Clone)]
pub struct NewLocation {
    pub code: String,
    pub name: String,
    pub location_type: LocationType,
    pub description: Option<String>,
    pub is_primary: bool,
}

/// Partial update; `None` keeps the stored value.
///
/// `description: Some(None)` clears the description.
#[derive(Debug, Clone, Default)]
pub struct LocationUpdate {
    pub name: Option<String>,
    pub location_type: Option<LocationType>,
    pub description: Option<Option<String>>,
    pub is_primary: Option<bool>,
}

impl InventoryService {
    pub async fn create_location(
        &self,
        tenant_id: &str,
        new: NewLocation,
        actor: &str,
    ) -> InventoryResult<InventoryLocation> {
        validate_actor(tenant_id, actor)?;
        validate_location_code(&new.code)?;
        validate_location_name(&new.name)?;

        let now = Utc::now();
        let location = InventoryLocation {
            id: new_id(),
            tenant_id: tenant_id.to_string(),
            code: new.code.trim().to_string(),
            name: new.name.trim().to_string(),
            location_type: new.location_type,
            description: new.description,
            is_primary: new.is_primary,
            lifecycle: Lifecycle::Active,
            created_by: actor.to_string(),
            updated_by: actor.to_string(),
            created_at: now,
            updated_at: now,
        };

        let mut uow = self.db.begin().await?;
        uow.locations().insert(&location).await.map_err(|e| match e {
            DbError::UniqueViolation { .. } => InventoryError::from(ValidationError::Duplicate {
                field: "code".to_string(),
                value: location.code.clone(),
            }),
            other => InventoryError::from(other),
        })?;
        if location.is_primary {
            uow.locations()
                .clear_primary_except(tenant_id, &location.id, actor, now)
                .await?;
        }
        uow.commit().await?;

        info!(tenant_id, location_id = %location.id, code = %location.code, "Location created");
        Ok(location)
    }

    pub async fn update_location(
        &self,
        tenant_id: &str,
        location_id: &str,
        update: LocationUpdate,
        actor: &str,
    ) -> InventoryResult<InventoryLocation> {
        validate_actor(tenant_id, actor)?;
        if let Some(name) = &update.name {
            validate_location_name(name)?;
        }

        let now = Utc::now();
        let mut uow = self.db.begin().await?;
        let mut location = require_location(&mut uow, tenant_id, location_id).await?;

        if let Some(name) = update.name {
            location.name = name.trim().to_string();
        }
        if let Some(location_type) = update.location_type {
            location.location_type = location_type;
        }
        if let Some(description) = update.description {
            location.description = description;
        }
        if let Some(is_primary) = update.is_primary {
            location.is_primary = is_primary;
        }
        location.updated_by = actor.to_string();
        location.updated_at = now;

        uow.locations().save(&location).await?;
        if location.is_primary {
            uow.locations()
                .clear_primary_except(tenant_id, &location.id, actor, now)
                .await?;
        }
        uow.commit().await?;

        info!(tenant_id, location_id, "Location updated");
        Ok(location)
    }

    /// Retires a location. Refused while any item holds reserved stock
    /// there.
    pub async fn retire_location(
        &self,
        tenant_id: &str,
        location_id: &str,
        actor: &str,
    ) -> InventoryResult<InventoryLocation> {
        validate_actor(tenant_id, actor)?;

        let now = Utc::now();
        let mut uow = self.db.begin().await?;
        let mut location = require_location(&mut uow, tenant_id, location_id).await?;
        if !location.lifecycle.is_active() {
            return Ok(location);
        }

        let reserved = uow
            .ledger()
            .total_reserved_at_location(tenant_id, location_id)
            .await?;
        if reserved > VARIANCE_EPSILON {
            return Err(CoreError::invalid_state(
                "Location",
                &location.code,
                format!("holding {} reserved", reserved),
                "retire",
            )
            .into());
        }

        uow.locations()
            .set_lifecycle(tenant_id, location_id, Lifecycle::Retired, actor, now)
            .await?;
        uow.commit().await?;

        location.lifecycle = Lifecycle::Retired;
        location.updated_by = actor.to_string();
        location.updated_at = now;
        info!(tenant_id, location_id, code = %location.code, "Location retired");
        Ok(location)
    }

    pub async fn restore_location(
        &self,
        tenant_id: &str,
        location_id: &str,
        actor: &str,
    ) -> InventoryResult<InventoryLocation> {
        validate_actor(tenant_id, actor)?;

        let now = Utc::now();
        let mut uow = self.db.begin().await?;
        let mut location = require_location(&mut uow, tenant_id, location_id).await?;
        if location.lifecycle.is_active() {
            return Ok(location);
        }

        uow.locations()
            .set_lifecycle(tenant_id, location_id, Lifecycle::Active, actor, now)
            .await?;
        uow.commit().await?;

        location.lifecycle = Lifecycle::Active;
        location.updated_by = actor.to_string();
        location.updated_at = now;
        info!(tenant_id, location_id, code = %location.code, "Location restored");
        Ok(location)
    }

    pub async fn get_location(
        &self,
        tenant_id: &str,
        location_id: &str,
    ) -> InventoryResult<InventoryLocation> {
        let mut uow = self.db.begin_read().await?;
        let location = require_location(&mut uow, tenant_id, location_id).await?;
        uow.rollback().await?;
        Ok(location)
    }

    pub async fn list_locations(
        &self,
        tenant_id: &str,
        include_retired: bool,
    ) -> InventoryResult<Vec<InventoryLocation>> {
        let mut uow = self.db.begin_read().await?;
        let locations = uow.locations().list(tenant_id, include_retired).await?;
        uow.rollback().await?;
        Ok(locations)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
