//! # Cycle Count Scheduler
//!
//! Creates count headers only. Counting, variance capture and closing a
//! count happen outside this crate.

use chrono::{DateTime, Duration, Utc};
use tracing::info;

use crate::error::InventoryResult;
use crate::service::{require_active_location, require_location, InventoryService};
use stockroom_core::validation::validate_actor;
use stockroom_core::{new_id, CountStatus, CountType, InventoryCount};

impl InventoryService {
    /// Schedules a cycle count at a location.
    ///
    /// `scheduled_for` defaults to `counts.default_lead_hours` from now.
    /// `total_items` is the number of active ledger rows at the location
    /// when the header is created.
    pub async fn schedule_cycle_count(
        &self,
        tenant_id: &str,
        location_id: &str,
        actor: &str,
        scheduled_for: Option<DateTime<Utc>>,
    ) -> InventoryResult<InventoryCount> {
        validate_actor(tenant_id, actor)?;

        let now = Utc::now();
        let scheduled_for = scheduled_for
            .unwrap_or_else(|| now + Duration::hours(self.config.counts.default_lead_hours));

        let mut uow = self.db.begin().await?;
        let location =
            require_active_location(&mut uow, tenant_id, location_id, "schedule count").await?;
        let total_items = uow
            .ledger()
            .count_active_at_location(tenant_id, location_id)
            .await?;

        let count = InventoryCount {
            id: new_id(),
            tenant_id: tenant_id.to_string(),
            inventory_location_id: location.id.clone(),
            count_type: CountType::Cycle,
            status: CountStatus::Scheduled,
            scheduled_for,
            total_items,
            items_counted: 0,
            variance_quantity: 0.0,
            variance_value: 0.0,
            created_by: actor.to_string(),
            metadata: None,
            created_at: now,
        };
        uow.counts().insert(&count).await?;
        uow.commit().await?;

        info!(
            tenant_id,
            count_id = %count.id,
            location = %location.code,
            total_items,
            scheduled_for = %scheduled_for,
            "Cycle count scheduled"
        );
        Ok(count)
    }

    pub async fn list_cycle_counts(
        &self,
        tenant_id: &str,
        location_id: &str,
    ) -> InventoryResult<Vec<InventoryCount>> {
        let mut uow = self.db.begin_read().await?;
        require_location(&mut uow, tenant_id, location_id).await?;
        let counts = uow.counts().list_for_location(tenant_id, location_id).await?;
        uow.rollback().await?;
        Ok(counts)
    }
}
