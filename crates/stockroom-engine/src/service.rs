//! # Inventory Service
//!
//! The handle callers hold. Operations live in sibling modules as
//! `impl InventoryService` blocks; this file holds the handle and the
//! lookups they share.
//!
//! ## Unit of Work per Call
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  validate input ──► db.begin() ──► resolve product / item / location   │
//! │                                      │                                  │
//! │                                      ▼                                  │
//! │                         lock item row (lock_version++)                  │
//! │                                      │                                  │
//! │                                      ▼                                  │
//! │                mutate ledger rows, append movement / adjustment         │
//! │                                      │                                  │
//! │                                      ▼                                  │
//! │                  re-aggregate item, mirror product, alerts              │
//! │                                      │                                  │
//! │                                      ▼                                  │
//! │                              uow.commit()                               │
//! │                                                                         │
//! │  Any `?` before commit drops the unit of work: nothing was written.    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::config::InventoryConfig;
use crate::error::InventoryResult;
use stockroom_core::{
    CoreError, InventoryItemLocation, InventoryLocation, Lifecycle, Product,
};
use stockroom_db::{Database, UnitOfWork};

#[derive(Debug, Clone)]
pub struct InventoryService {
    pub(crate) db: Database,
    pub(crate) config: InventoryConfig,
}

impl InventoryService {
    pub fn new(db: Database, config: InventoryConfig) -> Self {
        InventoryService { db, config }
    }

    /// Opens the database described by `config` and wraps it.
    pub async fn connect(config: InventoryConfig) -> InventoryResult<Self> {
        let db = Database::new(config.to_db_config()).await?;
        info!(
            path = %config.database.path.display(),
            batch_size = config.balancing.batch_size,
            "Inventory service ready"
        );
        Ok(Self::new(db, config))
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn config(&self) -> &InventoryConfig {
        &self.config
    }
}

// =============================================================================
// Shared Lookups
// =============================================================================

pub(crate) async fn require_product(
    uow: &mut UnitOfWork,
    tenant_id: &str,
    product_id: &str,
) -> InventoryResult<Product> {
    uow.products()
        .get(tenant_id, product_id)
        .await?
        .ok_or_else(|| CoreError::not_found("Product", product_id).into())
}

pub(crate) async fn require_location(
    uow: &mut UnitOfWork,
    tenant_id: &str,
    location_id: &str,
) -> InventoryResult<InventoryLocation> {
    uow.locations()
        .get(tenant_id, location_id)
        .await?
        .ok_or_else(|| CoreError::not_found("Location", location_id).into())
}

/// Like [`require_location`] but rejects retired locations.
pub(crate) async fn require_active_location(
    uow: &mut UnitOfWork,
    tenant_id: &str,
    location_id: &str,
    operation: &str,
) -> InventoryResult<InventoryLocation> {
    let location = require_location(uow, tenant_id, location_id).await?;
    if !location.lifecycle.is_active() {
        return Err(
            CoreError::invalid_state("Location", &location.code, "retired", operation).into(),
        );
    }
    Ok(location)
}

/// Returns the (item, location) ledger row, creating an empty one or
/// restoring a retired one.
pub(crate) async fn ensure_ledger_row(
    uow: &mut UnitOfWork,
    tenant_id: &str,
    item_id: &str,
    location_id: &str,
    now: DateTime<Utc>,
) -> InventoryResult<InventoryItemLocation> {
    match uow.ledger().find(tenant_id, item_id, location_id).await? {
        Some(mut row) => {
            if row.lifecycle == Lifecycle::Retired {
                row.restore(now);
                uow.ledger().save(&row).await?;
                debug!(item_id, location_id, "Restored ledger row");
            }
            Ok(row)
        }
        None => {
            let row = InventoryItemLocation::empty(tenant_id, item_id, location_id, now);
            uow.ledger().insert(&row).await?;
            Ok(row)
        }
    }
}

// =============================================================================
// Test Fixtures
// =============================================================================

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use std::path::PathBuf;
    use std::time::Duration;
    use stockroom_core::{new_id, LocationType};
    use stockroom_db::DbConfig;

    use crate::locations::NewLocation;

    pub const TENANT: &str = "tenant-1";
    pub const OTHER_TENANT: &str = "tenant-2";
    pub const ACTOR: &str = "user-1";

    pub async fn service() -> InventoryService {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        InventoryService::new(db, InventoryConfig::default())
    }

    /// A service over a WAL file database with several connections, for
    /// tests where units of work actually run side by side.
    ///
    /// The file and its `-wal`/`-shm` companions are removed on drop.
    pub struct FileService {
        pub service: InventoryService,
        path: PathBuf,
    }

    impl Drop for FileService {
        fn drop(&mut self) {
            for suffix in ["", "-wal", "-shm"] {
                let mut name = self.path.clone().into_os_string();
                name.push(suffix);
                let _ = std::fs::remove_file(name);
            }
        }
    }

    pub async fn file_service() -> FileService {
        let path = std::env::temp_dir().join(format!("stockroom-{}.db", new_id()));
        let config = DbConfig::new(path.clone())
            .max_connections(8)
            .busy_timeout(Duration::from_secs(10));
        let db = Database::new(config).await.unwrap();
        FileService {
            service: InventoryService::new(db, InventoryConfig::default()),
            path,
        }
    }

    /// Inserts a catalog product with the given low stock threshold.
    pub async fn product(
        service: &InventoryService,
        tenant: &str,
        sku: &str,
        low_stock_threshold: Option<i64>,
    ) -> Product {
        let now = Utc::now();
        let product = Product {
            id: new_id(),
            tenant_id: tenant.to_string(),
            sku: sku.to_string(),
            name: format!("Product {}", sku),
            description: None,
            vendor_price: Some(2.0),
            stock_quantity: 0,
            low_stock_threshold,
            created_at: now,
            updated_at: now,
        };
        let mut uow = service.database().begin().await.unwrap();
        uow.products().insert(&product).await.unwrap();
        uow.commit().await.unwrap();
        product
    }

    pub async fn location(service: &InventoryService, tenant: &str, code: &str) -> InventoryLocation {
        service
            .create_location(
                tenant,
                NewLocation {
                    code: code.to_string(),
                    name: format!("Location {}", code),
                    location_type: LocationType::Warehouse,
                    description: None,
                    is_primary: false,
                },
                ACTOR,
            )
            .await
            .unwrap()
    }

    pub async fn reload_product(service: &InventoryService, tenant: &str, id: &str) -> Product {
        let mut uow = service.database().begin_read().await.unwrap();
        uow.products().get(tenant, id).await.unwrap().unwrap()
    }
}
