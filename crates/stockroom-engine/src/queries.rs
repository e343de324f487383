//! # Read Side
//!
//! Tenant-scoped lookups keyed by product. A product that was never
//! touched by a stock operation has no item, so its lists are empty.

use chrono::{DateTime, Utc};

use crate::error::InventoryResult;
use crate::service::InventoryService;
use stockroom_core::{
    CoreError, InventoryAdjustment, InventoryAlert, InventoryItem, InventoryItemLocation,
    InventoryMovement, InventoryReconciliation, InventoryReservation, ReservationRef,
    ReservationStatus,
};
use stockroom_db::UnitOfWork;

async fn item_id_for(
    uow: &mut UnitOfWork,
    tenant_id: &str,
    product_id: &str,
) -> InventoryResult<Option<String>> {
    Ok(uow
        .items()
        .get_by_product(tenant_id, product_id)
        .await?
        .map(|item| item.id))
}

impl InventoryService {
    pub async fn get_item_for_product(
        &self,
        tenant_id: &str,
        product_id: &str,
    ) -> InventoryResult<Option<InventoryItem>> {
        let mut uow = self.db.begin_read().await?;
        let item = uow.items().get_by_product(tenant_id, product_id).await?;
        uow.rollback().await?;
        Ok(item)
    }

    /// Active ledger rows of the product's item.
    pub async fn list_location_ledgers(
        &self,
        tenant_id: &str,
        product_id: &str,
    ) -> InventoryResult<Vec<InventoryItemLocation>> {
        let mut uow = self.db.begin_read().await?;
        let rows = match item_id_for(&mut uow, tenant_id, product_id).await? {
            Some(item_id) => uow.ledger().list_for_item(tenant_id, &item_id, false).await?,
            None => Vec::new(),
        };
        uow.rollback().await?;
        Ok(rows)
    }

    /// Journal entries, oldest first.
    pub async fn list_movements(
        &self,
        tenant_id: &str,
        product_id: &str,
    ) -> InventoryResult<Vec<InventoryMovement>> {
        let mut uow = self.db.begin_read().await?;
        let movements = match item_id_for(&mut uow, tenant_id, product_id).await? {
            Some(item_id) => uow.journal().list_movements(tenant_id, &item_id).await?,
            None => Vec::new(),
        };
        uow.rollback().await?;
        Ok(movements)
    }

    /// Adjustment records, oldest first.
    pub async fn list_adjustments(
        &self,
        tenant_id: &str,
        product_id: &str,
    ) -> InventoryResult<Vec<InventoryAdjustment>> {
        let mut uow = self.db.begin_read().await?;
        let adjustments = match item_id_for(&mut uow, tenant_id, product_id).await? {
            Some(item_id) => uow.journal().list_adjustments(tenant_id, &item_id).await?,
            None => Vec::new(),
        };
        uow.rollback().await?;
        Ok(adjustments)
    }

    /// Reservations of the product, newest first.
    pub async fn list_reservations(
        &self,
        tenant_id: &str,
        product_id: &str,
        status: Option<ReservationStatus>,
    ) -> InventoryResult<Vec<InventoryReservation>> {
        let mut uow = self.db.begin_read().await?;
        let reservations = match item_id_for(&mut uow, tenant_id, product_id).await? {
            Some(item_id) => {
                uow.reservations()
                    .list_for_item(tenant_id, &item_id, status)
                    .await?
            }
            None => Vec::new(),
        };
        uow.rollback().await?;
        Ok(reservations)
    }

    /// Every reservation held for one external reference, across items.
    pub async fn list_reservations_for_reference(
        &self,
        tenant_id: &str,
        reference: &ReservationRef,
    ) -> InventoryResult<Vec<InventoryReservation>> {
        let mut uow = self.db.begin_read().await?;
        let reservations = uow
            .reservations()
            .list_for_reference(tenant_id, &reference.kind, &reference.id)
            .await?;
        uow.rollback().await?;
        Ok(reservations)
    }

    pub async fn get_reservation(
        &self,
        tenant_id: &str,
        reservation_id: &str,
    ) -> InventoryResult<InventoryReservation> {
        let mut uow = self.db.begin_read().await?;
        let reservation = uow.reservations().get(tenant_id, reservation_id).await?;
        uow.rollback().await?;
        reservation.ok_or_else(|| CoreError::not_found("Reservation", reservation_id).into())
    }

    /// Active reservations whose expiry has passed at `now`.
    ///
    /// They still hold stock; this is the feed for whatever job releases
    /// them.
    pub async fn list_expired_reservations(
        &self,
        tenant_id: &str,
        now: DateTime<Utc>,
    ) -> InventoryResult<Vec<InventoryReservation>> {
        let mut uow = self.db.begin_read().await?;
        let candidates = uow.reservations().list_active_with_expiry(tenant_id).await?;
        uow.rollback().await?;
        Ok(candidates
            .into_iter()
            .filter(|r| r.is_expired(now))
            .collect())
    }

    /// Unresolved alerts of one product, or of the whole tenant.
    pub async fn list_open_alerts(
        &self,
        tenant_id: &str,
        product_id: Option<&str>,
    ) -> InventoryResult<Vec<InventoryAlert>> {
        let mut uow = self.db.begin_read().await?;
        let alerts = match product_id {
            Some(product_id) => match item_id_for(&mut uow, tenant_id, product_id).await? {
                Some(item_id) => {
                    uow.alerts()
                        .list_unresolved_for_item(tenant_id, &item_id)
                        .await?
                }
                None => Vec::new(),
            },
            None => uow.alerts().list_unresolved(tenant_id).await?,
        };
        uow.rollback().await?;
        Ok(alerts)
    }

    /// Reconciliation cases of one product, or of the whole tenant,
    /// oldest first.
    pub async fn list_reconciliations(
        &self,
        tenant_id: &str,
        product_id: Option<&str>,
    ) -> InventoryResult<Vec<InventoryReconciliation>> {
        let mut uow = self.db.begin_read().await?;
        let cases = match product_id {
            Some(product_id) => match item_id_for(&mut uow, tenant_id, product_id).await? {
                Some(item_id) => {
                    uow.reconciliations()
                        .list(tenant_id, Some(&item_id), None)
                        .await?
                }
                None => Vec::new(),
            },
            None => uow.reconciliations().list(tenant_id, None, None).await?,
        };
        uow.rollback().await?;
        Ok(cases)
    }
}
