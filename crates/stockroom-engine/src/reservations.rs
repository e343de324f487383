//! # Reservation Manager
//!
//! Holds stock against an external reference (an order, a negotiation)
//! and releases it exactly once.
//!
//! ```text
//!                 reserve_stock                        release_reservation
//!                      │                                       │
//!        ┌─────────────┴─────────────┐                 lock item row
//!        ▼                           ▼                         │
//!  location given              no location              status == active?
//!  row.available ≥ qty ?       snapshot.available ≥ qty ?  │ no ──► InvalidState
//!  row.reserved += qty         (global hold)               ▼ yes
//!        │                           │                 status = released
//!        └─────────────┬─────────────┘                 row.reserved -= qty
//!                      ▼                               movement (qty 0)
//!        one active InventoryReservation                       │
//!                      │                                       │
//!                      └──────► re-aggregate + alerts ◄────────┘
//! ```
//!
//! `expires_at` is stored only. Nothing here releases expired holds.

use chrono::{DateTime, Utc};
use serde_json::json;
use tracing::info;

use crate::aggregate::{collect_snapshot, refresh_aggregates};
use crate::alerts::evaluate_alerts;
use crate::error::InventoryResult;
use crate::items::lock_item_for_product;
use crate::service::{ensure_ledger_row, require_active_location, InventoryService};
use stockroom_core::validation::{
    validate_actor, validate_positive_quantity, validate_reason, validate_reference,
};
use stockroom_core::{
    new_id, CoreError, InventoryMovement, InventoryReservation, MovementType, ReservationRef,
    ReservationStatus,
};

/// A hold request.
#[derive(Debug, Clone)]
pub struct ReserveRequest {
    pub product_id: String,
    pub quantity: f64,
    /// `None` holds against the item as a whole.
    pub location_id: Option<String>,
    pub reference: ReservationRef,
    pub expires_at: Option<DateTime<Utc>>,
}

impl InventoryService {
    /// Reserves stock at one location or item-wide.
    ///
    /// Fails with `InsufficientStock` when the hold does not fit; nothing
    /// is written in that case.
    pub async fn reserve_stock(
        &self,
        tenant_id: &str,
        request: ReserveRequest,
        actor: &str,
    ) -> InventoryResult<InventoryReservation> {
        validate_actor(tenant_id, actor)?;
        validate_positive_quantity("quantity", request.quantity)?;
        validate_reference(&request.reference.kind, &request.reference.id)?;

        let now = Utc::now();
        let mut uow = self.db.begin().await?;

        let location = match request.location_id.as_deref() {
            Some(location_id) => {
                Some(require_active_location(&mut uow, tenant_id, location_id, "reserve").await?)
            }
            None => None,
        };
        let (product, mut item) = lock_item_for_product(
            &mut uow,
            &self.config.items,
            tenant_id,
            &request.product_id,
            actor,
            now,
        )
        .await?;

        match &location {
            Some(location) => {
                let mut row =
                    ensure_ledger_row(&mut uow, tenant_id, &item.id, &location.id, now).await?;
                row.reserve(request.quantity, now)
                    .map_err(|shortfall| shortfall.into_error(&product.sku, Some(&location.code)))?;
                uow.ledger().save(&row).await?;
            }
            None => {
                let snapshot = collect_snapshot(&mut uow, &item, now).await?;
                if snapshot.available < request.quantity {
                    return Err(CoreError::InsufficientStock {
                        sku: product.sku.clone(),
                        location: None,
                        requested: request.quantity,
                        available: snapshot.available,
                    }
                    .into());
                }
            }
        }

        let reservation = InventoryReservation {
            id: new_id(),
            tenant_id: tenant_id.to_string(),
            inventory_item_id: item.id.clone(),
            inventory_location_id: location.as_ref().map(|l| l.id.clone()),
            quantity: request.quantity,
            status: ReservationStatus::Active,
            reserved_for_type: request.reference.kind.clone(),
            reserved_for_id: request.reference.id.clone(),
            reserved_at: now,
            expires_at: request.expires_at,
            reserved_by: actor.to_string(),
            released_at: None,
            released_by: None,
            release_reason: None,
        };
        uow.reservations().insert(&reservation).await?;

        refresh_aggregates(&mut uow, &mut item, &product, actor, now).await?;
        evaluate_alerts(
            &mut uow,
            &item,
            reservation.inventory_location_id.as_deref(),
            actor,
            now,
        )
        .await?;
        uow.commit().await?;

        info!(
            tenant_id,
            reservation_id = %reservation.id,
            sku = %product.sku,
            quantity = reservation.quantity,
            location = location.as_ref().map(|l| l.code.as_str()).unwrap_or("global"),
            reference = %request.reference,
            "Stock reserved"
        );
        Ok(reservation)
    }

    /// Releases an active reservation.
    ///
    /// Takes the item lock before checking the status, so two concurrent
    /// releases of the same hold cannot both succeed.
    pub async fn release_reservation(
        &self,
        tenant_id: &str,
        reservation_id: &str,
        actor: &str,
        reason: &str,
    ) -> InventoryResult<InventoryReservation> {
        validate_actor(tenant_id, actor)?;
        validate_reason(reason)?;

        let now = Utc::now();
        let mut uow = self.db.begin().await?;
        let item_id = uow
            .reservations()
            .get(tenant_id, reservation_id)
            .await?
            .ok_or_else(|| CoreError::not_found("Reservation", reservation_id))?
            .inventory_item_id;

        let mut item = uow.items().lock_for_update(tenant_id, &item_id).await?;
        let mut reservation = uow
            .reservations()
            .get(tenant_id, reservation_id)
            .await?
            .ok_or_else(|| CoreError::not_found("Reservation", reservation_id))?;
        if reservation.status != ReservationStatus::Active {
            return Err(CoreError::invalid_state(
                "Reservation",
                reservation_id,
                reservation.status.to_string(),
                "release",
            )
            .into());
        }

        uow.reservations()
            .mark_released(tenant_id, reservation_id, actor, reason, now)
            .await?;

        if let Some(location_id) = reservation.inventory_location_id.as_deref() {
            if let Some(mut row) = uow.ledger().find(tenant_id, &item.id, location_id).await? {
                row.release(reservation.quantity, now);
                uow.ledger().save(&row).await?;
            }
        }

        let product = uow
            .products()
            .get(tenant_id, &item.product_id)
            .await?
            .ok_or_else(|| CoreError::not_found("Product", &item.product_id))?;
        refresh_aggregates(&mut uow, &mut item, &product, actor, now).await?;

        let movement = InventoryMovement::signed(
            tenant_id,
            &item.id,
            reservation.inventory_location_id.as_deref(),
            0.0,
            MovementType::ReservationRelease,
            reason,
            Some(json!({
                "reservation_id": reservation.id,
                "location_id": reservation.inventory_location_id,
                "quantity": reservation.quantity,
            })),
            actor,
            now,
        );
        uow.journal().record_movement(&movement).await?;

        evaluate_alerts(
            &mut uow,
            &item,
            reservation.inventory_location_id.as_deref(),
            actor,
            now,
        )
        .await?;
        uow.commit().await?;

        reservation.status = ReservationStatus::Released;
        reservation.released_at = Some(now);
        reservation.released_by = Some(actor.to_string());
        reservation.release_reason = Some(reason.to_string());

        info!(
            tenant_id,
            reservation_id,
            sku = %product.sku,
            quantity = reservation.quantity,
            "Reservation released"
        );
        Ok(reservation)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::fixtures::{self, ACTOR, OTHER_TENANT, TENANT};
    use crate::InventoryError;
    use chrono::Duration;
    use stockroom_core::{InventoryLocation, Product, ValidationError};

    fn request(
        product: &Product,
        location: Option<&InventoryLocation>,
        qty: f64,
        order: &str,
    ) -> ReserveRequest {
        ReserveRequest {
            product_id: product.id.clone(),
            quantity: qty,
            location_id: location.map(|l| l.id.clone()),
            reference: ReservationRef::new("order", order),
            expires_at: None,
        }
    }

    async fn ledger_at(service: &InventoryService, product: &Product) -> (f64, f64, f64) {
        let rows = service.list_location_ledgers(TENANT, &product.id).await.unwrap();
        (rows[0].stock_on_hand, rows[0].stock_reserved, rows[0].stock_available)
    }

    #[tokio::test]
    async fn test_reserve_release_scenario() {
        let service = fixtures::service().await;
        let product = fixtures::product(&service, TENANT, "SKU-1", Some(5)).await;
        let location = fixtures::location(&service, TENANT, "WH-L").await;
        service
            .set_location_stock(TENANT, &product.id, &location.id, 100.0, ACTOR, "opening count")
            .await
            .unwrap();

        let o1 = service
            .reserve_stock(TENANT, request(&product, Some(&location), 30.0, "O1"), ACTOR)
            .await
            .unwrap();
        assert_eq!(ledger_at(&service, &product).await, (100.0, 30.0, 70.0));

        service
            .reserve_stock(TENANT, request(&product, Some(&location), 50.0, "O2"), ACTOR)
            .await
            .unwrap();
        assert_eq!(ledger_at(&service, &product).await, (100.0, 80.0, 20.0));

        service
            .release_reservation(TENANT, &o1.id, ACTOR, "order cancelled")
            .await
            .unwrap();
        assert_eq!(ledger_at(&service, &product).await, (100.0, 50.0, 50.0));

        let err = service
            .reserve_stock(TENANT, request(&product, Some(&location), 60.0, "O3"), ACTOR)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            InventoryError::Core(CoreError::InsufficientStock { requested, available, ref location, .. })
                if requested == 60.0 && available == 50.0 && location.as_deref() == Some("WH-L")
        ));
        assert_eq!(ledger_at(&service, &product).await, (100.0, 50.0, 50.0));

        let item = service
            .get_item_for_product(TENANT, &product.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(item.reserved_stock, 50.0);
        assert_eq!(item.available_stock, 50.0);
        assert_eq!(
            service
                .list_reservations(TENANT, &product.id, Some(ReservationStatus::Active))
                .await
                .unwrap()
                .len(),
            1
        );
    }

    #[tokio::test]
    async fn test_reserve_then_release_restores_row() {
        let service = fixtures::service().await;
        let product = fixtures::product(&service, TENANT, "SKU-1", Some(5)).await;
        let location = fixtures::location(&service, TENANT, "WH-A").await;
        service
            .set_location_stock(TENANT, &product.id, &location.id, 17.25, ACTOR, "count")
            .await
            .unwrap();
        let before = ledger_at(&service, &product).await;

        let reservation = service
            .reserve_stock(TENANT, request(&product, Some(&location), 4.75, "O1"), ACTOR)
            .await
            .unwrap();
        service
            .release_reservation(TENANT, &reservation.id, ACTOR, "cancelled")
            .await
            .unwrap();

        assert_eq!(ledger_at(&service, &product).await, before);
    }

    #[tokio::test]
    async fn test_release_writes_zero_quantity_movement() {
        let service = fixtures::service().await;
        let product = fixtures::product(&service, TENANT, "SKU-1", Some(5)).await;
        let location = fixtures::location(&service, TENANT, "WH-A").await;
        service
            .set_location_stock(TENANT, &product.id, &location.id, 10.0, ACTOR, "count")
            .await
            .unwrap();
        let reservation = service
            .reserve_stock(TENANT, request(&product, Some(&location), 3.0, "O1"), ACTOR)
            .await
            .unwrap();

        let released = service
            .release_reservation(TENANT, &reservation.id, ACTOR, "order shipped elsewhere")
            .await
            .unwrap();
        assert_eq!(released.status, ReservationStatus::Released);
        assert_eq!(released.released_by.as_deref(), Some(ACTOR));

        let movements = service.list_movements(TENANT, &product.id).await.unwrap();
        let last = movements.last().unwrap();
        assert_eq!(last.movement_type, MovementType::ReservationRelease);
        assert_eq!(last.quantity, 0.0);
        assert!(last.from_location_id.is_none());
        assert!(last.to_location_id.is_none());
        let metadata = last.metadata_json().unwrap();
        assert_eq!(metadata["reservation_id"], reservation.id.as_str());
        assert_eq!(metadata["quantity"], 3.0);

        let stored = service.get_reservation(TENANT, &reservation.id).await.unwrap();
        assert_eq!(stored.status, ReservationStatus::Released);
        assert_eq!(stored.release_reason.as_deref(), Some("order shipped elsewhere"));
    }

    #[tokio::test]
    async fn test_double_release_is_invalid_state() {
        let service = fixtures::service().await;
        let product = fixtures::product(&service, TENANT, "SKU-1", Some(5)).await;
        let location = fixtures::location(&service, TENANT, "WH-A").await;
        service
            .set_location_stock(TENANT, &product.id, &location.id, 10.0, ACTOR, "count")
            .await
            .unwrap();
        let reservation = service
            .reserve_stock(TENANT, request(&product, Some(&location), 3.0, "O1"), ACTOR)
            .await
            .unwrap();
        service
            .release_reservation(TENANT, &reservation.id, ACTOR, "cancelled")
            .await
            .unwrap();

        let err = service
            .release_reservation(TENANT, &reservation.id, ACTOR, "cancelled again")
            .await
            .unwrap_err();
        assert!(matches!(err, InventoryError::Core(CoreError::InvalidState { .. })));
        assert_eq!(ledger_at(&service, &product).await, (10.0, 0.0, 10.0));

        let err = service
            .release_reservation(OTHER_TENANT, &reservation.id, ACTOR, "foreign")
            .await
            .unwrap_err();
        assert!(matches!(err, InventoryError::Core(CoreError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_reserve_rejects_sub_epsilon_excess() {
        let service = fixtures::service().await;
        let product = fixtures::product(&service, TENANT, "SKU-1", Some(5)).await;
        let location = fixtures::location(&service, TENANT, "WH-A").await;
        service
            .set_location_stock(TENANT, &product.id, &location.id, 10.0, ACTOR, "count")
            .await
            .unwrap();

        let err = service
            .reserve_stock(TENANT, request(&product, Some(&location), 10.000_05, "O1"), ACTOR)
            .await
            .unwrap_err();
        assert!(matches!(err, InventoryError::Core(CoreError::InsufficientStock { .. })));
        let err = service
            .reserve_stock(TENANT, request(&product, None, 10.000_05, "O2"), ACTOR)
            .await
            .unwrap_err();
        assert!(matches!(err, InventoryError::Core(CoreError::InsufficientStock { .. })));
        assert_eq!(ledger_at(&service, &product).await, (10.0, 0.0, 10.0));

        service
            .reserve_stock(TENANT, request(&product, Some(&location), 10.0, "O3"), ACTOR)
            .await
            .unwrap();
        assert_eq!(ledger_at(&service, &product).await, (10.0, 10.0, 0.0));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_reserves_queue_on_the_item_lock() {
        let db = fixtures::file_service().await;
        let service = db.service.clone();
        let product = fixtures::product(&service, TENANT, "SKU-1", Some(5)).await;
        let location = fixtures::location(&service, TENANT, "WH-A").await;
        service
            .set_location_stock(TENANT, &product.id, &location.id, 1000.0, ACTOR, "count")
            .await
            .unwrap();

        let handles: Vec<_> = (0..8)
            .map(|n| {
                let service = service.clone();
                let req = request(&product, Some(&location), 1.0, &format!("O{}", n));
                tokio::spawn(async move { service.reserve_stock(TENANT, req, ACTOR).await })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(ledger_at(&service, &product).await, (1000.0, 8.0, 992.0));
        let item = service
            .get_item_for_product(TENANT, &product.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(item.reserved_stock, 8.0);
        assert_eq!(
            service
                .list_reservations(TENANT, &product.id, Some(ReservationStatus::Active))
                .await
                .unwrap()
                .len(),
            8
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_double_release_releases_once() {
        let db = fixtures::file_service().await;
        let service = db.service.clone();
        let product = fixtures::product(&service, TENANT, "SKU-1", Some(5)).await;
        let location = fixtures::location(&service, TENANT, "WH-A").await;
        service
            .set_location_stock(TENANT, &product.id, &location.id, 10.0, ACTOR, "count")
            .await
            .unwrap();
        let reservation = service
            .reserve_stock(TENANT, request(&product, Some(&location), 3.0, "O1"), ACTOR)
            .await
            .unwrap();

        let handles: Vec<_> = (0..2)
            .map(|_| {
                let service = service.clone();
                let id = reservation.id.clone();
                tokio::spawn(async move {
                    service
                        .release_reservation(TENANT, &id, ACTOR, "cancelled")
                        .await
                })
            })
            .collect();
        let mut released = 0;
        let mut rejected = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => released += 1,
                Err(InventoryError::Core(CoreError::InvalidState { .. })) => rejected += 1,
                Err(other) => panic!("unexpected error: {:?}", other),
            }
        }
        assert_eq!((released, rejected), (1, 1));
        assert_eq!(ledger_at(&service, &product).await, (10.0, 0.0, 10.0));

        let releases = service
            .list_movements(TENANT, &product.id)
            .await
            .unwrap()
            .into_iter()
            .filter(|m| m.movement_type == MovementType::ReservationRelease)
            .count();
        assert_eq!(releases, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_reserve_and_release_on_one_item() {
        let db = fixtures::file_service().await;
        let service = db.service.clone();
        let product = fixtures::product(&service, TENANT, "SKU-1", Some(5)).await;
        let location = fixtures::location(&service, TENANT, "WH-A").await;
        service
            .set_location_stock(TENANT, &product.id, &location.id, 20.0, ACTOR, "count")
            .await
            .unwrap();
        let mut held = Vec::new();
        for n in 0..4 {
            let reservation = service
                .reserve_stock(
                    TENANT,
                    request(&product, Some(&location), 2.0, &format!("OLD{}", n)),
                    ACTOR,
                )
                .await
                .unwrap();
            held.push(reservation.id);
        }

        let mut handles = Vec::new();
        for id in held {
            let service = service.clone();
            handles.push(tokio::spawn(async move {
                service
                    .release_reservation(TENANT, &id, ACTOR, "cancelled")
                    .await
                    .map(|_| ())
            }));
        }
        for n in 0..4 {
            let service = service.clone();
            let req = request(&product, Some(&location), 3.0, &format!("NEW{}", n));
            handles.push(tokio::spawn(async move {
                service.reserve_stock(TENANT, req, ACTOR).await.map(|_| ())
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(ledger_at(&service, &product).await, (20.0, 12.0, 8.0));
        let item = service
            .get_item_for_product(TENANT, &product.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(item.reserved_stock, 12.0);
        assert_eq!(item.available_stock, 8.0);
    }

    #[tokio::test]
    async fn test_global_reservation_checks_item_available() {
        let service = fixtures::service().await;
        let product = fixtures::product(&service, TENANT, "SKU-1", Some(5)).await;
        let a = fixtures::location(&service, TENANT, "WH-A").await;
        let b = fixtures::location(&service, TENANT, "WH-B").await;
        service
            .set_location_stock(TENANT, &product.id, &a.id, 20.0, ACTOR, "count")
            .await
            .unwrap();
        service
            .set_location_stock(TENANT, &product.id, &b.id, 10.0, ACTOR, "count")
            .await
            .unwrap();

        let hold = service
            .reserve_stock(TENANT, request(&product, None, 25.0, "O1"), ACTOR)
            .await
            .unwrap();
        assert!(hold.inventory_location_id.is_none());

        let item = service
            .get_item_for_product(TENANT, &product.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(item.current_stock, 30.0);
        assert_eq!(item.reserved_stock, 25.0);
        assert_eq!(item.available_stock, 5.0);

        // location rows are untouched by a global hold
        for row in service.list_location_ledgers(TENANT, &product.id).await.unwrap() {
            assert_eq!(row.stock_reserved, 0.0);
        }

        let err = service
            .reserve_stock(TENANT, request(&product, None, 6.0, "O2"), ACTOR)
            .await
            .unwrap_err();
        assert!(err.is_insufficient_stock());

        service
            .release_reservation(TENANT, &hold.id, ACTOR, "cancelled")
            .await
            .unwrap();
        let item = service
            .get_item_for_product(TENANT, &product.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(item.reserved_stock, 0.0);
        assert_eq!(item.available_stock, 30.0);
    }

    #[tokio::test]
    async fn test_reservations_by_reference_and_expiry() {
        let service = fixtures::service().await;
        let product = fixtures::product(&service, TENANT, "SKU-1", Some(5)).await;
        let location = fixtures::location(&service, TENANT, "WH-A").await;
        service
            .set_location_stock(TENANT, &product.id, &location.id, 10.0, ACTOR, "count")
            .await
            .unwrap();

        let mut expiring = request(&product, Some(&location), 2.0, "O1");
        expiring.expires_at = Some(Utc::now() - Duration::hours(1));
        let expired = service.reserve_stock(TENANT, expiring, ACTOR).await.unwrap();
        service
            .reserve_stock(TENANT, request(&product, Some(&location), 1.0, "O1"), ACTOR)
            .await
            .unwrap();

        let by_ref = service
            .list_reservations_for_reference(TENANT, &ReservationRef::new("order", "O1"))
            .await
            .unwrap();
        assert_eq!(by_ref.len(), 2);

        let swept = service.list_expired_reservations(TENANT, Utc::now()).await.unwrap();
        assert_eq!(swept.len(), 1);
        assert_eq!(swept[0].id, expired.id);

        // expired holds still count until someone releases them
        let item = service
            .get_item_for_product(TENANT, &product.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(item.reserved_stock, 3.0);
    }

    #[tokio::test]
    async fn test_reserve_rejects_bad_input() {
        let service = fixtures::service().await;
        let product = fixtures::product(&service, TENANT, "SKU-1", Some(5)).await;
        let location = fixtures::location(&service, TENANT, "WH-A").await;

        let err = service
            .reserve_stock(TENANT, request(&product, Some(&location), 0.0, "O1"), ACTOR)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            InventoryError::Core(CoreError::Validation(ValidationError::MustBePositive { .. }))
        ));

        let err = service
            .reserve_stock(TENANT, request(&product, Some(&location), 1.0, ""), ACTOR)
            .await
            .unwrap_err();
        assert!(matches!(err, InventoryError::Core(CoreError::Validation(_))));

        service.retire_location(TENANT, &location.id, ACTOR).await.unwrap();
        let err = service
            .reserve_stock(TENANT, request(&product, Some(&location), 1.0, "O1"), ACTOR)
            .await
            .unwrap_err();
        assert!(matches!(err, InventoryError::Core(CoreError::InvalidState { .. })));
    }
}
