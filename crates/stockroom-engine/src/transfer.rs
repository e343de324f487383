//! # Transfer Orchestrator
//!
//! Moves on-hand stock between two locations of the same item in one unit
//! of work. Balance-preserving: one `transfer` movement, no adjustment.

use chrono::Utc;
use tracing::info;

use crate::aggregate::refresh_aggregates;
use crate::alerts::evaluate_alerts;
use crate::error::InventoryResult;
use crate::items::lock_item_for_product;
use crate::service::{ensure_ledger_row, require_active_location, InventoryService};
use stockroom_core::validation::{
    validate_actor, validate_distinct_locations, validate_positive_quantity, validate_reason,
};
use stockroom_core::{new_id, InventoryItem, InventoryItemLocation, InventoryMovement, MovementType};

#[derive(Debug, Clone)]
pub struct TransferRequest {
    pub product_id: String,
    pub from_location_id: String,
    pub to_location_id: String,
    pub quantity: f64,
    pub reason: String,
}

#[derive(Debug, Clone)]
pub struct TransferOutcome {
    pub item: InventoryItem,
    pub from: InventoryItemLocation,
    pub to: InventoryItemLocation,
    pub movement: InventoryMovement,
}

impl InventoryService {
    /// Moves `quantity` of on-hand stock from one location to another.
    ///
    /// Fails with `InsufficientStock` when the source holds less than
    /// `quantity` on hand. Reserved stock at the source is not protected;
    /// the source's available floors at zero.
    pub async fn transfer_stock(
        &self,
        tenant_id: &str,
        request: TransferRequest,
        actor: &str,
    ) -> InventoryResult<TransferOutcome> {
        validate_actor(tenant_id, actor)?;
        validate_distinct_locations(&request.from_location_id, &request.to_location_id)?;
        validate_positive_quantity("quantity", request.quantity)?;
        validate_reason(&request.reason)?;

        let now = Utc::now();
        let mut uow = self.db.begin().await?;
        let source =
            require_active_location(&mut uow, tenant_id, &request.from_location_id, "transfer")
                .await?;
        let destination =
            require_active_location(&mut uow, tenant_id, &request.to_location_id, "transfer")
                .await?;
        let (product, mut item) = lock_item_for_product(
            &mut uow,
            &self.config.items,
            tenant_id,
            &request.product_id,
            actor,
            now,
        )
        .await?;

        let mut from = ensure_ledger_row(&mut uow, tenant_id, &item.id, &source.id, now).await?;
        let mut to = ensure_ledger_row(&mut uow, tenant_id, &item.id, &destination.id, now).await?;

        from.withdraw(request.quantity, now)
            .map_err(|shortfall| shortfall.into_error(&product.sku, Some(&source.code)))?;
        to.receive(request.quantity, now);
        uow.ledger().save(&from).await?;
        uow.ledger().save(&to).await?;

        let movement = InventoryMovement {
            id: new_id(),
            tenant_id: tenant_id.to_string(),
            inventory_item_id: item.id.clone(),
            from_location_id: Some(source.id.clone()),
            to_location_id: Some(destination.id.clone()),
            quantity: request.quantity,
            movement_type: MovementType::Transfer,
            reason: request.reason.clone(),
            metadata: None,
            performed_by: actor.to_string(),
            performed_at: now,
        };
        uow.journal().record_movement(&movement).await?;

        refresh_aggregates(&mut uow, &mut item, &product, actor, now).await?;
        evaluate_alerts(&mut uow, &item, Some(&source.id), actor, now).await?;
        evaluate_alerts(&mut uow, &item, Some(&destination.id), actor, now).await?;
        uow.commit().await?;

        info!(
            tenant_id,
            sku = %product.sku,
            from = %source.code,
            to = %destination.code,
            quantity = request.quantity,
            "Stock transferred"
        );
        Ok(TransferOutcome {
            item,
            from,
            to,
            movement,
        })
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::fixtures::{self, ACTOR, TENANT};
    use crate::InventoryError;
    use stockroom_core::{CoreError, InventoryLocation, Product, ValidationError};

    fn request(
        product: &Product,
        from: &InventoryLocation,
        to: &InventoryLocation,
        qty: f64,
    ) -> TransferRequest {
        TransferRequest {
            product_id: product.id.clone(),
            from_location_id: from.id.clone(),
            to_location_id: to.id.clone(),
            quantity: qty,
            reason: "rebalance".to_string(),
        }
    }

    #[tokio::test]
    async fn test_transfer_preserves_total_on_hand() {
        let service = fixtures::service().await;
        let product = fixtures::product(&service, TENANT, "SKU-1", Some(5)).await;
        let a = fixtures::location(&service, TENANT, "WH-A").await;
        let b = fixtures::location(&service, TENANT, "WH-B").await;
        service
            .set_location_stock(TENANT, &product.id, &a.id, 40.0, ACTOR, "count")
            .await
            .unwrap();

        let outcome = service
            .transfer_stock(TENANT, request(&product, &a, &b, 15.0), ACTOR)
            .await
            .unwrap();
        assert_eq!(outcome.from.stock_on_hand, 25.0);
        assert_eq!(outcome.to.stock_on_hand, 15.0);
        assert_eq!(outcome.from.stock_on_hand + outcome.to.stock_on_hand, 40.0);
        assert_eq!(outcome.to.stock_available, 15.0);
        assert_eq!(outcome.item.current_stock, 40.0);

        assert_eq!(outcome.movement.movement_type, MovementType::Transfer);
        assert_eq!(outcome.movement.from_location_id.as_deref(), Some(a.id.as_str()));
        assert_eq!(outcome.movement.to_location_id.as_deref(), Some(b.id.as_str()));
        assert_eq!(outcome.movement.quantity, 15.0);

        // one adjustment from the opening count, none from the transfer
        assert_eq!(service.list_adjustments(TENANT, &product.id).await.unwrap().len(), 1);
        assert_eq!(service.list_movements(TENANT, &product.id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_transfer_more_than_on_hand_fails() {
        let service = fixtures::service().await;
        let product = fixtures::product(&service, TENANT, "SKU-1", Some(5)).await;
        let a = fixtures::location(&service, TENANT, "WH-A").await;
        let b = fixtures::location(&service, TENANT, "WH-B").await;
        service
            .set_location_stock(TENANT, &product.id, &a.id, 5.0, ACTOR, "count")
            .await
            .unwrap();

        let err = service
            .transfer_stock(TENANT, request(&product, &a, &b, 8.0), ACTOR)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            InventoryError::Core(CoreError::InsufficientStock { requested, available, ref location, .. })
                if requested == 8.0 && available == 5.0 && location.as_deref() == Some("WH-A")
        ));

        // destination row was not created
        let rows = service.list_location_ledgers(TENANT, &product.id).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].stock_on_hand, 5.0);
    }

    #[tokio::test]
    async fn test_transfer_rejects_sub_epsilon_excess() {
        let service = fixtures::service().await;
        let product = fixtures::product(&service, TENANT, "SKU-1", Some(5)).await;
        let a = fixtures::location(&service, TENANT, "WH-A").await;
        let b = fixtures::location(&service, TENANT, "WH-B").await;
        service
            .set_location_stock(TENANT, &product.id, &a.id, 10.0, ACTOR, "count")
            .await
            .unwrap();

        let err = service
            .transfer_stock(TENANT, request(&product, &a, &b, 10.000_05), ACTOR)
            .await
            .unwrap_err();
        assert!(matches!(err, InventoryError::Core(CoreError::InsufficientStock { .. })));

        let outcome = service
            .transfer_stock(TENANT, request(&product, &a, &b, 10.0), ACTOR)
            .await
            .unwrap();
        assert_eq!(outcome.from.stock_on_hand + outcome.to.stock_on_hand, 10.0);
        assert_eq!(outcome.item.current_stock, 10.0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_transfers_never_overdraw() {
        let db = fixtures::file_service().await;
        let service = db.service.clone();
        let product = fixtures::product(&service, TENANT, "SKU-1", Some(5)).await;
        let a = fixtures::location(&service, TENANT, "WH-A").await;
        let b = fixtures::location(&service, TENANT, "WH-B").await;
        service
            .set_location_stock(TENANT, &product.id, &a.id, 10.0, ACTOR, "count")
            .await
            .unwrap();

        let handles: Vec<_> = (0..6)
            .map(|_| {
                let service = service.clone();
                let req = request(&product, &a, &b, 3.0);
                tokio::spawn(async move { service.transfer_stock(TENANT, req, ACTOR).await })
            })
            .collect();
        let mut moved = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => moved += 1,
                Err(InventoryError::Core(CoreError::InsufficientStock { .. })) => {}
                Err(other) => panic!("unexpected error: {:?}", other),
            }
        }
        assert_eq!(moved, 3);

        let rows = service.list_location_ledgers(TENANT, &product.id).await.unwrap();
        let on_hand: f64 = rows.iter().map(|r| r.stock_on_hand).sum();
        assert_eq!(on_hand, 10.0);
        let at_a = rows.iter().find(|r| r.inventory_location_id == a.id).unwrap();
        assert_eq!(at_a.stock_on_hand, 1.0);
    }

    #[tokio::test]
    async fn test_transfer_rejects_same_location_and_bad_quantity() {
        let service = fixtures::service().await;
        let product = fixtures::product(&service, TENANT, "SKU-1", Some(5)).await;
        let a = fixtures::location(&service, TENANT, "WH-A").await;
        let b = fixtures::location(&service, TENANT, "WH-B").await;

        let err = service
            .transfer_stock(TENANT, request(&product, &a, &a, 1.0), ACTOR)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            InventoryError::Core(CoreError::Validation(ValidationError::SameLocation { .. }))
        ));

        let err = service
            .transfer_stock(TENANT, request(&product, &a, &b, -2.0), ACTOR)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            InventoryError::Core(CoreError::Validation(ValidationError::MustBePositive { .. }))
        ));
    }

    #[tokio::test]
    async fn test_transfer_evaluates_alerts_at_both_locations() {
        let service = fixtures::service().await;
        let product = fixtures::product(&service, TENANT, "SKU-1", Some(50)).await;
        let a = fixtures::location(&service, TENANT, "WH-A").await;
        let b = fixtures::location(&service, TENANT, "WH-B").await;
        service
            .set_location_stock(TENANT, &product.id, &a.id, 10.0, ACTOR, "count")
            .await
            .unwrap();

        service
            .transfer_stock(TENANT, request(&product, &a, &b, 4.0), ACTOR)
            .await
            .unwrap();

        let open = service.list_open_alerts(TENANT, Some(&product.id)).await.unwrap();
        let mut at: Vec<_> = open
            .iter()
            .filter_map(|alert| alert.inventory_location_id.clone())
            .collect();
        at.sort();
        let mut expected = vec![a.id.clone(), b.id.clone()];
        expected.sort();
        assert_eq!(at, expected);
    }
}
