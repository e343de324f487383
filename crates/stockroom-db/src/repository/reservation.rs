//! # Reservation Repository
//!
//! Holds against a location or, with a null location, against the item as a
//! whole. A reservation is written once as `active` and updated once to
//! `released`; the release update is guarded on the status so a second
//! release can never apply.

use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;
use tracing::debug;

use crate::error::DbResult;
use stockroom_core::{InventoryReservation, ReservationStatus};

const RESERVATION_COLUMNS: &str = r#"
    id, tenant_id, inventory_item_id, inventory_location_id, quantity, status,
    reserved_for_type, reserved_for_id, reserved_at, expires_at, reserved_by,
    released_at, released_by, release_reason
"#;

#[derive(Debug)]
pub struct ReservationRepository<'c> {
    conn: &'c mut SqliteConnection,
}

impl<'c> ReservationRepository<'c> {
    pub fn new(conn: &'c mut SqliteConnection) -> Self {
        ReservationRepository { conn }
    }

    pub async fn get(
        &mut self,
        tenant_id: &str,
        id: &str,
    ) -> DbResult<Option<InventoryReservation>> {
        let sql = format!(
            "SELECT {} FROM inventory_reservations WHERE tenant_id = ?1 AND id = ?2",
            RESERVATION_COLUMNS
        );
        let reservation = sqlx::query_as::<_, InventoryReservation>(&sql)
            .bind(tenant_id)
            .bind(id)
            .fetch_optional(&mut *self.conn)
            .await?;
        Ok(reservation)
    }

    pub async fn insert(&mut self, reservation: &InventoryReservation) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO inventory_reservations (
                id, tenant_id, inventory_item_id, inventory_location_id, quantity, status,
                reserved_for_type, reserved_for_id, reserved_at, expires_at, reserved_by,
                released_at, released_by, release_reason
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
            "#,
        )
        .bind(&reservation.id)
        .bind(&reservation.tenant_id)
        .bind(&reservation.inventory_item_id)
        .bind(&reservation.inventory_location_id)
        .bind(reservation.quantity)
        .bind(reservation.status)
        .bind(&reservation.reserved_for_type)
        .bind(&reservation.reserved_for_id)
        .bind(reservation.reserved_at)
        .bind(reservation.expires_at)
        .bind(&reservation.reserved_by)
        .bind(reservation.released_at)
        .bind(&reservation.released_by)
        .bind(&reservation.release_reason)
        .execute(&mut *self.conn)
        .await?;

        debug!(
            reservation_id = %reservation.id,
            reference = %reservation.reference(),
            quantity = reservation.quantity,
            "Inserted reservation"
        );
        Ok(())
    }

    /// Flips an active reservation to released.
    ///
    /// Returns `false` when the row was not active (already released, or
    /// unknown for this tenant). Nothing is written in that case.
    pub async fn mark_released(
        &mut self,
        tenant_id: &str,
        id: &str,
        actor: &str,
        reason: &str,
        now: DateTime<Utc>,
    ) -> DbResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE inventory_reservations
            SET status = ?3, released_at = ?4, released_by = ?5, release_reason = ?6
            WHERE tenant_id = ?1 AND id = ?2 AND status = ?7
            "#,
        )
        .bind(tenant_id)
        .bind(id)
        .bind(ReservationStatus::Released)
        .bind(now)
        .bind(actor)
        .bind(reason)
        .bind(ReservationStatus::Active)
        .execute(&mut *self.conn)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Sum of active holds on the item with no location.
    pub async fn sum_active_global(&mut self, tenant_id: &str, item_id: &str) -> DbResult<f64> {
        let total: f64 = sqlx::query_scalar(
            r#"
            SELECT TOTAL(quantity) FROM inventory_reservations
            WHERE tenant_id = ?1 AND inventory_item_id = ?2
              AND inventory_location_id IS NULL AND status = 'active'
            "#,
        )
        .bind(tenant_id)
        .bind(item_id)
        .fetch_one(&mut *self.conn)
        .await?;
        Ok(total)
    }

    /// Reservations of one item, newest first, optionally by status.
    pub async fn list_for_item(
        &mut self,
        tenant_id: &str,
        item_id: &str,
        status: Option<ReservationStatus>,
    ) -> DbResult<Vec<InventoryReservation>> {
        let sql = format!(
            r#"
            SELECT {} FROM inventory_reservations
            WHERE tenant_id = ?1 AND inventory_item_id = ?2 AND (?3 IS NULL OR status = ?3)
            ORDER BY reserved_at DESC, id
            "#,
            RESERVATION_COLUMNS
        );
        let reservations = sqlx::query_as::<_, InventoryReservation>(&sql)
            .bind(tenant_id)
            .bind(item_id)
            .bind(status)
            .fetch_all(&mut *self.conn)
            .await?;
        Ok(reservations)
    }

    /// Reservations held for one external reference, e.g. ("order", "O-1").
    pub async fn list_for_reference(
        &mut self,
        tenant_id: &str,
        kind: &str,
        reference_id: &str,
    ) -> DbResult<Vec<InventoryReservation>> {
        let sql = format!(
            r#"
            SELECT {} FROM inventory_reservations
            WHERE tenant_id = ?1 AND reserved_for_type = ?2 AND reserved_for_id = ?3
            ORDER BY reserved_at, id
            "#,
            RESERVATION_COLUMNS
        );
        let reservations = sqlx::query_as::<_, InventoryReservation>(&sql)
            .bind(tenant_id)
            .bind(kind)
            .bind(reference_id)
            .fetch_all(&mut *self.conn)
            .await?;
        Ok(reservations)
    }

    /// Every active reservation of the tenant carrying an expiry.
    ///
    /// Expiry is compared in Rust; timestamps are stored as text.
    pub async fn list_active_with_expiry(
        &mut self,
        tenant_id: &str,
    ) -> DbResult<Vec<InventoryReservation>> {
        let sql = format!(
            r#"
            SELECT {} FROM inventory_reservations
            WHERE tenant_id = ?1 AND status = 'active' AND expires_at IS NOT NULL
            ORDER BY inventory_item_id, id
            "#,
            RESERVATION_COLUMNS
        );
        let reservations = sqlx::query_as::<_, InventoryReservation>(&sql)
            .bind(tenant_id)
            .fetch_all(&mut *self.conn)
            .await?;
        Ok(reservations)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::fixtures::{self, TENANT};
    use chrono::Duration;
    use stockroom_core::new_id;

    fn reservation(item_id: &str, location_id: Option<&str>, quantity: f64) -> InventoryReservation {
        InventoryReservation {
            id: new_id(),
            tenant_id: TENANT.to_string(),
            inventory_item_id: item_id.to_string(),
            inventory_location_id: location_id.map(str::to_string),
            quantity,
            status: ReservationStatus::Active,
            reserved_for_type: "order".to_string(),
            reserved_for_id: "O-1".to_string(),
            reserved_at: Utc::now(),
            expires_at: None,
            reserved_by: "tester".to_string(),
            released_at: None,
            released_by: None,
            release_reason: None,
        }
    }

    #[tokio::test]
    async fn test_release_applies_once() {
        let db = fixtures::db().await;
        let mut uow = db.begin().await.unwrap();
        let (_, item, _) = fixtures::seed(&mut uow, TENANT).await;
        let r = reservation(&item.id, None, 4.0);
        uow.reservations().insert(&r).await.unwrap();

        let now = Utc::now();
        assert!(uow
            .reservations()
            .mark_released(TENANT, &r.id, "tester", "order cancelled", now)
            .await
            .unwrap());
        assert!(!uow
            .reservations()
            .mark_released(TENANT, &r.id, "tester", "again", now)
            .await
            .unwrap());

        let stored = uow.reservations().get(TENANT, &r.id).await.unwrap().unwrap();
        assert_eq!(stored.status, ReservationStatus::Released);
        assert_eq!(stored.release_reason.as_deref(), Some("order cancelled"));
    }

    #[tokio::test]
    async fn test_global_sum_ignores_location_and_released() {
        let db = fixtures::db().await;
        let mut uow = db.begin().await.unwrap();
        let (_, item, location) = fixtures::seed(&mut uow, TENANT).await;

        uow.reservations()
            .insert(&reservation(&item.id, None, 4.0))
            .await
            .unwrap();
        uow.reservations()
            .insert(&reservation(&item.id, None, 6.0))
            .await
            .unwrap();
        uow.reservations()
            .insert(&reservation(&item.id, Some(&location.id), 50.0))
            .await
            .unwrap();
        let released = reservation(&item.id, None, 100.0);
        uow.reservations().insert(&released).await.unwrap();
        uow.reservations()
            .mark_released(TENANT, &released.id, "tester", "done", Utc::now())
            .await
            .unwrap();

        let sum = uow
            .reservations()
            .sum_active_global(TENANT, &item.id)
            .await
            .unwrap();
        assert_eq!(sum, 10.0);

        let active = uow
            .reservations()
            .list_for_item(TENANT, &item.id, Some(ReservationStatus::Active))
            .await
            .unwrap();
        assert_eq!(active.len(), 3);
        let all = uow
            .reservations()
            .list_for_item(TENANT, &item.id, None)
            .await
            .unwrap();
        assert_eq!(all.len(), 4);
    }

    #[tokio::test]
    async fn test_list_active_with_expiry() {
        let db = fixtures::db().await;
        let mut uow = db.begin().await.unwrap();
        let (_, item, _) = fixtures::seed(&mut uow, TENANT).await;

        let mut expiring = reservation(&item.id, None, 1.0);
        expiring.expires_at = Some(Utc::now() - Duration::minutes(5));
        uow.reservations().insert(&expiring).await.unwrap();
        uow.reservations()
            .insert(&reservation(&item.id, None, 1.0))
            .await
            .unwrap();

        let listed = uow
            .reservations()
            .list_active_with_expiry(TENANT)
            .await
            .unwrap();
        assert_eq!(listed.len(), 1);
        assert!(listed[0].is_expired(Utc::now()));

        let by_ref = uow
            .reservations()
            .list_for_reference(TENANT, "order", "O-1")
            .await
            .unwrap();
        assert_eq!(by_ref.len(), 2);
    }
}
