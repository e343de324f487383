//! # Unit of Work
//!
//! One sqlx transaction per service call. Repositories are borrowed from the
//! unit of work, so every statement of a call runs on the same connection
//! inside the same transaction.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  let mut uow = db.begin().await?;        BEGIN IMMEDIATE                │
//! │  uow.items().lock_for_update(..)         UPDATE ... lock_version + 1    │
//! │  uow.ledger().save(&row)                 UPDATE inventory_item_locations│
//! │  uow.journal().record_movement(&mv)      INSERT inventory_movements     │
//! │  uow.commit().await?;                    COMMIT                         │
//! │                                                                         │
//! │  any `?` before commit → uow dropped → ROLLBACK                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use sqlx::{Sqlite, Transaction};
use tracing::debug;

use crate::error::{DbError, DbResult};
use crate::repository::alert::AlertRepository;
use crate::repository::count::CountRepository;
use crate::repository::item::ItemRepository;
use crate::repository::journal::JournalRepository;
use crate::repository::ledger::LedgerRepository;
use crate::repository::location::LocationRepository;
use crate::repository::product::ProductRepository;
use crate::repository::reconciliation::ReconciliationRepository;
use crate::repository::reservation::ReservationRepository;

/// An open transaction plus repository accessors.
#[derive(Debug)]
pub struct UnitOfWork {
    tx: Transaction<'static, Sqlite>,
}

impl UnitOfWork {
    pub(crate) fn new(tx: Transaction<'static, Sqlite>) -> Self {
        UnitOfWork { tx }
    }

    pub fn products(&mut self) -> ProductRepository<'_> {
        ProductRepository::new(&mut self.tx)
    }

    pub fn locations(&mut self) -> LocationRepository<'_> {
        LocationRepository::new(&mut self.tx)
    }

    pub fn items(&mut self) -> ItemRepository<'_> {
        ItemRepository::new(&mut self.tx)
    }

    pub fn ledger(&mut self) -> LedgerRepository<'_> {
        LedgerRepository::new(&mut self.tx)
    }

    pub fn reservations(&mut self) -> ReservationRepository<'_> {
        ReservationRepository::new(&mut self.tx)
    }

    /// Movements and adjustments.
    pub fn journal(&mut self) -> JournalRepository<'_> {
        JournalRepository::new(&mut self.tx)
    }

    pub fn reconciliations(&mut self) -> ReconciliationRepository<'_> {
        ReconciliationRepository::new(&mut self.tx)
    }

    pub fn alerts(&mut self) -> AlertRepository<'_> {
        AlertRepository::new(&mut self.tx)
    }

    pub fn counts(&mut self) -> CountRepository<'_> {
        CountRepository::new(&mut self.tx)
    }

    /// Makes every write of this unit of work visible atomically.
    pub async fn commit(self) -> DbResult<()> {
        self.tx
            .commit()
            .await
            .map_err(|e| match DbError::from(e) {
                DbError::Internal(msg) => DbError::TransactionFailed(msg),
                other => other,
            })?;
        debug!("Unit of work committed");
        Ok(())
    }

    /// Discards every write of this unit of work.
    ///
    /// Dropping does the same; this just makes it explicit and surfaces
    /// errors.
    pub async fn rollback(self) -> DbResult<()> {
        self.tx
            .rollback()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;
        debug!("Unit of work rolled back");
        Ok(())
    }
}
