//! # Unit of Work
//!
//! One SQLite transaction with typed repository accessors.
//!
//! ## Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  let mut uow = db.begin().await?;     BEGIN + bump tx_gate              │
//! │       │                                (write lock held from here)      │
//! │       ▼                                                                 │
//! │  uow.stock().reserve(..).await?;      ─┐                                │
//! │  uow.cash().append_entry(..).await?;   │ any `?` drops uow → ROLLBACK   │
//! │  uow.sales().insert_sale(..).await?;  ─┘                                │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  uow.commit().await?;                 COMMIT, lock released             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! SQLite has no row locks. Bumping the single `tx_gate` row as the very
//! first statement takes the database write lock before anything is read,
//! so every check made inside the unit stays true until commit. Lock waits
//! are bounded by `busy_timeout`.
//!
//! SQLite allows one writer per database file, so the gate is global:
//! writers from different drawer sessions or accounts also queue behind
//! each other for the length of one unit of work. Reads (`begin_read`)
//! never take the gate. Independence across sessions holds for data, not
//! for lock waits; a backend with row locks could gate per row instead.

use sqlx::{Sqlite, SqlitePool, Transaction};
use tracing::trace;

use crate::error::DbResult;
use crate::repository::{
    CashRepository, CustomerRepository, OutboxRepository, PayableRepository, ProductRepository,
    RateRepository, ReceivableRepository, SaleRepository, StockRepository, SupplierRepository,
    TicketRepository,
};

/// A database transaction. Rolled back on drop unless committed.
pub struct UnitOfWork {
    tx: Transaction<'static, Sqlite>,
}

impl UnitOfWork {
    pub(crate) async fn begin_write(pool: &SqlitePool) -> DbResult<Self> {
        let mut tx = pool.begin().await?;
        sqlx::query("UPDATE tx_gate SET generation = generation + 1 WHERE id = 1")
            .execute(&mut *tx)
            .await?;
        trace!("write unit of work started");
        Ok(UnitOfWork { tx })
    }

    pub(crate) async fn begin_read(pool: &SqlitePool) -> DbResult<Self> {
        let tx = pool.begin().await?;
        Ok(UnitOfWork { tx })
    }

    /// Commits every change made through this unit.
    pub async fn commit(self) -> DbResult<()> {
        self.tx.commit().await?;
        trace!("unit of work committed");
        Ok(())
    }

    /// Discards every change made through this unit.
    pub async fn rollback(self) -> DbResult<()> {
        self.tx.rollback().await?;
        Ok(())
    }

    // =========================================================================
    // Repositories
    // =========================================================================

    pub fn products(&mut self) -> ProductRepository<'_> {
        ProductRepository::new(&mut self.tx)
    }

    pub fn stock(&mut self) -> StockRepository<'_> {
        StockRepository::new(&mut self.tx)
    }

    pub fn rates(&mut self) -> RateRepository<'_> {
        RateRepository::new(&mut self.tx)
    }

    pub fn cash(&mut self) -> CashRepository<'_> {
        CashRepository::new(&mut self.tx)
    }

    pub fn sales(&mut self) -> SaleRepository<'_> {
        SaleRepository::new(&mut self.tx)
    }

    pub fn tickets(&mut self) -> TicketRepository<'_> {
        TicketRepository::new(&mut self.tx)
    }

    pub fn customers(&mut self) -> CustomerRepository<'_> {
        CustomerRepository::new(&mut self.tx)
    }

    pub fn suppliers(&mut self) -> SupplierRepository<'_> {
        SupplierRepository::new(&mut self.tx)
    }

    pub fn receivables(&mut self) -> ReceivableRepository<'_> {
        ReceivableRepository::new(&mut self.tx)
    }

    pub fn payables(&mut self) -> PayableRepository<'_> {
        PayableRepository::new(&mut self.tx)
    }

    pub fn outbox(&mut self) -> OutboxRepository<'_> {
        OutboxRepository::new(&mut self.tx)
    }
}
