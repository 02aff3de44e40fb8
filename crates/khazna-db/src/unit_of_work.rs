//! # Unit of Work
//!
//! The single transaction boundary every multi-ledger operation runs inside.
//!
//! ## Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  UnitOfWork::begin(pool, "edit_sale")                                  │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  InventoryRepository::apply_movement_in(uow.conn(), ..)                │
//! │  SaleRepository::create_sale_in(uow.conn(), ..)                        │
//! │  CashboxRepository::record_transaction_in(uow.conn(), ..)              │
//! │  CustomerRepository::adjust_balance_in(uow.conn(), ..)                 │
//! │       │                                                                 │
//! │       ├── all Ok  ──► uow.commit()    every write visible at once      │
//! │       └── any Err ──► uow.rollback()  database as before begin()       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Dropping a `UnitOfWork` without committing rolls it back as well, so an
//! early `?` return can never leave a half-applied unit behind.

use sqlx::{Sqlite, SqliteConnection, SqlitePool, Transaction};
use tracing::{debug, warn};

use crate::error::{DbError, DbResult};

pub struct UnitOfWork {
    tx: Transaction<'static, Sqlite>,
    label: &'static str,
}

impl UnitOfWork {
    /// Opens a transaction on a pooled connection.
    pub async fn begin(pool: &SqlitePool, label: &'static str) -> DbResult<Self> {
        let tx = pool.begin().await.map_err(|e| match DbError::from(e) {
            DbError::Internal(msg) | DbError::QueryFailed(msg) => DbError::TransactionFailed(msg),
            other => other,
        })?;
        debug!(unit = label, "Unit of work started");
        Ok(UnitOfWork { tx, label })
    }

    /// The connection every ledger call in this unit must use.
    pub fn conn(&mut self) -> &mut SqliteConnection {
        &mut *self.tx
    }

    pub async fn commit(self) -> DbResult<()> {
        let label = self.label;
        self.tx
            .commit()
            .await
            .map_err(|e| match DbError::from(e) {
                DbError::Busy(msg) => DbError::Busy(msg),
                other => DbError::TransactionFailed(other.to_string()),
            })?;
        debug!(unit = label, "Unit of work committed");
        Ok(())
    }

    pub async fn rollback(self) -> DbResult<()> {
        let label = self.label;
        self.tx
            .rollback()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;
        debug!(unit = label, "Unit of work rolled back");
        Ok(())
    }

    /// Commits on `Ok`, rolls back on `Err`, and hands the result back.
    ///
    /// ```rust,ignore
    /// let mut uow = UnitOfWork::begin(&pool, "apply_movement").await?;
    /// let result = InventoryRepository::apply_movement_in(uow.conn(), &req).await;
    /// uow.finish(result).await
    /// ```
    pub async fn finish<T>(self, result: DbResult<T>) -> DbResult<T> {
        match result {
            Ok(value) => {
                self.commit().await?;
                Ok(value)
            }
            Err(err) => {
                self.abandon(&err).await;
                Err(err)
            }
        }
    }

    /// Rolls back after a failed step, keeping the step's error.
    ///
    /// A failing rollback is logged; the connection is discarded by the
    /// pool and SQLite discards the open transaction with it.
    pub async fn abandon(self, cause: &DbError) {
        let label = self.label;
        warn!(unit = label, error = %cause, "Rolling back unit of work");
        if let Err(e) = self.rollback().await {
            warn!(unit = label, error = %e, "Rollback failed");
        }
    }
}
