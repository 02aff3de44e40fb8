//! # Cashbox Ledger
//!
//! Two-currency cash balances and the transaction log behind them.
//!
//! ## Recording a Transaction
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  CashboxEntry { tx_type: Sale, amount_lyd: +2000, amount_usd: 0 }      │
//! │       │                                                                 │
//! │       ▼  sign checked against tx_type                                  │
//! │  UPDATE cashboxes SET balance_lyd += 2000, balance_usd += 0             │
//! │  RETURNING balance_usd, balance_lyd           ← the after-balances     │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  INSERT cashbox_transactions (.., balance_usd_after, balance_lyd_after)│
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Each balance equals the sum of its column over the cashbox's log.
//! Balances may go negative; there is no overdraft rule.

use chrono::Utc;
use khazna_core::validation::{validate_positive, validate_required};
use khazna_core::{
    Cashbox, CashboxTransaction, CashboxTxType, CoreError, Currency, ExchangeRate, Expense,
    Money, ValidationError,
};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};
use uuid::Uuid;

use super::Reference;
use crate::error::DbResult;
use crate::unit_of_work::UnitOfWork;

const TX_COLUMNS: &str = "id, cashbox_id, tx_type, amount_usd_cents, amount_lyd_cents, \
     exchange_rate_micros, balance_usd_after_cents, balance_lyd_after_cents, description, \
     reference_type, reference_id, created_by, created_at";

// =============================================================================
// Entries
// =============================================================================

/// A cash movement to record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CashboxEntry {
    pub cashbox_id: String,
    pub tx_type: CashboxTxType,
    pub amount_usd_cents: i64,
    pub amount_lyd_cents: i64,
    pub exchange_rate_micros: Option<i64>,
    pub description: String,
    pub reference_type: Option<String>,
    pub reference_id: Option<String>,
    pub created_by: Option<String>,
}

impl CashboxEntry {
    /// An entry moving `amount` (signed) in `currency`'s column only.
    pub fn new(
        cashbox_id: impl Into<String>,
        tx_type: CashboxTxType,
        currency: Currency,
        amount: Money,
        description: impl Into<String>,
    ) -> Self {
        let (amount_usd_cents, amount_lyd_cents) = match currency {
            Currency::Usd => (amount.cents(), 0),
            Currency::Lyd => (0, amount.cents()),
        };
        CashboxEntry {
            cashbox_id: cashbox_id.into(),
            tx_type,
            amount_usd_cents,
            amount_lyd_cents,
            exchange_rate_micros: None,
            description: description.into(),
            reference_type: None,
            reference_id: None,
            created_by: None,
        }
    }

    pub fn with_rate(mut self, rate: Option<ExchangeRate>) -> Self {
        self.exchange_rate_micros = rate.map(|r| r.micros());
        self
    }

    pub fn with_reference(mut self, reference: Reference<'_>) -> Self {
        self.reference_type = Some(reference.kind.to_string());
        self.reference_id = Some(reference.id.to_string());
        self
    }

    pub fn created_by(mut self, user: impl Into<String>) -> Self {
        self.created_by = Some(user.into());
        self
    }

    fn validate(&self) -> Result<(), ValidationError> {
        validate_required("cashbox_id", &self.cashbox_id)?;
        validate_required("description", &self.description)?;
        if self.amount_usd_cents == 0 && self.amount_lyd_cents == 0 {
            return Err(ValidationError::Inconsistent {
                field: "amount".to_string(),
                reason: "a cash entry must move money".to_string(),
            });
        }
        if !self.tx_type.permits(self.amount_usd_cents)
            || !self.tx_type.permits(self.amount_lyd_cents)
        {
            return Err(ValidationError::Inconsistent {
                field: "amount".to_string(),
                reason: format!("sign does not match a {:?} entry", self.tx_type),
            });
        }
        Ok(())
    }
}

/// An expense paid out of a cashbox.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpenseRequest {
    pub cashbox_id: String,
    pub category: String,
    pub description: String,
    /// Positive; the cash entry carries the negated amount.
    pub amount_cents: i64,
    pub currency: Currency,
    pub created_by: Option<String>,
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for cashboxes, their transaction log and expenses.
#[derive(Debug, Clone)]
pub struct CashboxRepository {
    pool: SqlitePool,
}

impl CashboxRepository {
    pub fn new(pool: SqlitePool) -> Self {
        CashboxRepository { pool }
    }

    /// Gets a cashbox; missing is `CashboxNotFound`.
    pub async fn get_cashbox(&self, id: &str) -> DbResult<Cashbox> {
        let mut conn = self.pool.acquire().await?;
        Self::fetch_cashbox_in(&mut *conn, id).await
    }

    pub async fn fetch_cashbox_in(conn: &mut SqliteConnection, id: &str) -> DbResult<Cashbox> {
        sqlx::query_as::<_, Cashbox>(
            "SELECT id, name, balance_usd_cents, balance_lyd_cents, version, updated_at \
             FROM cashboxes WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(conn)
        .await?
        .ok_or_else(|| CoreError::CashboxNotFound(id.to_string()).into())
    }

    /// Opens a new, empty cashbox.
    pub async fn open_cashbox(&self, id: &str, name: &str) -> DbResult<Cashbox> {
        validate_required("id", id)?;
        validate_required("name", name)?;
        sqlx::query(
            "INSERT INTO cashboxes (id, name, balance_usd_cents, balance_lyd_cents, version, updated_at) \
             VALUES (?1, ?2, 0, 0, 1, ?3)",
        )
        .bind(id)
        .bind(name)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        info!(cashbox_id = %id, "Cashbox opened");
        self.get_cashbox(id).await
    }

    /// Records one transaction in its own unit of work.
    pub async fn record_transaction(&self, entry: &CashboxEntry) -> DbResult<CashboxTransaction> {
        let mut uow = UnitOfWork::begin(&self.pool, "record_transaction").await?;
        let result = Self::record_transaction_in(uow.conn(), entry).await;
        uow.finish(result).await
    }

    /// Moves both balances by the entry's amounts and appends the log row.
    ///
    /// ## Errors
    /// - `ValidationError` for an all-zero entry or a sign the type forbids
    /// - `CashboxNotFound` when the cashbox does not exist
    pub async fn record_transaction_in(
        conn: &mut SqliteConnection,
        entry: &CashboxEntry,
    ) -> DbResult<CashboxTransaction> {
        entry.validate()?;
        let now = Utc::now();

        let balances: Option<(i64, i64)> = sqlx::query_as(
            r#"
            UPDATE cashboxes
            SET balance_usd_cents = balance_usd_cents + ?1,
                balance_lyd_cents = balance_lyd_cents + ?2,
                version = version + 1,
                updated_at = ?3
            WHERE id = ?4
            RETURNING balance_usd_cents, balance_lyd_cents
            "#,
        )
        .bind(entry.amount_usd_cents)
        .bind(entry.amount_lyd_cents)
        .bind(now)
        .bind(&entry.cashbox_id)
        .fetch_optional(&mut *conn)
        .await?;

        let (usd_after, lyd_after) =
            balances.ok_or_else(|| CoreError::CashboxNotFound(entry.cashbox_id.clone()))?;

        let tx = CashboxTransaction {
            id: Uuid::new_v4().to_string(),
            cashbox_id: entry.cashbox_id.clone(),
            tx_type: entry.tx_type,
            amount_usd_cents: entry.amount_usd_cents,
            amount_lyd_cents: entry.amount_lyd_cents,
            exchange_rate_micros: entry.exchange_rate_micros,
            balance_usd_after_cents: usd_after,
            balance_lyd_after_cents: lyd_after,
            description: entry.description.clone(),
            reference_type: entry.reference_type.clone(),
            reference_id: entry.reference_id.clone(),
            created_by: entry.created_by.clone(),
            created_at: now,
        };

        sqlx::query(
            r#"
            INSERT INTO cashbox_transactions (
                id, cashbox_id, tx_type, amount_usd_cents, amount_lyd_cents,
                exchange_rate_micros, balance_usd_after_cents, balance_lyd_after_cents,
                description, reference_type, reference_id, created_by, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
            "#,
        )
        .bind(&tx.id)
        .bind(&tx.cashbox_id)
        .bind(tx.tx_type)
        .bind(tx.amount_usd_cents)
        .bind(tx.amount_lyd_cents)
        .bind(tx.exchange_rate_micros)
        .bind(tx.balance_usd_after_cents)
        .bind(tx.balance_lyd_after_cents)
        .bind(&tx.description)
        .bind(&tx.reference_type)
        .bind(&tx.reference_id)
        .bind(&tx.created_by)
        .bind(tx.created_at)
        .execute(conn)
        .await?;

        debug!(
            cashbox_id = %tx.cashbox_id,
            tx_type = ?tx.tx_type,
            usd = tx.amount_usd_cents,
            lyd = tx.amount_lyd_cents,
            "Cashbox transaction recorded"
        );

        Ok(tx)
    }

    /// Transaction log of a cashbox, oldest first.
    pub async fn transactions_for(&self, cashbox_id: &str) -> DbResult<Vec<CashboxTransaction>> {
        let sql = format!(
            "SELECT {TX_COLUMNS} FROM cashbox_transactions WHERE cashbox_id = ?1 ORDER BY rowid"
        );
        let txs = sqlx::query_as::<_, CashboxTransaction>(&sql)
            .bind(cashbox_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(txs)
    }

    /// Transactions written on behalf of one reference (e.g. a sale).
    pub async fn transactions_for_reference(
        &self,
        reference: Reference<'_>,
    ) -> DbResult<Vec<CashboxTransaction>> {
        let sql = format!(
            "SELECT {TX_COLUMNS} FROM cashbox_transactions \
             WHERE reference_type = ?1 AND reference_id = ?2 ORDER BY rowid"
        );
        let txs = sqlx::query_as::<_, CashboxTransaction>(&sql)
            .bind(reference.kind)
            .bind(reference.id)
            .fetch_all(&self.pool)
            .await?;
        Ok(txs)
    }

    /// Cash put into the drawer (float, owner top-up).
    pub async fn deposit(
        &self,
        cashbox_id: &str,
        currency: Currency,
        amount: Money,
        description: &str,
        created_by: Option<&str>,
    ) -> DbResult<CashboxTransaction> {
        validate_positive("amount", amount.cents())?;
        let mut entry =
            CashboxEntry::new(cashbox_id, CashboxTxType::Deposit, currency, amount, description);
        entry.created_by = created_by.map(str::to_string);
        self.record_transaction(&entry).await
    }

    /// Cash taken out of the drawer; `amount` is positive.
    pub async fn withdraw(
        &self,
        cashbox_id: &str,
        currency: Currency,
        amount: Money,
        description: &str,
        created_by: Option<&str>,
    ) -> DbResult<CashboxTransaction> {
        validate_positive("amount", amount.cents())?;
        let mut entry =
            CashboxEntry::new(cashbox_id, CashboxTxType::Withdrawal, currency, -amount, description);
        entry.created_by = created_by.map(str::to_string);
        self.record_transaction(&entry).await
    }

    /// Records an expense and its `expense` cash entry in one unit of work.
    pub async fn record_expense(
        &self,
        req: &ExpenseRequest,
    ) -> DbResult<(Expense, CashboxTransaction)> {
        validate_required("category", &req.category)?;
        validate_required("description", &req.description)?;
        validate_positive("amount", req.amount_cents)?;

        let mut uow = UnitOfWork::begin(&self.pool, "record_expense").await?;
        let result = Self::record_expense_in(uow.conn(), req).await;
        let (expense, tx) = uow.finish(result).await?;

        info!(
            expense_id = %expense.id,
            category = %expense.category,
            amount = %expense.currency.format(Money::from_cents(expense.amount_cents)),
            "Expense recorded"
        );
        Ok((expense, tx))
    }

    async fn record_expense_in(
        conn: &mut SqliteConnection,
        req: &ExpenseRequest,
    ) -> DbResult<(Expense, CashboxTransaction)> {
        let expense = Expense {
            id: Uuid::new_v4().to_string(),
            cashbox_id: req.cashbox_id.clone(),
            category: req.category.trim().to_string(),
            description: req.description.trim().to_string(),
            amount_cents: req.amount_cents,
            currency: req.currency,
            created_by: req.created_by.clone(),
            created_at: Utc::now(),
        };

        let mut entry = CashboxEntry::new(
            &expense.cashbox_id,
            CashboxTxType::Expense,
            expense.currency,
            -Money::from_cents(expense.amount_cents),
            format!("{}: {}", expense.category, expense.description),
        )
        .with_reference(Reference::new("expense", &expense.id));
        entry.created_by = expense.created_by.clone();

        // Cash first: an unknown cashbox surfaces as CashboxNotFound.
        let tx = Self::record_transaction_in(&mut *conn, &entry).await?;

        sqlx::query(
            r#"
            INSERT INTO expenses (
                id, cashbox_id, category, description, amount_cents, currency, created_by, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(&expense.id)
        .bind(&expense.cashbox_id)
        .bind(&expense.category)
        .bind(&expense.description)
        .bind(expense.amount_cents)
        .bind(expense.currency)
        .bind(&expense.created_by)
        .bind(expense.created_at)
        .execute(conn)
        .await?;

        Ok((expense, tx))
    }

    pub async fn list_expenses(&self, cashbox_id: &str) -> DbResult<Vec<Expense>> {
        let expenses = sqlx::query_as::<_, Expense>(
            "SELECT id, cashbox_id, category, description, amount_cents, currency, created_by, created_at \
             FROM expenses WHERE cashbox_id = ?1 ORDER BY rowid",
        )
        .bind(cashbox_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(expenses)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
