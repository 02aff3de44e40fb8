//! # Customer Account
//!
//! Amount owed and lifetime purchases per customer, each change explained
//! by a row in `customer_ledger`.
//!
//! - `balance_owed_cents` moves both ways; below zero is store credit.
//! - `total_purchases_cents` only grows.
//!
//! Amounts are in the base currency.

use chrono::Utc;
use khazna_core::validation::{validate_name, validate_positive, validate_required};
use khazna_core::{CoreError, Customer, CustomerLedgerEntry, Money, ValidationError};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};
use uuid::Uuid;

use super::Reference;
use crate::error::DbResult;
use crate::unit_of_work::UnitOfWork;

const CUSTOMER_COLUMNS: &str = "id, name, phone, balance_owed_cents, total_purchases_cents, \
     version, created_at, updated_at";

/// Repository for customers and their ledger.
#[derive(Debug, Clone)]
pub struct CustomerRepository {
    pool: SqlitePool,
}

impl CustomerRepository {
    pub fn new(pool: SqlitePool) -> Self {
        CustomerRepository { pool }
    }

    pub async fn register_customer(&self, name: &str, phone: Option<&str>) -> DbResult<Customer> {
        validate_name(name)?;
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();
        let phone = phone.map(str::trim).filter(|p| !p.is_empty());

        sqlx::query(
            r#"
            INSERT INTO customers (
                id, name, phone, balance_owed_cents, total_purchases_cents,
                version, created_at, updated_at
            ) VALUES (?1, ?2, ?3, 0, 0, 1, ?4, ?4)
            "#,
        )
        .bind(&id)
        .bind(name.trim())
        .bind(phone)
        .bind(now)
        .execute(&self.pool)
        .await?;

        info!(customer_id = %id, "Customer registered");
        self.get_customer(&id).await
    }

    /// Gets a customer; missing is `CustomerNotFound`.
    pub async fn get_customer(&self, id: &str) -> DbResult<Customer> {
        let mut conn = self.pool.acquire().await?;
        Self::fetch_customer_in(&mut *conn, id).await
    }

    pub async fn fetch_customer_in(conn: &mut SqliteConnection, id: &str) -> DbResult<Customer> {
        let sql = format!("SELECT {CUSTOMER_COLUMNS} FROM customers WHERE id = ?1");
        sqlx::query_as::<_, Customer>(&sql)
            .bind(id)
            .fetch_optional(conn)
            .await?
            .ok_or_else(|| CoreError::CustomerNotFound(id.to_string()).into())
    }

    pub async fn list_customers(&self) -> DbResult<Vec<Customer>> {
        let sql = format!("SELECT {CUSTOMER_COLUMNS} FROM customers ORDER BY name");
        let customers = sqlx::query_as::<_, Customer>(&sql)
            .fetch_all(&self.pool)
            .await?;
        Ok(customers)
    }

    /// Adjusts the amount owed in its own unit of work.
    pub async fn adjust_balance(
        &self,
        customer_id: &str,
        delta: Money,
        reason: &str,
        reference: Option<Reference<'_>>,
    ) -> DbResult<Customer> {
        let mut uow = UnitOfWork::begin(&self.pool, "adjust_balance").await?;
        let result = Self::adjust_balance_in(uow.conn(), customer_id, delta, reason, reference).await;
        uow.finish(result).await
    }

    /// Adds `delta` (signed, base currency) to the amount owed.
    ///
    /// No floor: a balance below zero is credit the customer holds.
    pub async fn adjust_balance_in(
        conn: &mut SqliteConnection,
        customer_id: &str,
        delta: Money,
        reason: &str,
        reference: Option<Reference<'_>>,
    ) -> DbResult<Customer> {
        validate_required("reason", reason)?;
        if delta.is_zero() {
            return Err(ValidationError::Inconsistent {
                field: "delta".to_string(),
                reason: "a balance adjustment must change the balance".to_string(),
            }
            .into());
        }

        let balance_after: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE customers
            SET balance_owed_cents = balance_owed_cents + ?1,
                version = version + 1,
                updated_at = ?2
            WHERE id = ?3
            RETURNING balance_owed_cents
            "#,
        )
        .bind(delta.cents())
        .bind(Utc::now())
        .bind(customer_id)
        .fetch_optional(&mut *conn)
        .await?;

        let balance_after =
            balance_after.ok_or_else(|| CoreError::CustomerNotFound(customer_id.to_string()))?;

        Self::append_ledger_in(
            &mut *conn,
            customer_id,
            delta.cents(),
            0,
            balance_after,
            reason,
            reference,
        )
        .await?;

        debug!(customer_id = %customer_id, delta = delta.cents(), balance_after, "Customer balance adjusted");
        Self::fetch_customer_in(conn, customer_id).await
    }

    /// Adds to lifetime purchases in its own unit of work.
    pub async fn add_purchase(
        &self,
        customer_id: &str,
        amount: Money,
        reference: Option<Reference<'_>>,
    ) -> DbResult<Customer> {
        let mut uow = UnitOfWork::begin(&self.pool, "add_purchase").await?;
        let result = Self::add_purchase_in(uow.conn(), customer_id, amount, "purchase", reference).await;
        uow.finish(result).await
    }

    /// Adds `amount` (positive, base currency) to lifetime purchases.
    pub async fn add_purchase_in(
        conn: &mut SqliteConnection,
        customer_id: &str,
        amount: Money,
        reason: &str,
        reference: Option<Reference<'_>>,
    ) -> DbResult<Customer> {
        validate_positive("amount", amount.cents())?;

        let balance_after: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE customers
            SET total_purchases_cents = total_purchases_cents + ?1,
                version = version + 1,
                updated_at = ?2
            WHERE id = ?3
            RETURNING balance_owed_cents
            "#,
        )
        .bind(amount.cents())
        .bind(Utc::now())
        .bind(customer_id)
        .fetch_optional(&mut *conn)
        .await?;

        let balance_after =
            balance_after.ok_or_else(|| CoreError::CustomerNotFound(customer_id.to_string()))?;

        Self::append_ledger_in(
            &mut *conn,
            customer_id,
            0,
            amount.cents(),
            balance_after,
            reason,
            reference,
        )
        .await?;

        debug!(customer_id = %customer_id, amount = amount.cents(), "Customer purchase recorded");
        Self::fetch_customer_in(conn, customer_id).await
    }

    async fn append_ledger_in(
        conn: &mut SqliteConnection,
        customer_id: &str,
        balance_delta_cents: i64,
        purchases_delta_cents: i64,
        balance_after_cents: i64,
        reason: &str,
        reference: Option<Reference<'_>>,
    ) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO customer_ledger (
                id, customer_id, balance_delta_cents, purchases_delta_cents,
                balance_after_cents, reason, reference_type, reference_id, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(customer_id)
        .bind(balance_delta_cents)
        .bind(purchases_delta_cents)
        .bind(balance_after_cents)
        .bind(reason)
        .bind(reference.map(|r| r.kind))
        .bind(reference.map(|r| r.id))
        .bind(Utc::now())
        .execute(conn)
        .await?;
        Ok(())
    }

    /// Ledger of a customer, oldest first.
    pub async fn ledger_for(&self, customer_id: &str) -> DbResult<Vec<CustomerLedgerEntry>> {
        let entries = sqlx::query_as::<_, CustomerLedgerEntry>(
            "SELECT id, customer_id, balance_delta_cents, purchases_delta_cents, \
             balance_after_cents, reason, reference_type, reference_id, created_at \
             FROM customer_ledger WHERE customer_id = ?1 ORDER BY rowid",
        )
        .bind(customer_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(entries)
    }
}
