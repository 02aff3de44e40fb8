//! # Ledger Audit
//!
//! Folds every fact log and compares it with the balances stored next to it.
//!
//! ```text
//! ┌──────────────────────────────┬──────────────────────────────────────────┐
//! │  aggregate                   │  must equal                              │
//! ├──────────────────────────────┼──────────────────────────────────────────┤
//! │  products.current_stock      │  Σ ±quantity over stock_movements        │
//! │  cashboxes.balance_usd/lyd   │  Σ amount_usd/lyd over transactions      │
//! │  customers.balance_owed      │  Σ balance_delta over customer_ledger    │
//! │  customers.total_purchases   │  Σ purchases_delta over customer_ledger  │
//! │  sales.subtotal              │  Σ total_price of active sale_items      │
//! │  sales.total / amount_due    │  subtotal − discount / total − paid      │
//! └──────────────────────────────┴──────────────────────────────────────────┘
//! ```
//!
//! A clean report is what reporting relies on to rebuild any balance from
//! its log.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::{info, warn};

use crate::error::DbResult;

/// Which rule a discrepancy breaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscrepancyKind {
    ProductStock,
    MovementArithmetic,
    CashboxUsd,
    CashboxLyd,
    CustomerBalance,
    CustomerPurchases,
    SaleSubtotal,
    SaleTotal,
    SaleDue,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Discrepancy {
    pub kind: DiscrepancyKind,
    pub entity_id: String,
    /// What the log (or header arithmetic) says.
    pub expected: i64,
    /// What is stored.
    pub actual: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegrityReport {
    pub checked_at: DateTime<Utc>,
    pub products_checked: usize,
    pub movements_checked: usize,
    pub cashboxes_checked: usize,
    pub customers_checked: usize,
    pub sales_checked: usize,
    pub discrepancies: Vec<Discrepancy>,
}

impl IntegrityReport {
    pub fn is_consistent(&self) -> bool {
        self.discrepancies.is_empty()
    }
}

/// Read-only checker over all four ledgers.
#[derive(Debug, Clone)]
pub struct LedgerAuditor {
    pool: SqlitePool,
}

impl LedgerAuditor {
    pub fn new(pool: SqlitePool) -> Self {
        LedgerAuditor { pool }
    }

    /// Runs every check and collects all discrepancies.
    pub async fn audit(&self) -> DbResult<IntegrityReport> {
        let mut discrepancies = Vec::new();

        let products: Vec<(String, i64, i64)> = sqlx::query_as(
            r#"
            SELECT p.id, p.current_stock,
                   COALESCE((
                       SELECT SUM(CASE m.movement_type WHEN 'out' THEN -m.quantity ELSE m.quantity END)
                       FROM stock_movements m
                       WHERE m.product_id = p.id
                   ), 0)
            FROM products p
            ORDER BY p.id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        for (id, stored, folded) in &products {
            push_if_differs(&mut discrepancies, DiscrepancyKind::ProductStock, id, *folded, *stored);
        }

        let movements_checked: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM stock_movements")
            .fetch_one(&self.pool)
            .await?;
        let bad_movements: Vec<(String, i64, i64)> = sqlx::query_as(
            r#"
            SELECT id,
                   previous_stock + CASE movement_type WHEN 'out' THEN -quantity ELSE quantity END,
                   new_stock
            FROM stock_movements
            WHERE new_stock <> previous_stock + CASE movement_type WHEN 'out' THEN -quantity ELSE quantity END
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        for (id, expected, actual) in &bad_movements {
            push_if_differs(&mut discrepancies, DiscrepancyKind::MovementArithmetic, id, *expected, *actual);
        }

        let cashboxes: Vec<(String, i64, i64, i64, i64)> = sqlx::query_as(
            r#"
            SELECT c.id, c.balance_usd_cents, c.balance_lyd_cents,
                   COALESCE(SUM(t.amount_usd_cents), 0),
                   COALESCE(SUM(t.amount_lyd_cents), 0)
            FROM cashboxes c
            LEFT JOIN cashbox_transactions t ON t.cashbox_id = c.id
            GROUP BY c.id
            ORDER BY c.id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        for (id, usd, lyd, usd_sum, lyd_sum) in &cashboxes {
            push_if_differs(&mut discrepancies, DiscrepancyKind::CashboxUsd, id, *usd_sum, *usd);
            push_if_differs(&mut discrepancies, DiscrepancyKind::CashboxLyd, id, *lyd_sum, *lyd);
        }

        let customers: Vec<(String, i64, i64, i64, i64)> = sqlx::query_as(
            r#"
            SELECT c.id, c.balance_owed_cents, c.total_purchases_cents,
                   COALESCE(SUM(l.balance_delta_cents), 0),
                   COALESCE(SUM(l.purchases_delta_cents), 0)
            FROM customers c
            LEFT JOIN customer_ledger l ON l.customer_id = c.id
            GROUP BY c.id
            ORDER BY c.id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        for (id, owed, purchases, owed_sum, purchases_sum) in &customers {
            push_if_differs(&mut discrepancies, DiscrepancyKind::CustomerBalance, id, *owed_sum, *owed);
            push_if_differs(
                &mut discrepancies,
                DiscrepancyKind::CustomerPurchases,
                id,
                *purchases_sum,
                *purchases,
            );
        }

        let sales: Vec<(String, i64, i64, i64, i64, i64, i64)> = sqlx::query_as(
            r#"
            SELECT s.id, s.subtotal_cents, s.discount_cents, s.total_cents,
                   s.amount_paid_cents, s.amount_due_cents,
                   COALESCE(SUM(CASE WHEN i.returned_at IS NULL THEN i.total_price_cents END), 0)
            FROM sales s
            LEFT JOIN sale_items i ON i.sale_id = s.id
            GROUP BY s.id
            ORDER BY s.id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        for (id, subtotal, discount, total, paid, due, active_sum) in &sales {
            push_if_differs(&mut discrepancies, DiscrepancyKind::SaleSubtotal, id, *active_sum, *subtotal);
            push_if_differs(&mut discrepancies, DiscrepancyKind::SaleTotal, id, subtotal - discount, *total);
            push_if_differs(&mut discrepancies, DiscrepancyKind::SaleDue, id, total - paid, *due);
        }

        let report = IntegrityReport {
            checked_at: Utc::now(),
            products_checked: products.len(),
            movements_checked: movements_checked as usize,
            cashboxes_checked: cashboxes.len(),
            customers_checked: customers.len(),
            sales_checked: sales.len(),
            discrepancies,
        };

        if report.is_consistent() {
            info!(
                products = report.products_checked,
                cashboxes = report.cashboxes_checked,
                customers = report.customers_checked,
                sales = report.sales_checked,
                "Ledger audit clean"
            );
        } else {
            warn!(count = report.discrepancies.len(), "Ledger audit found discrepancies");
        }
        Ok(report)
    }
}

fn push_if_differs(
    out: &mut Vec<Discrepancy>,
    kind: DiscrepancyKind,
    entity_id: &str,
    expected: i64,
    actual: i64,
) {
    if expected != actual {
        out.push(Discrepancy {
            kind,
            entity_id: entity_id.to_string(),
            expected,
            actual,
        });
    }
}
