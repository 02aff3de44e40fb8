//! # Report Commands
//!
//! `audit` runs the ledger audit; `summary` totals recent sale headers per
//! currency. Neither writes anything.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use khazna_core::{Currency, SaleStatus};
use khazna_db::IntegrityReport;

use crate::error::ApiError;
use crate::state::AppContext;

const DEFAULT_SUMMARY_WINDOW: u32 = 200;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SummaryRequest {
    /// How many of the most recent sales to fold.
    #[serde(default)]
    pub limit: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrencyTotals {
    pub sales: usize,
    pub total_cents: i64,
    pub paid_cents: i64,
    pub due_cents: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SalesSummary {
    pub store_name: String,
    pub generated_at: DateTime<Utc>,
    pub sales_considered: usize,
    pub completed: usize,
    pub returned: usize,
    pub cancelled: usize,
    /// Completed sales only, keyed by currency code.
    pub by_currency: BTreeMap<String, CurrencyTotals>,
}

pub async fn audit(ctx: &AppContext) -> Result<IntegrityReport, ApiError> {
    let report = ctx.db().auditor().audit().await?;
    for d in &report.discrepancies {
        warn!(kind = ?d.kind, entity_id = %d.entity_id, expected = d.expected, actual = d.actual, "Discrepancy");
    }
    Ok(report)
}

pub async fn summary(ctx: &AppContext, req: SummaryRequest) -> Result<SalesSummary, ApiError> {
    let sales = ctx
        .db()
        .sales()
        .list_sales(req.limit.unwrap_or(DEFAULT_SUMMARY_WINDOW))
        .await?;

    let mut summary = SalesSummary {
        store_name: ctx.config().store.name.clone(),
        generated_at: Utc::now(),
        sales_considered: sales.len(),
        completed: 0,
        returned: 0,
        cancelled: 0,
        by_currency: BTreeMap::new(),
    };

    for sale in &sales {
        match sale.status {
            SaleStatus::Completed => summary.completed += 1,
            SaleStatus::Returned => summary.returned += 1,
            SaleStatus::Cancelled => summary.cancelled += 1,
            SaleStatus::Pending => continue,
        }
        if sale.status != SaleStatus::Completed {
            continue;
        }
        let totals = summary
            .by_currency
            .entry(sale.currency.code().to_string())
            .or_default();
        totals.sales += 1;
        totals.total_cents += sale.total_cents;
        totals.paid_cents += sale.amount_paid_cents;
        totals.due_cents += sale.amount_due_cents;
    }

    // Both currencies always appear, even when empty.
    for currency in [Currency::Lyd, Currency::Usd] {
        summary
            .by_currency
            .entry(currency.code().to_string())
            .or_default();
    }
    Ok(summary)
}
