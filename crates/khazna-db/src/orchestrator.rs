//! # Transaction Orchestrator
//!
//! Creates, edits, returns and cancels sales, moving stock, cash and
//! customer balances with them in one unit of work.
//!
//! ## Sale Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   none ──create──► completed ──edit──► completed ──edit──► ...         │
//! │                        │                                                │
//! │                        ├──return──► returned    (also: edit returning  │
//! │                        │                          every active line)   │
//! │                        └──cancel──► cancelled                          │
//! │                                                                         │
//! │   Sales are never deleted. Corrections are new movements, new cash     │
//! │   entries, returned lines and a status change.                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Edit, Step by Step
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  UnitOfWork::begin                                                      │
//! │   1. sale is completed, version matches, return ids are active lines   │
//! │   2. stock check: new qty ≤ stock + qty coming back from returns       │
//! │   3. `in`  movement per returned line   (sale-edit-return)             │
//! │   4. `out` movement per new line        (sale-edit-add)                │
//! │   5. plan_edit(): price_diff, new header figures, cash and due deltas  │
//! │   6. mark returned lines, insert new lines, version-checked header     │
//! │   7. cash `sale` (+) or `refund` (−) in the sale's currency            │
//! │   8. customer balance by the due delta, purchases by a positive diff   │
//! │  commit  ─ or ─  rollback on the first error, nothing visible          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every step runs on the unit's connection through the ledgers' `*_in`
//! functions; the orchestrator never touches the pool mid-unit.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use khazna_core::money::to_base;
use khazna_core::request::{
    CreateSaleRequest, CustomerPaymentRequest, EditSaleRequest, ReverseSaleRequest,
};
use khazna_core::settlement::{plan_edit, SaleTotals};
use khazna_core::validation::{
    validate_positive, validate_required, validate_return_ids, validate_sale_items,
};
use khazna_core::{
    CashboxTransaction, CashboxTxType, CoreError, Currency, Customer, ItemSnapshot, Money,
    MovementType, NewSaleItem, PaymentMethod, Product, Sale, SaleItem, SaleStatus, SaleWithItems,
    ValidationError, DEFAULT_CASHBOX_ID,
};
use serde::{Deserialize, Serialize};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::info;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::repository::cashbox::{CashboxEntry, CashboxRepository};
use crate::repository::customer::CustomerRepository;
use crate::repository::inventory::{InventoryRepository, MovementRequest};
use crate::repository::sale::SaleRepository;
use crate::repository::Reference;
use crate::unit_of_work::UnitOfWork;

// =============================================================================
// Settings and Outcomes
// =============================================================================

/// Store-wide settings the orchestrator needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerSettings {
    /// Currency customer balances and purchases are kept in.
    pub base_currency: Currency,
    /// Cashbox used when a request names none.
    pub cashbox_id: String,
}

impl Default for LedgerSettings {
    fn default() -> Self {
        LedgerSettings {
            base_currency: Currency::Lyd,
            cashbox_id: DEFAULT_CASHBOX_ID.to_string(),
        }
    }
}

/// What an edit, return or cancel did.
///
/// Sale-currency figures unless noted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EditOutcome {
    /// The sale as stored afterwards, with its active lines.
    pub sale: SaleWithItems,
    pub returned_item_ids: Vec<String>,
    pub added_item_ids: Vec<String>,
    pub returned_total_cents: i64,
    pub new_items_total_cents: i64,
    /// `new_items_total − returned_total`.
    pub price_diff_cents: i64,
    /// Change of the sale total; differs from `price_diff` only when the
    /// discount had to be capped.
    pub settled_diff_cents: i64,
    /// Cash collected (+) or refunded (−).
    pub cash_delta_cents: i64,
    /// Change to the customer's balance, in the base currency.
    pub customer_balance_delta_cents: i64,
}

/// A customer payment as applied.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PaymentReceipt {
    pub customer: Customer,
    pub transaction: CashboxTransaction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EditKind {
    Edit,
    Return,
    Cancel,
}

impl EditKind {
    fn label(self) -> &'static str {
        match self {
            EditKind::Edit => "edit_sale",
            EditKind::Return => "return_sale",
            EditKind::Cancel => "cancel_sale",
        }
    }

    fn return_reason(self) -> &'static str {
        match self {
            EditKind::Edit => "sale-edit-return",
            EditKind::Return => "sale-return",
            EditKind::Cancel => "sale-cancel",
        }
    }

    fn verb(self) -> &'static str {
        match self {
            EditKind::Edit => "edit",
            EditKind::Return => "return",
            EditKind::Cancel => "cancellation",
        }
    }
}

struct EditInput<'a> {
    sale_id: &'a str,
    return_ids: &'a [String],
    new_items: &'a [NewSaleItem],
    cashbox_id: Option<&'a str>,
    created_by: &'a str,
    expected_version: Option<i64>,
    kind: EditKind,
}

// =============================================================================
// Orchestrator
// =============================================================================

/// Runs multi-ledger operations, each inside one [`UnitOfWork`].
///
/// ## Usage
/// ```rust,ignore
/// let orchestrator = db.orchestrator(LedgerSettings::default());
/// let created = orchestrator.create_sale(&request).await?;
/// let outcome = orchestrator.edit_sale(&edit).await?;
/// ```
#[derive(Debug, Clone)]
pub struct TransactionOrchestrator {
    pool: SqlitePool,
    settings: LedgerSettings,
}

impl TransactionOrchestrator {
    pub fn new(pool: SqlitePool, settings: LedgerSettings) -> Self {
        TransactionOrchestrator { pool, settings }
    }

    pub fn settings(&self) -> &LedgerSettings {
        &self.settings
    }

    // -------------------------------------------------------------------------
    // Create
    // -------------------------------------------------------------------------

    /// Checks out a cart.
    ///
    /// ## Errors
    /// - `ValidationError` - empty cart, bad line, discount or payment rules
    /// - `InvariantViolation` - line figures or `expected_total_cents` mismatch
    /// - `ProductNotFound` / `CustomerNotFound` / `CashboxNotFound`
    /// - `InsufficientStock` - nothing is written
    pub async fn create_sale(&self, req: &CreateSaleRequest) -> DbResult<SaleWithItems> {
        let totals = self.validate_create(req)?;

        let mut uow = UnitOfWork::begin(&self.pool, "create_sale").await?;
        let result = self.create_in(uow.conn(), req, &totals).await;
        let created = uow.finish(result).await?;

        info!(
            sale_id = %created.sale.id,
            sale_number = %created.sale.sale_number,
            items = created.items.len(),
            total = %created.sale.currency.format(created.sale.total()),
            amount_due = created.sale.amount_due_cents,
            "Sale created"
        );
        Ok(created)
    }

    fn validate_create(&self, req: &CreateSaleRequest) -> DbResult<SaleTotals> {
        validate_required("created_by", &req.created_by)?;
        validate_sale_items(&req.items, false)?;

        let totals = SaleTotals::compute(
            &req.items,
            Money::from_cents(req.discount_cents),
            Money::from_cents(req.amount_paid_cents),
        )?;

        if let Some(expected) = req.expected_total_cents {
            if expected != totals.total.cents() {
                return Err(CoreError::invariant("total", expected, totals.total.cents()).into());
            }
        }

        if req.payment_method == PaymentMethod::Partial && req.customer_id.is_none() {
            return Err(ValidationError::Required {
                field: "customer_id".to_string(),
            }
            .into());
        }
        if totals.amount_due.is_positive() {
            if req.customer_id.is_none() {
                return Err(ValidationError::Required {
                    field: "customer_id".to_string(),
                }
                .into());
            }
            if !req.payment_method.carries_debt() {
                return Err(ValidationError::Inconsistent {
                    field: "amount_paid".to_string(),
                    reason: "only partial sales may leave an amount due".to_string(),
                }
                .into());
            }
        }

        khazna_core::money::check_rate_presence(
            req.currency,
            self.settings.base_currency,
            req.exchange_rate,
        )?;

        Ok(totals)
    }

    async fn create_in(
        &self,
        conn: &mut SqliteConnection,
        req: &CreateSaleRequest,
        totals: &SaleTotals,
    ) -> DbResult<SaleWithItems> {
        let products = check_stock_in(&mut *conn, &req.items, &[]).await?;
        if let Some(customer_id) = req.customer_id.as_deref() {
            CustomerRepository::fetch_customer_in(&mut *conn, customer_id).await?;
        }

        let sale_id = Uuid::new_v4().to_string();
        let reference = Reference::sale(&sale_id);
        let now = Utc::now();

        for item in &req.items {
            let movement = MovementRequest::new(&item.product_id, MovementType::Out, item.quantity, "sale")
                .with_unit_cost(item.unit_cost_cents)
                .with_reference(reference)
                .created_by(&req.created_by);
            InventoryRepository::apply_movement_in(&mut *conn, &movement).await?;
        }

        let sale_number = SaleRepository::next_sale_number_in(&mut *conn, now).await?;
        let sale = Sale {
            id: sale_id.clone(),
            sale_number,
            customer_id: req.customer_id.clone(),
            status: SaleStatus::Completed,
            subtotal_cents: totals.subtotal.cents(),
            discount_cents: totals.discount.cents(),
            total_cents: totals.total.cents(),
            amount_paid_cents: totals.amount_paid.cents(),
            amount_due_cents: totals.amount_due.cents(),
            payment_method: req.payment_method,
            currency: req.currency,
            exchange_rate_micros: req.exchange_rate.map(|r| r.micros()),
            created_by: req.created_by.clone(),
            notes: req.notes.clone(),
            version: 1,
            created_at: now,
            updated_at: now,
        };
        let items = build_items(&sale_id, &req.items, &products, now)?;
        let created = SaleRepository::create_sale_in(&mut *conn, &sale, &items).await?;

        if totals.amount_paid.is_positive() {
            let cashbox_id = req.cashbox_id.as_deref().unwrap_or(&self.settings.cashbox_id);
            let entry = CashboxEntry::new(
                cashbox_id,
                CashboxTxType::Sale,
                sale.currency,
                totals.amount_paid,
                format!("Sale {}", sale.sale_number),
            )
            .with_rate(req.exchange_rate)
            .with_reference(reference)
            .created_by(&req.created_by);
            CashboxRepository::record_transaction_in(&mut *conn, &entry).await?;
        }

        if let Some(customer_id) = sale.customer_id.as_deref() {
            let base = self.settings.base_currency;
            if totals.amount_due.is_positive() {
                let due = to_base(totals.amount_due, sale.currency, base, req.exchange_rate)?;
                CustomerRepository::adjust_balance_in(&mut *conn, customer_id, due, "sale-credit", Some(reference))
                    .await?;
            }
            let purchase = to_base(totals.total, sale.currency, base, req.exchange_rate)?;
            if purchase.is_positive() {
                CustomerRepository::add_purchase_in(&mut *conn, customer_id, purchase, "sale", Some(reference))
                    .await?;
            }
        }

        Ok(created)
    }

    // -------------------------------------------------------------------------
    // Edit / Return / Cancel
    // -------------------------------------------------------------------------

    /// Returns some lines of a sale and adds new ones, settling the
    /// difference.
    ///
    /// ## Errors
    /// - `NoChangeRequested` - nothing to return and nothing to add
    /// - `SaleNotFound` / `SaleItemNotFound` / `ProductNotFound`
    /// - `InvalidSaleStatus` - the sale is not `completed`
    /// - `ConcurrentModification` - `expected_version` is stale
    /// - `InsufficientStock` - the sale is left exactly as it was
    pub async fn edit_sale(&self, req: &EditSaleRequest) -> DbResult<EditOutcome> {
        validate_required("sale_id", &req.sale_id)?;
        validate_required("created_by", &req.created_by)?;
        validate_return_ids(&req.return_item_ids)?;
        validate_sale_items(&req.new_items, true)?;
        if req.return_item_ids.is_empty() && req.new_items.is_empty() {
            return Err(CoreError::NoChangeRequested {
                sale_id: req.sale_id.clone(),
            }
            .into());
        }

        let input = EditInput {
            sale_id: &req.sale_id,
            return_ids: &req.return_item_ids,
            new_items: &req.new_items,
            cashbox_id: req.cashbox_id.as_deref(),
            created_by: &req.created_by,
            expected_version: req.expected_version,
            kind: EditKind::Edit,
        };

        let mut uow = UnitOfWork::begin(&self.pool, EditKind::Edit.label()).await?;
        let result = self.apply_edit(uow.conn(), &input).await;
        let outcome = uow.finish(result).await?;
        log_outcome(EditKind::Edit, &outcome);
        Ok(outcome)
    }

    /// Returns every active line; the sale ends `returned`.
    pub async fn return_sale(&self, req: &ReverseSaleRequest) -> DbResult<EditOutcome> {
        self.reverse(req, EditKind::Return).await
    }

    /// Same reversal as [`Self::return_sale`]; the sale ends `cancelled`.
    pub async fn cancel_sale(&self, req: &ReverseSaleRequest) -> DbResult<EditOutcome> {
        self.reverse(req, EditKind::Cancel).await
    }

    async fn reverse(&self, req: &ReverseSaleRequest, kind: EditKind) -> DbResult<EditOutcome> {
        validate_required("sale_id", &req.sale_id)?;
        validate_required("created_by", &req.created_by)?;

        let mut uow = UnitOfWork::begin(&self.pool, kind.label()).await?;
        let result = self.reverse_in(uow.conn(), req, kind).await;
        let outcome = uow.finish(result).await?;
        log_outcome(kind, &outcome);
        Ok(outcome)
    }

    async fn reverse_in(
        &self,
        conn: &mut SqliteConnection,
        req: &ReverseSaleRequest,
        kind: EditKind,
    ) -> DbResult<EditOutcome> {
        let sale = SaleRepository::fetch_sale_in(&mut *conn, &req.sale_id).await?;
        ensure_editable(&sale)?;

        let return_ids: Vec<String> = SaleRepository::active_items_in(&mut *conn, &sale.id)
            .await?
            .into_iter()
            .map(|item| item.id)
            .collect();
        if return_ids.is_empty() {
            return Err(CoreError::NoChangeRequested { sale_id: sale.id }.into());
        }

        let input = EditInput {
            sale_id: &req.sale_id,
            return_ids: &return_ids,
            new_items: &[],
            cashbox_id: req.cashbox_id.as_deref(),
            created_by: &req.created_by,
            expected_version: req.expected_version,
            kind,
        };
        self.apply_edit(conn, &input).await
    }

    async fn apply_edit(
        &self,
        conn: &mut SqliteConnection,
        input: &EditInput<'_>,
    ) -> DbResult<EditOutcome> {
        let sale = SaleRepository::fetch_sale_in(&mut *conn, input.sale_id).await?;
        ensure_editable(&sale)?;
        if let Some(expected) = input.expected_version {
            if expected != sale.version {
                return Err(DbError::concurrent("Sale", &sale.id));
            }
        }

        let active = SaleRepository::active_items_in(&mut *conn, &sale.id).await?;
        let mut returned = Vec::with_capacity(input.return_ids.len());
        for item_id in input.return_ids {
            let item = active
                .iter()
                .find(|item| &item.id == item_id)
                .ok_or_else(|| CoreError::SaleItemNotFound {
                    sale_id: sale.id.clone(),
                    item_id: item_id.clone(),
                })?;
            returned.push(item.clone());
        }

        let products = check_stock_in(&mut *conn, input.new_items, &returned).await?;

        let reference = Reference::sale(&sale.id);
        for item in &returned {
            let movement = MovementRequest::new(
                &item.product_id,
                MovementType::In,
                item.quantity,
                input.kind.return_reason(),
            )
            .with_unit_cost(item.unit_cost_cents)
            .with_reference(reference)
            .created_by(input.created_by);
            InventoryRepository::apply_movement_in(&mut *conn, &movement).await?;
        }
        for item in input.new_items {
            let movement =
                MovementRequest::new(&item.product_id, MovementType::Out, item.quantity, "sale-edit-add")
                    .with_unit_cost(item.unit_cost_cents)
                    .with_reference(reference)
                    .created_by(input.created_by);
            InventoryRepository::apply_movement_in(&mut *conn, &movement).await?;
        }

        let returned_total: Money = returned.iter().map(SaleItem::total_price).sum();
        let new_items_total: Money = input.new_items.iter().map(NewSaleItem::total_price).sum();
        let carries_debt = sale.payment_method.carries_debt() && sale.customer_id.is_some();
        let plan = plan_edit(
            &SaleTotals::of_sale(&sale),
            returned_total,
            new_items_total,
            carries_debt,
        )?;

        let now = Utc::now();
        SaleRepository::mark_returned_in(&mut *conn, &sale.id, input.return_ids, now).await?;
        let added = build_items(&sale.id, input.new_items, &products, now)?;
        SaleRepository::insert_items_in(&mut *conn, &added).await?;

        let remaining = active.len() - returned.len() + added.len();
        let status = match input.kind {
            EditKind::Edit if remaining == 0 => SaleStatus::Returned,
            EditKind::Edit => sale.status,
            EditKind::Return => SaleStatus::Returned,
            EditKind::Cancel => SaleStatus::Cancelled,
        };

        let mut header = sale.clone();
        header.status = status;
        header.subtotal_cents = plan.totals.subtotal.cents();
        header.discount_cents = plan.totals.discount.cents();
        header.total_cents = plan.totals.total.cents();
        header.amount_paid_cents = plan.totals.amount_paid.cents();
        header.amount_due_cents = plan.totals.amount_due.cents();
        let updated = SaleRepository::update_header_in(&mut *conn, &header, sale.version).await?;

        if !plan.cash_delta.is_zero() {
            let cashbox_id = input.cashbox_id.unwrap_or(&self.settings.cashbox_id);
            let tx_type = if plan.cash_delta.is_positive() {
                CashboxTxType::Sale
            } else {
                CashboxTxType::Refund
            };
            let entry = CashboxEntry::new(
                cashbox_id,
                tx_type,
                sale.currency,
                plan.cash_delta,
                format!("Sale {} {}", sale.sale_number, input.kind.verb()),
            )
            .with_rate(sale.exchange_rate())
            .with_reference(reference)
            .created_by(input.created_by);
            CashboxRepository::record_transaction_in(&mut *conn, &entry).await?;
        }

        let mut customer_delta = Money::zero();
        if let Some(customer_id) = sale.customer_id.as_deref() {
            let base = self.settings.base_currency;
            let rate = sale.exchange_rate();
            // Differences of converted figures, so successive edits add up
            // to exactly what creation put on the account.
            if !plan.due_delta.is_zero() {
                customer_delta = to_base(plan.totals.amount_due, sale.currency, base, rate)?
                    - to_base(sale.amount_due(), sale.currency, base, rate)?;
                if !customer_delta.is_zero() {
                    CustomerRepository::adjust_balance_in(
                        &mut *conn,
                        customer_id,
                        customer_delta,
                        input.kind.return_reason(),
                        Some(reference),
                    )
                    .await?;
                }
            }
            if plan.settled_diff.is_positive() {
                let purchase = to_base(plan.totals.total, sale.currency, base, rate)?
                    - to_base(sale.total(), sale.currency, base, rate)?;
                if purchase.is_positive() {
                    CustomerRepository::add_purchase_in(
                        &mut *conn,
                        customer_id,
                        purchase,
                        "sale-edit-add",
                        Some(reference),
                    )
                    .await?;
                }
            }
        }

        let items = SaleRepository::active_items_in(conn, &sale.id).await?;

        Ok(EditOutcome {
            sale: SaleWithItems { sale: updated, items },
            returned_item_ids: returned.into_iter().map(|item| item.id).collect(),
            added_item_ids: added.into_iter().map(|item| item.id).collect(),
            returned_total_cents: plan.returned_total.cents(),
            new_items_total_cents: plan.new_items_total.cents(),
            price_diff_cents: plan.price_diff.cents(),
            settled_diff_cents: plan.settled_diff.cents(),
            cash_delta_cents: plan.cash_delta.cents(),
            customer_balance_delta_cents: customer_delta.cents(),
        })
    }

    // -------------------------------------------------------------------------
    // Customer Payments
    // -------------------------------------------------------------------------

    /// A customer pays down their balance: the balance drops by the amount
    /// in base currency and the cash lands in the cashbox as a `deposit`.
    pub async fn receive_payment(&self, req: &CustomerPaymentRequest) -> DbResult<PaymentReceipt> {
        validate_required("customer_id", &req.customer_id)?;
        validate_required("created_by", &req.created_by)?;
        validate_positive("amount", req.amount_cents)?;

        let amount = Money::from_cents(req.amount_cents);
        let base_amount = to_base(amount, req.currency, self.settings.base_currency, req.exchange_rate)?;

        let mut uow = UnitOfWork::begin(&self.pool, "receive_payment").await?;
        let result = self.receive_payment_in(uow.conn(), req, amount, base_amount).await;
        let receipt = uow.finish(result).await?;

        info!(
            customer_id = %receipt.customer.id,
            amount = %req.currency.format(amount),
            balance_owed = receipt.customer.balance_owed_cents,
            "Customer payment received"
        );
        Ok(receipt)
    }

    async fn receive_payment_in(
        &self,
        conn: &mut SqliteConnection,
        req: &CustomerPaymentRequest,
        amount: Money,
        base_amount: Money,
    ) -> DbResult<PaymentReceipt> {
        let reference = Reference::new("customer", &req.customer_id);
        let customer =
            CustomerRepository::adjust_balance_in(&mut *conn, &req.customer_id, -base_amount, "payment", Some(reference))
                .await?;

        let cashbox_id = req.cashbox_id.as_deref().unwrap_or(&self.settings.cashbox_id);
        let entry = CashboxEntry::new(
            cashbox_id,
            CashboxTxType::Deposit,
            req.currency,
            amount,
            format!("Payment from {}", customer.name),
        )
        .with_rate(req.exchange_rate)
        .with_reference(reference)
        .created_by(&req.created_by);
        let transaction = CashboxRepository::record_transaction_in(conn, &entry).await?;

        Ok(PaymentReceipt {
            customer,
            transaction,
        })
    }
}

// =============================================================================
// Helpers
// =============================================================================

fn ensure_editable(sale: &Sale) -> DbResult<()> {
    if !sale.status.is_editable() {
        return Err(CoreError::InvalidSaleStatus {
            sale_id: sale.id.clone(),
            current_status: sale.status.to_string(),
        }
        .into());
    }
    Ok(())
}

/// Checks every wanted product has enough stock, counting what `restored`
/// lines put back first. Quantities of repeated products are summed.
async fn check_stock_in(
    conn: &mut SqliteConnection,
    wanted: &[NewSaleItem],
    restored: &[SaleItem],
) -> DbResult<HashMap<String, Product>> {
    let mut needed: Vec<(&str, i64)> = Vec::new();
    for item in wanted {
        match needed.iter_mut().find(|(id, _)| *id == item.product_id) {
            Some((_, quantity)) => *quantity += item.quantity,
            None => needed.push((item.product_id.as_str(), item.quantity)),
        }
    }

    let mut products = HashMap::with_capacity(needed.len());
    for (product_id, quantity) in needed {
        let product = InventoryRepository::fetch_product_in(&mut *conn, product_id).await?;
        let coming_back: i64 = restored
            .iter()
            .filter(|item| item.product_id == product_id)
            .map(|item| item.quantity)
            .sum();
        let available = product.current_stock + coming_back;
        if quantity > available {
            return Err(CoreError::InsufficientStock {
                sku: product.sku,
                available,
                requested: quantity,
            }
            .into());
        }
        products.insert(product.id.clone(), product);
    }
    Ok(products)
}

/// Lines with the product's sku and name as of now and the caller's
/// locked prices.
fn build_items(
    sale_id: &str,
    items: &[NewSaleItem],
    products: &HashMap<String, Product>,
    at: DateTime<Utc>,
) -> DbResult<Vec<SaleItem>> {
    let mut lines = Vec::with_capacity(items.len());
    for item in items {
        let product = products
            .get(&item.product_id)
            .ok_or_else(|| CoreError::ProductNotFound(item.product_id.clone()))?;
        let snapshot = ItemSnapshot {
            product_id: product.id.clone(),
            sku: product.sku.clone(),
            name: product.name.clone(),
            unit_price_cents: item.unit_price_cents,
            unit_cost_cents: item.unit_cost_cents,
        };
        lines.push(SaleItem::from_snapshot(
            sale_id,
            snapshot,
            item.quantity,
            item.total_price_cents,
            item.profit_cents,
            at,
        ));
    }
    Ok(lines)
}

fn log_outcome(kind: EditKind, outcome: &EditOutcome) {
    info!(
        operation = kind.label(),
        sale_id = %outcome.sale.sale.id,
        status = %outcome.sale.sale.status,
        returned = outcome.returned_item_ids.len(),
        added = outcome.added_item_ids.len(),
        price_diff = outcome.price_diff_cents,
        cash_delta = outcome.cash_delta_cents,
        customer_delta = outcome.customer_balance_delta_cents,
        "Sale updated"
    );
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use khazna_core::{ExchangeRate, NewProduct};

    async fn setup() -> (Database, TransactionOrchestrator) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let orchestrator = db.orchestrator(LedgerSettings::default());
        (db, orchestrator)
    }

    async fn product(db: &Database, sku: &str, stock: i64) -> Product {
        db.inventory()
            .register_product(
                &NewProduct {
                    sku: sku.to_string(),
                    name: format!("Product {sku}"),
                    cost_price_cents: 600,
                    selling_price_cents: 1000,
                    opening_stock: stock,
                    low_stock_threshold: 0,
                },
                None,
            )
            .await
            .unwrap()
    }

    fn cash_sale(items: Vec<NewSaleItem>) -> CreateSaleRequest {
        let total: i64 = items.iter().map(|i| i.total_price_cents).sum();
        CreateSaleRequest {
            customer_id: None,
            items,
            discount_cents: 0,
            amount_paid_cents: total,
            payment_method: PaymentMethod::Cash,
            currency: Currency::Lyd,
            exchange_rate: None,
            cashbox_id: None,
            created_by: "cashier-1".to_string(),
            notes: None,
            expected_total_cents: None,
        }
    }

    fn edit(sale_id: &str, return_ids: Vec<String>, new_items: Vec<NewSaleItem>) -> EditSaleRequest {
        EditSaleRequest {
            sale_id: sale_id.to_string(),
            return_item_ids: return_ids,
            new_items,
            cashbox_id: None,
            created_by: "cashier-1".to_string(),
            expected_version: None,
        }
    }

    fn reverse(sale_id: &str) -> ReverseSaleRequest {
        ReverseSaleRequest {
            sale_id: sale_id.to_string(),
            cashbox_id: None,
            created_by: "manager".to_string(),
            expected_version: None,
        }
    }

    #[tokio::test]
    async fn test_create_sale_moves_every_ledger() {
        let (db, orchestrator) = setup().await;
        let tea = product(&db, "TEA", 5).await;

        let created = orchestrator
            .create_sale(&cash_sale(vec![NewSaleItem::priced(&tea.id, 2, 1000, 600)]))
            .await
            .unwrap();

        assert_eq!(created.sale.total_cents, 2000);
        assert_eq!(created.sale.status, SaleStatus::Completed);
        assert_eq!(created.items[0].sku_snapshot, "TEA");
        assert_eq!(db.inventory().get_stock(&tea.id).await.unwrap(), 3);
        assert_eq!(db.cashbox().get_cashbox("main").await.unwrap().balance_lyd_cents, 2000);
    }

    #[tokio::test]
    async fn test_create_rejects_repeated_lines_beyond_stock() {
        let (db, orchestrator) = setup().await;
        let tea = product(&db, "TEA", 3).await;

        let req = cash_sale(vec![
            NewSaleItem::priced(&tea.id, 2, 1000, 600),
            NewSaleItem::priced(&tea.id, 2, 1000, 600),
        ]);
        let err = orchestrator.create_sale(&req).await.unwrap_err();
        match err {
            DbError::Domain(CoreError::InsufficientStock { available, requested, .. }) => {
                assert_eq!(available, 3);
                assert_eq!(requested, 4);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(db.inventory().get_stock(&tea.id).await.unwrap(), 3);
        assert!(db.sales().list_sales(10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_oversized_price_is_rejected_before_stock_moves() {
        let (db, orchestrator) = setup().await;
        let tea = product(&db, "TEA", 5).await;

        let mut req = cash_sale(vec![NewSaleItem::priced(&tea.id, 3, i64::MAX / 2, 600)]);
        req.amount_paid_cents = 0;
        let err = orchestrator.create_sale(&req).await.unwrap_err();
        assert!(matches!(
            err,
            DbError::Domain(CoreError::Validation(ValidationError::OutOfRange { .. }))
        ));
        assert_eq!(db.inventory().get_stock(&tea.id).await.unwrap(), 5);
        assert!(db.sales().list_sales(10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_create_checks_expected_total() {
        let (db, orchestrator) = setup().await;
        let tea = product(&db, "TEA", 3).await;

        let mut req = cash_sale(vec![NewSaleItem::priced(&tea.id, 1, 1000, 600)]);
        req.expected_total_cents = Some(999);
        let err = orchestrator.create_sale(&req).await.unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::InvariantViolation { .. })));
    }

    #[tokio::test]
    async fn test_credit_needs_partial_and_customer() {
        let (db, orchestrator) = setup().await;
        let tea = product(&db, "TEA", 3).await;

        let mut req = cash_sale(vec![NewSaleItem::priced(&tea.id, 1, 1000, 600)]);
        req.amount_paid_cents = 400;
        assert!(matches!(
            orchestrator.create_sale(&req).await.unwrap_err(),
            DbError::Domain(CoreError::Validation(_))
        ));

        let customer = db.customers().register_customer("Salem", None).await.unwrap();
        req.customer_id = Some(customer.id.clone());
        assert!(orchestrator.create_sale(&req).await.is_err());

        req.payment_method = PaymentMethod::Partial;
        let created = orchestrator.create_sale(&req).await.unwrap();
        assert_eq!(created.sale.amount_due_cents, 600);

        let after = db.customers().get_customer(&customer.id).await.unwrap();
        assert_eq!(after.balance_owed_cents, 600);
        assert_eq!(after.total_purchases_cents, 1000);
    }

    #[tokio::test]
    async fn test_unknown_customer_aborts_before_stock() {
        let (db, orchestrator) = setup().await;
        let tea = product(&db, "TEA", 3).await;

        let mut req = cash_sale(vec![NewSaleItem::priced(&tea.id, 1, 1000, 600)]);
        req.customer_id = Some("ghost".to_string());
        let err = orchestrator.create_sale(&req).await.unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::CustomerNotFound(_))));
        assert_eq!(db.inventory().get_stock(&tea.id).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_unknown_cashbox_rolls_back_stock() {
        let (db, orchestrator) = setup().await;
        let tea = product(&db, "TEA", 3).await;

        let mut req = cash_sale(vec![NewSaleItem::priced(&tea.id, 1, 1000, 600)]);
        req.cashbox_id = Some("nope".to_string());
        let err = orchestrator.create_sale(&req).await.unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::CashboxNotFound(_))));
        assert_eq!(db.inventory().get_stock(&tea.id).await.unwrap(), 3);
        assert!(db.sales().list_sales(10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_usd_sale_needs_rate_and_converts_for_customer() {
        let (db, orchestrator) = setup().await;
        let tea = product(&db, "TEA", 3).await;
        let customer = db.customers().register_customer("Amal", None).await.unwrap();

        let mut req = cash_sale(vec![NewSaleItem::priced(&tea.id, 1, 1000, 600)]);
        req.currency = Currency::Usd;
        req.customer_id = Some(customer.id.clone());
        req.payment_method = PaymentMethod::Partial;
        req.amount_paid_cents = 600;
        assert!(orchestrator.create_sale(&req).await.is_err());

        req.exchange_rate = Some("4.85".parse::<ExchangeRate>().unwrap());
        let created = orchestrator.create_sale(&req).await.unwrap();
        assert_eq!(created.sale.exchange_rate_micros, Some(4_850_000));

        let cashbox = db.cashbox().get_cashbox("main").await.unwrap();
        assert_eq!(cashbox.balance_usd_cents, 600);
        assert_eq!(cashbox.balance_lyd_cents, 0);

        let after = db.customers().get_customer(&customer.id).await.unwrap();
        assert_eq!(after.balance_owed_cents, 1940);
        assert_eq!(after.total_purchases_cents, 4850);
    }

    #[tokio::test]
    async fn test_usd_credit_returned_line_by_line_clears_the_customer() {
        let (db, orchestrator) = setup().await;
        let tea = product(&db, "TEA", 5).await;
        let customer = db.customers().register_customer("Amal", None).await.unwrap();

        let mut req = cash_sale(vec![
            NewSaleItem::priced(&tea.id, 1, 5, 3),
            NewSaleItem::priced(&tea.id, 1, 5, 3),
        ]);
        req.currency = Currency::Usd;
        req.exchange_rate = Some("4.85".parse::<ExchangeRate>().unwrap());
        req.customer_id = Some(customer.id.clone());
        req.payment_method = PaymentMethod::Partial;
        req.amount_paid_cents = 0;
        let created = orchestrator.create_sale(&req).await.unwrap();

        // 0.10 USD at 4.85 is 0.485 LYD, rounded to 0.49.
        let owed = db.customers().get_customer(&customer.id).await.unwrap();
        assert_eq!(owed.balance_owed_cents, 49);

        let first = orchestrator
            .edit_sale(&edit(&created.sale.id, vec![created.items[0].id.clone()], vec![]))
            .await
            .unwrap();
        assert_eq!(first.customer_balance_delta_cents, -25);

        let second = orchestrator
            .edit_sale(&edit(&created.sale.id, vec![created.items[1].id.clone()], vec![]))
            .await
            .unwrap();
        assert_eq!(second.customer_balance_delta_cents, -24);
        assert_eq!(second.sale.sale.status, SaleStatus::Returned);
        assert_eq!(second.sale.sale.amount_due_cents, 0);

        let after = db.customers().get_customer(&customer.id).await.unwrap();
        assert_eq!(after.balance_owed_cents, 0);
        assert_eq!(after.total_purchases_cents, 49);
        assert!(db.auditor().audit().await.unwrap().is_consistent());
    }

    #[tokio::test]
    async fn test_edit_with_nothing_is_rejected() {
        let (_db, orchestrator) = setup().await;
        let err = orchestrator.edit_sale(&edit("s1", vec![], vec![])).await.unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::NoChangeRequested { .. })));
    }

    #[tokio::test]
    async fn test_edit_adding_more_collects_cash() {
        let (db, orchestrator) = setup().await;
        let tea = product(&db, "TEA", 5).await;
        let coffee = product(&db, "COF", 5).await;

        let created = orchestrator
            .create_sale(&cash_sale(vec![NewSaleItem::priced(&tea.id, 1, 1000, 600)]))
            .await
            .unwrap();

        let outcome = orchestrator
            .edit_sale(&edit(
                &created.sale.id,
                vec![],
                vec![NewSaleItem::priced(&coffee.id, 2, 1500, 900)],
            ))
            .await
            .unwrap();

        assert_eq!(outcome.price_diff_cents, 3000);
        assert_eq!(outcome.cash_delta_cents, 3000);
        assert_eq!(outcome.sale.sale.total_cents, 4000);
        assert_eq!(outcome.sale.sale.amount_paid_cents, 4000);
        assert_eq!(outcome.sale.items.len(), 2);
        assert_eq!(outcome.sale.sale.version, 2);
        assert_eq!(db.inventory().get_stock(&coffee.id).await.unwrap(), 3);
        assert_eq!(db.cashbox().get_cashbox("main").await.unwrap().balance_lyd_cents, 4000);
    }

    #[tokio::test]
    async fn test_edit_of_partial_sale_moves_customer_balance() {
        let (db, orchestrator) = setup().await;
        let tea = product(&db, "TEA", 5).await;
        let customer = db.customers().register_customer("Huda", None).await.unwrap();

        let mut req = cash_sale(vec![
            NewSaleItem::priced(&tea.id, 1, 1000, 600),
            NewSaleItem::priced(&tea.id, 2, 1000, 600),
        ]);
        req.customer_id = Some(customer.id.clone());
        req.payment_method = PaymentMethod::Partial;
        req.amount_paid_cents = 1000;
        let created = orchestrator.create_sale(&req).await.unwrap();
        assert_eq!(created.sale.amount_due_cents, 2000);

        // Returning 2000 worth clears the due; no cash changes hands.
        let outcome = orchestrator
            .edit_sale(&edit(&created.sale.id, vec![created.items[1].id.clone()], vec![]))
            .await
            .unwrap();
        assert_eq!(outcome.cash_delta_cents, 0);
        assert_eq!(outcome.customer_balance_delta_cents, -2000);
        assert_eq!(outcome.sale.sale.amount_due_cents, 0);
        assert_eq!(outcome.sale.sale.amount_paid_cents, 1000);

        let after = db.customers().get_customer(&customer.id).await.unwrap();
        assert_eq!(after.balance_owed_cents, 0);
        assert_eq!(after.total_purchases_cents, 3000);
        assert_eq!(db.cashbox().transactions_for("main").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_return_sale_reverses_everything() {
        let (db, orchestrator) = setup().await;
        let tea = product(&db, "TEA", 5).await;

        let created = orchestrator
            .create_sale(&cash_sale(vec![NewSaleItem::priced(&tea.id, 2, 1000, 600)]))
            .await
            .unwrap();
        let outcome = orchestrator.return_sale(&reverse(&created.sale.id)).await.unwrap();

        assert_eq!(outcome.sale.sale.status, SaleStatus::Returned);
        assert!(outcome.sale.items.is_empty());
        assert_eq!(outcome.sale.sale.total_cents, 0);
        assert_eq!(outcome.cash_delta_cents, -2000);
        assert_eq!(db.inventory().get_stock(&tea.id).await.unwrap(), 5);
        assert_eq!(db.cashbox().get_cashbox("main").await.unwrap().balance_lyd_cents, 0);

        let again = orchestrator.return_sale(&reverse(&created.sale.id)).await.unwrap_err();
        assert!(matches!(again, DbError::Domain(CoreError::InvalidSaleStatus { .. })));
    }

    #[tokio::test]
    async fn test_cancel_sale_ends_cancelled() {
        let (db, orchestrator) = setup().await;
        let tea = product(&db, "TEA", 5).await;

        let created = orchestrator
            .create_sale(&cash_sale(vec![NewSaleItem::priced(&tea.id, 1, 1000, 600)]))
            .await
            .unwrap();
        let outcome = orchestrator.cancel_sale(&reverse(&created.sale.id)).await.unwrap();
        assert_eq!(outcome.sale.sale.status, SaleStatus::Cancelled);

        let movements = db.inventory().movements_for(&tea.id).await.unwrap();
        assert_eq!(movements.last().unwrap().reason, "sale-cancel");
    }

    #[tokio::test]
    async fn test_stale_version_is_concurrent_modification() {
        let (db, orchestrator) = setup().await;
        let tea = product(&db, "TEA", 5).await;

        let created = orchestrator
            .create_sale(&cash_sale(vec![NewSaleItem::priced(&tea.id, 1, 1000, 600)]))
            .await
            .unwrap();
        orchestrator
            .edit_sale(&edit(&created.sale.id, vec![], vec![NewSaleItem::priced(&tea.id, 1, 1000, 600)]))
            .await
            .unwrap();

        let mut stale = edit(&created.sale.id, vec![created.items[0].id.clone()], vec![]);
        stale.expected_version = Some(1);
        let err = orchestrator.edit_sale(&stale).await.unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(db.inventory().get_stock(&tea.id).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_return_of_foreign_line_rejected() {
        let (db, orchestrator) = setup().await;
        let tea = product(&db, "TEA", 5).await;

        let first = orchestrator
            .create_sale(&cash_sale(vec![NewSaleItem::priced(&tea.id, 1, 1000, 600)]))
            .await
            .unwrap();
        let second = orchestrator
            .create_sale(&cash_sale(vec![NewSaleItem::priced(&tea.id, 1, 1000, 600)]))
            .await
            .unwrap();

        let err = orchestrator
            .edit_sale(&edit(&first.sale.id, vec![second.items[0].id.clone()], vec![]))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::SaleItemNotFound { .. })));
    }

    #[tokio::test]
    async fn test_customer_payment() {
        let (db, orchestrator) = setup().await;
        let customer = db.customers().register_customer("Salem", None).await.unwrap();
        db.customers()
            .adjust_balance(&customer.id, Money::from_cents(5000), "opening-balance", None)
            .await
            .unwrap();

        let receipt = orchestrator
            .receive_payment(&CustomerPaymentRequest {
                customer_id: customer.id.clone(),
                amount_cents: 2000,
                currency: Currency::Lyd,
                exchange_rate: None,
                cashbox_id: None,
                created_by: "cashier-1".to_string(),
            })
            .await
            .unwrap();

        assert_eq!(receipt.customer.balance_owed_cents, 3000);
        assert_eq!(receipt.transaction.tx_type, CashboxTxType::Deposit);
        assert_eq!(receipt.transaction.balance_lyd_after_cents, 2000);
    }
}
