//! # Ledger Commands
//!
//! Products and stock, customer accounts, and cashboxes.

use serde::{Deserialize, Serialize};
use tracing::debug;

use khazna_core::request::CustomerPaymentRequest;
use khazna_core::{
    Cashbox, CashboxTransaction, Currency, Customer, CustomerLedgerEntry, Expense, Money,
    MovementType, NewProduct, Product, Sale, StockMovement,
};
use khazna_db::{ExpenseRequest, MovementRequest, PaymentReceipt};

use crate::error::ApiError;
use crate::state::AppContext;

// =============================================================================
// Request / Response Bodies
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterProductRequest {
    #[serde(flatten)]
    pub product: NewProduct,
    #[serde(default)]
    pub created_by: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProductQuery {
    #[serde(default)]
    pub product_id: Option<String>,
    #[serde(default)]
    pub sku: Option<String>,
}

/// A manual stock movement (delivery, count correction, damage).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdjustStockRequest {
    pub product_id: String,
    pub movement_type: MovementType,
    /// Positive for `in`/`out`, the signed delta for `adjustment`.
    pub quantity: i64,
    #[serde(default)]
    pub unit_cost_cents: Option<i64>,
    pub reason: String,
    #[serde(default)]
    pub created_by: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterCustomerRequest {
    pub name: String,
    #[serde(default)]
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomerQuery {
    pub customer_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomerStatement {
    pub customer: Customer,
    pub ledger: Vec<CustomerLedgerEntry>,
    pub sales: Vec<Sale>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CashboxQuery {
    #[serde(default)]
    pub cashbox_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CashboxStatement {
    pub cashbox: Cashbox,
    pub transactions: Vec<CashboxTransaction>,
}

/// Body of `deposit` and `withdraw`; `amount_cents` is always positive.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CashMovementRequest {
    #[serde(default)]
    pub cashbox_id: Option<String>,
    #[serde(default)]
    pub currency: Currency,
    pub amount_cents: i64,
    pub description: String,
    #[serde(default)]
    pub created_by: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordExpenseRequest {
    #[serde(default)]
    pub cashbox_id: Option<String>,
    pub category: String,
    pub description: String,
    pub amount_cents: i64,
    #[serde(default)]
    pub currency: Currency,
    #[serde(default)]
    pub created_by: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpenseReceipt {
    pub expense: Expense,
    pub transaction: CashboxTransaction,
}

// =============================================================================
// Products and Stock
// =============================================================================

pub async fn register_product(
    ctx: &AppContext,
    req: RegisterProductRequest,
) -> Result<Product, ApiError> {
    debug!(sku = %req.product.sku, "register_product command");
    Ok(ctx
        .db()
        .inventory()
        .register_product(&req.product, req.created_by.as_deref())
        .await?)
}

pub async fn get_product(ctx: &AppContext, query: ProductQuery) -> Result<Product, ApiError> {
    let inventory = ctx.db().inventory();
    match (query.product_id, query.sku) {
        (Some(id), _) => inventory
            .get_product(&id)
            .await?
            .ok_or_else(|| ApiError::not_found("Product", &id)),
        (None, Some(sku)) => inventory
            .get_product_by_sku(&sku)
            .await?
            .ok_or_else(|| ApiError::not_found("Product", &sku)),
        (None, None) => Err(ApiError::validation("product_id or sku is required")),
    }
}

pub async fn list_products(ctx: &AppContext) -> Result<Vec<Product>, ApiError> {
    Ok(ctx.db().inventory().list_products().await?)
}

pub async fn low_stock(ctx: &AppContext) -> Result<Vec<Product>, ApiError> {
    Ok(ctx.db().inventory().list_low_stock().await?)
}

pub async fn adjust_stock(
    ctx: &AppContext,
    req: AdjustStockRequest,
) -> Result<StockMovement, ApiError> {
    debug!(product_id = %req.product_id, movement = ?req.movement_type, "adjust_stock command");
    let mut movement = MovementRequest::new(
        req.product_id,
        req.movement_type,
        req.quantity,
        req.reason,
    );
    if let Some(cost) = req.unit_cost_cents {
        movement = movement.with_unit_cost(cost);
    }
    if let Some(user) = req.created_by {
        movement = movement.created_by(user);
    }
    Ok(ctx.db().inventory().apply_movement(&movement).await?)
}

pub async fn stock_movements(
    ctx: &AppContext,
    query: ProductQuery,
) -> Result<Vec<StockMovement>, ApiError> {
    let product = get_product(ctx, query).await?;
    Ok(ctx.db().inventory().movements_for(&product.id).await?)
}

// =============================================================================
// Customers
// =============================================================================

pub async fn register_customer(
    ctx: &AppContext,
    req: RegisterCustomerRequest,
) -> Result<Customer, ApiError> {
    debug!("register_customer command");
    Ok(ctx
        .db()
        .customers()
        .register_customer(&req.name, req.phone.as_deref())
        .await?)
}

pub async fn get_customer(
    ctx: &AppContext,
    query: CustomerQuery,
) -> Result<CustomerStatement, ApiError> {
    let customers = ctx.db().customers();
    let customer = customers.get_customer(&query.customer_id).await?;
    let ledger = customers.ledger_for(&customer.id).await?;
    let sales = ctx.db().sales().list_sales_for_customer(&customer.id).await?;
    Ok(CustomerStatement {
        customer,
        ledger,
        sales,
    })
}

pub async fn list_customers(ctx: &AppContext) -> Result<Vec<Customer>, ApiError> {
    Ok(ctx.db().customers().list_customers().await?)
}

pub async fn receive_payment(
    ctx: &AppContext,
    req: CustomerPaymentRequest,
) -> Result<PaymentReceipt, ApiError> {
    debug!(customer_id = %req.customer_id, amount = req.amount_cents, "receive_payment command");
    Ok(ctx.orchestrator().receive_payment(&req).await?)
}

// =============================================================================
// Cashbox
// =============================================================================

pub async fn get_cashbox(
    ctx: &AppContext,
    query: CashboxQuery,
) -> Result<CashboxStatement, ApiError> {
    let cashbox_id = ctx.cashbox_or_default(query.cashbox_id.as_deref());
    let repo = ctx.db().cashbox();
    Ok(CashboxStatement {
        cashbox: repo.get_cashbox(cashbox_id).await?,
        transactions: repo.transactions_for(cashbox_id).await?,
    })
}

pub async fn deposit(
    ctx: &AppContext,
    req: CashMovementRequest,
) -> Result<CashboxTransaction, ApiError> {
    let cashbox_id = ctx.cashbox_or_default(req.cashbox_id.as_deref());
    debug!(cashbox_id = %cashbox_id, amount = req.amount_cents, "deposit command");
    Ok(ctx
        .db()
        .cashbox()
        .deposit(
            cashbox_id,
            req.currency,
            Money::from_cents(req.amount_cents),
            &req.description,
            req.created_by.as_deref(),
        )
        .await?)
}

pub async fn withdraw(
    ctx: &AppContext,
    req: CashMovementRequest,
) -> Result<CashboxTransaction, ApiError> {
    let cashbox_id = ctx.cashbox_or_default(req.cashbox_id.as_deref());
    debug!(cashbox_id = %cashbox_id, amount = req.amount_cents, "withdraw command");
    Ok(ctx
        .db()
        .cashbox()
        .withdraw(
            cashbox_id,
            req.currency,
            Money::from_cents(req.amount_cents),
            &req.description,
            req.created_by.as_deref(),
        )
        .await?)
}

pub async fn record_expense(
    ctx: &AppContext,
    req: RecordExpenseRequest,
) -> Result<ExpenseReceipt, ApiError> {
    let expense = ExpenseRequest {
        cashbox_id: ctx.cashbox_or_default(req.cashbox_id.as_deref()).to_string(),
        category: req.category,
        description: req.description,
        amount_cents: req.amount_cents,
        currency: req.currency,
        created_by: req.created_by,
    };
    debug!(cashbox_id = %expense.cashbox_id, category = %expense.category, "record_expense command");
    let (expense, transaction) = ctx.db().cashbox().record_expense(&expense).await?;
    Ok(ExpenseReceipt {
        expense,
        transaction,
    })
}

pub async fn list_expenses(ctx: &AppContext, query: CashboxQuery) -> Result<Vec<Expense>, ApiError> {
    let cashbox_id = ctx.cashbox_or_default(query.cashbox_id.as_deref());
    Ok(ctx.db().cashbox().list_expenses(cashbox_id).await?)
}
