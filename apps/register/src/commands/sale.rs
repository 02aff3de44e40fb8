//! # Sale Commands
//!
//! `checkout` builds a price-locked cart from the catalogue; the other
//! write commands pass the caller's request straight to the orchestrator.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use khazna_core::cart::Cart;
use khazna_core::request::{CreateSaleRequest, EditSaleRequest, ReverseSaleRequest};
use khazna_core::{PaymentMethod, Sale, SaleWithItems};
use khazna_db::EditOutcome;

use crate::error::ApiError;
use crate::state::AppContext;

/// Default page size for `list-sales`.
const DEFAULT_LIST_LIMIT: u32 = 50;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutLine {
    pub product_id: String,
    pub quantity: i64,
}

/// A base-currency sale priced from the catalogue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutRequest {
    #[serde(default)]
    pub customer_id: Option<String>,
    pub lines: Vec<CheckoutLine>,
    #[serde(default)]
    pub discount_cents: i64,
    /// Omitted means paid in full.
    #[serde(default)]
    pub amount_paid_cents: Option<i64>,
    pub payment_method: PaymentMethod,
    #[serde(default)]
    pub cashbox_id: Option<String>,
    pub created_by: String,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaleQuery {
    #[serde(default)]
    pub sale_id: Option<String>,
    #[serde(default)]
    pub sale_number: Option<String>,
    /// Also list lines that were returned.
    #[serde(default)]
    pub include_returned: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListSalesRequest {
    #[serde(default)]
    pub limit: Option<u32>,
    #[serde(default)]
    pub customer_id: Option<String>,
}

pub async fn checkout(ctx: &AppContext, req: CheckoutRequest) -> Result<SaleWithItems, ApiError> {
    debug!(lines = req.lines.len(), "checkout command");

    let mut cart = Cart::new();
    for line in &req.lines {
        let product = ctx
            .db()
            .inventory()
            .get_product(&line.product_id)
            .await?
            .ok_or_else(|| ApiError::not_found("Product", &line.product_id))?;
        cart.add_product(&product, line.quantity)?;
    }
    if cart.is_empty() {
        return Err(ApiError::validation("Cart is empty"));
    }

    let total = cart.subtotal().cents() - req.discount_cents;
    let request = CreateSaleRequest {
        customer_id: req.customer_id,
        items: cart.to_new_items(),
        discount_cents: req.discount_cents,
        amount_paid_cents: req.amount_paid_cents.unwrap_or(total),
        payment_method: req.payment_method,
        currency: ctx.config().ledger.base_currency,
        exchange_rate: None,
        cashbox_id: req.cashbox_id,
        created_by: req.created_by,
        notes: req.notes,
        expected_total_cents: Some(total),
    };
    create_sale(ctx, request).await
}

pub async fn create_sale(
    ctx: &AppContext,
    req: CreateSaleRequest,
) -> Result<SaleWithItems, ApiError> {
    debug!(items = req.items.len(), currency = %req.currency, "create_sale command");
    let created = ctx.orchestrator().create_sale(&req).await?;
    info!(
        store = %ctx.config().store.name,
        sale_number = %created.sale.sale_number,
        total = %created.sale.currency.format(created.sale.total()),
        "Sale rung up"
    );
    Ok(created)
}

pub async fn edit_sale(ctx: &AppContext, req: EditSaleRequest) -> Result<EditOutcome, ApiError> {
    debug!(
        sale_id = %req.sale_id,
        returns = req.return_item_ids.len(),
        adds = req.new_items.len(),
        "edit_sale command"
    );
    Ok(ctx.orchestrator().edit_sale(&req).await?)
}

pub async fn return_sale(
    ctx: &AppContext,
    req: ReverseSaleRequest,
) -> Result<EditOutcome, ApiError> {
    debug!(sale_id = %req.sale_id, "return_sale command");
    Ok(ctx.orchestrator().return_sale(&req).await?)
}

pub async fn cancel_sale(
    ctx: &AppContext,
    req: ReverseSaleRequest,
) -> Result<EditOutcome, ApiError> {
    debug!(sale_id = %req.sale_id, "cancel_sale command");
    Ok(ctx.orchestrator().cancel_sale(&req).await?)
}

pub async fn get_sale(ctx: &AppContext, query: SaleQuery) -> Result<SaleWithItems, ApiError> {
    let sales = ctx.db().sales();
    let sale_id = match (query.sale_id, query.sale_number) {
        (Some(id), _) => id,
        (None, Some(number)) => {
            sales
                .get_sale_by_number(&number)
                .await?
                .ok_or_else(|| ApiError::not_found("Sale", &number))?
                .id
        }
        (None, None) => return Err(ApiError::validation("sale_id or sale_number is required")),
    };

    let mut found = sales.get_sale_with_items(&sale_id).await?;
    if query.include_returned {
        found.items = sales.get_all_items(&sale_id).await?;
    }
    Ok(found)
}

pub async fn list_sales(ctx: &AppContext, req: ListSalesRequest) -> Result<Vec<Sale>, ApiError> {
    let sales = ctx.db().sales();
    let limit = req.limit.unwrap_or(DEFAULT_LIST_LIMIT);
    match req.customer_id {
        Some(customer_id) => {
            let mut found = sales.list_sales_for_customer(&customer_id).await?;
            found.truncate(limit as usize);
            Ok(found)
        }
        None => Ok(sales.list_sales(limit).await?),
    }
}
