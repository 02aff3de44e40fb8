//! # Requests
//!
//! What the checkout and edit screens send through the API boundary.
//!
//! ```json
//! {
//!   "customer_id": null,
//!   "items": [{ "product_id": "…", "quantity": 2, "unit_price_cents": 1000,
//!               "unit_cost_cents": 600, "total_price_cents": 2000,
//!               "profit_cents": 800 }],
//!   "amount_paid_cents": 2000,
//!   "payment_method": "cash",
//!   "currency": "LYD",
//!   "created_by": "cashier-1"
//! }
//! ```

use serde::{Deserialize, Serialize};

use crate::money::{Currency, ExchangeRate};
use crate::types::{NewSaleItem, PaymentMethod};

/// Cart checkout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateSaleRequest {
    #[serde(default)]
    pub customer_id: Option<String>,
    pub items: Vec<NewSaleItem>,
    #[serde(default)]
    pub discount_cents: i64,
    pub amount_paid_cents: i64,
    pub payment_method: PaymentMethod,
    #[serde(default)]
    pub currency: Currency,
    /// Required iff `currency` differs from the base currency.
    #[serde(default)]
    pub exchange_rate: Option<ExchangeRate>,
    /// Defaults to the configured cashbox.
    #[serde(default)]
    pub cashbox_id: Option<String>,
    pub created_by: String,
    #[serde(default)]
    pub notes: Option<String>,
    /// When present, the computed total must match it exactly.
    #[serde(default)]
    pub expected_total_cents: Option<i64>,
}

/// Return a subset of a sale's lines and add new ones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditSaleRequest {
    pub sale_id: String,
    #[serde(default)]
    pub return_item_ids: Vec<String>,
    #[serde(default)]
    pub new_items: Vec<NewSaleItem>,
    #[serde(default)]
    pub cashbox_id: Option<String>,
    pub created_by: String,
    /// The sale version the caller last read; stale versions are rejected.
    #[serde(default)]
    pub expected_version: Option<i64>,
}

/// Whole-sale reversal (`return` or `cancel`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReverseSaleRequest {
    pub sale_id: String,
    #[serde(default)]
    pub cashbox_id: Option<String>,
    pub created_by: String,
    #[serde(default)]
    pub expected_version: Option<i64>,
}

/// A customer settling (part of) their balance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerPaymentRequest {
    pub customer_id: String,
    pub amount_cents: i64,
    #[serde(default)]
    pub currency: Currency,
    #[serde(default)]
    pub exchange_rate: Option<ExchangeRate>,
    #[serde(default)]
    pub cashbox_id: Option<String>,
    pub created_by: String,
}
