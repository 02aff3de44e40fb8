//! # Register Commands
//!
//! Every operation a caller can request, addressed by name and fed a JSON
//! body.
//!
//! ## Command Organization
//! ```text
//! commands/
//! ├── mod.rs      ◄─── You are here (names + dispatch)
//! ├── sale.rs     ◄─── checkout, create / edit / return / cancel, queries
//! ├── ledger.rs   ◄─── products, stock, customers, payments, cashbox
//! └── report.rs   ◄─── audit, sales summary
//! ```
//!
//! ## How Dispatch Works
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  khazna edit-sale request.json                                          │
//! │         │                                                               │
//! │         ▼                                                               │
//! │  Cli::try_parse_from(args)  ──► Command::EditSale(RequestArgs)          │
//! │         │                                                               │
//! │         ▼                                                               │
//! │  serde_json::from_value::<EditSaleRequest>(body)                        │
//! │         │            (malformed ──► VALIDATION_ERROR)                   │
//! │         ▼                                                               │
//! │  sale::edit_sale(&ctx, req) ──► Result<EditOutcome, ApiError>           │
//! │         │                                                               │
//! │         ▼                                                               │
//! │  serde_json::to_value(outcome)                                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

pub mod ledger;
pub mod report;
pub mod sale;

use clap::{Args, Subcommand};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::error::ApiError;
use crate::state::AppContext;

/// Where a command's JSON body comes from.
#[derive(Args, Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestArgs {
    /// JSON request body file, or `-` for stdin. Omitted means an empty body.
    #[arg(value_name = "REQUEST")]
    pub request: Option<String>,
}

/// A register command.
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
#[command(rename_all = "kebab-case")]
pub enum Command {
    /// Sell catalogue products at their current prices
    Checkout(RequestArgs),
    /// Record a sale with caller-locked prices
    CreateSale(RequestArgs),
    /// Return lines from a sale and/or add new ones
    EditSale(RequestArgs),
    /// Return every active line of a sale
    ReturnSale(RequestArgs),
    /// Reverse a sale and mark it cancelled
    CancelSale(RequestArgs),
    /// Show a sale with its lines
    GetSale(RequestArgs),
    /// List recent sales
    ListSales(RequestArgs),
    /// Add a product with its opening stock
    RegisterProduct(RequestArgs),
    /// Show a product by id or SKU
    GetProduct(RequestArgs),
    /// List all products
    ListProducts,
    /// List products at or below their threshold
    LowStock,
    /// Record a manual stock movement
    AdjustStock(RequestArgs),
    /// Show a product's movement log
    StockMovements(RequestArgs),
    /// Add a customer account
    RegisterCustomer(RequestArgs),
    /// Show a customer's balance, ledger and sales
    GetCustomer(RequestArgs),
    /// List customer accounts
    ListCustomers,
    /// Take a payment against a customer balance
    ReceivePayment(RequestArgs),
    /// Show a cashbox with its transactions
    GetCashbox(RequestArgs),
    /// Put cash into a cashbox
    Deposit(RequestArgs),
    /// Take cash out of a cashbox
    Withdraw(RequestArgs),
    /// Pay an expense out of a cashbox
    RecordExpense(RequestArgs),
    /// List a cashbox's expenses
    ListExpenses(RequestArgs),
    /// Check every balance against its log
    Audit,
    /// Totals over recent sales
    Summary(RequestArgs),
}

impl Command {
    /// The request body source, if the command takes one.
    pub fn request(&self) -> Option<&str> {
        match self {
            Command::ListProducts
            | Command::LowStock
            | Command::ListCustomers
            | Command::Audit => None,
            Command::Checkout(args)
            | Command::CreateSale(args)
            | Command::EditSale(args)
            | Command::ReturnSale(args)
            | Command::CancelSale(args)
            | Command::GetSale(args)
            | Command::ListSales(args)
            | Command::RegisterProduct(args)
            | Command::GetProduct(args)
            | Command::AdjustStock(args)
            | Command::StockMovements(args)
            | Command::RegisterCustomer(args)
            | Command::GetCustomer(args)
            | Command::ReceivePayment(args)
            | Command::GetCashbox(args)
            | Command::Deposit(args)
            | Command::Withdraw(args)
            | Command::RecordExpense(args)
            | Command::ListExpenses(args)
            | Command::Summary(args) => args.request.as_deref(),
        }
    }
}

/// Runs one command against `body`.
pub async fn dispatch(ctx: &AppContext, command: &Command, body: Value) -> Result<Value, ApiError> {
    tracing::debug!(?command, "dispatch");
    match command {
        Command::Checkout(_) => respond(sale::checkout(ctx, parse(body)?).await?),
        Command::CreateSale(_) => respond(sale::create_sale(ctx, parse(body)?).await?),
        Command::EditSale(_) => respond(sale::edit_sale(ctx, parse(body)?).await?),
        Command::ReturnSale(_) => respond(sale::return_sale(ctx, parse(body)?).await?),
        Command::CancelSale(_) => respond(sale::cancel_sale(ctx, parse(body)?).await?),
        Command::GetSale(_) => respond(sale::get_sale(ctx, parse(body)?).await?),
        Command::ListSales(_) => respond(sale::list_sales(ctx, parse(body)?).await?),
        Command::RegisterProduct(_) => respond(ledger::register_product(ctx, parse(body)?).await?),
        Command::GetProduct(_) => respond(ledger::get_product(ctx, parse(body)?).await?),
        Command::ListProducts => respond(ledger::list_products(ctx).await?),
        Command::LowStock => respond(ledger::low_stock(ctx).await?),
        Command::AdjustStock(_) => respond(ledger::adjust_stock(ctx, parse(body)?).await?),
        Command::StockMovements(_) => respond(ledger::stock_movements(ctx, parse(body)?).await?),
        Command::RegisterCustomer(_) => respond(ledger::register_customer(ctx, parse(body)?).await?),
        Command::GetCustomer(_) => respond(ledger::get_customer(ctx, parse(body)?).await?),
        Command::ListCustomers => respond(ledger::list_customers(ctx).await?),
        Command::ReceivePayment(_) => respond(ledger::receive_payment(ctx, parse(body)?).await?),
        Command::GetCashbox(_) => respond(ledger::get_cashbox(ctx, parse(body)?).await?),
        Command::Deposit(_) => respond(ledger::deposit(ctx, parse(body)?).await?),
        Command::Withdraw(_) => respond(ledger::withdraw(ctx, parse(body)?).await?),
        Command::RecordExpense(_) => respond(ledger::record_expense(ctx, parse(body)?).await?),
        Command::ListExpenses(_) => respond(ledger::list_expenses(ctx, parse(body)?).await?),
        Command::Audit => respond(report::audit(ctx).await?),
        Command::Summary(_) => respond(report::summary(ctx, parse(body)?).await?),
    }
}

/// Decodes a request body; `null` counts as `{}`.
fn parse<T: DeserializeOwned>(body: Value) -> Result<T, ApiError> {
    let body = if body.is_null() {
        Value::Object(Default::default())
    } else {
        body
    };
    Ok(serde_json::from_value(body)?)
}

fn respond<T: Serialize>(value: T) -> Result<Value, ApiError> {
    serde_json::to_value(value)
        .map_err(|e| ApiError::internal(format!("Cannot encode response: {}", e)))
}
