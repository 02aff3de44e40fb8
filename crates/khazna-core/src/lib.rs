//! # khazna-core: Pure Business Logic for Khazna POS
//!
//! The arithmetic and rules of the sale transaction & reconciliation engine,
//! as pure functions with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Khazna POS Architecture                          │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │            Register (API boundary: JSON in, JSON out)           │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │   khazna-db: ledgers, UnitOfWork, TransactionOrchestrator       │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ khazna-core (THIS CRATE) ★                      │   │
//! │  │                                                                 │   │
//! │  │   ┌─────────┐ ┌─────────┐ ┌─────────┐ ┌────────────┐ ┌───────┐  │   │
//! │  │   │  types  │ │  money  │ │  cart   │ │ settlement │ │valid. │  │   │
//! │  │   │ Sale    │ │ Money   │ │ price   │ │ SaleTotals │ │ rules │  │   │
//! │  │   │ Movement│ │ Currency│ │ locking │ │ plan_edit  │ │       │  │   │
//! │  │   └─────────┘ └─────────┘ └─────────┘ └────────────┘ └───────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS            │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Ledger facts and aggregates (Product, Sale, Cashbox, ...)
//! - [`money`] - Integer money, currencies, fixed-point exchange rates
//! - [`cart`] - Carts with prices locked at add-time
//! - [`settlement`] - Sale totals and edit settlement plans
//! - [`request`] - Request shapes accepted at the API boundary
//! - [`validation`] - Input rules
//! - [`error`] - Domain error types
//!
//! ## Example Usage
//!
//! ```rust
//! use khazna_core::money::Money;
//! use khazna_core::settlement::{plan_edit, SaleTotals};
//! use khazna_core::NewSaleItem;
//!
//! let items = vec![NewSaleItem::priced("tea", 2, 1000, 600)];
//! let totals = SaleTotals::compute(&items, Money::zero(), Money::from_cents(2000)).unwrap();
//!
//! // Return the line, add one at 15.00: 5.00 goes back to the customer.
//! let plan = plan_edit(&totals, Money::from_cents(2000), Money::from_cents(1500), false).unwrap();
//! assert_eq!(plan.cash_delta.cents(), -500);
//! ```

pub mod cart;
pub mod error;
pub mod money;
pub mod request;
pub mod settlement;
pub mod types;
pub mod validation;

pub use error::{CoreError, CoreResult, ValidationError};
pub use money::{Currency, ExchangeRate, Money};
pub use types::*;

/// Cashbox used when a request does not name one.
pub const DEFAULT_CASHBOX_ID: &str = "main";

/// Maximum lines on a single sale.
pub const MAX_CART_ITEMS: usize = 100;

/// Maximum quantity of a single line.
///
/// Guards against typing 1000 instead of 10.
pub const MAX_ITEM_QUANTITY: i64 = 9_999;

/// Maximum unit price or cost, in minor units (one billion major units).
///
/// Keeps `quantity * price` summed over a full cart well inside `i64`.
pub const MAX_UNIT_PRICE_CENTS: i64 = 100_000_000_000;
