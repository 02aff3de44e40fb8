//! # Repository Module
//!
//! The four ledgers, each a repository over its own tables.
//!
//! ## Two Ways In
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  db.inventory().apply_movement(&req)                                   │
//! │       │  opens its own UnitOfWork, commits on success                  │
//! │       ▼                                                                 │
//! │  InventoryRepository::apply_movement_in(conn, &req)                    │
//! │       ▲  runs on a caller's connection, never commits                  │
//! │       │                                                                 │
//! │  TransactionOrchestrator (one UnitOfWork across all four ledgers)      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every `*_in` function takes `&mut SqliteConnection` so the orchestrator
//! can run stock, sale, cash and customer writes inside one transaction.
//!
//! ## Available Repositories
//!
//! - [`InventoryRepository`](inventory::InventoryRepository) - stock and movements
//! - [`CashboxRepository`](cashbox::CashboxRepository) - balances, cash log, expenses
//! - [`CustomerRepository`](customer::CustomerRepository) - balances and ledger
//! - [`SaleRepository`](sale::SaleRepository) - sale headers and lines

pub mod cashbox;
pub mod customer;
pub mod inventory;
pub mod sale;

/// What a ledger row points back to (`sale` / id, `expense` / id, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reference<'a> {
    pub kind: &'a str,
    pub id: &'a str,
}

impl<'a> Reference<'a> {
    pub fn new(kind: &'a str, id: &'a str) -> Self {
        Reference { kind, id }
    }

    pub fn sale(id: &'a str) -> Self {
        Reference { kind: "sale", id }
    }
}
