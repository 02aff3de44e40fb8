//! # khazna-db: Ledgers and Transaction Orchestrator for Khazna POS
//!
//! SQLite persistence for the four ledgers and the orchestrator that keeps
//! them in step.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Khazna POS Data Flow                             │
//! │                                                                         │
//! │  register command (create-sale / edit-sale / return-sale ...)          │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     khazna-db (THIS CRATE)                      │   │
//! │  │                                                                 │   │
//! │  │   TransactionOrchestrator ── one UnitOfWork per call ──┐        │   │
//! │  │        │          │           │            │            │        │   │
//! │  │        ▼          ▼           ▼            ▼            ▼        │   │
//! │  │   Inventory    Sale Record  Cashbox     Customer     commit /   │   │
//! │  │   Ledger       Store        Ledger      Account      rollback   │   │
//! │  │                                                                 │   │
//! │  │   LedgerAuditor ── folds every log, compares with aggregates    │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite (WAL) ── append-only fact tables + materialised balances       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`unit_of_work`] - The transaction boundary
//! - [`repository`] - The four ledgers
//! - [`orchestrator`] - Create / edit / return / cancel
//! - [`audit`] - Log-vs-aggregate integrity check
//!
//! ## Usage
//!
//! ```rust,ignore
//! use khazna_db::{Database, DbConfig, LedgerSettings};
//!
//! let db = Database::new(DbConfig::new("path/to/khazna.db")).await?;
//! let orchestrator = db.orchestrator(LedgerSettings::default());
//!
//! let sale = orchestrator.create_sale(&request).await?;
//! let report = db.auditor().audit().await?;
//! assert!(report.is_consistent());
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod audit;
pub mod error;
pub mod migrations;
pub mod orchestrator;
pub mod pool;
pub mod repository;
pub mod unit_of_work;

// =============================================================================
// Re-exports
// =============================================================================

pub use audit::{Discrepancy, DiscrepancyKind, IntegrityReport, LedgerAuditor};
pub use error::{DbError, DbResult};
pub use orchestrator::{EditOutcome, LedgerSettings, PaymentReceipt, TransactionOrchestrator};
pub use pool::{Database, DbConfig};
pub use unit_of_work::UnitOfWork;

// Repository re-exports for convenience
pub use repository::cashbox::{CashboxEntry, CashboxRepository, ExpenseRequest};
pub use repository::customer::CustomerRepository;
pub use repository::inventory::{InventoryRepository, MovementRequest};
pub use repository::sale::SaleRepository;
pub use repository::Reference;
