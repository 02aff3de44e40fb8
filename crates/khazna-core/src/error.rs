//! # Error Types
//!
//! Domain-specific error types for khazna-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  khazna-core errors (this file)                                        │
//! │  ├── CoreError        - Business rule failures                         │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  khazna-db errors                                                      │
//! │  └── DbError          - Storage failures (wraps CoreError as Domain)   │
//! │                                                                         │
//! │  register app                                                          │
//! │  └── ApiError         - What the caller sees (serialized)              │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → DbError → ApiError → Caller       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every failure the orchestrator reports is one of these variants. None of
//! them leave partial writes behind: they are raised before commit, and the
//! surrounding unit of work is rolled back.

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Product cannot be found.
    #[error("Product not found: {0}")]
    ProductNotFound(String),

    /// A stock decrement exceeds what is on hand.
    ///
    /// ## When This Occurs
    /// - Cart line quantity > current stock at checkout
    /// - Edit adds a line for a product that was sold out meanwhile
    /// - Manual adjustment would drive stock below zero
    ///
    /// ## User Workflow
    /// ```text
    /// Edit sale: return A, add B (qty 3)
    ///      │
    ///      ▼
    /// Stock B = 1  ──►  InsufficientStock { sku: "B", available: 1, requested: 3 }
    ///      │
    ///      ▼
    /// Whole edit rolled back: A is still on the sale, stock of A unchanged
    /// ```
    #[error("Insufficient stock for {sku}: available {available}, requested {requested}")]
    InsufficientStock {
        sku: String,
        available: i64,
        requested: i64,
    },

    /// Caller-supplied figures disagree with the ones derived from them.
    ///
    /// ## When This Occurs
    /// - A line's `total_price` is not `quantity × unit_price`
    /// - A line's `profit` is not `total_price − quantity × unit_cost`
    /// - The caller's expected sale total differs from the computed one
    #[error("Invariant violated for {what}: expected {expected}, got {actual}")]
    InvariantViolation {
        what: String,
        expected: i64,
        actual: i64,
    },

    /// Edit with nothing to return and nothing to add.
    #[error("Edit of sale {sale_id} requests no change")]
    NoChangeRequested { sale_id: String },

    /// Sale not found.
    #[error("Sale not found: {0}")]
    SaleNotFound(String),

    /// A returned item id is not an active line of the sale.
    #[error("Sale item {item_id} is not an active line of sale {sale_id}")]
    SaleItemNotFound { sale_id: String, item_id: String },

    /// Customer not found.
    #[error("Customer not found: {0}")]
    CustomerNotFound(String),

    /// Cashbox not found.
    #[error("Cashbox not found: {0}")]
    CashboxNotFound(String),

    /// Optimistic version check failed.
    ///
    /// ## When This Occurs
    /// - Caller edits a sale using a version it read before another edit
    /// - A versioned row changed between read and conditional write
    ///
    /// The caller should reload and retry the whole operation.
    #[error("{entity} {id} was modified concurrently")]
    ConcurrentModification { entity: String, id: String },

    /// Sale is not in a state that allows the requested operation.
    ///
    /// ## When This Occurs
    /// - Editing a sale that was already returned or cancelled
    /// - Returning a pending sale
    #[error("Sale {sale_id} is {current_status}, cannot perform operation")]
    InvalidSaleStatus {
        sale_id: String,
        current_status: String,
    },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl CoreError {
    /// Shorthand for an `InvariantViolation`.
    pub fn invariant(what: impl Into<String>, expected: i64, actual: i64) -> Self {
        CoreError::InvariantViolation {
            what: what.into(),
            expected,
            actual,
        }
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// Raised before any storage work starts.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Value must not be negative.
    #[error("{field} must not be negative")]
    MustNotBeNegative { field: String },

    /// Invalid format (e.g., malformed exchange rate).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Value is not in allowed set.
    #[error("{field} must be one of: {allowed:?}")]
    NotAllowed { field: String, allowed: Vec<String> },

    /// Two fields contradict each other.
    #[error("{field}: {reason}")]
    Inconsistent { field: String, reason: String },

    /// Duplicate value in a set that must be unique.
    #[error("{field} '{value}' is listed more than once")]
    Duplicate { field: String, value: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
