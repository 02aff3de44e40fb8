//! # API Error Type
//!
//! The one error type every command returns.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Flow in Khazna POS                             │
//! │                                                                         │
//! │  Command Function ── Result<T, ApiError>                               │
//! │         │                                                               │
//! │         ├── DbError::Busy / QueryFailed ─── logged ──► DATABASE_ERROR   │
//! │         │                                                               │
//! │         ├── DbError::Domain(CoreError) ──────────────► business code    │
//! │         │       InsufficientStock    ► INSUFFICIENT_STOCK               │
//! │         │       NoChangeRequested    ► NO_CHANGE_REQUESTED              │
//! │         │       ConcurrentModification ► CONCURRENT_MODIFICATION        │
//! │         │                                                               │
//! │         └── malformed request body ──────────────────► VALIDATION_ERROR │
//! │                                                                         │
//! │  Caller receives:                                                       │
//! │  { "code": "INSUFFICIENT_STOCK",                                        │
//! │    "message": "Insufficient stock for TEA: available 1, requested 3" }  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Storage details are logged with `tracing::error!`, never sent back.
//! `retryable` is set when repeating the whole request can succeed.

use serde::Serialize;
use thiserror::Error;

use khazna_core::{CoreError, ValidationError};
use khazna_db::DbError;

use crate::config::ConfigError;

/// Error returned by every command.
///
/// ```json
/// {
///   "code": "NOT_FOUND",
///   "message": "Sale not found: 4f0c..."
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Error)]
#[serde(rename_all = "camelCase")]
#[error("[{code:?}] {message}")]
pub struct ApiError {
    /// Machine-readable error code for programmatic handling
    pub code: ErrorCode,

    /// Human-readable error message for display
    pub message: String,

    /// The caller may repeat the request unchanged.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub retryable: bool,
}

/// Error codes for API responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Sale, line, product, customer or cashbox not found
    NotFound,

    /// Input validation failed
    ValidationError,

    /// Not enough stock for a decrement
    InsufficientStock,

    /// Caller figures disagree with derived ones, or a ledger check refused a write
    InvariantViolation,

    /// Edit with nothing to return and nothing to add
    NoChangeRequested,

    /// Stale version; reload and retry
    ConcurrentModification,

    /// Operation not allowed in the sale's current state
    BusinessLogic,

    /// Configuration could not be loaded
    ConfigError,

    /// Database operation failed
    DatabaseError,

    /// Internal error
    Internal,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        ApiError {
            code,
            message: message.into(),
            retryable: false,
        }
    }

    pub fn not_found(resource: &str, id: &str) -> Self {
        ApiError::new(ErrorCode::NotFound, format!("{} not found: {}", resource, id))
    }

    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::ValidationError, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::Internal, message)
    }

    fn retryable(mut self) -> Self {
        self.retryable = true;
        self
    }
}

/// Converts database errors to API errors.
impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::Domain(core) => core.into(),
            DbError::NotFound { entity, id } => ApiError::not_found(&entity, &id),
            DbError::UniqueViolation { field, value } => ApiError::new(
                ErrorCode::ValidationError,
                format!("{} '{}' already exists", field, value),
            ),
            DbError::ForeignKeyViolation { message } => {
                tracing::error!("Foreign key violation: {}", message);
                ApiError::new(ErrorCode::ValidationError, "Invalid reference")
            }
            DbError::ConstraintViolation { message } => {
                tracing::error!("Ledger constraint rejected a write: {}", message);
                ApiError::new(
                    ErrorCode::InvariantViolation,
                    "Write rejected by a ledger constraint",
                )
            }
            DbError::Busy(e) => {
                tracing::warn!("Database busy: {}", e);
                ApiError::new(ErrorCode::DatabaseError, "Database is busy").retryable()
            }
            DbError::PoolExhausted => {
                ApiError::new(ErrorCode::DatabaseError, "Database pool exhausted").retryable()
            }
            DbError::ConnectionFailed(e) => {
                tracing::error!("Database connection failed: {}", e);
                ApiError::new(ErrorCode::DatabaseError, "Database connection failed")
            }
            DbError::MigrationFailed(e) => {
                tracing::error!("Migration failed: {}", e);
                ApiError::new(ErrorCode::DatabaseError, "Database migration failed")
            }
            DbError::QueryFailed(e) => {
                tracing::error!("Database query failed: {}", e);
                ApiError::new(ErrorCode::DatabaseError, "Database operation failed")
            }
            DbError::TransactionFailed(e) => {
                tracing::error!("Transaction failed: {}", e);
                ApiError::new(ErrorCode::DatabaseError, "Database transaction failed")
            }
            DbError::Internal(e) => {
                tracing::error!("Internal database error: {}", e);
                ApiError::new(ErrorCode::DatabaseError, "Database operation failed")
            }
        }
    }
}

/// Converts core errors to API errors.
impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        let message = err.to_string();
        match err {
            CoreError::ProductNotFound(_)
            | CoreError::SaleNotFound(_)
            | CoreError::SaleItemNotFound { .. }
            | CoreError::CustomerNotFound(_)
            | CoreError::CashboxNotFound(_) => ApiError::new(ErrorCode::NotFound, message),
            CoreError::InsufficientStock { .. } => {
                ApiError::new(ErrorCode::InsufficientStock, message)
            }
            CoreError::InvariantViolation { .. } => {
                ApiError::new(ErrorCode::InvariantViolation, message)
            }
            CoreError::NoChangeRequested { .. } => {
                ApiError::new(ErrorCode::NoChangeRequested, message)
            }
            CoreError::ConcurrentModification { .. } => {
                ApiError::new(ErrorCode::ConcurrentModification, message).retryable()
            }
            CoreError::InvalidSaleStatus { .. } => ApiError::new(ErrorCode::BusinessLogic, message),
            CoreError::Validation(e) => ApiError::validation(e.to_string()),
        }
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        ApiError::validation(err.to_string())
    }
}

impl From<ConfigError> for ApiError {
    fn from(err: ConfigError) -> Self {
        ApiError::new(ErrorCode::ConfigError, err.to_string())
    }
}

/// Malformed request bodies.
impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::validation(format!("Invalid request body: {}", err))
    }
}
