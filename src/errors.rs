use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use rust_decimal::Decimal;
use serde_json::json;
use thiserror::Error;

/// Errors surfaced by the transaction engine.
///
/// Why thiserror?
/// - Derives Display, Error traits automatically
/// - Clean error messages
/// - Type-safe error handling
///
/// Why these specific variants?
/// - Each represents a distinct business or operational failure
/// - HTTP status codes map naturally to these at the adapter boundary
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Validation failed: {0}")]
    ValidationError(String),

    #[error("Insufficient funds. Required: {required}, available: {balance}")]
    InsufficientFunds { balance: Decimal, required: Decimal },

    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// Raised by [`crate::wallet_store::WalletStore::apply_delta`] if a
    /// delta would drive a wallet negative. The engine's own validation
    /// (funds check for SPEND, system-wallet liveness for TOPUP/BONUS)
    /// should make this unreachable in practice; it exists as the store's
    /// own last-line defense of the non-negative balance invariant.
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    /// Internal signal only — always resolved inside the engine before it
    /// escapes to a caller. Carries the row that won the race.
    #[error("Duplicate idempotency key")]
    DuplicateIdempotencyKey(Box<crate::models::Transaction>),

    #[error("Request deadline exceeded before commit")]
    Timeout,

    #[error("Storage error: {0}")]
    StorageError(#[from] sqlx::Error),
}

impl EngineError {
    /// Classifies whether this failure is a transient storage condition the
    /// engine should retry (deadlock / lock-wait timeout), as opposed to a
    /// business-rule failure or a permanent storage fault.
    pub fn is_transient(&self) -> bool {
        match self {
            EngineError::StorageError(sqlx::Error::Database(db_err)) => {
                // Postgres: 40P01 = deadlock_detected, 55P03 = lock_not_available
                matches!(db_err.code().as_deref(), Some("40P01") | Some("55P03"))
            }
            _ => false,
        }
    }
}

/// Helper type for Results produced by the engine.
pub type EngineResult<T> = Result<T, EngineError>;

/// Convert EngineError to an HTTP response.
///
/// This is where business errors become API responses. Key insight: not all
/// errors are 500s.
impl IntoResponse for EngineError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            EngineError::ValidationError(ref msg) => {
                (StatusCode::UNPROCESSABLE_ENTITY, msg.clone())
            }

            EngineError::InsufficientFunds { .. } => (StatusCode::BAD_REQUEST, self.to_string()),

            EngineError::ConfigurationError(ref msg) => {
                tracing::error!(error = %msg, "Configuration error");
                (StatusCode::BAD_REQUEST, self.to_string())
            }

            EngineError::InvariantViolation(ref msg) => {
                tracing::error!(error = %msg, "Invariant violation");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "an internal invariant was violated".to_string(),
                )
            }

            EngineError::DuplicateIdempotencyKey(_) => {
                // Should never reach the adapter boundary: the engine resolves
                // this internally by returning the existing transaction.
                tracing::error!("Unresolved duplicate idempotency key reached the adapter");
                (StatusCode::CONFLICT, "idempotency conflict".to_string())
            }

            EngineError::Timeout => (StatusCode::INTERNAL_SERVER_ERROR, self.to_string()),

            EngineError::StorageError(ref e) => {
                tracing::error!(error = ?e, "Storage error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "storage operation failed".to_string(),
                )
            }
        };

        let body = Json(json!({
            "success": false,
            "error": error_message,
        }));

        (status, body).into_response()
    }
}
