//! # API Error Type
//!
//! Unified error type for HTTP handlers.
//!
//! ## Error Handling Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Flow in Mostrador                              │
//! │                                                                         │
//! │  Handler: Result<Json<T>, ApiError>                                    │
//! │       │                                                                 │
//! │       ├── DbError::NotFound ──────────────────────► 404 NOT_FOUND       │
//! │       ├── DbError::UniqueViolation / Duplicate ───► 409 CONFLICT        │
//! │       ├── CoreError (business rule) ──────────────► 400 <rule code>     │
//! │       ├── rejected JSON / query string ───────────► 400 VALIDATION_ERROR│
//! │       ├── bad login ──────────────────────────────► 401 UNAUTHORIZED    │
//! │       ├── DbError::Busy / PoolExhausted ──────────► 503 DATABASE_BUSY   │
//! │       └── anything else (logged, hidden) ─────────► 500                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The client always receives:
//! ```json
//! { "code": "INSUFFICIENT_STOCK", "message": "Insufficient stock for COKE: available 1, requested 2" }
//! ```

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use mostrador_core::CoreError;
use mostrador_db::DbError;

/// Result type for handlers.
pub type ApiResult<T> = Result<T, ApiError>;

/// Error body returned by every failing request.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiError {
    /// Machine-readable error code for programmatic handling
    pub code: ErrorCode,

    /// Human-readable error message for display
    pub message: String,
}

/// Error codes for API responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Resource not found (404)
    NotFound,

    /// Input validation failed (400)
    ValidationError,

    /// Uniqueness conflict (409)
    Conflict,

    /// Login failed or token rejected (401)
    Unauthorized,

    /// Insufficient stock (400)
    InsufficientStock,

    /// Cash tendered below total (400)
    InsufficientPayment,

    /// Operation on a closed shift (400)
    ShiftClosed,

    /// Order status change outside the table (400)
    InvalidTransition,

    /// Any other business rule (400)
    BusinessRule,

    /// Database locked by another writer; safe to retry (503)
    DatabaseBusy,

    /// Database operation failed (500)
    DatabaseError,

    /// Internal server error (500)
    Internal,
}

impl ErrorCode {
    pub fn status(self) -> StatusCode {
        match self {
            ErrorCode::NotFound => StatusCode::NOT_FOUND,
            ErrorCode::Conflict => StatusCode::CONFLICT,
            ErrorCode::Unauthorized => StatusCode::UNAUTHORIZED,
            ErrorCode::DatabaseBusy => StatusCode::SERVICE_UNAVAILABLE,
            ErrorCode::DatabaseError | ErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
            ErrorCode::ValidationError
            | ErrorCode::InsufficientStock
            | ErrorCode::InsufficientPayment
            | ErrorCode::ShiftClosed
            | ErrorCode::InvalidTransition
            | ErrorCode::BusinessRule => StatusCode::BAD_REQUEST,
        }
    }
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        ApiError {
            code,
            message: message.into(),
        }
    }

    pub fn not_found(resource: &str, id: &str) -> Self {
        ApiError::new(ErrorCode::NotFound, format!("{} not found: {}", resource, id))
    }

    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::ValidationError, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::Unauthorized, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::Internal, message)
    }

    pub fn status(&self) -> StatusCode {
        self.code.status()
    }
}

/// Converts database errors to API errors.
impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => ApiError::not_found(&entity, &id),
            DbError::UniqueViolation { field, value } => ApiError::new(
                ErrorCode::Conflict,
                format!("{} '{}' already exists", field, value),
            ),
            DbError::Domain(core) => core.into(),
            DbError::ForeignKeyViolation { message } => {
                tracing::warn!("Foreign key violation: {}", message);
                ApiError::validation("Invalid reference")
            }
            DbError::ConnectionFailed(e) => {
                tracing::error!("Database connection failed: {}", e);
                ApiError::new(ErrorCode::DatabaseError, "Database connection failed")
            }
            DbError::MigrationFailed(e) => {
                tracing::error!("Database migration failed: {}", e);
                ApiError::new(ErrorCode::DatabaseError, "Database migration failed")
            }
            DbError::QueryFailed(e) => {
                // Log the actual error but return a generic message
                tracing::error!("Database query failed: {}", e);
                ApiError::new(ErrorCode::DatabaseError, "Database operation failed")
            }
            DbError::PoolExhausted => {
                tracing::error!("Database pool exhausted");
                ApiError::new(ErrorCode::DatabaseBusy, "Database is busy, try again")
            }
            DbError::Busy(e) => {
                tracing::warn!("Database busy: {}", e);
                ApiError::new(ErrorCode::DatabaseBusy, "Database is busy, try again")
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
        let code = match &err {
            CoreError::NotFound { .. } => ErrorCode::NotFound,
            CoreError::Duplicate { .. } => ErrorCode::Conflict,
            CoreError::InsufficientStock { .. } => ErrorCode::InsufficientStock,
            CoreError::InsufficientPayment { .. } => ErrorCode::InsufficientPayment,
            CoreError::ShiftClosed { .. } => ErrorCode::ShiftClosed,
            CoreError::InvalidTransition { .. } => ErrorCode::InvalidTransition,
            CoreError::Validation(_) => ErrorCode::ValidationError,
            CoreError::ProductInactive { .. }
            | CoreError::NoActivePrice { .. }
            | CoreError::InvalidStatus { .. }
            | CoreError::ReturnExceedsSold { .. }
            | CoreError::InvalidOperation(_) => ErrorCode::BusinessRule,
        };
        ApiError::new(code, err.to_string())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::validation(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::validation(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(self)).into_response()
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{:?}] {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

#[cfg(test)]
mod tests {
    use super::*;
    use mostrador_core::ValidationError;

    #[test]
    fn test_status_mapping() {
        let not_found: ApiError = DbError::not_found("Sale", "s1").into();
        assert_eq!(not_found.status(), StatusCode::NOT_FOUND);
        assert_eq!(not_found.message, "Sale not found: s1");

        let conflict: ApiError = DbError::duplicate("sku", "COKE").into();
        assert_eq!(conflict.status(), StatusCode::CONFLICT);

        let duplicate: ApiError = DbError::Domain(CoreError::duplicate("registerName", "Caja 1")).into();
        assert_eq!(duplicate.code, ErrorCode::Conflict);

        let stock: ApiError = DbError::Domain(CoreError::InsufficientStock {
            sku: "COKE".into(),
            available: 1,
            requested: 2,
        })
        .into();
        assert_eq!(stock.code, ErrorCode::InsufficientStock);
        assert_eq!(stock.status(), StatusCode::BAD_REQUEST);

        let invalid: ApiError = CoreError::Validation(ValidationError::Required {
            field: "sku".into(),
        })
        .into();
        assert_eq!(invalid.code, ErrorCode::ValidationError);
    }

    #[test]
    fn test_internal_errors_are_hidden() {
        let err: ApiError = DbError::QueryFailed("no such table: salez".into()).into();
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!err.message.contains("salez"));
    }

    #[test]
    fn test_busy_is_retryable() {
        let err: ApiError = DbError::Busy("database is locked".into()).into();
        assert_eq!(err.code, ErrorCode::DatabaseBusy);
        assert_eq!(err.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert!(!err.message.contains("locked"));

        let exhausted: ApiError = DbError::PoolExhausted.into();
        assert_eq!(exhausted.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn test_envelope_shape() {
        let err = ApiError::not_found("Product", "p1");
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["code"], "NOT_FOUND");
        assert_eq!(json["message"], "Product not found: p1");
    }
}
