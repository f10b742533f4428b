use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use sqlx::migrate::MigrateError;
use thiserror::Error;
use uuid::Uuid;

/// Top-level error type for the entire application
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Vendor error: {0}")]
    Vendor(#[from] VendorError),

    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("Bill storage error: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Bad request: {0}")]
    BadRequest(String),
}

/// Vendor-related errors
#[derive(Error, Debug)]
pub enum VendorError {
    #[error("Vendor not found: {0}")]
    NotFound(Uuid),

    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Invalid total amount: {0}")]
    InvalidTotalAmount(String),
}

/// Payment-ledger errors
#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Transaction not found: {0}")]
    TransactionNotFound(Uuid),

    #[error("Transaction {transaction_id} does not belong to vendor {vendor_id}")]
    VendorMismatch {
        transaction_id: Uuid,
        vendor_id: Uuid,
    },

    #[error("Invalid payment amount: {0}")]
    InvalidAmount(String),
}

/// API error response structure
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub error_code: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            AppError::Vendor(VendorError::NotFound(id)) => (
                StatusCode::NOT_FOUND,
                "VENDOR_NOT_FOUND",
                format!("Vendor not found: {}", id),
            ),
            AppError::Vendor(VendorError::MissingField(field)) => (
                StatusCode::BAD_REQUEST,
                "MISSING_FIELD",
                format!("Missing required field: {}", field),
            ),
            AppError::Vendor(VendorError::InvalidTotalAmount(msg)) => (
                StatusCode::BAD_REQUEST,
                "INVALID_TOTAL_AMOUNT",
                format!("Invalid total amount: {}", msg),
            ),
            AppError::Ledger(LedgerError::TransactionNotFound(id)) => (
                StatusCode::NOT_FOUND,
                "TRANSACTION_NOT_FOUND",
                format!("Transaction not found: {}", id),
            ),
            AppError::Ledger(LedgerError::VendorMismatch { transaction_id, vendor_id }) => (
                StatusCode::NOT_FOUND,
                "TRANSACTION_NOT_FOUND",
                format!(
                    "Transaction {} not found for vendor {}",
                    transaction_id, vendor_id
                ),
            ),
            AppError::Ledger(LedgerError::InvalidAmount(msg)) => (
                StatusCode::BAD_REQUEST,
                "INVALID_AMOUNT",
                format!("Invalid payment amount: {}", msg),
            ),
            AppError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, "INVALID_INPUT", msg),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
            AppError::Database(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "DATABASE_ERROR",
                "A database error occurred".to_string(),
            ),
            AppError::Storage(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "STORAGE_ERROR",
                "Bill upload failed".to_string(),
            ),
            _ => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "An internal error occurred".to_string(),
            ),
        };

        let body = Json(ErrorResponse {
            error: message,
            error_code: error_code.to_string(),
        });

        (status, body).into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        AppError::Internal(format!("Error converting: {:?}", error))
    }
}

impl From<rust_decimal::Error> for AppError {
    fn from(error: rust_decimal::Error) -> Self {
        AppError::InvalidInput(format!("Decimal conversion error: {:?}", error))
    }
}

impl From<reqwest::Error> for AppError {
    fn from(error: reqwest::Error) -> Self {
        AppError::Storage(format!("HTTP request error: {:?}", error))
    }
}

impl From<MigrateError> for AppError {
    fn from(error: MigrateError) -> Self {
        AppError::Internal(format!("Migration error: {:?}", error))
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let message = errors
            .field_errors()
            .into_iter()
            .map(|(field, errors)| {
                let messages: Vec<String> = errors
                    .iter()
                    .map(|e| e.message.as_ref().map(|m| m.to_string()).unwrap_or_default())
                    .collect();
                format!("{}: {}", field, messages.join(", "))
            })
            .collect::<Vec<String>>()
            .join("; ");

        AppError::InvalidInput(message)
    }
}

impl From<axum::extract::multipart::MultipartError> for AppError {
    fn from(error: axum::extract::multipart::MultipartError) -> Self {
        AppError::BadRequest(format!("Invalid multipart body: {}", error))
    }
}

/// Result type alias for the application
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn status_of(error: AppError) -> StatusCode {
        error.into_response().status()
    }

    #[test]
    fn not_found_errors_map_to_404() {
        let id = Uuid::new_v4();
        assert_eq!(
            status_of(AppError::Vendor(VendorError::NotFound(id))),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(AppError::Ledger(LedgerError::TransactionNotFound(id))),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(AppError::Ledger(LedgerError::VendorMismatch {
                transaction_id: id,
                vendor_id: Uuid::new_v4(),
            })),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn validation_errors_map_to_400() {
        assert_eq!(
            status_of(AppError::Vendor(VendorError::MissingField("name"))),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(AppError::Ledger(LedgerError::InvalidAmount(
                "must be greater than zero".into()
            ))),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn infrastructure_errors_map_to_500_with_generic_message() {
        assert_eq!(
            status_of(AppError::Database(sqlx::Error::PoolClosed)),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            status_of(AppError::Storage("upstream refused".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
