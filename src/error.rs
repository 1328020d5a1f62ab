//! Error handling module
//!
//! HTTP-facing error type and its response conversion.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::domain::LedgerError;

/// Application-wide Result type
pub type AppResult<T> = Result<T, AppError>;

/// Application error types
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    // Client errors (4xx)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Missing required header: {0}")]
    MissingHeader(String),

    // Ledger, identity and cancellation outcomes
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

/// Error response body
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub errors: String,
    pub error_code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl AppError {
    /// HTTP status of this error
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            AppError::MissingHeader(_) => StatusCode::UNAUTHORIZED,
            AppError::Ledger(err) => match err {
                e if e.is_business_error() => StatusCode::BAD_REQUEST,
                e if e.is_identity_error() => StatusCode::UNAUTHORIZED,
                LedgerError::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            AppError::InvalidRequest(_) => "invalid_request",
            AppError::MissingHeader(_) => "missing_header",
            AppError::Ledger(err) => match err {
                LedgerError::UserNotFound(_) => "user_not_found",
                LedgerError::ProductNotFound(_) => "product_not_found",
                LedgerError::InsufficientFunds { .. } => "insufficient_funds",
                LedgerError::SelfTransfer => "self_transfer",
                LedgerError::InvalidAmount(_) => "invalid_amount",
                LedgerError::InvalidCredentials => "invalid_credentials",
                LedgerError::InvalidToken => "invalid_token",
                LedgerError::Cancelled => "cancelled",
                LedgerError::Internal(_) => "internal_error",
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        let (message, details) = match &self {
            AppError::InvalidRequest(msg) => (self.to_string(), Some(msg.clone())),
            AppError::MissingHeader(header) => (self.to_string(), Some(header.clone())),
            AppError::Ledger(LedgerError::UserNotFound(name))
            | AppError::Ledger(LedgerError::ProductNotFound(name)) => {
                (self.to_string(), Some(name.clone()))
            }
            AppError::Ledger(LedgerError::Internal(msg)) => {
                tracing::error!("Internal error: {}", msg);
                ("Internal server error".to_string(), None)
            }
            _ => (self.to_string(), None),
        };

        let body = ErrorResponse {
            errors: message,
            error_code: self.error_code().to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}
