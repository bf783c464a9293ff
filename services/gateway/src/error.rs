use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use types::errors::TradingError;

/// Central error type for the gateway
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal server error")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message, code) = match self {
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg, "UNAUTHORIZED"),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg, "BAD_REQUEST"),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg, "NOT_FOUND"),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg, "CONFLICT"),
            AppError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
                "INTERNAL_ERROR",
            ),
        };

        let body = Json(json!({
            "error": code,
            "message": error_message
        }));

        (status, body).into_response()
    }
}

impl From<TradingError> for AppError {
    fn from(err: TradingError) -> Self {
        match &err {
            TradingError::Validation(_)
            | TradingError::InsufficientFunds { .. }
            | TradingError::InsufficientPosition { .. }
            | TradingError::SymbolNotTradable(_) => AppError::BadRequest(err.to_string()),
            TradingError::OrderNotFound(_) => AppError::NotFound(err.to_string()),
            TradingError::OrderAlreadyFilled(_)
            | TradingError::OrderAlreadyCancelled(_)
            | TradingError::DuplicateClientOrderId(_) => AppError::Conflict(err.to_string()),
            TradingError::LedgerInconsistency { .. } => {
                AppError::Internal(anyhow::anyhow!(err.to_string()))
            }
        }
    }
}
