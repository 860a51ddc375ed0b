use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Chain unavailable: {0}")]
    ChainUnavailable(String),

    #[error("Operator has insufficient SLH balance")]
    InsufficientOperatorBalance,

    #[error("Broadcast rejected: {0}")]
    BroadcastRejected(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Telegram API error: {0}")]
    Telegram(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            AppError::Database(ref e) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "DATABASE_ERROR",
                e.to_string(),
            ),
            AppError::InvalidAddress(ref msg) => {
                (StatusCode::BAD_REQUEST, "INVALID_ADDRESS", msg.clone())
            }
            AppError::InvalidAmount(ref msg) => {
                (StatusCode::BAD_REQUEST, "INVALID_AMOUNT", msg.clone())
            }
            AppError::BadRequest(ref msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            AppError::InsufficientOperatorBalance => (
                StatusCode::PAYMENT_REQUIRED,
                "INSUFFICIENT_OPERATOR_BALANCE",
                "Operator has insufficient SLH balance".to_string(),
            ),
            AppError::Forbidden(ref msg) => (StatusCode::FORBIDDEN, "FORBIDDEN", msg.clone()),
            AppError::NotFound(ref msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            AppError::ChainUnavailable(ref msg) => {
                (StatusCode::BAD_GATEWAY, "CHAIN_UNAVAILABLE", msg.clone())
            }
            AppError::BroadcastRejected(ref msg) => {
                (StatusCode::BAD_GATEWAY, "BROADCAST_REJECTED", msg.clone())
            }
            _ => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                self.to_string(),
            ),
        };

        let body = Json(ErrorResponse {
            success: false,
            error: ErrorDetail {
                code: code.to_string(),
                message,
            },
        });

        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_errors_map_to_400() {
        let resp = AppError::InvalidAddress("bad".into()).into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let resp = AppError::InvalidAmount("bad".into()).into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn insufficient_operator_balance_maps_to_402() {
        let resp = AppError::InsufficientOperatorBalance.into_response();
        assert_eq!(resp.status(), StatusCode::PAYMENT_REQUIRED);
    }

    #[test]
    fn chain_errors_map_to_502() {
        let resp = AppError::ChainUnavailable("rpc down".into()).into_response();
        assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
        let resp = AppError::BroadcastRejected("nonce too low".into()).into_response();
        assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
    }
}
