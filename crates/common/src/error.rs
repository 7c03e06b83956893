use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

/// HTTP-facing error types.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
        };

        let body = json!({ "error": message });
        (status, Json(body)).into_response()
    }
}

/// Errors reported by platform client collaborators.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PushError {
    /// The send call itself failed (connection, timeout, non-2xx, bad reply).
    #[error("transport error: {0}")]
    Transport(String),

    /// The client could not be built (missing key or credential, bad endpoint).
    #[error("configuration error: {0}")]
    Config(String),

    /// The platform rejected the message as a whole.
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}
