use axum::{
    extract::{
        multipart::MultipartRejection,
        rejection::{JsonRejection, PathRejection},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Application-level error type shared by the gateway, the job source and the
/// orchestration layer. Implements `IntoResponse` so Axum handlers can return
/// `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    /// Bad caller input. Raised before any network call is attempted.
    #[error("Validation error: {0}")]
    Validation(String),

    /// A required credential or setting is missing.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A remote call returned a non-success status.
    #[error("Request failed (status {status}): {message}")]
    Request { status: u16, message: String },

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Another operation of the same kind is still in flight.
    #[error("Busy: {0}")]
    Busy(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// The most specific message that can be shown to a user, if any.
    /// Transport and internal failures carry nothing user-presentable.
    pub fn user_message(&self) -> Option<String> {
        let message = match self {
            AppError::Validation(msg)
            | AppError::Configuration(msg)
            | AppError::RateLimited(msg)
            | AppError::Auth(msg)
            | AppError::Busy(msg)
            | AppError::NotFound(msg) => msg.clone(),
            AppError::Request { message, .. } => message.clone(),
            AppError::Transport(_) | AppError::Internal(_) => return None,
        };
        if message.trim().is_empty() {
            None
        } else {
            Some(message)
        }
    }

    /// `user_message()` or the given fallback.
    pub fn message_or(&self, fallback: &str) -> String {
        self.user_message().unwrap_or_else(|| fallback.to_string())
    }
}

// Extractor rejections become validation errors so every error response
// carries the same JSON body.
impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

impl From<MultipartRejection> for AppError {
    fn from(rejection: MultipartRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            AppError::Configuration(msg) => {
                tracing::error!("Configuration error: {msg}");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "CONFIGURATION_ERROR",
                    msg.clone(),
                )
            }
            AppError::Request { status, message } => {
                tracing::error!("Upstream error {status}: {message}");
                (StatusCode::BAD_GATEWAY, "UPSTREAM_ERROR", message.clone())
            }
            AppError::RateLimited(msg) => {
                (StatusCode::TOO_MANY_REQUESTS, "RATE_LIMITED", msg.clone())
            }
            AppError::Auth(msg) => {
                tracing::error!("Upstream authentication error: {msg}");
                (StatusCode::BAD_GATEWAY, "UPSTREAM_AUTH_ERROR", msg.clone())
            }
            AppError::Busy(msg) => (StatusCode::CONFLICT, "BUSY", msg.clone()),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            AppError::Transport(e) => {
                tracing::error!("Transport error: {e}");
                (
                    StatusCode::BAD_GATEWAY,
                    "TRANSPORT_ERROR",
                    "Could not reach the upstream service".to_string(),
                )
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal server error occurred".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}
