use axum::{http::StatusCode, response::IntoResponse};
use serde_json::json;
use thiserror::Error;

pub type AppResult<T> = Result<T, AppError>;

/// Application error type shared by the HTTP API, the realtime layer and the
/// stores.
///
/// A missing thread and a caller who is not a participant of an existing
/// thread both map to `NotFound`, so the API never reveals whether a thread
/// id exists to someone outside it.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("JWT error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),

    #[error("Handshake rejected: {0}")]
    Handshake(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("WebSocket error: {0}")]
    WebSocket(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Unknown error: {0}")]
    Unknown(#[from] anyhow::Error),
}

impl AppError {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Auth(_) | AppError::Jwt(_) | AppError::Handshake(_) => {
                StatusCode::UNAUTHORIZED
            }
            AppError::WebSocket(_) => StatusCode::BAD_REQUEST,
            AppError::Database(_)
            | AppError::Json(_)
            | AppError::Config(_)
            | AppError::Internal(_)
            | AppError::Unknown(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get a user-facing error message (without sensitive details)
    pub fn user_message(&self) -> String {
        match self {
            AppError::Validation(msg) => format!("Validation error: {}", msg),
            AppError::NotFound(msg) => msg.clone(),
            AppError::Auth(msg) => format!("Authentication failed: {}", msg),
            AppError::Jwt(_) => "Invalid or expired token".to_string(),
            AppError::Handshake(msg) => format!("Handshake rejected: {}", msg),
            AppError::WebSocket(_) => "WebSocket connection error".to_string(),
            AppError::Config(msg) => format!("Configuration error: {}", msg),
            _ => "Internal server error".to_string(),
        }
    }

    /// Get error code for programmatic error handling
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Auth(_) => "AUTH_ERROR",
            AppError::Jwt(_) => "JWT_ERROR",
            AppError::Handshake(_) => "HANDSHAKE_REJECTED",
            AppError::Database(_) => "DATABASE_ERROR",
            AppError::Json(_) => "JSON_ERROR",
            AppError::WebSocket(_) => "WEBSOCKET_ERROR",
            AppError::Config(_) => "CONFIG_ERROR",
            AppError::Internal(_) => "INTERNAL_ERROR",
            AppError::Unknown(_) => "UNKNOWN_ERROR",
        }
    }

    /// Log this error with appropriate level and context
    pub fn log(&self) {
        let status = self.status_code();
        let code = self.error_code();

        if status.is_server_error() {
            tracing::error!(
                error = %self,
                error_code = %code,
                status = %status.as_u16(),
                "Server error occurred"
            );
        } else if status == StatusCode::UNAUTHORIZED {
            tracing::warn!(
                error = %self,
                error_code = %code,
                "Authentication failed"
            );
        } else {
            tracing::debug!(
                error = %self,
                error_code = %code,
                "Client error occurred"
            );
        }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        AppError::Validation(msg.into())
    }

    pub fn auth(msg: impl Into<String>) -> Self {
        AppError::Auth(msg.into())
    }

    pub fn handshake(msg: impl Into<String>) -> Self {
        AppError::Handshake(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        AppError::Internal(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        AppError::Config(msg.into())
    }

    /// The uniform not-found error for threads. Used both when the thread id
    /// does not exist and when the caller is not a participant.
    pub fn thread_not_found() -> Self {
        AppError::NotFound("thread not found".to_string())
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for AppError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        tracing::warn!(error = %err, "WebSocket error occurred");
        AppError::WebSocket(err.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        self.log();

        let status = self.status_code();
        let error_code = self.error_code();

        // Don't expose internal details for server errors
        let body = if status.is_server_error() {
            json!({
                "error": "Internal server error",
                "error_code": error_code,
                "status": status.as_u16(),
            })
        } else {
            json!({
                "error": self.user_message(),
                "error_code": error_code,
                "status": status.as_u16(),
            })
        };

        (status, axum::Json(body)).into_response()
    }
}
