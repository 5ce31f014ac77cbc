//! Common error types for the media generation gateway

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Application-wide error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("Task not found: {0}")]
    TaskNotFound(String),

    #[error("Resource not found: {0}")]
    ResourceNotFound(String),

    #[error("Version not found: {0}")]
    VersionNotFound(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Version ledger is corrupt: {0}")]
    CorruptLedger(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Error response format
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub message: String,
    pub r#type: String,
    pub code: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_type, code) = match &self {
            AppError::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, "server_error", None),
            AppError::Io(_) => (StatusCode::INTERNAL_SERVER_ERROR, "server_error", None),
            AppError::Json(_) => (
                StatusCode::BAD_REQUEST,
                "invalid_request_error",
                Some("invalid_json"),
            ),
            AppError::HttpClient(_) => (StatusCode::BAD_GATEWAY, "provider_error", None),
            AppError::TaskNotFound(_) => (
                StatusCode::NOT_FOUND,
                "not_found_error",
                Some("task_not_found"),
            ),
            AppError::ResourceNotFound(_) => (
                StatusCode::NOT_FOUND,
                "not_found_error",
                Some("resource_not_found"),
            ),
            AppError::VersionNotFound(_) => (
                StatusCode::NOT_FOUND,
                "not_found_error",
                Some("version_not_found"),
            ),
            AppError::InvalidRequest(_) => (StatusCode::BAD_REQUEST, "invalid_request_error", None),
            AppError::CorruptLedger(_) => (StatusCode::INTERNAL_SERVER_ERROR, "server_error", None),
            AppError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "server_error", None),
        };

        // 5xx detail is logged here; the response body stays generic enough.
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }

        let body = Json(ErrorResponse {
            error: ErrorDetail {
                message: self.to_string(),
                r#type: error_type.to_string(),
                code: code.map(|c| c.to_string()),
            },
        });

        (status, body).into_response()
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, AppError>;
