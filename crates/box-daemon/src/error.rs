//! Error types for box-daemon

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use box_controller::{ClusterError, ReconcileError};
use serde::Serialize;
use thiserror::Error;

/// Daemon-level errors
#[derive(Debug, Error)]
pub enum DaemonError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    /// Bad command-line or configuration value
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Server startup error
    #[error("Server error: {0}")]
    Server(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// API-specific errors
#[derive(Debug, Error)]
pub enum ApiError {
    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Bad request
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Cluster call failed
    #[error("Cluster error: {0}")]
    Cluster(#[from] ClusterError),

    /// Reconcile pass aborted
    #[error("Reconcile failed: {0}")]
    Reconcile(#[from] ReconcileError),
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            ApiError::Validation(_) => (StatusCode::UNPROCESSABLE_ENTITY, "VALIDATION_ERROR"),
            ApiError::Cluster(ClusterError::NotFound(_)) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            ApiError::Cluster(ClusterError::Conflict(_)) => (StatusCode::CONFLICT, "CONFLICT"),
            ApiError::Cluster(_) => (StatusCode::BAD_GATEWAY, "CLUSTER_ERROR"),
            ApiError::Reconcile(ReconcileError::DeadlineExceeded(_)) => {
                (StatusCode::GATEWAY_TIMEOUT, "DEADLINE_EXCEEDED")
            }
            ApiError::Reconcile(_) => (StatusCode::BAD_GATEWAY, "RECONCILE_FAILED"),
        };

        let body = ErrorResponse {
            error: self.to_string(),
            code: code.to_string(),
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for API operations
pub type ApiResult<T> = Result<T, ApiError>;

/// Result type alias for daemon operations
pub type DaemonResult<T> = Result<T, DaemonError>;
