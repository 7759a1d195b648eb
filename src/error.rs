//! Error types for the offline worker
//!
//! Provides unified error handling using thiserror.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tokio_rusqlite::rusqlite;

// == Worker Error Enum ==
/// Unified error type for the offline worker.
#[derive(Error, Debug)]
pub enum WorkerError {
    /// Upstream fetch rejected at the transport level
    #[error("Network error: {0}")]
    Network(String),

    /// Upstream fetch lost the race against its timer
    #[error("Network timeout after {0} ms")]
    Timeout(u64),

    /// Upstream answered, but not with a 2xx status
    #[error("Failed to download content: {0}")]
    UpstreamStatus(u16),

    /// Durable queue store could not be opened or a transaction failed
    #[error("Storage error: {0}")]
    Storage(String),

    /// Invalid request data
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Unknown notification, cache or record
    #[error("Not found: {0}")]
    NotFound(String),

    /// Lifecycle transition attempted from the wrong state
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Internal worker error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl WorkerError {
    /// Returns true for failures that the fetch policy recovers from the cache.
    pub fn is_network_failure(&self) -> bool {
        matches!(self, WorkerError::Network(_) | WorkerError::Timeout(_))
    }
}

impl From<reqwest::Error> for WorkerError {
    fn from(err: reqwest::Error) -> Self {
        WorkerError::Network(err.to_string())
    }
}

impl From<rusqlite::Error> for WorkerError {
    fn from(err: rusqlite::Error) -> Self {
        WorkerError::Storage(err.to_string())
    }
}

impl From<tokio_rusqlite::Error<WorkerError>> for WorkerError {
    fn from(err: tokio_rusqlite::Error<WorkerError>) -> Self {
        match err {
            tokio_rusqlite::Error::Error(e) => e,
            other => WorkerError::Storage(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for WorkerError {
    fn from(err: serde_json::Error) -> Self {
        WorkerError::Internal(format!("JSON error: {}", err))
    }
}

impl From<url::ParseError> for WorkerError {
    fn from(err: url::ParseError) -> Self {
        WorkerError::InvalidRequest(format!("Invalid URL: {}", err))
    }
}

// == IntoResponse Implementation ==
impl IntoResponse for WorkerError {
    fn into_response(self) -> Response {
        let status = match &self {
            WorkerError::Network(_) | WorkerError::UpstreamStatus(_) => StatusCode::BAD_GATEWAY,
            WorkerError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            WorkerError::Storage(_) | WorkerError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            WorkerError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            WorkerError::NotFound(_) => StatusCode::NOT_FOUND,
            WorkerError::InvalidState(_) => StatusCode::CONFLICT,
        };

        let body = Json(json!({
            "error": self.to_string()
        }));

        (status, body).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the offline worker.
pub type Result<T> = std::result::Result<T, WorkerError>;
