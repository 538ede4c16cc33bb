//! Error types for the HTTP layer
//!
//! Provides unified error handling using thiserror.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;
use tracing::error;

use crate::models::ErrorResponse;
use crate::store::StoreError;

// == API Error Enum ==
/// Unified error type for request handlers.
#[derive(Error, Debug)]
pub enum ApiError {
    /// The backing store failed or is unreachable
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A cache entry holds text that is not JSON
    #[error("Corrupt entry at {key}: {source}")]
    CorruptEntry {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    /// The request body is not JSON
    #[error("Invalid JSON body: {0}")]
    InvalidBody(#[source] serde_json::Error),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Store(StoreError::Exhausted | StoreError::Stopped) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            ApiError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::CorruptEntry { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::InvalidBody(_) => StatusCode::BAD_REQUEST,
        }
    }
}

// == IntoResponse Implementation ==
impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("{}", self);
        }

        (status, Json(ErrorResponse::new(self.to_string()))).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for handlers.
pub type Result<T> = std::result::Result<T, ApiError>;
