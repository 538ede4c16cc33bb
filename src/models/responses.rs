//! Response bodies for the HTTP API
//!
//! Defines the structure of outgoing HTTP response bodies.

use axum::{
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::{Map, Value};

/// Plain-text decimal body used by every counter endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CounterText(pub String);

impl CounterText {
    /// Body for a counter that has never been written.
    pub fn zero() -> Self {
        Self("0".to_string())
    }
}

impl From<i64> for CounterText {
    fn from(value: i64) -> Self {
        Self(value.to_string())
    }
}

impl IntoResponse for CounterText {
    fn into_response(self) -> Response {
        (
            [(header::CONTENT_TYPE, "text/plain; charset=UTF-8")],
            self.0,
        )
            .into_response()
    }
}

/// Reply to `POST /cache/:name`: the store's acknowledgement as a JSON
/// string, or `{}` when the store did not send one.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheAck(pub Value);

impl From<Option<String>> for CacheAck {
    fn from(ack: Option<String>) -> Self {
        match ack {
            Some(text) => Self(Value::String(text)),
            None => Self(Value::Object(Map::new())),
        }
    }
}

impl IntoResponse for CacheAck {
    fn into_response(self) -> Response {
        Json(self.0).into_response()
    }
}

/// Error response body for all error conditions
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    /// Error message describing what went wrong
    pub error: String,
}

impl ErrorResponse {
    /// Creates a new ErrorResponse
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}
