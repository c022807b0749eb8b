//! Error types for `indoorflow`.
//!
//! Each concern gets its own enum so callers can decide what is fatal:
//! configuration errors drop a single floor-plan or area entry, cache errors
//! drop a single write, ingest errors reject a single request.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// A floor-plan or area entry that cannot be used.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("missing field `{0}`")]
    MissingField(&'static str),

    #[error("`{field}` needs exactly 4 corners, got {count}")]
    CornerCount { field: &'static str, count: usize },

    #[error("calibration points coincide in {0} space")]
    CoincidentCalibration(&'static str),

    #[error("degenerate calibration quad: {0}")]
    DegenerateQuad(String),

    #[error("unsupported geometry: {0}")]
    UnsupportedGeometry(String),

    #[error("invalid JSON in {var}: {message}")]
    InvalidJson { var: &'static str, message: String },
}

/// Failures talking to a cache backend.
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("cache backend error: {0}")]
    Backend(#[from] redis::RedisError),

    #[error("cache value (de)serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Per-request rejection of a vendor notification.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum IngestError {
    #[error("Wrong secret, access forbidden")]
    WrongSecret,

    #[error("Wrong notification type: {0}")]
    UnsupportedType(String),

    #[error("Malformed notification: {0}")]
    Malformed(String),
}

impl IngestError {
    pub fn status(&self) -> StatusCode {
        match self {
            IngestError::WrongSecret => StatusCode::FORBIDDEN,
            IngestError::UnsupportedType(_) | IngestError::Malformed(_) => StatusCode::BAD_REQUEST,
        }
    }
}

/// JSON error body shared by every rejecting endpoint.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub status_code: u16,
    pub error: String,
    pub message: String,
}

impl ErrorBody {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status_code: status.as_u16(),
            error: status.canonical_reason().unwrap_or("Error").to_string(),
            message: message.into(),
        }
    }

    pub fn into_response_with(self, status: StatusCode) -> Response {
        (status, Json(self)).into_response()
    }
}

impl IntoResponse for IngestError {
    fn into_response(self) -> Response {
        let status = self.status();
        ErrorBody::new(status, self.to_string()).into_response_with(status)
    }
}
