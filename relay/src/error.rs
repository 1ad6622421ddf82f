//! Error types for the relay.

use axum::{
    Json,
    extract::rejection::BytesRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use tracing::warn;

/// Result type alias for relay operations.
pub type Result<T> = std::result::Result<T, RelayError>;

/// Error type for the relay.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// Invalid relay configuration.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The upstream request could not be completed.
    #[error("{0}")]
    Upstream(#[from] reqwest::Error),

    /// The inbound request body could not be read or exceeds the size cap.
    #[error("failed to read request body: {0}")]
    Body(#[from] BytesRejection),

    /// IO error (binding the listener, serving).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl RelayError {
    /// HTTP status reported to the browser.
    pub fn status(&self) -> StatusCode {
        match self {
            RelayError::Body(rejection) => rejection.status(),
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        warn!("relay error: {}", self);
        (
            self.status(),
            Json(json!({ "error": self.to_string() })),
        )
            .into_response()
    }
}
