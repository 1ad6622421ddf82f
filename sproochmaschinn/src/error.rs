//! Error types for the Sproochmaschinn API client.

use std::time::Duration;

use thiserror::Error;

use crate::types::JobKind;

/// Result type alias for Sproochmaschinn operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for Sproochmaschinn API operations.
#[derive(Error, Debug)]
pub enum Error {
    /// The remote service refused or failed to issue a session.
    #[error("session creation failed: {message}")]
    SessionCreationFailed {
        status: Option<u16>,
        message: String,
    },

    /// Live channel transport failure. Recovered locally by reconnecting.
    #[error("live channel error: {0}")]
    Channel(String),

    /// Non-2xx response from the remote API.
    #[error("{message} (status={status})")]
    Transport { status: u16, message: String },

    /// The remote API answered a submission with HTTP 429.
    #[error("{message}")]
    RateLimited { message: String },

    /// The job reached a failed state on the server.
    #[error("{message}")]
    JobFailed { kind: JobKind, message: String },

    /// The job did not reach a terminal state within its attempt cap.
    #[error("{kind} timed out after {attempts} attempts ({waited:?})")]
    JobTimeout {
        kind: JobKind,
        attempts: u32,
        waited: Duration,
    },

    /// A precondition on the input was violated; nothing was sent.
    #[error("invalid input: {0}")]
    Validation(String),

    /// The wait was cancelled by the caller.
    #[error("operation cancelled")]
    Cancelled,

    /// Invalid configuration.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// HTTP request error.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// Base64 decoding error.
    #[error("base64 decode error: {0}")]
    Base64Decode(#[from] base64::DecodeError),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Creates a transport error for a non-2xx response.
    pub fn transport(status: u16, message: impl Into<String>) -> Self {
        Error::Transport {
            status,
            message: message.into(),
        }
    }

    /// Creates a rate-limit error with the default user-facing message.
    pub fn rate_limited() -> Self {
        Error::RateLimited {
            message: "rate limit exceeded, please wait a moment".to_string(),
        }
    }

    /// Returns the HTTP status associated with this error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Transport { status, .. } => Some(*status),
            Error::RateLimited { .. } => Some(429),
            Error::SessionCreationFailed { status, .. } => *status,
            Error::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Returns true if this is a rate limit error.
    pub fn is_rate_limit(&self) -> bool {
        matches!(self, Error::RateLimited { .. })
    }

    /// Returns true if a job ran out of poll attempts.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::JobTimeout { .. })
    }

    /// Returns true if the input was rejected before reaching the network.
    pub fn is_validation(&self) -> bool {
        matches!(self, Error::Validation(_))
    }

    /// Returns true if the server reported the job as failed.
    pub fn is_job_failed(&self) -> bool {
        matches!(self, Error::JobFailed { .. })
    }

    /// Returns true if the caller may reasonably resubmit after a pause.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::RateLimited { .. } | Error::JobTimeout { .. } => true,
            Error::Transport { status, .. } => *status >= 500,
            Error::SessionCreationFailed { .. } | Error::Http(_) => true,
            _ => false,
        }
    }
}
