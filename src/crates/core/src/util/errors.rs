//! Error types
//!
//! `NexusError` covers every failure that can end a request. Non-fatal conditions
//! (dropped artifacts, a missing Phase-2 reply) are logged and carried in the run
//! report instead of being raised.

use std::time::Duration;

pub type NexusResult<T> = Result<T, NexusError>;

#[derive(Debug, thiserror::Error)]
pub enum NexusError {
    /// Inbound body could not be repaired into a valid query request.
    #[error("Malformed request: {0}")]
    MalformedRequest(String),

    /// Backend could not be reached (connect failure, timeout, broken stream).
    #[error("Backend unavailable: {0}")]
    BackendUnavailable(String),

    /// Backend answered with a failure.
    #[error("Backend error (status {status}): {message}")]
    BackendError { status: u16, message: String },

    #[error("No widget data received within {0:?}")]
    WidgetRetrievalTimeout(Duration),

    #[error("Invalid widget retrieval transition: {from} -> {to}")]
    InvalidStateTransition {
        from: &'static str,
        to: &'static str,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl NexusError {
    pub fn malformed(detail: impl Into<String>) -> Self {
        NexusError::MalformedRequest(detail.into())
    }

    pub fn config(detail: impl Into<String>) -> Self {
        NexusError::Config(detail.into())
    }

    /// Whether the failure happened talking to the backend.
    pub fn is_backend_failure(&self) -> bool {
        matches!(
            self,
            NexusError::BackendUnavailable(_) | NexusError::BackendError { .. }
        )
    }
}

impl From<reqwest::Error> for NexusError {
    fn from(error: reqwest::Error) -> Self {
        match error.status() {
            Some(status) => NexusError::BackendError {
                status: status.as_u16(),
                message: error.to_string(),
            },
            None => NexusError::BackendUnavailable(error.to_string()),
        }
    }
}
