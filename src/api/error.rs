//! Terminal API errors.
//!
//! Transient failures (429, connection resets, gateway errors) never surface
//! here unless the retry budget is exhausted.

use thiserror::Error;

/// Error returned by an [`Invoker`](super::Invoker) once a request cannot succeed.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Non-retryable HTTP status.
    #[error("{request} failed with status {status}: {body}")]
    Status {
        request: String,
        status: u16,
        body: String,
    },

    /// Retry budget used up on rate limiting or transient failures.
    #[error("{request} gave up after {attempts} attempts; last error: {last}")]
    Exhausted {
        request: String,
        attempts: u32,
        last: String,
    },

    /// Response could not be decoded.
    #[error("{request} returned a malformed payload: {reason}")]
    Malformed { request: String, reason: String },

    /// Non-transient transport failure (invalid URL, client misconfiguration).
    #[error("{request} could not be sent: {reason}")]
    Transport { request: String, reason: String },

    /// The enclosing cycle was cancelled while waiting.
    #[error("request cancelled")]
    Cancelled,
}

impl ApiError {
    /// HTTP status carried by the error, if one was observed.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::Exhausted { last, .. } => last
                .strip_prefix("status ")
                .and_then(|s| s.parse().ok()),
            _ => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}
