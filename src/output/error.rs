//! Output-specific error types.

use thiserror::Error;

/// Errors that can occur in the output layer.
#[derive(Debug, Error)]
pub enum OutputError {
    /// Writer queue is full; the event was dropped.
    #[error("output channel full")]
    ChannelFull,

    /// Writer actor is gone.
    #[error("output channel closed")]
    Closed,

    /// Writing to the destination failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Event could not be encoded.
    #[error("encode error: {0}")]
    Encode(#[from] serde_json::Error),

    /// Internal error (e.g., thread join failure).
    #[error("internal error: {0}")]
    Internal(String),
}
