//! # Input Error Types
//!
//! Errors raised while opening, reading or seeking input streams.
//!
//! Producer failures happen on the reactor thread and reach the consumer
//! later, sometimes more than once, so [`InputError`] is `Clone`.

use std::io;
use std::sync::Arc;
use thiserror::Error;

/// Errors that can occur during input stream operations.
#[derive(Error, Debug, Clone)]
pub enum InputError {
    // ========================================================================
    // Transport Errors
    // ========================================================================
    /// I/O error reported by the underlying source.
    #[error("I/O error: {0}")]
    Io(Arc<io::Error>),

    /// Failed to open or read the source.
    #[error("Source error: {0}")]
    Source(String),

    /// Remote server answered with a non-success status.
    #[error("HTTP status {status} for {uri}")]
    Http { status: u16, uri: String },

    // ========================================================================
    // Stream Errors
    // ========================================================================
    /// Seeking is not supported for this stream.
    #[error("Not seekable")]
    NotSeekable,

    /// The stream ended before the requested data was delivered.
    #[error("Unexpected end of file")]
    UnexpectedEof,

    /// The reactor thread shut down while the stream still needed it.
    #[error("Input stream closed")]
    Closed,

    /// No input plugin handles this URI.
    #[error("Unsupported URI: {0}")]
    Unsupported(String),

    // ========================================================================
    // Generic Errors
    // ========================================================================
    /// Internal error (should not occur in normal operation).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl InputError {
    /// Returns `true` if retrying the same operation may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            InputError::Io(err) => matches!(
                err.kind(),
                io::ErrorKind::Interrupted
                    | io::ErrorKind::TimedOut
                    | io::ErrorKind::ConnectionReset
                    | io::ErrorKind::ConnectionAborted
                    | io::ErrorKind::WouldBlock
            ),
            InputError::Http { status, .. } => *status >= 500 || *status == 429,
            InputError::Source(_) => true,
            _ => false,
        }
    }
}

impl From<io::Error> for InputError {
    fn from(err: io::Error) -> Self {
        InputError::Io(Arc::new(err))
    }
}

impl From<InputError> for io::Error {
    fn from(err: InputError) -> Self {
        match err {
            InputError::Io(inner) => io::Error::new(inner.kind(), inner.to_string()),
            InputError::NotSeekable => io::Error::new(io::ErrorKind::Unsupported, err),
            InputError::UnexpectedEof => io::Error::new(io::ErrorKind::UnexpectedEof, err),
            other => io::Error::new(io::ErrorKind::Other, other),
        }
    }
}

/// Result type for input operations.
pub type Result<T> = std::result::Result<T, InputError>;
