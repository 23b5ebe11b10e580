//! Error types for the streaming HTTP client.
//!
//! # Design
//!
//! Every failure surfaces as one [`Error`] value returned by `send`. The enum is
//! `Clone` because a producer failure is recorded on the pipe *and* delivered
//! through the consumer's read; wrapped third-party errors are held behind
//! `Arc` for that reason.
//!
//! Non-2xx responses are never errors: status codes are returned intact and
//! interpreting them is the caller's job.

use std::error::Error as StdError;
use std::io;
use std::sync::Arc;
use thiserror::Error;

/// Result type alias for client operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced while building, encoding, or sending a request.
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// The base URL (or a derived request URL) could not be parsed.
    #[error("invalid url: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// A builder call recorded an invalid header, cookie, or URI.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The request context was canceled by its owner.
    #[error("context canceled")]
    Canceled,

    /// The request context's deadline passed.
    #[error("context deadline exceeded")]
    DeadlineExceeded,

    /// Reading from a body source failed.
    #[error("io error: {0}")]
    Io(Arc<io::Error>),

    /// JSON serialization of the request body failed.
    #[error("json encoding failed: {0}")]
    Json(Arc<serde_json::Error>),

    /// The body producer wrote after the consumer stopped reading.
    #[error("write on closed pipe")]
    ClosedPipe,

    /// The underlying transport failed.
    #[error("transport error: {0}")]
    Transport(Arc<dyn StdError + Send + Sync>),
}

impl Error {
    /// Wrap a stream read failure.
    pub fn io(err: io::Error) -> Self {
        Error::Io(Arc::new(err))
    }

    /// Wrap a JSON serialization failure.
    pub fn json(err: serde_json::Error) -> Self {
        Error::Json(Arc::new(err))
    }

    /// Wrap a failure from the base transport primitive.
    pub fn transport<E>(err: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Error::Transport(Arc::new(err))
    }

    /// Returns true for context cancellation and deadline expiry.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Error::Canceled | Error::DeadlineExceeded)
    }

    /// Returns true when the context deadline expired.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::DeadlineExceeded)
    }

    /// Returns true for body encoding failures (serialization or source reads).
    pub fn is_encode(&self) -> bool {
        matches!(self, Error::Io(_) | Error::Json(_))
    }

    /// Returns true for failures reported by the transport.
    pub fn is_transport(&self) -> bool {
        matches!(self, Error::Transport(_))
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::io(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::json(err)
    }
}

impl From<http::Error> for Error {
    fn from(err: http::Error) -> Self {
        Error::InvalidRequest(err.to_string())
    }
}
