//! Publisher Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};
use std::io::Error as IoError;
use std::path::PathBuf;

/// A publisher error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for publisher operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong
/// internally: transient transport problems are worth retrying, an index
/// that explicitly refused the payload is not.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// The request never completed (connection, TLS, body read).
    #[display("request failed: {_0}")]
    Transport(reqwest::Error),
    /// The index answered with a non-success status.
    #[display("unexpected status {_0}")]
    Status(#[error(not(source))] u16),
    /// A 2xx response whose body we could not make sense of.
    #[display("malformed response: {_0}")]
    Malformed(#[error(not(source))] &'static str),
    /// The index explicitly refused the upload. Re-sending the identical
    /// payload will be refused again.
    #[display("index rejected the upload: {_0}")]
    Rejected(#[error(not(source))] String),
    /// Local filesystem failure (reading the artifact, staging a symlink).
    #[display("I/O error: {_0}")]
    Io(IoError),
    /// A path without a final component cannot be published.
    #[display("unusable path: {}", _0.display())]
    InvalidPath(#[error(not(source))] PathBuf),
}

impl From<IoError> for ErrorKind {
    fn from(err: IoError) -> Self {
        Self::Io(err)
    }
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Transport(_) | Self::Status(_) | Self::Malformed(_) | Self::Io(_)
        )
    }
}
