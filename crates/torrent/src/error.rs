//! Torrent Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};
use std::io::Error as IoError;
use std::path::PathBuf;

/// A torrent error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for torrent operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// Any of these is fatal for the release's publication attempt: there is
/// nothing to publish without a torrent.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// Content to hash could not be read.
    #[display("I/O error: {_0}")]
    Io(IoError),
    /// The content path names nothing publishable.
    #[display("no content at {}", _0.display())]
    EmptyContent(#[error(not(source))] PathBuf),
    /// A metainfo document could not be parsed.
    #[display("malformed metainfo: {_0}")]
    Malformed(#[error(not(source))] &'static str),
}

impl From<IoError> for ErrorKind {
    fn from(err: IoError) -> Self {
        Self::Io(err)
    }
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        false
    }
}
