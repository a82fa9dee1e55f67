//! Pipeline Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};
use std::io::Error as IoError;
use std::path::PathBuf;
use std::time::Duration;

/// A pipeline error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// Everything here aborts the release's publication attempt; per-publisher
/// failures are handled (logged and swallowed) inside the fan-out and never
/// surface as one of these.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    #[display("release {_0} does not exist")]
    UnknownRelease(#[error(not(source))] i64),
    /// Unrecoverable configuration error: nothing can be hashed or staged.
    #[display("release {_0} has no content path")]
    MissingContentPath(#[error(not(source))] i64),
    /// The content path names nothing a torrent can be derived from.
    #[display("unusable content path: {}", _0.display())]
    UnusableContentPath(#[error(not(source))] PathBuf),
    /// Building or reading the torrent artifact failed. Fatal: there is
    /// nothing to publish without a torrent.
    #[display("torrent artifact error")]
    Torrent,
    #[display("release store error")]
    Store,
    /// Staging I/O failure.
    #[display("I/O error: {_0}")]
    Io(IoError),
    /// A task exceeded its hard wall-clock budget and was terminated.
    #[display("task exceeded its {}s budget", _0.as_secs())]
    Timeout(#[error(not(source))] Duration),
}

impl From<IoError> for ErrorKind {
    fn from(err: IoError) -> Self {
        Self::Io(err)
    }
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Io(_) | Self::Timeout(_))
    }
}
