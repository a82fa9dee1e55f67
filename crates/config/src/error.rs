//! Configuration Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};
use std::path::PathBuf;

/// A configuration error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for configuration operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// The layered providers could not be read or deserialized.
    #[display("could not load configuration")]
    Load,
    /// A value was present but unusable.
    #[display("invalid configuration value: {_0}")]
    Invalid(#[error(not(source))] &'static str),
    /// Directory settings must be absolute so the pipeline never depends
    /// on the process working directory.
    #[display("path is not absolute: {}", _0.display())]
    RelativePath(#[error(not(source))] PathBuf),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        false
    }
}
