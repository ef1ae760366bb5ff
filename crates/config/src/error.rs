//! Config Error Types

use derive_more::{Display, Error};
use std::path::PathBuf;

/// A configuration error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for configuration operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    #[display("config file not found: {}", _0.display())]
    NotFound(#[error(not(source))] PathBuf),
    #[display("unsupported config file format (expected .yaml, .toml or .json): {}", _0.display())]
    UnsupportedFormat(#[error(not(source))] PathBuf),
    /// The layered sources could not be merged into a [`Config`](crate::Config).
    #[display("unable to load configuration")]
    Extract,
    #[display("invalid configuration for '{field}': {reason}")]
    Invalid {
        field: &'static str,
        reason: String,
    },
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        // Configuration is either right or it isn't.
        false
    }
}
