//! Binary Error Types

use derive_more::{Display, Error};

/// A command-line error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for command-line operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    #[display("unable to load configuration")]
    Config,
    /// An audio root, the synthesizer or the file namer could not be built.
    #[display("unable to set up {_0}")]
    Setup(#[error(not(source))] &'static str),
    #[display("run aborted")]
    Aborted,
    #[display("unable to print configuration")]
    Output,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        false
    }
}
