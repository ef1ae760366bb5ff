//! Record Error Types
//!
//! Parse and validation failures are per-record and recoverable: the caller
//! sets the record aside and keeps going. `TooManyUnfixable` and
//! `StoreUnreadable` are the two fatal loads; nothing may be mutated after
//! either is raised.

use derive_more::{Display, Error};
use std::path::PathBuf;

/// A record error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for record operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// A batch line is not JSON, even after repair.
    #[display("malformed JSON: {_0}")]
    Parse(#[error(not(source))] String),
    /// The line parsed, but not to a JSON object.
    #[display("record is not a JSON object")]
    NotAnObject,
    #[display("missing required field: {_0}")]
    MissingField(#[error(not(source))] &'static str),
    #[display("required field is empty: {_0}")]
    EmptyField(#[error(not(source))] &'static str),
    #[display("invalid value for field '{field}': {value}")]
    InvalidField {
        field: &'static str,
        value: String,
    },
    #[display("record has no back cards")]
    NoBackCards,
    #[display("back card {index} is missing '{field}'")]
    IncompleteCard {
        index: usize,
        field: &'static str,
    },
    /// Most of the batch is garbage; refuse to ingest any of it.
    #[display("{unfixable} of {total} batch lines are unfixable")]
    TooManyUnfixable {
        unfixable: usize,
        total: usize,
    },
    /// The batch file exists but could not be read.
    #[display("unable to read batch file: {}", _0.display())]
    BatchUnreadable(#[error(not(source))] PathBuf),
    /// The store file exists but could not be read or parsed.
    #[display("unable to read store file: {}", _0.display())]
    StoreUnreadable(#[error(not(source))] PathBuf),
    /// Writing a store, batch, backup or log file failed.
    #[display("unable to write file: {}", _0.display())]
    Write(#[error(not(source))] PathBuf),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Write(_))
    }

    /// Returns `true` if the run must stop before touching anything.
    pub fn is_fatal_load(&self) -> bool {
        matches!(self, Self::TooManyUnfixable { .. } | Self::BatchUnreadable(_) | Self::StoreUnreadable(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fatal_loads() {
        assert!(ErrorKind::TooManyUnfixable { unfixable: 3, total: 4 }.is_fatal_load());
        assert!(ErrorKind::StoreUnreadable(PathBuf::from("vocab.yaml")).is_fatal_load());
        assert!(!ErrorKind::NoBackCards.is_fatal_load());
        assert!(!ErrorKind::Parse("eof".into()).is_fatal_load());
    }

    #[test]
    fn display() {
        assert_eq!(
            ErrorKind::IncompleteCard { index: 2, field: "example_en" }.to_string(),
            "back card 2 is missing 'example_en'"
        );
        assert_eq!(ErrorKind::TooManyUnfixable { unfixable: 3, total: 4 }.to_string(), "3 of 4 batch lines are unfixable");
    }
}
