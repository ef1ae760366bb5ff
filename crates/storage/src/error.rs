//! Storage Error Types
//!
//! Callers mostly care about two kinds: [`ErrorKind::NotFound`] is how the
//! audio cache learns of a miss, and [`ErrorKind::AlreadyExists`] tells it a
//! concurrent writer got there first. Match through `Deref`:
//! `matches!(&*err, ErrorKind::NotFound(_))`.

use derive_more::{Display, Error};
use std::io::{Error as IoError, ErrorKind as IoErrorKind};
use std::path::{Path, PathBuf};

/// A storage error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for storage operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    #[display("no audio at {}", _0.display())]
    NotFound(#[error(not(source))] PathBuf),
    #[display("permission denied: {}", _0.display())]
    PermissionDenied(#[error(not(source))] PathBuf),
    /// Assets are write-once; the path is taken.
    #[display("audio already exists at {}", _0.display())]
    AlreadyExists(#[error(not(source))] PathBuf),
    #[display("I/O error on {}: {source}", path.display())]
    Io { path: PathBuf, source: IoError },
    /// Escapes the audio root, or is not a usable file name.
    #[display("invalid audio path: {}", _0.display())]
    InvalidPath(#[error(not(source))] PathBuf),
    #[display("unsupported audio format: {_0}")]
    UnsupportedFormat(#[error(not(source))] String),
}

impl ErrorKind {
    /// Sorts an I/O failure on `path` into the kinds callers act on.
    pub fn from_io(source: IoError, path: &Path) -> Self {
        let path = path.to_path_buf();
        match source.kind() {
            IoErrorKind::NotFound => Self::NotFound(path),
            IoErrorKind::PermissionDenied => Self::PermissionDenied(path),
            IoErrorKind::AlreadyExists => Self::AlreadyExists(path),
            _ => Self::Io { path, source },
        }
    }

    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Io { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::missing(IoErrorKind::NotFound, "no audio at back/apple/a.mp3", false)]
    #[case::taken(IoErrorKind::AlreadyExists, "audio already exists at back/apple/a.mp3", false)]
    #[case::denied(IoErrorKind::PermissionDenied, "permission denied: back/apple/a.mp3", false)]
    #[case::other(IoErrorKind::StorageFull, "I/O error on back/apple/a.mp3: disk full", true)]
    fn test_from_io(#[case] kind: IoErrorKind, #[case] message: &str, #[case] retryable: bool) {
        let error = ErrorKind::from_io(IoError::new(kind, "disk full"), Path::new("back/apple/a.mp3"));
        assert_eq!(error.to_string(), message);
        assert_eq!(error.is_retryable(), retryable);
    }
}
