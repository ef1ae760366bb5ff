//! Synthesis Error Types
//!
//! The split that matters to callers: transient failures are retried by
//! [`RetryPolicy`](crate::RetryPolicy), fatal ones stop the whole run, and
//! everything else sets the one record aside.

use derive_more::{Display, Error};

/// A synthesis error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for synthesis operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// Connection, timeout or transport failure.
    #[display("unable to reach the synthesis service")]
    Network,
    /// Rate limiting or a server-side failure (408, 429, 5xx).
    #[display("synthesis service unavailable (status {_0})")]
    Unavailable(#[error(not(source))] u16),
    /// Account quota or billing limit reached; nothing else will succeed.
    #[display("synthesis quota exceeded (status {_0})")]
    QuotaExceeded(#[error(not(source))] u16),
    #[display("synthesis credentials rejected")]
    Unauthorized,
    /// The service refused this particular text.
    #[display("synthesis rejected (status {status}): {message}")]
    Rejected {
        status: u16,
        message: String,
    },
    #[display("synthesis returned no audio")]
    EmptyAudio,
    #[display("synthesis failed after {_0} attempts")]
    Exhausted(#[error(not(source))] u32),
    #[display("invalid synthesis client settings: {_0}")]
    Settings(#[error(not(source))] String),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network | Self::Unavailable(_) | Self::EmptyAudio)
    }

    /// Returns `true` if no further synthesis can succeed during this run.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::QuotaExceeded(_) | Self::Unauthorized | Self::Settings(_))
    }

    /// Maps a non-success HTTP status to the matching error.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        match status {
            401 => Self::Unauthorized,
            402 | 403 => Self::QuotaExceeded(status),
            408 | 429 | 500..=599 => Self::Unavailable(status),
            _ => Self::Rejected { status, message: message.into() },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(401, ErrorKind::Unauthorized, false, true)]
    #[case(402, ErrorKind::QuotaExceeded(402), false, true)]
    #[case(403, ErrorKind::QuotaExceeded(403), false, true)]
    #[case(408, ErrorKind::Unavailable(408), true, false)]
    #[case(429, ErrorKind::Unavailable(429), true, false)]
    #[case(503, ErrorKind::Unavailable(503), true, false)]
    #[case(400, ErrorKind::Rejected { status: 400, message: "bad".into() }, false, false)]
    #[case(422, ErrorKind::Rejected { status: 422, message: "bad".into() }, false, false)]
    fn test_from_status(
        #[case] status: u16,
        #[case] expected: ErrorKind,
        #[case] retryable: bool,
        #[case] fatal: bool,
    ) {
        let kind = ErrorKind::from_status(status, "bad");
        assert_eq!(kind, expected);
        assert_eq!(kind.is_retryable(), retryable);
        assert_eq!(kind.is_fatal(), fatal);
    }
}
