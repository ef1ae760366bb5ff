//! Library Error Types
//!
//! Structured errors using `exn` for location tracking and error trees. The
//! kinds follow how a sync run reacts to them: per-record failures are
//! reported and the run carries on, fatal ones stop it before the store is
//! written.

use derive_more::{Display, Error};

/// A library error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for library operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// The store or the batch could not be loaded; nothing was changed.
    #[display("unable to load vocabulary data")]
    FatalLoad,
    /// Audio for one record could not be synthesized; the record was skipped.
    #[display("audio synthesis failed for '{_0}'")]
    Synthesis(#[error(not(source))] String),
    /// The synthesis collaborator refused all further work (quota, credentials).
    #[display("synthesis unavailable for the rest of the run")]
    SynthesisAborted,
    #[display("audio storage error")]
    Storage,
    #[display("invalid audio file name template")]
    Template,
    #[display("unable to save vocabulary data")]
    Save,
    #[display("unable to write report")]
    Report,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        // Synthesis has already been retried by the time it surfaces here.
        matches!(self, Self::Storage)
    }

    /// Returns `true` if the run cannot continue past this error.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::FatalLoad | Self::SynthesisAborted | Self::Save)
    }
}
