//! The vocabulary synchronizer: content-addressed audio cache, deduplication,
//! merge, consistency verification and the run report.
//!
//! Everything a run needs from the outside world is carried by a
//! [`Context`], built once per run by the caller.

pub mod cache;
pub mod dedup;
pub mod error;
#[cfg(test)]
mod fixtures;
mod key;
pub mod merge;
mod naming;
pub mod report;
pub mod sync;
pub mod verify;

pub use crate::cache::{AudioRef, Lookup, get_or_create};
pub use crate::key::{ContentKey, Role, partition};
pub use crate::naming::{AudioNamer, DEFAULT_SENTENCE_TEMPLATE, DEFAULT_WORD_TEMPLATE};
pub use crate::sync::{SyncEvent, SyncOptions, sync};
use vocab_storage::{AudioFormat, BackendHandle};
use vocab_synth::{RetryPolicy, SynthesizerHandle};

/// Which duplicate survives word-level deduplication.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Keep {
    /// Most back cards; ties go to the earliest.
    #[default]
    Richest,
    /// The earliest in store order.
    First,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DedupPolicy {
    pub keep: Keep,
    /// The same word in two voices is two entries.
    pub scope_by_voice: bool,
}

/// Collaborators and settings shared by every step of a run.
pub struct Context {
    pub word_audio: BackendHandle,
    /// Partitioned by word, see [`partition`].
    pub sentence_audio: BackendHandle,
    pub synthesizer: SynthesizerHandle,
    /// Voice for entries that don't name their own.
    pub voice: String,
    pub format: AudioFormat,
    pub ssml: bool,
    pub namer: AudioNamer,
    pub retry: RetryPolicy,
    pub dedup: DedupPolicy,
    /// Plan synthesis instead of performing it. Callers are expected to wrap
    /// the audio roots in a [`ReadOnlyBackend`](vocab_storage::backend::ReadOnlyBackend).
    pub dry_run: bool,
}
impl Context {
    pub fn new(
        word_audio: BackendHandle,
        sentence_audio: BackendHandle,
        synthesizer: SynthesizerHandle,
        voice: impl Into<String>,
        namer: AudioNamer,
    ) -> Self {
        Self {
            word_audio,
            sentence_audio,
            synthesizer,
            voice: voice.into(),
            format: AudioFormat::default(),
            ssml: false,
            namer,
            retry: RetryPolicy::default(),
            dedup: DedupPolicy::default(),
            dry_run: false,
        }
    }

    pub fn with_format(mut self, format: AudioFormat, ssml: bool) -> Self {
        self.format = format;
        self.ssml = ssml;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_dedup(mut self, dedup: DedupPolicy) -> Self {
        self.dedup = dedup;
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// The audio root holding assets of `role`.
    pub fn root(&self, role: Role) -> &BackendHandle {
        match role {
            Role::Word => &self.word_audio,
            Role::Sentence => &self.sentence_audio,
        }
    }
}
