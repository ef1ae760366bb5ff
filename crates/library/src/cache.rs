//! The content-addressed audio cache.
//!
//! There is no index: an asset's path is a pure function of its role, voice
//! and normalized text (see [`ContentKey`](crate::ContentKey)), so asking the
//! audio root whether that path exists *is* the cache lookup. Assets are
//! written once and never overwritten.

use crate::Context;
use crate::error::{ErrorKind, Result};
use crate::key::{Role, partition};
use exn::ResultExt;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::path::{Path, PathBuf};
use tracing::instrument;
use vocab_records::models::VocabularyEntry;
use vocab_storage::error::ErrorKind as StorageErrorKind;
use vocab_synth::SynthesisRequest;

/// Location of an asset: which root, and the path below it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AudioRef {
    pub role: Role,
    pub path: PathBuf,
}
impl AudioRef {
    pub fn word(file_name: &str) -> Self {
        Self {
            role: Role::Word,
            path: PathBuf::from(file_name.trim()),
        }
    }

    /// Sentence audio lives in the owning word's partition.
    pub fn sentence(word: &str, file_name: &str) -> Self {
        Self {
            role: Role::Sentence,
            path: Path::new(&partition(word)).join(file_name.trim()),
        }
    }

    /// Every asset `entry` references. Unset references are skipped.
    pub fn of_entry(entry: &VocabularyEntry) -> impl Iterator<Item = Self> + '_ {
        let word = entry.has_word_audio().then(|| Self::word(&entry.word_audio_file));
        let cards = entry
            .back_cards
            .iter()
            .filter(|card| card.has_audio())
            .map(|card| Self::sentence(&entry.word, &card.audio_file));
        word.into_iter().chain(cards)
    }

    /// The name recorded on the entry or card.
    pub fn file_name(&self) -> String {
        self.path.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default()
    }
}
impl Display for AudioRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}:{}", self.role, self.path.display())
    }
}

/// How a cache request was satisfied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    /// The asset already existed; nothing was synthesized.
    Hit(AudioRef),
    /// The asset was synthesized and written.
    Created(AudioRef),
    /// Dry run: the asset is missing and would have been synthesized.
    Planned(AudioRef),
}
impl Lookup {
    pub fn audio(&self) -> &AudioRef {
        match self {
            Self::Hit(audio) | Self::Created(audio) | Self::Planned(audio) => audio,
        }
    }
}

/// Returns the asset for `text` spoken by `voice`, synthesizing it first if
/// it doesn't exist yet.
///
/// `owner` is the word the audio belongs to; it decides the partition of
/// sentence audio and is ignored for word audio.
///
/// A zero-byte file at the derived path is treated as a miss and replaced.
///
/// # Errors
///
/// - [`ErrorKind::SynthesisAborted`] if the synthesizer reports a quota or
///   credential problem. No later request can succeed either.
/// - [`ErrorKind::Synthesis`] if synthesis failed after retries, or the text
///   was rejected.
/// - [`ErrorKind::Storage`] if the audio root could not be read or written.
#[instrument(skip(ctx, text))]
pub async fn get_or_create(ctx: &Context, role: Role, text: &str, voice: &str, owner: &str) -> Result<Lookup> {
    let file_name = ctx.namer.file_name(role, text, voice, ctx.format)?;
    let audio = match role {
        Role::Word => AudioRef::word(&file_name),
        Role::Sentence => AudioRef::sentence(owner, &file_name),
    };
    let backend = ctx.root(role);
    match backend.stat(&audio.path).await {
        Ok(info) if !info.is_empty() => {
            tracing::trace!(path = %audio.path.display(), "Audio cache hit");
            return Ok(Lookup::Hit(audio));
        },
        Ok(_) => {
            tracing::warn!(path = %audio.path.display(), "Replacing empty audio file");
            backend.delete(&audio.path).await.or_raise(|| ErrorKind::Storage)?;
        },
        Err(e) if matches!(&*e, StorageErrorKind::NotFound(_)) => {},
        Err(e) => return Err(e).or_raise(|| ErrorKind::Storage),
    }

    if ctx.dry_run {
        tracing::info!(path = %audio.path.display(), "Would synthesize audio");
        return Ok(Lookup::Planned(audio));
    }

    let request = SynthesisRequest::new(text.trim(), voice, ctx.format).with_ssml(ctx.ssml);
    let bytes = match ctx.retry.run(text.trim(), || ctx.synthesizer.synthesize(&request)).await {
        Ok(bytes) => bytes,
        Err(e) if e.is_fatal() => return Err(e).or_raise(|| ErrorKind::SynthesisAborted),
        Err(e) => return Err(e).or_raise(|| ErrorKind::Synthesis(text.trim().to_string())),
    };
    match backend.create(&audio.path, &bytes).await {
        Ok(()) => {
            tracing::info!(path = %audio.path.display(), bytes = bytes.len(), "Synthesized audio");
            Ok(Lookup::Created(audio))
        },
        // Written by someone else in the meantime; same key, same audio.
        Err(e) if matches!(&*e, StorageErrorKind::AlreadyExists(_)) => Ok(Lookup::Hit(audio)),
        Err(e) => Err(e).or_raise(|| ErrorKind::Storage),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{Fixture, VOICE, entry};
    use vocab_storage::StorageBackend;
    use vocab_synth::MockSynthesizer;
    use vocab_synth::error::ErrorKind as SynthErrorKind;

    #[tokio::test]
    async fn test_miss_then_hit() {
        let fixture = Fixture::new();
        let ctx = fixture.context();

        let first = get_or_create(&ctx, Role::Sentence, "An apple a day.", VOICE, "apple").await.unwrap();
        let Lookup::Created(audio) = &first else { panic!("expected a new asset, got {first:?}") };
        assert!(audio.path.starts_with("apple"));
        assert_eq!(fixture.sentence_audio.read(&audio.path).await.unwrap(), b"MOCK:Matthew:An apple a day.");

        let second = get_or_create(&ctx, Role::Sentence, "an  APPLE a day.", VOICE, "apple").await.unwrap();
        assert_eq!(second, Lookup::Hit(audio.clone()));
        assert_eq!(fixture.synth.calls().await, 1);
    }

    #[tokio::test]
    async fn test_roles_use_separate_roots() {
        let fixture = Fixture::new();
        let ctx = fixture.context();
        get_or_create(&ctx, Role::Word, "apple", VOICE, "apple").await.unwrap();
        get_or_create(&ctx, Role::Sentence, "apple", VOICE, "apple").await.unwrap();
        assert_eq!(fixture.word_audio.len().await, 1);
        assert_eq!(fixture.sentence_audio.len().await, 1);
        assert_eq!(fixture.synth.calls().await, 2);
    }

    #[tokio::test]
    async fn test_empty_file_is_replaced() {
        let fixture = Fixture::new();
        let ctx = fixture.context();
        let name = ctx.namer.file_name(Role::Word, "apple", VOICE, ctx.format).unwrap();
        fixture.word_audio.create(Path::new(&name), b"").await.unwrap();

        let lookup = get_or_create(&ctx, Role::Word, "apple", VOICE, "apple").await.unwrap();
        assert!(matches!(lookup, Lookup::Created(_)));
        assert_eq!(fixture.word_audio.read(Path::new(&name)).await.unwrap(), b"MOCK:Matthew:apple");
    }

    #[tokio::test]
    async fn test_dry_run_plans() {
        let fixture = Fixture::new();
        let ctx = fixture.context().with_dry_run(true);
        let lookup = get_or_create(&ctx, Role::Word, "apple", VOICE, "apple").await.unwrap();
        assert!(matches!(lookup, Lookup::Planned(_)));
        assert_eq!(fixture.synth.calls().await, 0);
        assert!(fixture.word_audio.is_empty().await);
    }

    #[tokio::test]
    async fn test_transient_failures_are_retried() {
        let fixture = Fixture::with_synth(MockSynthesizer::with_failures([
            SynthErrorKind::Network,
            SynthErrorKind::Unavailable(503),
        ]));
        let lookup = get_or_create(&fixture.context(), Role::Word, "apple", VOICE, "apple").await.unwrap();
        assert!(matches!(lookup, Lookup::Created(_)));
        assert_eq!(fixture.synth.calls().await, 3);
    }

    #[tokio::test]
    async fn test_exhausted_retries_fail_the_request() {
        let synth = MockSynthesizer::with_failures(std::iter::repeat_n(SynthErrorKind::Network, 3));
        let fixture = Fixture::with_synth(synth);
        let err = get_or_create(&fixture.context(), Role::Word, "apple", VOICE, "apple").await.unwrap_err();
        assert_eq!(*err, ErrorKind::Synthesis("apple".to_string()));
        assert!(!err.is_fatal());
        assert!(fixture.word_audio.is_empty().await);
    }

    #[tokio::test]
    async fn test_quota_aborts() {
        let fixture = Fixture::with_synth(MockSynthesizer::with_failures([SynthErrorKind::QuotaExceeded(402)]));
        let err = get_or_create(&fixture.context(), Role::Word, "apple", VOICE, "apple").await.unwrap_err();
        assert_eq!(*err, ErrorKind::SynthesisAborted);
        assert!(err.is_fatal());
        assert_eq!(fixture.synth.calls().await, 1);
    }

    #[test]
    fn test_entry_refs() {
        let mut apple = entry("Apple", 1, &["An apple a day.", "Apple pie."]);
        apple.word_audio_file = "apple-00.mp3".to_string();
        apple.back_cards[0].audio_file = "an-apple-a-day-01.mp3".to_string();
        let refs: Vec<_> = AudioRef::of_entry(&apple).collect();
        assert_eq!(refs, vec![AudioRef::word("apple-00.mp3"), AudioRef::sentence("apple", "an-apple-a-day-01.mp3")]);
        assert_eq!(refs[1].path, Path::new("apple/an-apple-a-day-01.mp3"));
        assert_eq!(refs[1].file_name(), "an-apple-a-day-01.mp3");
    }
}
