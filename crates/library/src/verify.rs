//! Consistency checks between the store and the audio roots.
//!
//! Read-only: the only thing a caller may act on is the list of orphans,
//! through [`delete_orphans`].

use crate::cache::AudioRef;
use crate::error::{ErrorKind, Result};
use crate::{Context, Role};
use derive_more::Display;
use exn::ResultExt;
use futures::TryStreamExt;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::PathBuf;
use tracing::instrument;
use vocab_records::models::VocabularyEntry;
use vocab_storage::validate_file_name;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Problem {
    /// No file name recorded.
    #[display("no audio")]
    Unset,
    #[display("file not found")]
    NotFound,
    /// Zero bytes, left behind by an interrupted write.
    #[display("empty file")]
    Empty,
    /// The recorded name is not a plain file name.
    #[display("invalid file name")]
    InvalidName,
}

/// An entry or card whose audio is unusable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingAudio {
    pub word: String,
    pub role: Role,
    /// Example sentence, for sentence audio.
    pub example: Option<String>,
    /// As recorded on the entry or card.
    pub file_name: String,
    pub problem: Problem,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Verification {
    pub missing: Vec<MissingAudio>,
    /// Files no entry references, sorted.
    pub orphaned: Vec<AudioRef>,
    /// Ranks absent from `1..=max(rank)`.
    pub rank_gaps: Vec<u32>,
    /// Ranks shared by more than one entry, with the words sharing them.
    pub duplicate_ranks: BTreeMap<u32, Vec<String>>,
}
impl Verification {
    pub fn is_consistent(&self) -> bool {
        self.missing.is_empty() && self.orphaned.is_empty()
    }
}

/// Cross-checks `entries` against both audio roots.
///
/// Each root is listed once; every reference is then checked against the
/// listing rather than with a request per file.
#[instrument(skip_all, fields(entries = entries.len()))]
pub async fn verify(ctx: &Context, entries: &[VocabularyEntry]) -> Result<Verification> {
    let mut on_disk: HashMap<AudioRef, u64> = HashMap::new();
    for role in [Role::Word, Role::Sentence] {
        let files: Vec<_> = ctx.root(role).list_stream(None).try_collect().await.or_raise(|| ErrorKind::Storage)?;
        on_disk.extend(files.into_iter().map(|file| (AudioRef { role, path: file.path }, file.size)));
    }

    let mut missing = Vec::new();
    let mut referenced = BTreeSet::new();
    for entry in entries {
        let mut check = |role: Role, file_name: &str, example: Option<&str>| {
            let problem = if file_name.trim().is_empty() {
                Some(Problem::Unset)
            } else if validate_file_name(file_name.trim()).is_err() {
                Some(Problem::InvalidName)
            } else {
                let audio = match role {
                    Role::Word => AudioRef::word(file_name),
                    Role::Sentence => AudioRef::sentence(&entry.word, file_name),
                };
                let problem = match on_disk.get(&audio) {
                    None => Some(Problem::NotFound),
                    Some(0) => Some(Problem::Empty),
                    Some(_) => None,
                };
                referenced.insert(audio);
                problem
            };
            if let Some(problem) = problem {
                missing.push(MissingAudio {
                    word: entry.word.clone(),
                    role,
                    example: example.map(str::to_string),
                    file_name: file_name.to_string(),
                    problem,
                });
            }
        };
        check(Role::Word, &entry.word_audio_file, None);
        for card in &entry.back_cards {
            check(Role::Sentence, &card.audio_file, Some(&card.example_en));
        }
    }

    let mut orphaned: Vec<AudioRef> = on_disk.into_keys().filter(|audio| !referenced.contains(audio)).collect();
    orphaned.sort();

    let verification = Verification {
        missing,
        orphaned,
        rank_gaps: rank_gaps(entries),
        duplicate_ranks: duplicate_ranks(entries),
    };
    tracing::info!(
        missing = verification.missing.len(),
        orphaned = verification.orphaned.len(),
        rank_gaps = verification.rank_gaps.len(),
        duplicate_ranks = verification.duplicate_ranks.len(),
        "Verified store against audio"
    );
    Ok(verification)
}

/// Every rank in `1..=max(rank)` that no entry holds.
///
/// ```
/// use vocab_library::verify::rank_gaps;
/// use vocab_records::models::VocabularyEntry;
/// let entries: Vec<_> = [1, 2, 4].map(|rank| VocabularyEntry::new(format!("w{rank}"), rank)).into();
/// assert_eq!(rank_gaps(&entries), vec![3]);
/// ```
pub fn rank_gaps(entries: &[VocabularyEntry]) -> Vec<u32> {
    let ranks: BTreeSet<u32> = entries.iter().map(|entry| entry.rank).collect();
    let max = ranks.last().copied().unwrap_or(0);
    (1..=max).filter(|rank| !ranks.contains(rank)).collect()
}

pub fn duplicate_ranks(entries: &[VocabularyEntry]) -> BTreeMap<u32, Vec<String>> {
    let mut by_rank: BTreeMap<u32, Vec<String>> = BTreeMap::new();
    for entry in entries {
        by_rank.entry(entry.rank).or_default().push(entry.word.clone());
    }
    by_rank.retain(|_, words| words.len() > 1);
    by_rank
}

/// Deletes orphaned audio. Returns the paths actually removed.
#[instrument(skip_all, fields(orphans = orphans.len()))]
pub async fn delete_orphans(ctx: &Context, orphans: &[AudioRef]) -> Result<Vec<PathBuf>> {
    let mut deleted = Vec::with_capacity(orphans.len());
    for orphan in orphans {
        ctx.root(orphan.role).delete(&orphan.path).await.or_raise(|| ErrorKind::Storage)?;
        tracing::info!(audio = %orphan, "Deleted orphaned audio");
        deleted.push(orphan.path.clone());
    }
    Ok(deleted)
}
