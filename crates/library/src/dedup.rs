//! Word and sentence deduplication of the store.
//!
//! Both passes only rearrange entries in memory. Audio belonging to whatever
//! was dropped is *scheduled* for deletion, and only if nothing that survived
//! still references it; the caller deletes it once the store is saved.

use crate::cache::AudioRef;
use crate::{Context, DedupPolicy, Keep};
use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use std::collections::hash_map::Entry;
use std::collections::{BTreeSet, HashMap, HashSet};
use tracing::instrument;
use vocab_records::models::{BackCard, EntryKey, VocabularyEntry};
use vocab_storage::error::ErrorKind as StorageErrorKind;

/// A card dropped because its entry already had the same example.
#[derive(Debug, Clone, PartialEq)]
pub struct DroppedCard {
    pub word: String,
    pub card: BackCard,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dedup {
    /// Entries discarded in favour of a richer (or earlier) duplicate.
    pub removed_entries: Vec<VocabularyEntry>,
    pub removed_cards: Vec<DroppedCard>,
    /// Audio no surviving entry references any more.
    pub scheduled: Vec<AudioRef>,
}
impl Dedup {
    pub fn is_empty(&self) -> bool {
        self.removed_entries.is_empty() && self.removed_cards.is_empty()
    }
}

/// Runs word-level then sentence-level deduplication over `entries`.
#[instrument(skip_all, fields(entries = entries.len()))]
pub fn dedup(entries: &mut Vec<VocabularyEntry>, policy: &DedupPolicy) -> Dedup {
    let removed_entries = dedup_words(entries, policy);
    let removed_cards = dedup_sentences(entries);

    let candidates = removed_entries.iter().flat_map(AudioRef::of_entry).chain(removed_cards.iter().filter_map(
        |dropped| dropped.card.has_audio().then(|| AudioRef::sentence(&dropped.word, &dropped.card.audio_file)),
    ));
    let scheduled = unreferenced(candidates, entries);
    if !removed_entries.is_empty() || !removed_cards.is_empty() {
        tracing::info!(
            entries = removed_entries.len(),
            cards = removed_cards.len(),
            audio = scheduled.len(),
            "Removed duplicates"
        );
    }
    Dedup {
        removed_entries,
        removed_cards,
        scheduled,
    }
}

/// Keeps one entry per [`EntryKey`] and returns the ones discarded, in store
/// order.
///
/// The survivor keeps its position. If it has no word audio of its own it
/// adopts the first one found on a discarded duplicate; being the same word
/// in the same voice, that file is the one it would have been given anyway.
pub fn dedup_words(entries: &mut Vec<VocabularyEntry>, policy: &DedupPolicy) -> Vec<VocabularyEntry> {
    let mut groups: HashMap<EntryKey, Vec<usize>> = HashMap::new();
    for (index, entry) in entries.iter().enumerate() {
        groups.entry(entry.key(policy.scope_by_voice)).or_default().push(index);
    }

    let mut discard = BTreeSet::new();
    for indices in groups.values().filter(|indices| indices.len() > 1) {
        let survivor = match policy.keep {
            Keep::First => indices[0],
            // `max_by_key` returns the last maximum; ties must go to the earliest.
            Keep::Richest => indices
                .iter()
                .copied()
                .rev()
                .max_by_key(|&index| entries[index].back_cards.len())
                .unwrap_or(indices[0]),
        };
        if !entries[survivor].has_word_audio()
            && let Some(adopted) = indices
                .iter()
                .map(|&index| &entries[index])
                .find(|entry| entry.has_word_audio())
                .map(|entry| entry.word_audio_file.clone())
        {
            entries[survivor].word_audio_file = adopted;
        }
        tracing::debug!(
            word = %entries[survivor].word,
            kept_cards = entries[survivor].back_cards.len(),
            duplicates = indices.len() - 1,
            "Duplicate word"
        );
        discard.extend(indices.iter().copied().filter(|&index| index != survivor));
    }

    let mut removed = Vec::with_capacity(discard.len());
    let mut index = 0;
    entries.retain(|entry| {
        let keep = !discard.contains(&index);
        if !keep {
            removed.push(entry.clone());
        }
        index += 1;
        keep
    });
    removed
}

/// Within each entry keeps the first card of every example sentence,
/// preserving order, and returns the cards dropped.
///
/// A kept card without audio adopts the audio of a dropped duplicate: same
/// example, same voice, same content key.
pub fn dedup_sentences(entries: &mut [VocabularyEntry]) -> Vec<DroppedCard> {
    let mut dropped = Vec::new();
    for entry in entries.iter_mut() {
        let mut first_of: HashMap<String, usize> = HashMap::new();
        let mut kept: Vec<BackCard> = Vec::with_capacity(entry.back_cards.len());
        let mut duplicates = Vec::new();
        for card in std::mem::take(&mut entry.back_cards) {
            match first_of.entry(card.example_key()) {
                Entry::Vacant(slot) => {
                    slot.insert(kept.len());
                    kept.push(card);
                },
                Entry::Occupied(slot) => {
                    let first = &mut kept[*slot.get()];
                    if !first.has_audio() && card.has_audio() {
                        first.audio_file = card.audio_file.clone();
                    }
                    duplicates.push(card);
                },
            }
        }
        if !duplicates.is_empty() {
            tracing::debug!(word = %entry.word, duplicates = duplicates.len(), "Duplicate example sentences");
        }
        entry.back_cards = kept;
        dropped.extend(duplicates.into_iter().map(|card| DroppedCard {
            word: entry.word.clone(),
            card,
        }));
    }
    dropped
}

/// The candidates that no entry in `survivors` references, sorted and unique.
pub(crate) fn unreferenced(candidates: impl IntoIterator<Item = AudioRef>, survivors: &[VocabularyEntry]) -> Vec<AudioRef> {
    let referenced: HashSet<AudioRef> = survivors.iter().flat_map(AudioRef::of_entry).collect();
    let unique: BTreeSet<AudioRef> = candidates.into_iter().filter(|audio| !referenced.contains(audio)).collect();
    unique.into_iter().collect()
}

/// Deletes scheduled audio, returning how many files were removed. Files
/// already gone are not an error.
#[instrument(skip_all, fields(scheduled = scheduled.len()))]
pub async fn delete_scheduled(ctx: &Context, scheduled: &[AudioRef]) -> Result<usize> {
    let mut deleted = 0;
    for audio in scheduled {
        match ctx.root(audio.role).delete(&audio.path).await {
            Ok(()) => {
                tracing::info!(audio = %audio, "Deleted duplicate audio");
                deleted += 1;
            },
            Err(e) if matches!(&*e, StorageErrorKind::NotFound(_)) => {},
            Err(e) => return Err(e).or_raise(|| ErrorKind::Storage),
        }
    }
    Ok(deleted)
}
