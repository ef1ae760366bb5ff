//! Merging validated batch entries into the store.
//!
//! A merge is all-or-nothing per entry: every piece of audio the entry needs
//! is resolved through the [cache](crate::cache) before the store is touched,
//! so a synthesis failure leaves the stored entry exactly as it was. Audio
//! created before the failure is content-addressed and gets reused next time.

use crate::cache::{Lookup, get_or_create};
use crate::error::Result;
use crate::{Context, Role};
use std::collections::{HashMap, HashSet};
use tracing::instrument;
use vocab_records::models::{BackCard, EntryKey, VocabularyEntry};

/// What merging one entry did to the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Change {
    /// A new word: the entry and all of its cards were added.
    Inserted { cards: usize },
    /// A known word gained novel cards (and word audio, if it had none).
    Extended { cards: usize, word_audio: bool },
    /// Everything in the incoming entry was already stored.
    Unchanged,
}

/// Cache outcomes while merging one entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AudioTally {
    pub reused: usize,
    pub created: usize,
    pub planned: usize,
}
impl AudioTally {
    fn record(&mut self, lookup: &Lookup) {
        match lookup {
            Lookup::Hit(_) => self.reused += 1,
            Lookup::Created(_) => self.created += 1,
            Lookup::Planned(_) => self.planned += 1,
        }
    }

    pub fn add(&mut self, other: AudioTally) {
        self.reused += other.reused;
        self.created += other.created;
        self.planned += other.planned;
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Merged {
    pub key: EntryKey,
    pub change: Change,
    pub audio: AudioTally,
}

/// The store being merged into, indexed by [`EntryKey`].
pub struct Merger<'a> {
    ctx: &'a Context,
    entries: Vec<VocabularyEntry>,
    index: HashMap<EntryKey, usize>,
}
impl<'a> Merger<'a> {
    /// Expects `entries` to be deduplicated already; with duplicates, only
    /// the first of each key is merged into.
    pub fn new(ctx: &'a Context, entries: Vec<VocabularyEntry>) -> Self {
        let mut index = HashMap::with_capacity(entries.len());
        for (position, entry) in entries.iter().enumerate() {
            index.entry(entry.key(ctx.dedup.scope_by_voice)).or_insert(position);
        }
        Self { ctx, entries, index }
    }

    pub fn entries(&self) -> &[VocabularyEntry] {
        &self.entries
    }

    pub fn into_entries(self) -> Vec<VocabularyEntry> {
        self.entries
    }

    /// Merges one validated entry.
    ///
    /// New words are inserted with audio for the word and every card. Known
    /// words only gain the cards whose example sentence they don't have yet;
    /// their existing cards, rank and audio are left alone. Repeated examples
    /// within the incoming entry count once.
    ///
    /// # Errors
    ///
    /// Any [cache](get_or_create) error. The store is unchanged when one is
    /// returned.
    #[instrument(skip_all, fields(word = %incoming.word))]
    pub async fn merge(&mut self, incoming: VocabularyEntry) -> Result<Merged> {
        let key = incoming.key(self.ctx.dedup.scope_by_voice);
        let mut audio = AudioTally::default();
        let change = match self.index.get(&key).copied() {
            None => {
                let entry = self.prepare_new(incoming, &mut audio).await?;
                let cards = entry.back_cards.len();
                self.index.insert(key.clone(), self.entries.len());
                self.entries.push(entry);
                tracing::info!(cards, "Inserted new word");
                Change::Inserted { cards }
            },
            Some(position) => {
                let stored = &self.entries[position];
                let voice = self.voice_for(stored).to_string();
                let word = stored.word.clone();
                let word_audio = if stored.has_word_audio() {
                    None
                } else {
                    Some(self.resolve(Role::Word, &word, &voice, &word, &mut audio).await?)
                };
                let mut seen: HashSet<String> = stored.back_cards.iter().map(BackCard::example_key).collect();
                let mut novel = Vec::new();
                for mut card in incoming.back_cards {
                    if !seen.insert(card.example_key()) {
                        continue;
                    }
                    card.audio_file = self.resolve(Role::Sentence, &card.example_en, &voice, &word, &mut audio).await?;
                    novel.push(card);
                }

                let stored = &mut self.entries[position];
                let gained_word_audio = word_audio.is_some();
                if let Some(file_name) = word_audio {
                    stored.word_audio_file = file_name;
                }
                if novel.is_empty() && !gained_word_audio {
                    tracing::debug!("Nothing new");
                    Change::Unchanged
                } else {
                    let cards = novel.len();
                    stored.back_cards.extend(novel);
                    tracing::info!(cards, word_audio = gained_word_audio, "Extended known word");
                    Change::Extended {
                        cards,
                        word_audio: gained_word_audio,
                    }
                }
            },
        };
        Ok(Merged { key, change, audio })
    }

    async fn prepare_new(&self, mut entry: VocabularyEntry, audio: &mut AudioTally) -> Result<VocabularyEntry> {
        let voice = self.voice_for(&entry).to_string();
        let word = entry.word.clone();
        entry.word_audio_file = self.resolve(Role::Word, &word, &voice, &word, audio).await?;
        let mut seen = HashSet::new();
        entry.back_cards.retain(|card| seen.insert(card.example_key()));
        for card in &mut entry.back_cards {
            card.audio_file = self.resolve(Role::Sentence, &card.example_en, &voice, &word, audio).await?;
        }
        Ok(entry)
    }

    async fn resolve(
        &self,
        role: Role,
        text: &str,
        voice: &str,
        owner: &str,
        audio: &mut AudioTally,
    ) -> Result<String> {
        let lookup = get_or_create(self.ctx, role, text, voice, owner).await?;
        audio.record(&lookup);
        Ok(lookup.audio().file_name())
    }

    fn voice_for<'e>(&'e self, entry: &'e VocabularyEntry) -> &'e str {
        entry.voice_id.as_deref().filter(|voice| !voice.trim().is_empty()).unwrap_or(&self.ctx.voice)
    }
}
