//! Shared test setup: in-memory audio roots and a scripted synthesizer.

use crate::{AudioNamer, Context, DEFAULT_SENTENCE_TEMPLATE, DEFAULT_WORD_TEMPLATE};
use std::sync::Arc;
use std::time::Duration;
use vocab_records::models::{BackCard, VocabularyEntry};
use vocab_storage::backend::MockBackend;
use vocab_synth::{MockSynthesizer, RetryPolicy};

pub(crate) const VOICE: &str = "Matthew";

pub(crate) struct Fixture {
    pub word_audio: Arc<MockBackend>,
    pub sentence_audio: Arc<MockBackend>,
    pub synth: Arc<MockSynthesizer>,
}
impl Fixture {
    pub fn new() -> Self {
        Self::with_synth(MockSynthesizer::default())
    }

    pub fn with_synth(synth: MockSynthesizer) -> Self {
        Self {
            word_audio: Arc::new(MockBackend::default().with_name("front")),
            sentence_audio: Arc::new(MockBackend::default().with_name("back")),
            synth: Arc::new(synth),
        }
    }

    pub fn context(&self) -> Context {
        let namer = AudioNamer::new(DEFAULT_WORD_TEMPLATE, DEFAULT_SENTENCE_TEMPLATE).unwrap();
        Context::new(self.word_audio.clone(), self.sentence_audio.clone(), self.synth.clone(), VOICE, namer)
            .with_retry(RetryPolicy::new(3, Duration::ZERO))
    }
}

pub(crate) fn entry(word: &str, rank: u32, examples: &[&str]) -> VocabularyEntry {
    VocabularyEntry::new(word, rank)
        .with_cards(examples.iter().map(|example| BackCard::new(format!("meaning of {word}"), *example)))
}
