use super::{BackCard, normalize};
use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter, Result as FmtResult};

/// A single word's full record: metadata plus its example cards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VocabularyEntry {
    pub word: String,
    /// Frequency rank, ideally unique and contiguous from 1.
    pub rank: u32,
    #[serde(rename = "freq", alias = "frequency", default = "zero")]
    pub frequency: Number,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub part_of_speech: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voice_id: Option<String>,
    /// File name below the word-audio root. Empty until synthesized.
    #[serde(default)]
    pub word_audio_file: String,
    #[serde(default)]
    pub back_cards: Vec<BackCard>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

fn zero() -> Number {
    Number::from(0u8)
}

impl VocabularyEntry {
    pub fn new(word: impl Into<String>, rank: u32) -> Self {
        Self {
            word: word.into(),
            rank,
            frequency: zero(),
            part_of_speech: None,
            voice_id: None,
            word_audio_file: String::new(),
            back_cards: Vec::new(),
            extra: BTreeMap::new(),
        }
    }

    pub fn with_cards(mut self, cards: impl IntoIterator<Item = BackCard>) -> Self {
        self.back_cards.extend(cards);
        self
    }

    pub fn normalized_word(&self) -> String {
        normalize(&self.word)
    }

    /// Identity used for deduplication and merge. When `scope_by_voice` is
    /// set, the same word recorded in two voices counts as two entries.
    pub fn key(&self, scope_by_voice: bool) -> EntryKey {
        EntryKey {
            word: self.normalized_word(),
            voice: if scope_by_voice { self.voice_id.clone() } else { None },
        }
    }

    pub fn has_example(&self, example_key: &str) -> bool {
        self.back_cards.iter().any(|card| card.example_key() == example_key)
    }

    pub fn has_word_audio(&self) -> bool {
        !self.word_audio_file.trim().is_empty()
    }
}

/// Identity of an entry in the store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntryKey {
    pub word: String,
    pub voice: Option<String>,
}
impl Display for EntryKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match &self.voice {
            Some(voice) => write!(f, "{} ({voice})", self.word),
            None => write!(f, "{}", self.word),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_scoping() {
        let mut entry = VocabularyEntry::new("Apple", 1);
        entry.voice_id = Some("Matthew".to_string());
        assert_eq!(entry.key(false), EntryKey { word: "apple".to_string(), voice: None });
        assert_eq!(entry.key(true).voice.as_deref(), Some("Matthew"));
        assert_eq!(entry.key(true).to_string(), "apple (Matthew)");
    }

    #[test]
    fn test_has_example_is_normalized() {
        let entry = VocabularyEntry::new("apple", 1).with_cards([BackCard::new("a fruit", "I ate an  Apple.")]);
        assert!(entry.has_example("i ate an apple."));
        assert!(!entry.has_example("i ate a pear."));
    }

    #[test]
    fn test_unknown_fields_round_trip() {
        let yaml = "word: apple\nrank: 7\nfreq: 1234\nback_cards:\n- definition_en: a fruit\n  example_en: An apple a day.\n  example_zh: 一天一苹果\ntranslation: 苹果\n";
        let entry: VocabularyEntry = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(entry.rank, 7);
        assert_eq!(entry.frequency, Number::from(1234));
        assert_eq!(entry.extra.get("translation"), Some(&Value::from("苹果")));
        assert_eq!(entry.back_cards[0].extra.get("example_zh"), Some(&Value::from("一天一苹果")));

        let again: VocabularyEntry = serde_yaml::from_str(&serde_yaml::to_string(&entry).unwrap()).unwrap();
        assert_eq!(again, entry);
    }

    #[test]
    fn test_frequency_alias() {
        let entry: VocabularyEntry = serde_json::from_str(r#"{"word":"a","rank":1,"frequency":9.5}"#).unwrap();
        assert_eq!(entry.frequency.as_f64(), Some(9.5));
        assert!(entry.back_cards.is_empty());
        assert!(!entry.has_word_audio());
    }
}
