use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// One definition/example pair shown on the back of a flashcard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackCard {
    pub definition_en: String,
    pub example_en: String,
    /// File name of the example sentence audio, relative to the owning
    /// word's partition. Empty until synthesized.
    #[serde(default)]
    pub audio_file: String,
    /// Fields this tool doesn't model (translations, notes) are carried through.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}
impl BackCard {
    pub fn new(definition_en: impl Into<String>, example_en: impl Into<String>) -> Self {
        Self {
            definition_en: definition_en.into(),
            example_en: example_en.into(),
            audio_file: String::new(),
            extra: BTreeMap::new(),
        }
    }

    /// Normalized example sentence, the identity of a card within its entry.
    pub fn example_key(&self) -> String {
        super::normalize(&self.example_en)
    }

    pub fn has_audio(&self) -> bool {
        !self.audio_file.trim().is_empty()
    }
}
