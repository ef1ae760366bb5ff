//! Content addressing for synthesized audio.

use rslug::slugify;
use std::fmt::{Display, Formatter, Result as FmtResult};
use vocab_records::models::normalize;

/// Hex characters of the digest embedded in file names (64 bits).
const KEY_LENGTH: usize = 16;

/// What a piece of audio is for. Word audio and sentence audio live in
/// separate roots, and the same text spoken as either gets a different key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Role {
    Word,
    Sentence,
}
impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Word => "word",
            Self::Sentence => "sentence",
        }
    }
}
impl Display for Role {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

/// Deterministic identity of a piece of audio: BLAKE3 over the role, the
/// voice and the normalized text.
///
/// Casing and whitespace do not change the key, the voice and role do.
///
/// ```
/// use vocab_library::{ContentKey, Role};
/// let a = ContentKey::new(Role::Sentence, "Matthew", "An apple a day.");
/// let b = ContentKey::new(Role::Sentence, "Matthew", "  an APPLE  a day. ");
/// assert_eq!(a, b);
/// assert_ne!(a, ContentKey::new(Role::Word, "Matthew", "An apple a day."));
/// assert_eq!(a.to_string().len(), 16);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContentKey(blake3::Hash);
impl ContentKey {
    pub fn new(role: Role, voice: &str, text: &str) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(role.as_str().as_bytes());
        hasher.update(b"\0");
        hasher.update(voice.trim().as_bytes());
        hasher.update(b"\0");
        hasher.update(normalize(text).as_bytes());
        Self(hasher.finalize())
    }
}
impl Display for ContentKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(&self.0.to_hex()[..KEY_LENGTH])
    }
}

/// Quotation marks are dropped rather than turned into separators, so
/// `don't` becomes `dont` and `"ok"` doesn't gain stray hyphens.
const QUOTES: [char; 13] = [
    '\u{0027}', '\u{0022}', '\u{2018}', '\u{2019}', '\u{201C}', '\u{201D}', '\u{201E}', '\u{201B}', '\u{0060}',
    '\u{00AB}', '\u{00BB}', '\u{2039}', '\u{203A}',
];

/// URL and filesystem safe form of `text`.
pub(crate) fn slug(text: &str) -> String {
    let stripped: String = text.chars().filter(|c| !QUOTES.contains(c)).collect();
    slugify!(&stripped)
}

/// Directory below the sentence root that holds a word's sentence audio.
///
/// The slug of the word, or a short hash when the word has nothing
/// slug-worthy in it (punctuation, unsupported scripts).
pub fn partition(word: &str) -> String {
    let word = normalize(word);
    let slug = slug(&word);
    if slug.is_empty() { format!("w-{}", &blake3::hash(word.as_bytes()).to_hex()[..8]) } else { slug }
}
