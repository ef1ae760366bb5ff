//! Audio file names.
//!
//! File names are rendered from user-configured [upon] templates and always
//! end in the voice's format extension. The template syntax follows upon's
//! Mustache-like conventions (`{{ variable }}`, `{{ value|formatter }}`) with
//! two additions:
//!
//! - **`slug`**: lower-case, hyphen-separated, quotation marks dropped.
//! - **`truncate`**: the first `n` characters, as `truncate(value, n)` or
//!   `{{ value|truncate: n }}`.
//!
//! # Template Variables
//!
//! | Variable | Description                                      |
//! |----------|--------------------------------------------------|
//! | `text`   | Normalized text (trimmed, single-spaced, lower)  |
//! | `key`    | The [`ContentKey`], 16 hex characters            |
//! | `voice`  | Voice identifier                                 |
//! | `role`   | `word` or `sentence`                             |
//!
//! Templates must use `key`: two different texts whose slugs collide would
//! otherwise be written to the same file.

use crate::error::{ErrorKind, Result};
use crate::key::{ContentKey, Role};
use exn::ResultExt;
use tracing::instrument;
use upon::{Engine, Template};
use vocab_records::models::normalize;
use vocab_storage::{AudioFormat, validate_file_name};

pub const DEFAULT_WORD_TEMPLATE: &str = "{{ text|slug }}-{{ key }}";
pub const DEFAULT_SENTENCE_TEMPLATE: &str = "{{ truncate(text, 40)|slug }}-{{ key }}";

/// Compiled word and sentence file name templates.
pub struct AudioNamer {
    engine: Engine<'static>,
    word: Template<'static>,
    sentence: Template<'static>,
}
impl AudioNamer {
    /// Compiles both templates.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::Template`] if either template fails to compile,
    /// fails to render, or renders the same name for different keys.
    pub fn new(word: &str, sentence: &str) -> Result<Self> {
        let mut engine = Engine::new();
        addons::configure(&mut engine);
        let word = engine.compile(word.to_string()).or_raise(|| ErrorKind::Template)?;
        let sentence = engine.compile(sentence.to_string()).or_raise(|| ErrorKind::Template)?;
        let namer = Self { engine, word, sentence };
        for role in [Role::Word, Role::Sentence] {
            namer.ensure_keyed(role)?;
        }
        Ok(namer)
    }

    /// The file name (no directories) for `text` spoken by `voice`.
    ///
    /// ```
    /// use vocab_library::{AudioNamer, ContentKey, Role};
    /// use vocab_storage::AudioFormat;
    /// let namer = AudioNamer::new("{{ text|slug }}-{{ key }}", "{{ truncate(text, 12)|slug }}-{{ key }}").unwrap();
    /// let text = "An apple a day keeps the doctor away.";
    /// let name = namer.file_name(Role::Sentence, text, "Matthew", AudioFormat::Mp3).unwrap();
    /// let key = ContentKey::new(Role::Sentence, "Matthew", text);
    /// assert_eq!(name, format!("an-apple-a-d-{key}.mp3"));
    /// ```
    #[instrument(level = "trace", skip(self))]
    pub fn file_name(&self, role: Role, text: &str, voice: &str, format: AudioFormat) -> Result<String> {
        let key = ContentKey::new(role, voice, text);
        self.render(role, &normalize(text), voice, &key, format)
    }

    fn render(&self, role: Role, text: &str, voice: &str, key: &ContentKey, format: AudioFormat) -> Result<String> {
        let template = match role {
            Role::Word => &self.word,
            Role::Sentence => &self.sentence,
        };
        let parameters = upon::value! {
            text: text,
            key: key.to_string(),
            voice: voice.trim(),
            role: role.as_str(),
        };
        let stem = template.render(&self.engine, parameters).to_string().or_raise(|| ErrorKind::Template)?;
        let stem = stem.trim().trim_matches(|c: char| c == '-' || c == '.');
        if stem.is_empty() {
            exn::bail!(ErrorKind::Template);
        }
        let name = format!("{stem}{}", format.extension());
        validate_file_name(&name).or_raise(|| ErrorKind::Template)?;
        Ok(name)
    }

    /// Renders a sample under two different keys; identical output means the
    /// template ignores the key.
    fn ensure_keyed(&self, role: Role) -> Result<()> {
        let sample = |text: &str| {
            let key = ContentKey::new(role, "voice", text);
            self.render(role, "sample text", "voice", &key, AudioFormat::Mp3)
        };
        if sample("first")? == sample("second")? {
            exn::bail!(ErrorKind::Template);
        }
        Ok(())
    }
}

/// Custom [`upon`] extensions for file-name-safe text.
mod addons {
    use crate::key::slug;
    use std::fmt::Write;
    use upon::{Engine, Value, fmt as upon_fmt};

    fn slug_formatter(f: &mut upon_fmt::Formatter<'_>, value: &Value) -> upon_fmt::Result {
        match value {
            Value::String(s) => write!(f, "{}", slug(s))?,
            v => upon_fmt::default(f, v)?,
        };
        Ok(())
    }

    /// First `max_chars` characters of `s`. Sentences are counted in
    /// characters, not bytes, so accented text isn't cut shorter.
    fn truncate(s: &str, max_chars: usize) -> String {
        s.chars().take(max_chars).collect()
    }

    pub(crate) fn configure(engine: &mut Engine<'_>) {
        engine.add_formatter("slug", slug_formatter);
        engine.add_function("truncate", truncate);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn namer() -> AudioNamer {
        AudioNamer::new(DEFAULT_WORD_TEMPLATE, DEFAULT_SENTENCE_TEMPLATE).unwrap()
    }

    #[test]
    fn test_word_name() {
        let key = ContentKey::new(Role::Word, "Matthew", "Apple");
        let name = namer().file_name(Role::Word, "Apple", "Matthew", AudioFormat::Mp3).unwrap();
        assert_eq!(name, format!("apple-{key}.mp3"));
    }

    #[test]
    fn test_same_text_same_name() {
        let namer = namer();
        let a = namer.file_name(Role::Sentence, "An  apple a day.", "Matthew", AudioFormat::Mp3).unwrap();
        let b = namer.file_name(Role::Sentence, "an apple a DAY.", "Matthew", AudioFormat::Mp3).unwrap();
        assert_eq!(a, b);
        let other_voice = namer.file_name(Role::Sentence, "an apple a day.", "Joanna", AudioFormat::Mp3).unwrap();
        assert_ne!(a, other_voice);
    }

    #[test]
    fn test_sentence_is_truncated() {
        let text = "The quick brown fox jumps over the lazy dog while the cat watches.";
        let name = namer().file_name(Role::Sentence, text, "Matthew", AudioFormat::OggVorbis).unwrap();
        assert!(name.starts_with("the-quick-brown-fox-jumps-over-the-lazy-"));
        assert!(name.ends_with(".ogg"));
    }

    #[test]
    fn test_quotes_are_dropped() {
        let name = namer().file_name(Role::Word, "\u{201C}don\u{2019}t\u{201D}", "Matthew", AudioFormat::Mp3).unwrap();
        assert!(name.starts_with("dont-"), "{name}");
    }

    #[test]
    fn test_unsluggable_text_still_has_a_name() {
        let key = ContentKey::new(Role::Word, "Matthew", "?!");
        let name = namer().file_name(Role::Word, "?!", "Matthew", AudioFormat::Mp3).unwrap();
        assert_eq!(name, format!("{key}.mp3"));
    }

    #[test]
    fn test_truncate_filter_syntax() {
        let namer = AudioNamer::new("{{ text|truncate: 5|slug }}-{{ key }}", DEFAULT_SENTENCE_TEMPLATE).unwrap();
        let name = namer.file_name(Role::Word, "strawberry", "Matthew", AudioFormat::Mp3).unwrap();
        assert!(name.starts_with("straw-"));
    }

    #[rstest]
    #[case::ignores_key("{{ text|slug }}")]
    #[case::syntax_error("{{ text|slug ")]
    #[case::unknown_formatter("{{ text|shout }}-{{ key }}")]
    #[case::directory("{{ voice }}/{{ key }}")]
    fn test_rejected_templates(#[case] template: &str) {
        let err = AudioNamer::new(template, DEFAULT_SENTENCE_TEMPLATE).err().unwrap();
        assert!(matches!(&*err, ErrorKind::Template));
    }
}
