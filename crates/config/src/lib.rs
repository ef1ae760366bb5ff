//! Layered configuration for vocab-sync.
//!
//! Sources, lowest precedence first:
//!
//! 1. Built-in defaults ([`Config::default`]).
//! 2. The user config file, `config.yaml` in the platform config directory
//!    (e.g. `~/.config/vocab-sync/config.yaml`), if it exists.
//! 3. An explicit file passed with `--config` (`.yaml`, `.toml` or `.json`).
//! 4. Environment variables prefixed with `VOCAB_SYNC_`, using `__` between
//!    section and key: `VOCAB_SYNC_SYNTHESIS__API_KEY=...`.
//!
//! Relative paths are resolved against `paths.root` once everything is merged.

pub mod error;

use crate::error::{ErrorKind, Result};
use directories::ProjectDirs;
use exn::ResultExt;
use figment::Figment;
use figment::providers::{Env, Format, Json, Serialized, Toml, Yaml};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::instrument;
use vocab_library::{AudioNamer, DEFAULT_SENTENCE_TEMPLATE, DEFAULT_WORD_TEMPLATE};
use vocab_storage::AudioFormat;

pub const ENV_PREFIX: &str = "VOCAB_SYNC_";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub paths: Paths,
    pub voice: Voice,
    pub synthesis: Synthesis,
    pub dedup: Dedup,
    pub batch: Batch,
    pub naming: Naming,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Paths {
    /// Base directory every other relative path is resolved against.
    pub root: PathBuf,
    pub store: PathBuf,
    pub batch: PathBuf,
    /// History of every batch record ever loaded (JSONL). Disabled when unset.
    pub batch_log: Option<PathBuf>,
    /// Where repaired batches are written for inspection. Disabled when unset.
    pub corrected_batch: Option<PathBuf>,
    pub word_audio: PathBuf,
    pub sentence_audio: PathBuf,
    pub reports: PathBuf,
    /// Batch and store backups. Defaults to beside the original when unset.
    pub backups: Option<PathBuf>,
}
impl Default for Paths {
    fn default() -> Self {
        Self {
            root: PathBuf::from("data"),
            store: PathBuf::from("vocab3000_database.yaml"),
            batch: PathBuf::from("temp/temp_vocab3000.jsonl"),
            batch_log: Some(PathBuf::from("temp/temp_vocab3000_log.jsonl")),
            corrected_batch: Some(PathBuf::from("temp/corrected_vocab3000.jsonl")),
            word_audio: PathBuf::from("audio/front"),
            sentence_audio: PathBuf::from("audio/back"),
            reports: PathBuf::from("reports"),
            backups: Some(PathBuf::from("temp")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Voice {
    pub id: String,
    /// `mp3`, `ogg_vorbis` or `pcm`.
    pub format: String,
    /// Wrap text in `<speak>` and send it as SSML.
    pub ssml: bool,
}
impl Default for Voice {
    fn default() -> Self {
        Self {
            id: "Matthew".to_string(),
            format: "mp3".to_string(),
            ssml: false,
        }
    }
}
impl Voice {
    pub fn audio_format(&self) -> Result<AudioFormat> {
        self.format.parse::<AudioFormat>().or_raise(|| ErrorKind::Invalid {
            field: "voice.format",
            reason: format!("unsupported audio format '{}'", self.format),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Synthesis {
    pub endpoint: String,
    pub api_key: Option<String>,
    pub engine: Option<String>,
    pub timeout_secs: u64,
    pub retry_attempts: u32,
    pub retry_delay_ms: u64,
}
impl Default for Synthesis {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            api_key: None,
            engine: Some("neural".to_string()),
            timeout_secs: 30,
            retry_attempts: 3,
            retry_delay_ms: 2000,
        }
    }
}
impl Synthesis {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

/// Which duplicate survives word-level deduplication.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Keep {
    /// The entry with the most back cards; ties go to the earliest.
    #[default]
    Richest,
    /// The earliest entry in store order.
    First,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Dedup {
    pub keep: Keep,
    /// Treat the same word in two voices as two entries.
    pub scope_by_voice: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Batch {
    /// Refuse the batch when more than this fraction of lines is unfixable.
    pub max_unfixable_ratio: f64,
    /// Rewrite the batch after a run so it only holds records still pending.
    pub clear_after_merge: bool,
}
impl Default for Batch {
    fn default() -> Self {
        Self {
            max_unfixable_ratio: 0.5,
            clear_after_merge: true,
        }
    }
}

/// File name templates for synthesized audio (without extension).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Naming {
    pub word: String,
    pub sentence: String,
}
impl Default for Naming {
    fn default() -> Self {
        Self {
            word: DEFAULT_WORD_TEMPLATE.to_string(),
            sentence: DEFAULT_SENTENCE_TEMPLATE.to_string(),
        }
    }
}

impl Config {
    /// Loads the configuration from every source and resolves its paths.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        Self::load_from(Self::user_config_path().as_deref(), explicit)
    }

    /// Like [`load`](Self::load), with the user config file given explicitly.
    #[instrument(skip_all)]
    pub fn load_from(user: Option<&Path>, explicit: Option<&Path>) -> Result<Self> {
        let mut config: Self = Self::figment(user, explicit)?.extract().or_raise(|| ErrorKind::Extract)?;
        config.resolve();
        config.validate()?;
        tracing::debug!(root = %config.paths.root.display(), "Configuration loaded");
        Ok(config)
    }

    /// Location of the per-user config file, if the platform has one.
    pub fn user_config_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "vocab-sync").map(|dirs| dirs.config_dir().join("config.yaml"))
    }

    fn figment(user: Option<&Path>, explicit: Option<&Path>) -> Result<Figment> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));
        if let Some(user) = user
            && user.is_file()
        {
            tracing::debug!(path = %user.display(), "Using user config file");
            figment = Self::merge_file(figment, user)?;
        }
        if let Some(explicit) = explicit {
            if !explicit.is_file() {
                exn::bail!(ErrorKind::NotFound(explicit.to_path_buf()));
            }
            figment = Self::merge_file(figment, explicit)?;
        }
        Ok(figment.merge(Env::prefixed(ENV_PREFIX).split("__")))
    }

    fn merge_file(figment: Figment, path: &Path) -> Result<Figment> {
        let extension = path.extension().and_then(|e| e.to_str()).map(str::to_ascii_lowercase);
        Ok(match extension.as_deref() {
            Some("yaml" | "yml") => figment.merge(Yaml::file(path)),
            Some("toml") => figment.merge(Toml::file(path)),
            Some("json") => figment.merge(Json::file(path)),
            _ => exn::bail!(ErrorKind::UnsupportedFormat(path.to_path_buf())),
        })
    }

    /// Makes every path absolute-or-root-relative.
    fn resolve(&mut self) {
        let root = self.paths.root.clone();
        let join = |path: &mut PathBuf| {
            if path.is_relative() {
                *path = root.join(&*path);
            }
        };
        let paths = &mut self.paths;
        for path in [
            &mut paths.store,
            &mut paths.batch,
            &mut paths.word_audio,
            &mut paths.sentence_audio,
            &mut paths.reports,
        ] {
            join(path);
        }
        for path in [&mut paths.batch_log, &mut paths.corrected_batch, &mut paths.backups].into_iter().flatten() {
            join(path);
        }
    }

    /// Fails fast on settings no run could succeed with.
    pub fn validate(&self) -> Result<()> {
        let invalid = |field: &'static str, reason: &str| ErrorKind::Invalid { field, reason: reason.to_string() };
        let ratio = self.batch.max_unfixable_ratio;
        if !(ratio > 0.0 && ratio <= 1.0) {
            exn::bail!(invalid("batch.max_unfixable_ratio", "must be within (0, 1]"));
        }
        if self.synthesis.retry_attempts == 0 {
            exn::bail!(invalid("synthesis.retry_attempts", "must be at least 1"));
        }
        if self.voice.id.trim().is_empty() {
            exn::bail!(invalid("voice.id", "must not be empty"));
        }
        self.voice.audio_format()?;
        // Compiled one at a time so the error names the template at fault.
        let templates = [
            ("naming.word", self.naming.word.as_str(), DEFAULT_SENTENCE_TEMPLATE),
            ("naming.sentence", DEFAULT_WORD_TEMPLATE, self.naming.sentence.as_str()),
        ];
        for (field, word, sentence) in templates {
            AudioNamer::new(word, sentence).or_raise(|| invalid(field, "template must compile and include {{ key }}"))?;
        }
        if self.paths.word_audio == self.paths.sentence_audio {
            exn::bail!(invalid("paths.sentence_audio", "must differ from paths.word_audio"));
        }
        Ok(())
    }

    /// Copy safe to print: secrets are masked.
    pub fn redacted(&self) -> Self {
        let mut config = self.clone();
        if config.synthesis.api_key.is_some() {
            config.synthesis.api_key = Some("********".to_string());
        }
        config
    }
}
