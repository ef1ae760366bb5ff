//! The run report.
//!
//! A plain-text summary of everything a run did and everything that needs a
//! human: repaired and unfixable batch lines, invalid records, failed
//! synthesis, duplicates removed, missing and orphaned audio, rank gaps.
//! Rendering never touches the store or the audio roots.

use crate::dedup::Dedup;
use crate::error::{ErrorKind, Result};
use crate::merge::{AudioTally, Change, Merged};
use crate::verify::Verification;
use exn::ResultExt;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::instrument;
use upon::Engine;
use vocab_records::RunStamp;

const TEMPLATE: &str = "\
Vocabulary sync report {{ stamp }}{% if dry_run %} (dry run, nothing was written){% endif %}

Store
  Entries loaded:     {{ store.loaded }}
  Entries now:        {{ store.saved }}
  Changed:            {% if store.changed %}yes{% else %}no{% endif %}

Batch
  Lines read:         {{ batch.lines }}
  Records parsed:     {{ batch.parsed }}
  Repaired lines:     {{ batch.corrections|count }}
  Unfixable lines:    {{ batch.unfixable|count }}
  Valid records:      {{ batch.valid }}
  Invalid records:    {{ batch.invalid|count }}
{%- for note in batch.corrections %}
  - line {{ note.line }} repaired: {{ note.detail }}
{%- endfor %}
{%- for note in batch.unfixable %}
  - line {{ note.line }} unfixable: {{ note.detail }}
{%- endfor %}
{%- for note in batch.invalid %}
  - line {{ note.line }} invalid: {{ note.detail }}
{%- endfor %}

Merge
  New words:          {{ merge.inserted|count }}
  Extended words:     {{ merge.extended|count }} (+{{ merge.cards_added }} cards)
  Unchanged:          {{ merge.unchanged }}
  Failed:             {{ merge.failed|count }}
  Audio created:      {{ merge.audio.created }}
  Audio reused:       {{ merge.audio.reused }}
  Audio planned:      {{ merge.audio.planned }}
{%- for failure in merge.failed %}
  - {{ failure }}
{%- endfor %}

Duplicates
  Entries removed:    {{ dedup.entries|count }}
  Cards removed:      {{ dedup.cards|count }}
  Audio deleted:      {{ dedup.audio_deleted }}
{%- for word in dedup.entries %}
  - entry {{ word }}
{%- endfor %}
{%- for card in dedup.cards %}
  - card {{ card }}
{%- endfor %}

Consistency
  Missing audio:      {{ verification.missing|count }}
  Orphaned audio:     {{ verification.orphaned|count }} ({{ verification.orphans_deleted }} deleted)
  Rank gaps:          {{ verification.rank_gaps|join }}
  Duplicate ranks:    {{ verification.duplicate_ranks|count }}
{%- for missing in verification.missing %}
  - missing {{ missing }}
{%- endfor %}
{%- for orphan in verification.orphaned %}
  - orphaned {{ orphan }}
{%- endfor %}
{%- for rank in verification.duplicate_ranks %}
  - rank {{ rank }}
{%- endfor %}
";

/// A numbered batch line and what happened to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LineNote {
    pub line: usize,
    pub detail: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StoreSummary {
    pub loaded: usize,
    pub saved: usize,
    pub changed: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    /// Non-blank lines.
    pub lines: usize,
    pub parsed: usize,
    pub valid: usize,
    pub corrections: Vec<LineNote>,
    pub unfixable: Vec<LineNote>,
    pub invalid: Vec<LineNote>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AudioSummary {
    pub created: usize,
    pub reused: usize,
    pub planned: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MergeSummary {
    pub inserted: Vec<String>,
    pub extended: Vec<String>,
    pub unchanged: usize,
    pub cards_added: usize,
    /// `word: reason`
    pub failed: Vec<String>,
    pub audio: AudioSummary,
}
impl MergeSummary {
    pub fn record(&mut self, merged: &Merged) {
        match merged.change {
            Change::Inserted { .. } => self.inserted.push(merged.key.to_string()),
            Change::Extended { cards, .. } => {
                self.extended.push(merged.key.to_string());
                self.cards_added += cards;
            },
            Change::Unchanged => self.unchanged += 1,
        }
        self.add_audio(merged.audio);
    }

    pub fn record_failure(&mut self, word: &str, reason: impl std::fmt::Display) {
        self.failed.push(format!("{word}: {reason}"));
    }

    fn add_audio(&mut self, tally: AudioTally) {
        self.audio.created += tally.created;
        self.audio.reused += tally.reused;
        self.audio.planned += tally.planned;
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DedupSummary {
    /// `word (rank N, M cards)` of every entry removed.
    pub entries: Vec<String>,
    /// `word: example` of every card removed.
    pub cards: Vec<String>,
    pub audio_deleted: usize,
}
impl From<&Dedup> for DedupSummary {
    fn from(dedup: &Dedup) -> Self {
        Self {
            entries: dedup
                .removed_entries
                .iter()
                .map(|entry| format!("{} (rank {}, {} cards)", entry.word, entry.rank, entry.back_cards.len()))
                .collect(),
            cards: dedup
                .removed_cards
                .iter()
                .map(|dropped| format!("{}: {}", dropped.word, dropped.card.example_en))
                .collect(),
            audio_deleted: 0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct VerificationSummary {
    /// `word [role] file: problem`
    pub missing: Vec<String>,
    pub orphaned: Vec<String>,
    pub orphans_deleted: usize,
    pub rank_gaps: Vec<u32>,
    /// `N: word, word`
    pub duplicate_ranks: Vec<String>,
}
impl From<&Verification> for VerificationSummary {
    fn from(verification: &Verification) -> Self {
        Self {
            missing: verification
                .missing
                .iter()
                .map(|missing| {
                    let subject = match &missing.example {
                        Some(example) => format!("{} [{}] \"{example}\"", missing.word, missing.role),
                        None => format!("{} [{}]", missing.word, missing.role),
                    };
                    match missing.file_name.trim() {
                        "" => format!("{subject}: {}", missing.problem),
                        file_name => format!("{subject} {file_name}: {}", missing.problem),
                    }
                })
                .collect(),
            orphaned: verification.orphaned.iter().map(ToString::to_string).collect(),
            orphans_deleted: 0,
            rank_gaps: verification.rank_gaps.clone(),
            duplicate_ranks: verification
                .duplicate_ranks
                .iter()
                .map(|(rank, words)| format!("{rank}: {}", words.join(", ")))
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Report {
    pub stamp: String,
    pub dry_run: bool,
    pub store: StoreSummary,
    pub batch: BatchSummary,
    pub merge: MergeSummary,
    pub dedup: DedupSummary,
    pub verification: VerificationSummary,
}
impl Report {
    pub fn new(stamp: &RunStamp, dry_run: bool) -> Self {
        Self {
            stamp: stamp.to_string(),
            dry_run,
            ..Self::default()
        }
    }

    pub fn render(&self) -> Result<String> {
        let mut engine = Engine::new();
        addons::configure(&mut engine);
        let template = engine.compile(TEMPLATE).or_raise(|| ErrorKind::Report)?;
        template.render(&engine, self).to_string().or_raise(|| ErrorKind::Report)
    }

    /// Writes `report_<stamp>.txt` into `dir`, creating it if needed.
    #[instrument(skip_all, fields(dir = %dir.display()))]
    pub async fn write(&self, dir: &Path) -> Result<PathBuf> {
        let rendered = self.render()?;
        tokio::fs::create_dir_all(dir).await.or_raise(|| ErrorKind::Report)?;
        let path = dir.join(format!("report_{}.txt", self.stamp));
        tokio::fs::write(&path, rendered).await.or_raise(|| ErrorKind::Report)?;
        tracing::info!(path = %path.display(), "Report written");
        Ok(path)
    }
}

mod addons {
    use std::fmt::Write;
    use upon::{Engine, Value, fmt as upon_fmt};

    /// Number of items in a list or map.
    fn count(f: &mut upon_fmt::Formatter<'_>, value: &Value) -> upon_fmt::Result {
        match value {
            Value::List(items) => write!(f, "{}", items.len())?,
            Value::Map(items) => write!(f, "{}", items.len())?,
            v => upon_fmt::default(f, v)?,
        };
        Ok(())
    }

    /// Comma-separated list, `none` when empty.
    fn join(f: &mut upon_fmt::Formatter<'_>, value: &Value) -> upon_fmt::Result {
        match value {
            Value::List(items) if items.is_empty() => f.write_str("none")?,
            Value::List(items) => {
                for (index, item) in items.iter().enumerate() {
                    if index > 0 {
                        f.write_str(", ")?;
                    }
                    upon_fmt::default(f, item)?;
                }
            },
            v => upon_fmt::default(f, v)?,
        };
        Ok(())
    }

    pub(crate) fn configure(engine: &mut Engine<'_>) {
        engine.add_formatter("count", count);
        engine.add_formatter("join", join);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Role;
    use crate::verify::{MissingAudio, Problem};
    use time::macros::datetime;

    fn report() -> Report {
        Report::new(&RunStamp::at(datetime!(2025-03-04 05:06:07 UTC)), false)
    }

    #[test]
    fn test_empty_report_renders() {
        let rendered = report().render().unwrap();
        assert!(rendered.starts_with("Vocabulary sync report 20250304_050607\n"));
        assert!(rendered.contains("Rank gaps:          none"));
        assert!(!rendered.contains("dry run"));
    }

    #[test]
    fn test_report_lists_what_needs_attention() {
        let mut report = report();
        report.batch.lines = 3;
        report.batch.unfixable.push(LineNote { line: 2, detail: "EOF while parsing".to_string() });
        report.merge.record_failure("pear", "audio synthesis failed for 'A ripe pear.'");
        report.verification = VerificationSummary::from(&Verification {
            missing: vec![MissingAudio {
                word: "apple".to_string(),
                role: Role::Word,
                example: None,
                file_name: "apple-00.mp3".to_string(),
                problem: Problem::NotFound,
            }],
            rank_gaps: vec![3, 5],
            ..Verification::default()
        });

        let rendered = report.render().unwrap();
        assert!(rendered.contains("Unfixable lines:    1\n"), "{rendered}");
        assert!(rendered.contains("  - line 2 unfixable: EOF while parsing\n"), "{rendered}");
        assert!(rendered.contains("  - pear: audio synthesis failed for 'A ripe pear.'\n"), "{rendered}");
        assert!(rendered.contains("  - missing apple [word] apple-00.mp3: file not found\n"), "{rendered}");
        assert!(rendered.contains("Rank gaps:          3, 5\n"), "{rendered}");
    }

    #[test]
    fn test_dry_run_is_flagged() {
        let report = Report::new(&RunStamp::at(datetime!(2025-03-04 05:06:07 UTC)), true);
        assert!(report.render().unwrap().lines().next().unwrap().ends_with("(dry run, nothing was written)"));
    }

    #[tokio::test]
    async fn test_write() {
        let dir = tempfile::tempdir().unwrap();
        let path = report().write(&dir.path().join("reports")).await.unwrap();
        assert_eq!(path.file_name().unwrap(), "report_20250304_050607.txt");
        assert!(std::fs::read_to_string(path).unwrap().contains("Entries loaded:     0"));
    }
}
