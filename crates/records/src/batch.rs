//! The incoming batch: one JSON record per line.
//!
//! Loading is tolerant. Lines that fail to parse go through
//! [`repair`](crate::repair); lines that parse after repair are kept and
//! recorded as a [`Correction`], lines that don't are recorded as
//! [`Unfixable`] and excluded. If most of the batch is unfixable the load is
//! refused outright.

use crate::error::{ErrorKind, Result};
use crate::fs::{backup, write_atomic};
use crate::repair::repair;
use exn::ResultExt;
use serde_json::Value;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind as IoErrorKind, Write};
use std::path::Path;
use tracing::instrument;

/// Fraction of unfixable lines above which a batch is refused.
pub const DEFAULT_MAX_UNFIXABLE_RATIO: f64 = 0.5;

/// A parsed batch line.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchRecord {
    /// 1-based line number in the batch file.
    pub line: usize,
    pub value: Value,
}

/// A line that only parsed after repair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Correction {
    pub line: usize,
    pub original: String,
    pub repaired: String,
    /// Why the original line failed to parse.
    pub error: String,
}

/// A line that could not be repaired and was left out of the batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unfixable {
    pub line: usize,
    pub content: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Batch {
    pub records: Vec<BatchRecord>,
    pub corrections: Vec<Correction>,
    pub unfixable: Vec<Unfixable>,
    /// Number of non-blank lines read.
    pub lines: usize,
}
impl Batch {
    /// Parses batch contents.
    ///
    /// Blank lines are skipped and do not count towards the ratio.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::TooManyUnfixable`] if more than
    /// `max_unfixable_ratio` of the non-blank lines cannot be repaired.
    pub fn parse(contents: &str, max_unfixable_ratio: f64) -> Result<Self> {
        let mut batch = Self::default();
        for (index, raw) in contents.lines().enumerate() {
            let line = index + 1;
            let text = raw.trim();
            if text.is_empty() {
                continue;
            }
            batch.lines += 1;
            match repair(text) {
                Ok((value, None)) => batch.records.push(BatchRecord { line, value }),
                Ok((value, Some(repaired))) => {
                    // The error of the untouched line is what the report wants.
                    let error = serde_json::from_str::<Value>(text).err().map(|e| e.to_string());
                    tracing::info!(line, original = text, repaired, "Repaired batch line");
                    batch.corrections.push(Correction {
                        line,
                        original: text.to_string(),
                        repaired,
                        error: error.unwrap_or_else(|| ErrorKind::NotAnObject.to_string()),
                    });
                    batch.records.push(BatchRecord { line, value });
                },
                Err(e) => {
                    let error = e.to_string();
                    tracing::warn!(line, content = text, error, "Unfixable batch line");
                    batch.unfixable.push(Unfixable { line, content: text.to_string(), error });
                },
            }
        }
        if batch.lines > 0 && batch.unfixable.len() as f64 / batch.lines as f64 > max_unfixable_ratio {
            exn::bail!(ErrorKind::TooManyUnfixable {
                unfixable: batch.unfixable.len(),
                total: batch.lines,
            });
        }
        Ok(batch)
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.records.iter().map(|r| &r.value)
    }
}

/// Loads the batch file, taking a backup first when `backup_to` is given.
///
/// A missing batch file is an empty batch. The backup is written before any
/// repair is attempted, so it survives a refused load.
#[instrument(skip_all, fields(path = %path.display()))]
pub fn load(path: &Path, max_unfixable_ratio: f64, backup_to: Option<&Path>) -> Result<Batch> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == IoErrorKind::NotFound => {
            tracing::info!("No batch file, nothing to merge");
            return Ok(Batch::default());
        },
        Err(e) => return Err(e).or_raise(|| ErrorKind::BatchUnreadable(path.to_path_buf())),
    };
    if let Some(backup_to) = backup_to
        && !contents.trim().is_empty()
    {
        backup(path, backup_to)?;
    }
    let batch = Batch::parse(&contents, max_unfixable_ratio)?;
    tracing::info!(
        records = batch.records.len(),
        corrections = batch.corrections.len(),
        unfixable = batch.unfixable.len(),
        "Batch loaded"
    );
    Ok(batch)
}

/// Replaces `path` with the given records, one JSON object per line.
pub fn write<'a>(path: &Path, values: impl IntoIterator<Item = &'a Value>) -> Result<()> {
    write_atomic(path, to_jsonl(values).as_bytes())
}

/// Appends records to a JSONL history log, creating it if necessary.
pub fn append<'a>(path: &Path, values: impl IntoIterator<Item = &'a Value>) -> Result<()> {
    let contents = to_jsonl(values);
    if contents.is_empty() {
        return Ok(());
    }
    let failed = || ErrorKind::Write(path.to_path_buf());
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).or_raise(failed)?;
    }
    let mut file = OpenOptions::new().create(true).append(true).open(path).or_raise(failed)?;
    file.write_all(contents.as_bytes()).or_raise(failed)?;
    Ok(())
}

fn to_jsonl<'a>(values: impl IntoIterator<Item = &'a Value>) -> String {
    values.into_iter().fold(String::new(), |mut out, value| {
        // `Value`'s Display is infallible compact JSON.
        out.push_str(&value.to_string());
        out.push('\n');
        out
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const GOOD: &str = r#"{"word": "apple", "rank": 1, "freq": 10, "back_cards": [{"definition_en": "fruit", "example_en": "An apple."}]}"#;

    #[test]
    fn test_parse_clean_batch() {
        let contents = format!("{GOOD}\n\n{GOOD}\n");
        let batch = Batch::parse(&contents, DEFAULT_MAX_UNFIXABLE_RATIO).unwrap();
        assert_eq!(batch.lines, 2);
        assert_eq!(batch.records.len(), 2);
        assert_eq!(batch.records[1].line, 3);
        assert!(batch.corrections.is_empty());
    }

    #[test]
    fn test_parse_records_corrections() {
        let broken = GOOD.trim_end_matches('}');
        let batch = Batch::parse(broken, DEFAULT_MAX_UNFIXABLE_RATIO).unwrap();
        assert_eq!(batch.records.len(), 1);
        assert_eq!(batch.corrections.len(), 1);
        assert_eq!(batch.corrections[0].line, 1);
        assert_eq!(batch.corrections[0].original, broken);
        assert!(batch.corrections[0].error.contains("EOF"));
    }

    #[test]
    fn test_parse_excludes_unfixable() {
        let contents = format!("{GOOD}\nnot json\n{GOOD}\n");
        let batch = Batch::parse(&contents, DEFAULT_MAX_UNFIXABLE_RATIO).unwrap();
        assert_eq!(batch.records.len(), 2);
        assert_eq!(batch.unfixable.len(), 1);
        assert_eq!(batch.unfixable[0].line, 2);
    }

    #[test]
    fn test_parse_half_unfixable_is_accepted() {
        let contents = format!("{GOOD}\nnot json\n");
        assert!(Batch::parse(&contents, DEFAULT_MAX_UNFIXABLE_RATIO).is_ok());
    }

    #[test]
    fn test_parse_mostly_garbage_is_fatal() {
        let contents = format!("{GOOD}\nnot json\nalso not json\n");
        let err = Batch::parse(&contents, DEFAULT_MAX_UNFIXABLE_RATIO).unwrap_err();
        assert_eq!(*err, ErrorKind::TooManyUnfixable { unfixable: 2, total: 3 });
        assert!(err.is_fatal_load());
    }

    #[test]
    fn test_load_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let batch = load(&dir.path().join("temp_vocab.jsonl"), 0.5, None).unwrap();
        assert!(batch.is_empty());
    }

    #[test]
    fn test_load_backs_up_before_refusing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("temp_vocab.jsonl");
        fs::write(&path, "nope\nnope\n").unwrap();
        let backup_to = dir.path().join("temp_vocab.backup.jsonl");
        assert!(load(&path, 0.5, Some(&backup_to)).is_err());
        assert_eq!(fs::read_to_string(backup_to).unwrap(), "nope\nnope\n");
    }

    #[test]
    fn test_write_and_append() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log/history.jsonl");
        append(&path, [&json!({"word": "a"})]).unwrap();
        append(&path, [&json!({"word": "b"})]).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "{\"word\":\"a\"}\n{\"word\":\"b\"}\n");

        write(&path, []).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "");
    }
}
