//! The persistent vocabulary store: a YAML list of entries.
//!
//! Older stores were bucketed by first letter (`a: [...]`, `b: [...]`); those
//! are flattened on load. Saves always write the flat list.

use crate::error::{ErrorKind, Result};
use crate::fs::{backup, write_atomic};
use crate::models::VocabularyEntry;
use exn::ResultExt;
use serde_yaml::Value as YamlValue;
use std::fs;
use std::io::ErrorKind as IoErrorKind;
use std::path::Path;
use tracing::instrument;

/// Loads every entry from the store.
///
/// A missing or empty store is an empty list, not an error.
///
/// # Errors
///
/// Returns [`ErrorKind::StoreUnreadable`] if the file exists but cannot be
/// read or does not describe a list of entries.
#[instrument(skip_all, fields(path = %path.display()))]
pub fn load(path: &Path) -> Result<Vec<VocabularyEntry>> {
    let unreadable = || ErrorKind::StoreUnreadable(path.to_path_buf());
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == IoErrorKind::NotFound => {
            tracing::info!("No store file yet, starting empty");
            return Ok(Vec::new());
        },
        Err(e) => return Err(e).or_raise(unreadable),
    };
    let entries = parse(&contents).or_raise(unreadable)?;
    tracing::info!(entries = entries.len(), "Store loaded");
    Ok(entries)
}

/// Parses store contents in either the flat or the letter-bucketed shape.
pub fn parse(contents: &str) -> Result<Vec<VocabularyEntry>> {
    let invalid = |value: &str| ErrorKind::InvalidField { field: "store", value: value.to_string() };
    let document: YamlValue = serde_yaml::from_str(contents).or_raise(|| invalid("not YAML"))?;
    match document {
        YamlValue::Null => Ok(Vec::new()),
        YamlValue::Sequence(_) => serde_yaml::from_value(document).or_raise(|| invalid("list of entries")),
        YamlValue::Mapping(buckets) => {
            let mut entries = Vec::new();
            for (bucket, items) in buckets {
                if items.is_null() {
                    continue;
                }
                let label = bucket.as_str().unwrap_or("?").to_string();
                let mut bucket_entries: Vec<VocabularyEntry> =
                    serde_yaml::from_value(items).or_raise(|| invalid(&format!("bucket '{label}'")))?;
                entries.append(&mut bucket_entries);
            }
            Ok(entries)
        },
        _ => exn::bail!(invalid("expected a list or a map of lists")),
    }
}

/// Writes the store atomically, backing up the previous file to `backup_to`
/// first when given.
#[instrument(skip_all, fields(path = %path.display(), entries = entries.len()))]
pub fn save(path: &Path, entries: &[VocabularyEntry], backup_to: Option<&Path>) -> Result<()> {
    if let Some(backup_to) = backup_to {
        backup(path, backup_to)?;
    }
    let yaml = serde_yaml::to_string(entries).or_raise(|| ErrorKind::Write(path.to_path_buf()))?;
    write_atomic(path, yaml.as_bytes())?;
    tracing::info!("Store saved");
    Ok(())
}
