use std::fmt::{Display, Formatter, Result as FmtResult};
use std::path::{Path, PathBuf};
use time::OffsetDateTime;
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;

const STAMP_FORMAT: &[BorrowedFormatItem<'static>] = format_description!("[year][month][day]_[hour][minute][second]");

/// The moment a run started. Every artifact of one run (batch backup, store
/// backup, report) carries the same stamp so they can be matched up later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct RunStamp(OffsetDateTime);
impl RunStamp {
    pub fn now() -> Self {
        Self(OffsetDateTime::now_utc())
    }

    pub fn at(moment: OffsetDateTime) -> Self {
        Self(moment)
    }

    pub fn moment(&self) -> OffsetDateTime {
        self.0
    }

    /// `vocab.jsonl` becomes `<dir>/vocab.backup-20250101_120000.jsonl`.
    pub fn backup_path(&self, original: &Path, dir: Option<&Path>) -> PathBuf {
        let stem = original.file_stem().map(|s| s.to_string_lossy()).unwrap_or_default();
        let name = match original.extension() {
            Some(ext) => format!("{stem}.backup-{self}.{}", ext.to_string_lossy()),
            None => format!("{stem}.backup-{self}"),
        };
        match dir.or_else(|| original.parent()) {
            Some(dir) => dir.join(name),
            None => PathBuf::from(name),
        }
    }
}
impl Display for RunStamp {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self.0.format(STAMP_FORMAT) {
            Ok(stamp) => f.write_str(&stamp),
            Err(_) => write!(f, "{}", self.0.unix_timestamp()),
        }
    }
}
