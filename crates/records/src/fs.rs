use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use std::fs;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

/// Writes `contents` to a temporary file beside `path`, then renames it into
/// place. A crash leaves either the old file or the new one, never half.
pub(crate) fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let failed = || ErrorKind::Write(path.to_path_buf());
    fs::create_dir_all(dir).or_raise(failed)?;
    let mut temp = NamedTempFile::new_in(dir).or_raise(failed)?;
    temp.write_all(contents).or_raise(failed)?;
    temp.as_file().sync_all().or_raise(failed)?;
    temp.persist(path).or_raise(failed)?;
    Ok(())
}

/// Copies `original` to `backup`, creating the backup directory if needed.
/// Does nothing when there is nothing to back up.
pub(crate) fn backup(original: &Path, backup: &Path) -> Result<bool> {
    if !original.is_file() {
        return Ok(false);
    }
    let failed = || ErrorKind::Write(backup.to_path_buf());
    if let Some(parent) = backup.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).or_raise(failed)?;
    }
    fs::copy(original, backup).or_raise(failed)?;
    tracing::info!(original = %original.display(), backup = %backup.display(), "Backup created");
    Ok(true)
}
