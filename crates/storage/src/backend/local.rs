//! Audio roots on the local filesystem, accessed through `tokio::fs`.

use crate::backend::FileInfoStream;
use crate::error::{ErrorKind, Result};
use crate::path::validate as validate_path;
use crate::{FileInfo, StorageBackend};
use async_stream::stream;
use async_trait::async_trait;
use std::io::{Error as IoError, ErrorKind as IoErrorKind};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

/// Staged writes are named `.partial-<pid>-<file name>` beside their target.
const STAGING_PREFIX: &str = ".partial-";

/// An audio root directory.
///
/// New assets are written to a hidden staging file first and then hard-linked
/// into place, so a crash never leaves a truncated asset under its real name
/// and an occupied name is never replaced. Hidden files are not assets and are
/// left out of listings.
///
/// # Examples
///
/// ```no_run
/// use vocab_storage::backend::LocalBackend;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let words = LocalBackend::new("front", "/srv/vocab/audio/front")?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct LocalBackend {
    name: String,
    root: PathBuf,
}
impl LocalBackend {
    /// Opens an audio root, creating the directory if it doesn't exist yet.
    ///
    /// # Errors
    ///
    /// [`InvalidPath`](ErrorKind::InvalidPath) if `root` is relative or is
    /// something other than a directory.
    pub fn new(name: impl Into<String>, root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        if !root.is_absolute() || (root.exists() && !root.is_dir()) {
            exn::bail!(ErrorKind::InvalidPath(root));
        }
        // Once per run; not worth an async constructor.
        std::fs::create_dir_all(&root).map_err(|e| ErrorKind::from_io(e, &root))?;
        Ok(Self { name: name.into(), root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The validated relative path and where it lives on disk.
    fn locate(&self, path: &Path) -> Result<(PathBuf, PathBuf)> {
        let relative = validate_path(path)?;
        let absolute = self.root.join(&relative);
        Ok((relative, absolute))
    }

    /// Writes `data` to a staging file beside `target` and links it into
    /// place. The staging file is always removed.
    async fn stage_and_link(target: &Path, data: &[u8]) -> std::result::Result<(), IoError> {
        let (Some(dir), Some(file_name)) = (target.parent(), target.file_name()) else {
            return Err(IoError::other("asset path has no file name"));
        };
        let staged = dir.join(format!("{STAGING_PREFIX}{}-{}", std::process::id(), file_name.to_string_lossy()));
        let mut file = fs::File::create(&staged).await?;
        let written = match file.write_all(data).await {
            Ok(()) => file.sync_all().await,
            Err(e) => Err(e),
        };
        drop(file);
        let linked = match written {
            Ok(()) => fs::hard_link(&staged, target).await,
            Err(e) => Err(e),
        };
        _ = fs::remove_file(&staged).await;
        match linked {
            // FAT and some network mounts have no hard links.
            Err(e) if matches!(e.kind(), IoErrorKind::Unsupported | IoErrorKind::PermissionDenied) => {
                tracing::debug!(path = %target.display(), error = %e, "Hard link refused, writing in place");
                Self::write_new(target, data).await
            },
            linked => linked,
        }
    }

    /// Writes `data` straight to `target`, which must not exist yet. A failed
    /// write removes the partial file again.
    async fn write_new(target: &Path, data: &[u8]) -> std::result::Result<(), IoError> {
        let mut file = fs::OpenOptions::new().write(true).create_new(true).open(target).await?;
        let written = match file.write_all(data).await {
            Ok(()) => file.sync_all().await,
            Err(e) => Err(e),
        };
        drop(file);
        if written.is_err() {
            _ = fs::remove_file(target).await;
        }
        written
    }
}

fn is_hidden(path: &Path) -> bool {
    path.file_name().is_some_and(|name| name.to_string_lossy().starts_with('.'))
}

#[async_trait]
impl StorageBackend for LocalBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn list_stream<'a>(&'a self, partition: Option<&'a Path>) -> FileInfoStream<'a> {
        let start = match partition.map(validate_path).transpose() {
            Ok(Some(partition)) => self.root.join(partition),
            Ok(None) => self.root.clone(),
            Err(e) => return Box::pin(futures::stream::once(async { Err(e) })),
        };
        Box::pin(stream!({
            let mut pending = vec![start];
            while let Some(dir) = pending.pop() {
                let mut entries = match fs::read_dir(&dir).await {
                    Ok(entries) => entries,
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                    Err(e) => {
                        yield Err(exn::Exn::from(ErrorKind::from_io(e, &dir)));
                        continue;
                    },
                };
                loop {
                    let entry = match entries.next_entry().await {
                        Ok(Some(entry)) => entry,
                        Ok(None) => break,
                        Err(e) => {
                            yield Err(exn::Exn::from(ErrorKind::from_io(e, &dir)));
                            break;
                        },
                    };
                    let path = entry.path();
                    if is_hidden(&path) {
                        continue;
                    }
                    match entry.metadata().await {
                        Ok(metadata) if metadata.is_dir() => pending.push(path),
                        Ok(metadata) if metadata.is_file() => {
                            // Entries come from walking `root`, so the prefix is always there.
                            if let Ok(relative) = path.strip_prefix(&self.root) {
                                yield Ok(FileInfo::new(relative, metadata.len()));
                            }
                        },
                        // Broken symlinks, sockets: not audio.
                        Ok(_) => {},
                        Err(e) => yield Err(exn::Exn::from(ErrorKind::from_io(e, &path))),
                    }
                }
            }
        }))
    }

    async fn stat(&self, path: &Path) -> Result<FileInfo> {
        let (relative, absolute) = self.locate(path)?;
        let metadata = fs::metadata(&absolute).await.map_err(|e| ErrorKind::from_io(e, &relative))?;
        if !metadata.is_file() {
            exn::bail!(ErrorKind::InvalidPath(relative));
        }
        Ok(FileInfo::new(relative, metadata.len()))
    }

    async fn read(&self, path: &Path) -> Result<Vec<u8>> {
        let (relative, absolute) = self.locate(path)?;
        Ok(fs::read(&absolute).await.map_err(|e| ErrorKind::from_io(e, &relative))?)
    }

    async fn create(&self, path: &Path, data: &[u8]) -> Result<()> {
        let (relative, absolute) = self.locate(path)?;
        if let Some(partition) = absolute.parent() {
            fs::create_dir_all(partition).await.map_err(|e| ErrorKind::from_io(e, &relative))?;
        }
        Self::stage_and_link(&absolute, data).await.map_err(|e| ErrorKind::from_io(e, &relative))?;
        tracing::debug!(root = self.name, path = %relative.display(), bytes = data.len(), "Stored audio");
        Ok(())
    }

    /// Also removes the partition directory once its last asset is gone.
    async fn delete(&self, path: &Path) -> Result<()> {
        let (relative, absolute) = self.locate(path)?;
        fs::remove_file(&absolute).await.map_err(|e| ErrorKind::from_io(e, &relative))?;
        if let Some(partition) = absolute.parent()
            && partition != self.root
        {
            // Fails harmlessly while the partition still has assets.
            _ = fs::remove_dir(partition).await;
        }
        tracing::debug!(root = self.name, path = %relative.display(), "Deleted audio");
        Ok(())
    }
}
