//! In-memory audio root for tests.

use super::FileInfoStream;
use crate::error::{ErrorKind, Result};
use crate::path::validate as validate_path;
use crate::{FileInfo, StorageBackend};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;

/// Assets kept in a sorted map, so listings come out in path order.
///
/// # Examples
///
/// ```
/// use vocab_storage::backend::{MockBackend, StorageBackend};
/// use std::path::Path;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let words = MockBackend::with_files([("apple-3f2a9c01d4e5b6a7.mp3", b"ID3...")]);
/// words.create(Path::new("banana-0011223344556677.mp3"), b"ID3...").await?;
/// assert_eq!(words.len().await, 2);
/// assert_eq!(words.stat(Path::new("apple-3f2a9c01d4e5b6a7.mp3")).await?.size, 6);
/// # Ok(())
/// # }
/// ```
pub struct MockBackend {
    name: String,
    assets: RwLock<BTreeMap<PathBuf, Vec<u8>>>,
}
impl MockBackend {
    /// Panics on a path that fails validation: broken test setup should not pass.
    pub fn with_files(files: impl IntoIterator<Item = (impl Into<PathBuf>, impl Into<Vec<u8>>)>) -> Self {
        let assets = files
            .into_iter()
            .map(|(path, data)| {
                let path = path.into();
                match validate_path(&path) {
                    Ok(validated) => (validated, data.into()),
                    Err(_) => panic!("MockBackend::with_files: invalid path {}", path.display()),
                }
            })
            .collect();
        Self {
            name: "mock".to_string(),
            assets: RwLock::new(assets),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub async fn len(&self) -> usize {
        self.assets.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.assets.read().await.is_empty()
    }

    /// Every stored path, sorted.
    pub async fn paths(&self) -> Vec<PathBuf> {
        self.assets.read().await.keys().cloned().collect()
    }
}
impl Default for MockBackend {
    fn default() -> Self {
        Self::with_files(Vec::<(PathBuf, Vec<u8>)>::new())
    }
}

#[async_trait]
impl StorageBackend for MockBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn list_stream<'a>(&'a self, partition: Option<&'a Path>) -> FileInfoStream<'a> {
        let partition = match partition.map(validate_path).transpose() {
            Ok(partition) => partition,
            Err(e) => return Box::pin(futures::stream::once(async { Err(e) })),
        };
        Box::pin(async_stream::stream!({
            // Snapshot first; the lock is never held across a yield.
            let files: Vec<FileInfo> = self
                .assets
                .read()
                .await
                .iter()
                .filter(|(path, _)| partition.as_ref().is_none_or(|partition| path.starts_with(partition)))
                .map(|(path, data)| FileInfo::new(path.clone(), data.len() as u64))
                .collect();
            for file in files {
                yield Ok(file);
            }
        }))
    }

    async fn stat(&self, path: &Path) -> Result<FileInfo> {
        let path = validate_path(path)?;
        match self.assets.read().await.get(&path) {
            Some(data) => Ok(FileInfo::new(path, data.len() as u64)),
            None => exn::bail!(ErrorKind::NotFound(path)),
        }
    }

    async fn read(&self, path: &Path) -> Result<Vec<u8>> {
        let path = validate_path(path)?;
        match self.assets.read().await.get(&path) {
            Some(data) => Ok(data.clone()),
            None => exn::bail!(ErrorKind::NotFound(path)),
        }
    }

    async fn create(&self, path: &Path, data: &[u8]) -> Result<()> {
        let path = validate_path(path)?;
        match self.assets.write().await.entry(path) {
            Entry::Occupied(taken) => exn::bail!(ErrorKind::AlreadyExists(taken.key().clone())),
            Entry::Vacant(free) => {
                free.insert(data.to_vec());
                Ok(())
            },
        }
    }

    async fn delete(&self, path: &Path) -> Result<()> {
        let path = validate_path(path)?;
        match self.assets.write().await.remove(&path) {
            Some(_) => Ok(()),
            None => exn::bail!(ErrorKind::NotFound(path)),
        }
    }
}
