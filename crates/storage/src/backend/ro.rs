//! Dry-run wrapper for an audio root.

use crate::backend::FileInfoStream;
use crate::error::Result;
use crate::{BackendHandle, FileInfo, StorageBackend};
use async_trait::async_trait;
use std::path::Path;

/// Passes lookups through to the wrapped root and turns every write into a
/// log line, so that a dry run sees the real cache state without changing it.
#[derive(Clone)]
pub struct ReadOnlyBackend {
    inner: BackendHandle,
}
impl ReadOnlyBackend {
    pub fn new(inner: BackendHandle) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl StorageBackend for ReadOnlyBackend {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn list_stream<'a>(&'a self, partition: Option<&'a Path>) -> FileInfoStream<'a> {
        self.inner.list_stream(partition)
    }

    async fn stat(&self, path: &Path) -> Result<FileInfo> {
        self.inner.stat(path).await
    }

    async fn read(&self, path: &Path) -> Result<Vec<u8>> {
        self.inner.read(path).await
    }

    async fn create(&self, path: &Path, data: &[u8]) -> Result<()> {
        tracing::info!(root = self.name(), path = %path.display(), bytes = data.len(), "Dry run: would store audio");
        Ok(())
    }

    async fn delete(&self, path: &Path) -> Result<()> {
        tracing::info!(root = self.name(), path = %path.display(), "Dry run: would delete audio");
        Ok(())
    }
}
