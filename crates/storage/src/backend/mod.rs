//! Audio root backends.
//!
//! The audio cache needs three things from a root: look at one asset
//! ([`stat`](StorageBackend::stat)), add one without ever replacing another
//! ([`create`](StorageBackend::create)), and remove one
//! ([`delete`](StorageBackend::delete)). The verifier additionally walks the
//! whole root once per run with [`list_stream`](StorageBackend::list_stream).

mod local;
#[cfg(feature = "mock")]
mod mock;
mod ro;

pub use self::local::LocalBackend;
#[cfg(feature = "mock")]
pub use self::mock::MockBackend;
pub use self::ro::ReadOnlyBackend;
use crate::error::Result;
use crate::file::FileInfo;
use async_trait::async_trait;
use futures::Stream;
use std::path::Path;
use std::pin::Pin;

pub(crate) type FileInfoStream<'a> = Pin<Box<dyn Stream<Item = Result<FileInfo>> + Send + 'a>>;

/// One audio root.
///
/// Every path is relative to the root and goes through
/// [`validate_path`](crate::validate_path) before it touches anything.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use vocab_storage::{backend::StorageBackend, error::{ErrorKind, Result}};
///
/// /// Stores `audio` unless a usable asset is already there.
/// async fn store_once(root: &dyn StorageBackend, audio: &[u8]) -> Result<bool> {
///     let path = Path::new("apple/an-apple-a-day-3f2a9c01d4e5b6a7.mp3");
///     match root.stat(path).await {
///         Ok(info) if !info.is_empty() => return Ok(false),
///         Ok(_) => root.delete(path).await?,
///         Err(e) if matches!(&*e, ErrorKind::NotFound(_)) => {},
///         Err(e) => return Err(e),
///     }
///     root.create(path, audio).await?;
///     Ok(true)
/// }
/// ```
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// For logging.
    fn name(&self) -> &str;

    /// Every asset below `partition` (or the whole root), in no particular
    /// order. A partition that doesn't exist is empty, not an error.
    fn list_stream<'a>(&'a self, partition: Option<&'a Path>) -> FileInfoStream<'a>;

    /// Size and format of one asset, or
    /// [`NotFound`](crate::error::ErrorKind::NotFound).
    async fn stat(&self, path: &Path) -> Result<FileInfo>;

    async fn read(&self, path: &Path) -> Result<Vec<u8>>;

    /// Stores a new asset, creating its partition if needed.
    ///
    /// Never replaces an existing asset: an occupied path is
    /// [`AlreadyExists`](crate::error::ErrorKind::AlreadyExists). Either the
    /// whole of `data` becomes visible at `path` or nothing does.
    async fn create(&self, path: &Path, data: &[u8]) -> Result<()>;

    /// Removes an asset, or reports
    /// [`NotFound`](crate::error::ErrorKind::NotFound).
    async fn delete(&self, path: &Path) -> Result<()>;
}
