//! Storage for synthesized audio.
//!
//! There are two audio roots, one for word audio and one for sentence audio
//! partitioned by word. Assets are addressed by their path below a root and
//! are never rewritten in place. No index is kept: what a backend lists is
//! what exists.

pub mod backend;
pub mod error;
mod file;
mod path;

pub use crate::backend::StorageBackend;
pub use crate::file::{AudioFormat, FileInfo};
pub use crate::path::{validate as validate_path, validate_file_name};
use std::sync::Arc;

/// Shared handle to an audio root, as held by a run context.
pub type BackendHandle = Arc<dyn StorageBackend + Send + Sync>;
