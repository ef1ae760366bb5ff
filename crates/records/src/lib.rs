//! Vocabulary records: the data model, the persistent YAML store, the JSONL
//! batch with its heuristic line repair, and structural validation.
//!
//! Everything in this crate is synchronous and free of audio concerns; the
//! audio cache and the merge live in `vocab-library`.

pub mod batch;
mod consts;
pub mod error;
mod fs;
pub mod models;
mod repair;
mod stamp;
pub mod store;
mod validate;

pub use crate::batch::Batch;
pub use crate::repair::repair;
pub use crate::stamp::RunStamp;
pub use crate::validate::{is_valid, validate};
