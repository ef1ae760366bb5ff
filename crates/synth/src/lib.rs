//! Speech synthesis, the one external collaborator of a sync run.
//!
//! [`Synthesizer`] is the seam: the HTTP client in production, the
//! [`MockSynthesizer`] (behind the `mock` feature) in tests. Retrying lives in
//! [`RetryPolicy`] so that every synthesizer gets the same behaviour.

pub mod error;
mod http;
#[cfg(feature = "mock")]
mod mock;
mod request;
mod retry;

use crate::error::Result;
pub use crate::http::{HttpSettings, HttpSynthesizer};
#[cfg(feature = "mock")]
pub use crate::mock::MockSynthesizer;
pub use crate::request::SynthesisRequest;
pub use crate::retry::RetryPolicy;
use async_trait::async_trait;
use std::sync::Arc;

/// Turns text into encoded audio.
#[async_trait]
pub trait Synthesizer: Send + Sync {
    /// Name of the implementation (used for logging only).
    fn name(&self) -> &str;

    /// Synthesizes a single request, returning the raw audio bytes.
    ///
    /// Implementations make exactly one attempt; see [`RetryPolicy`].
    async fn synthesize(&self, request: &SynthesisRequest) -> Result<Vec<u8>>;
}

pub type SynthesizerHandle = Arc<dyn Synthesizer + Send + Sync>;
