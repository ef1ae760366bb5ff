//! In-memory synthesizer for testing.

use crate::error::{ErrorKind, Result};
use crate::{SynthesisRequest, Synthesizer};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use tokio::sync::Mutex;

/// Synthesizer double that records every request and returns deterministic
/// bytes (`MOCK:<voice>:<text>`).
///
/// Failures can be scripted two ways: a queue consumed one per call
/// ([`with_failures`](Self::with_failures)), or a standing failure for a
/// particular text ([`fail_on`](Self::fail_on)).
///
/// ```
/// use vocab_storage::AudioFormat;
/// use vocab_synth::{MockSynthesizer, SynthesisRequest, Synthesizer};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let synth = MockSynthesizer::default();
/// let audio = synth.synthesize(&SynthesisRequest::new("apple", "Joanna", AudioFormat::Mp3)).await.unwrap();
/// assert_eq!(audio, b"MOCK:Joanna:apple");
/// assert_eq!(synth.calls().await, 1);
/// # }
/// ```
#[derive(Default)]
pub struct MockSynthesizer {
    requests: Mutex<Vec<SynthesisRequest>>,
    queued: Mutex<VecDeque<ErrorKind>>,
    standing: HashMap<String, ErrorKind>,
}
impl MockSynthesizer {
    /// Fail the next calls, in order, with the given errors.
    pub fn with_failures(failures: impl IntoIterator<Item = ErrorKind>) -> Self {
        Self {
            queued: Mutex::new(failures.into_iter().collect()),
            ..Self::default()
        }
    }

    /// Always fail requests for `text` (compared after trimming).
    pub fn fail_on(mut self, text: impl Into<String>, kind: ErrorKind) -> Self {
        self.standing.insert(text.into().trim().to_string(), kind);
        self
    }

    /// Number of calls made, failed ones included.
    pub async fn calls(&self) -> usize {
        self.requests.lock().await.len()
    }

    pub async fn requests(&self) -> Vec<SynthesisRequest> {
        self.requests.lock().await.clone()
    }

    /// Number of calls made for exactly this text.
    pub async fn calls_for(&self, text: &str) -> usize {
        self.requests.lock().await.iter().filter(|r| r.text.trim() == text.trim()).count()
    }
}

#[async_trait]
impl Synthesizer for MockSynthesizer {
    fn name(&self) -> &str {
        "mock"
    }

    async fn synthesize(&self, request: &SynthesisRequest) -> Result<Vec<u8>> {
        self.requests.lock().await.push(request.clone());
        if let Some(kind) = self.queued.lock().await.pop_front() {
            exn::bail!(kind);
        }
        if let Some(kind) = self.standing.get(request.text.trim()) {
            exn::bail!(kind.clone());
        }
        Ok(format!("MOCK:{}:{}", request.voice, request.text.trim()).into_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vocab_storage::AudioFormat;

    fn request(text: &str) -> SynthesisRequest {
        SynthesisRequest::new(text, "Joanna", AudioFormat::Mp3)
    }

    #[tokio::test]
    async fn test_queued_failures_then_success() {
        let synth = MockSynthesizer::with_failures([ErrorKind::Network]);
        assert!(synth.synthesize(&request("apple")).await.is_err());
        assert!(synth.synthesize(&request("apple")).await.is_ok());
        assert_eq!(synth.calls_for("apple").await, 2);
    }

    #[tokio::test]
    async fn test_standing_failure() {
        let synth = MockSynthesizer::default().fail_on("pear", ErrorKind::Rejected { status: 400, message: "no".into() });
        assert!(synth.synthesize(&request("apple")).await.is_ok());
        let err = synth.synthesize(&request(" pear ")).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Rejected { .. }));
        assert_eq!(synth.calls().await, 2);
    }
}
