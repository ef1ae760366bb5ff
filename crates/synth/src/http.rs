//! HTTP synthesis client.
//!
//! Speaks a minimal JSON protocol: `POST {endpoint}` with the text, voice and
//! output format, answered by the raw audio bytes. Any provider can sit behind
//! it with a thin proxy.

use crate::error::{ErrorKind, Result};
use crate::{SynthesisRequest, Synthesizer};
use async_trait::async_trait;
use exn::ResultExt;
use serde::Serialize;
use std::time::Duration;
use tracing::instrument;

const USER_AGENT: &str = concat!("vocab-sync/", env!("CARGO_PKG_VERSION"));
/// Error bodies are only kept for the log line.
const MAX_ERROR_MESSAGE: usize = 200;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpSettings {
    pub endpoint: String,
    /// Sent as a bearer token when present.
    pub api_key: Option<String>,
    /// Provider-specific engine name (e.g. `neural`).
    pub engine: Option<String>,
    pub timeout: Duration,
}

#[derive(Serialize)]
struct Payload<'a> {
    text: String,
    voice_id: &'a str,
    output_format: &'a str,
    text_type: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    engine: Option<&'a str>,
}

pub struct HttpSynthesizer {
    client: reqwest::Client,
    settings: HttpSettings,
}
impl HttpSynthesizer {
    /// # Errors
    ///
    /// Returns [`ErrorKind::Settings`] if the endpoint is not a valid URL or
    /// the HTTP client cannot be built.
    pub fn new(settings: HttpSettings) -> Result<Self> {
        let endpoint = settings.endpoint.trim();
        if endpoint.is_empty() {
            exn::bail!(ErrorKind::Settings("no synthesis endpoint configured".to_string()));
        }
        reqwest::Url::parse(endpoint)
            .or_raise(|| ErrorKind::Settings(format!("invalid synthesis endpoint: {endpoint}")))?;
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(settings.timeout)
            .build()
            .or_raise(|| ErrorKind::Settings("unable to build HTTP client".to_string()))?;
        Ok(Self { client, settings })
    }
}

#[async_trait]
impl Synthesizer for HttpSynthesizer {
    fn name(&self) -> &str {
        "http"
    }

    #[instrument(skip_all, fields(voice = %request.voice, format = request.format.as_str()))]
    async fn synthesize(&self, request: &SynthesisRequest) -> Result<Vec<u8>> {
        let payload = Payload {
            text: request.payload(),
            voice_id: &request.voice,
            output_format: request.format.as_str(),
            text_type: request.text_type(),
            engine: self.settings.engine.as_deref(),
        };
        let mut builder = self.client.post(self.settings.endpoint.trim()).json(&payload);
        if let Some(key) = &self.settings.api_key {
            builder = builder.bearer_auth(key);
        }
        let response = builder.send().await.or_raise(|| ErrorKind::Network)?;
        let status = response.status();
        if !status.is_success() {
            let mut message = response.text().await.unwrap_or_default();
            message.truncate(message.floor_char_boundary(MAX_ERROR_MESSAGE));
            tracing::debug!(status = status.as_u16(), message, "Synthesis request failed");
            exn::bail!(ErrorKind::from_status(status.as_u16(), message));
        }
        let audio = response.bytes().await.or_raise(|| ErrorKind::Network)?;
        if audio.is_empty() {
            exn::bail!(ErrorKind::EmptyAudio);
        }
        tracing::debug!(bytes = audio.len(), "Synthesized audio");
        Ok(audio.to_vec())
    }
}
