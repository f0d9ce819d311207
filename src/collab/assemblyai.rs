//! AssemblyAI transcription via the v2 REST API.
//!
//! - `POST /v2/transcript` with `{"audio_url": ..., "language_detection": true}`
//! - `GET /v2/transcript/{id}` returns status, text and word timings (ms)

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use super::provider::{ProviderStatus, ProviderTranscript, TranscriptionProvider};
use crate::error::{Error, Result};
use crate::subtitle::Word;

/// Default API endpoint
pub const DEFAULT_BASE_URL: &str = "https://api.assemblyai.com";

#[derive(Debug, Serialize)]
struct SubmitRequest<'a> {
    audio_url: &'a str,
    language_detection: bool,
}

#[derive(Debug, Deserialize)]
struct SubmitResponse {
    id: String,
}

#[derive(Debug, Deserialize)]
struct TranscriptResponse {
    status: String,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    words: Option<Vec<Word>>,
    #[serde(default)]
    error: Option<String>,
}

impl TranscriptResponse {
    fn into_transcript(self) -> ProviderTranscript {
        let status = ProviderStatus::from_wire(&self.status);
        let error = match (status, self.error) {
            (ProviderStatus::Error, None) => Some(format!("provider status: {}", self.status)),
            (_, error) => error,
        };

        ProviderTranscript {
            status,
            text: self.text,
            words: self.words.unwrap_or_default(),
            error,
        }
    }
}

/// AssemblyAI client
pub struct AssemblyAiProvider {
    client: Client,
    base_url: String,
    api_key: String,
}

impl AssemblyAiProvider {
    /// Create a client against the public endpoint
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Self::with_base_url(api_key, DEFAULT_BASE_URL)
    }

    /// Create a client against a custom endpoint (proxies, test servers)
    pub fn with_base_url(api_key: impl Into<String>, base_url: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .use_rustls_tls()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| Error::Provider(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        })
    }

    fn transcript_url(&self) -> String {
        format!("{}/v2/transcript", self.base_url)
    }
}

#[async_trait]
impl TranscriptionProvider for AssemblyAiProvider {
    fn name(&self) -> &'static str {
        "assemblyai"
    }

    #[instrument(skip(self))]
    async fn submit(&self, audio_url: &str) -> Result<String> {
        let response = self
            .client
            .post(self.transcript_url())
            .header("authorization", &self.api_key)
            .json(&SubmitRequest {
                audio_url,
                language_detection: true,
            })
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| Error::Provider(format!("submit failed: {e}")))?;

        let body: SubmitResponse = response
            .json()
            .await
            .map_err(|e| Error::Provider(format!("malformed submit response: {e}")))?;

        info!(provider_job = %body.id, "Submitted audio for transcription");
        Ok(body.id)
    }

    #[instrument(skip(self))]
    async fn poll(&self, provider_job_id: &str) -> Result<ProviderTranscript> {
        let url = format!(
            "{}/{}",
            self.transcript_url(),
            urlencoding::encode(provider_job_id)
        );

        let response = self
            .client
            .get(url)
            .header("authorization", &self.api_key)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| Error::Provider(format!("poll failed: {e}")))?;

        let body: TranscriptResponse = response
            .json()
            .await
            .map_err(|e| Error::Provider(format!("malformed transcript response: {e}")))?;

        debug!(status = %body.status, "Polled transcript");
        Ok(body.into_transcript())
    }
}
