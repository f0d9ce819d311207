//! Speech-to-text provider seam
//!
//! A [`TranscriptionProvider`] accepts an audio URL, hands back its own job
//! id, and reports status plus word timings when polled.

use async_trait::async_trait;

use crate::error::Result;
use crate::subtitle::Word;

/// Provider job state, already collapsed to what the orchestrator acts on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderStatus {
    /// Queued or being transcribed
    Processing,
    Completed,
    Error,
}

impl ProviderStatus {
    /// Map a provider wire status. `queued` counts as processing; anything
    /// unrecognised is treated as a malformed response.
    #[must_use]
    pub fn from_wire(status: &str) -> Self {
        match status.to_ascii_lowercase().as_str() {
            "queued" | "processing" => Self::Processing,
            "completed" => Self::Completed,
            _ => Self::Error,
        }
    }
}

/// Result of one provider poll
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderTranscript {
    pub status: ProviderStatus,
    /// Full transcript text, once completed
    pub text: Option<String>,
    /// Word timings in milliseconds, in provider order
    pub words: Vec<Word>,
    /// Provider's failure description, if any
    pub error: Option<String>,
}

impl ProviderTranscript {
    #[must_use]
    pub fn processing() -> Self {
        Self {
            status: ProviderStatus::Processing,
            text: None,
            words: Vec::new(),
            error: None,
        }
    }

    #[must_use]
    pub fn completed(text: impl Into<String>, words: Vec<Word>) -> Self {
        Self {
            status: ProviderStatus::Completed,
            text: Some(text.into()),
            words,
            error: None,
        }
    }

    #[must_use]
    pub fn failed(reason: impl Into<String>) -> Self {
        Self {
            status: ProviderStatus::Error,
            text: None,
            words: Vec::new(),
            error: Some(reason.into()),
        }
    }
}

/// Trait for speech-to-text services
#[async_trait]
pub trait TranscriptionProvider: Send + Sync {
    /// Short lowercase provider name (e.g., `"assemblyai"`)
    fn name(&self) -> &'static str;

    /// Submit audio for transcription; returns the provider's job id
    async fn submit(&self, audio_url: &str) -> Result<String>;

    /// Fetch the current state of a submitted job
    async fn poll(&self, provider_job_id: &str) -> Result<ProviderTranscript>;
}
