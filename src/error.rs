//! Error taxonomy shared by the orchestrator, the job store and the
//! collaborator implementations.
//!
//! Input errors are reported before any state is touched. Collaborator
//! errors (`Provider`, `Storage`, `Renderer`) are what the orchestrator
//! converts into a track `error` transition.

use thiserror::Error;

use crate::job::{JobId, RenderRejection, TransitionError};
use crate::subtitle::SrtError;

/// Library error type
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid video reference: {0}")]
    InvalidVideoRef(String),

    #[error("Invalid job id: {0}")]
    InvalidJobId(String),

    #[error("Job not found: {0}")]
    JobNotFound(JobId),

    #[error("Render rejected: {0}")]
    RenderRejected(RenderRejection),

    #[error("Transcription provider error: {0}")]
    Provider(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Renderer error: {0}")]
    Renderer(String),

    #[error("Concurrent update lost for job {0}")]
    Conflict(JobId),

    #[error(transparent)]
    Transition(#[from] TransitionError),

    #[error("Stored subtitle is unreadable: {0}")]
    Srt(#[from] SrtError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Whether this error was caused by the caller's request rather than by
    /// a collaborator or by the job store.
    #[must_use]
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidVideoRef(_)
                | Self::InvalidJobId(_)
                | Self::JobNotFound(_)
                | Self::RenderRejected(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
