//! Caller-side polling loops
//!
//! The orchestrator only offers single checks. These helpers repeat a check
//! on a fixed interval until the track reaches a terminal state or the
//! caller cancels.

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::Result;
use crate::job::{JobId, TrackStatus};
use crate::orchestrator::{Orchestrator, RenderReport, TranscriptionReport};

/// How a wait ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome<T> {
    /// The track reached `completed` or `error`
    Finished(T),
    /// The token was cancelled; carries the last observed report
    Cancelled(T),
}

impl<T> WaitOutcome<T> {
    pub fn into_inner(self) -> T {
        match self {
            Self::Finished(report) | Self::Cancelled(report) => report,
        }
    }
}

/// Poll transcription every `interval` until it is terminal.
///
/// Errors from a check (provider or store) end the wait immediately.
pub async fn wait_for_transcription(
    orchestrator: &Orchestrator,
    id: JobId,
    interval: Duration,
    cancel: &CancellationToken,
) -> Result<WaitOutcome<TranscriptionReport>> {
    loop {
        let report = orchestrator.check_transcription(id).await?;
        if report.status.is_terminal() {
            return Ok(WaitOutcome::Finished(report));
        }
        debug!(job = %id, status = %report.status, "Transcription not finished");

        tokio::select! {
            () = cancel.cancelled() => return Ok(WaitOutcome::Cancelled(report)),
            () = tokio::time::sleep(interval) => {}
        }
    }
}

/// Poll the render track every `interval` until it is terminal.
///
/// A render track that has not started (`pending` or absent) is waited on
/// like one in progress.
pub async fn wait_for_render(
    orchestrator: &Orchestrator,
    id: JobId,
    interval: Duration,
    cancel: &CancellationToken,
) -> Result<WaitOutcome<RenderReport>> {
    loop {
        let report = orchestrator.render_status(id).await?;
        if report.status.is_some_and(TrackStatus::is_terminal) {
            return Ok(WaitOutcome::Finished(report));
        }

        tokio::select! {
            () = cancel.cancelled() => return Ok(WaitOutcome::Cancelled(report)),
            () = tokio::time::sleep(interval) => {}
        }
    }
}
