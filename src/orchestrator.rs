//! Drives a job through transcription and rendering
//!
//! Every operation is a single short-lived step: start a transcription,
//! check it once, gate a render, run a render. Repetition (polling cadence,
//! timeouts) belongs to the caller; see [`crate::poller`].
//!
//! State changes go through [`Orchestrator::transition`], which re-reads the
//! job, re-evaluates the transition against the fresh record and writes it
//! back with compare-and-set. A lost race is retried a few times; a
//! transition that no longer applies is simply not written.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use chrono::Utc;
use serde::Serialize;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::collab::{
    BlobStore, Buckets, ProviderStatus, ProviderTranscript, TranscriptionProvider, VideoRenderer,
};
use crate::error::{Error, Result};
use crate::job::{
    JobId, JobStore, RenderRejection, SubtitleArtifact, TrackStatus, TranscriptionJob, VideoRef,
};
use crate::subtitle::{resolve, segment, to_srt, Cue, SubtitleStyle, DEFAULT_MAX_SEGMENT_MS};

/// Attempts per transition before a compare-and-set conflict is surfaced
const MAX_CAS_ATTEMPTS: usize = 5;

/// Default age after which a `processing` render may be taken over
pub const DEFAULT_RENDER_LEASE: Duration = Duration::from_secs(30 * 60);

/// Upload extensions accepted by [`Orchestrator::ingest_video`] with their
/// content types
const VIDEO_TYPES: &[(&str, &str)] = &[
    ("mp4", "video/mp4"),
    ("m4v", "video/x-m4v"),
    ("mov", "video/quicktime"),
    ("webm", "video/webm"),
    ("mkv", "video/x-matroska"),
    ("avi", "video/x-msvideo"),
    ("mpeg", "video/mpeg"),
    ("mpg", "video/mpeg"),
];

/// Tunables that are not collaborators
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrchestratorSettings {
    pub buckets: Buckets,
    pub max_segment_ms: u64,
    /// A render left in `processing` this long is considered abandoned.
    /// Zero disables takeover.
    pub render_lease: Duration,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            buckets: Buckets::default(),
            max_segment_ms: DEFAULT_MAX_SEGMENT_MS,
            render_lease: DEFAULT_RENDER_LEASE,
        }
    }
}

/// A stored upload
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedVideo {
    pub video_ref: VideoRef,
    pub public_url: String,
}

/// Outcome of one transcription check
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptionReport {
    pub job_id: JobId,
    pub status: TrackStatus,
    /// Present once `completed`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub cues: Vec<Cue>,
    /// Serialized SRT, present once `completed`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub srt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subtitle_url: Option<String>,
}

/// Render track of a job
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderReport {
    pub job_id: JobId,
    /// `None` until transcription completes
    pub status: Option<TrackStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rendered_video_url: Option<String>,
}

/// Coordinates provider, storage, renderer and the job store
pub struct Orchestrator {
    provider: Arc<dyn TranscriptionProvider>,
    blobs: Arc<dyn BlobStore>,
    renderer: Arc<dyn VideoRenderer>,
    jobs: Arc<dyn JobStore>,
    settings: OrchestratorSettings,
}

impl Orchestrator {
    pub fn new(
        provider: Arc<dyn TranscriptionProvider>,
        blobs: Arc<dyn BlobStore>,
        renderer: Arc<dyn VideoRenderer>,
        jobs: Arc<dyn JobStore>,
    ) -> Self {
        Self {
            provider,
            blobs,
            renderer,
            jobs,
            settings: OrchestratorSettings::default(),
        }
    }

    #[must_use]
    pub fn with_settings(mut self, settings: OrchestratorSettings) -> Self {
        self.settings = settings;
        self
    }

    #[must_use]
    pub fn settings(&self) -> &OrchestratorSettings {
        &self.settings
    }

    /// Fetch a job record
    pub async fn job(&self, id: JobId) -> Result<TranscriptionJob> {
        self.jobs.get(id).await?.ok_or(Error::JobNotFound(id))
    }

    /// All job records, newest first
    pub async fn jobs(&self) -> Result<Vec<TranscriptionJob>> {
        self.jobs.list().await
    }

    /// Store an upload in the videos bucket under a fresh `<uuid>.<ext>` name
    #[instrument(skip(self, data), fields(size = data.len()))]
    pub async fn ingest_video(&self, file_name: &str, data: Bytes) -> Result<UploadedVideo> {
        let extension = Path::new(file_name)
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .ok_or_else(|| Error::InvalidVideoRef(file_name.to_string()))?;
        let content_type = VIDEO_TYPES
            .iter()
            .find(|(ext, _)| *ext == extension)
            .map(|(_, content_type)| *content_type)
            .ok_or_else(|| Error::InvalidVideoRef(format!("{file_name}: not a video file")))?;
        if data.is_empty() {
            return Err(Error::InvalidVideoRef(format!("{file_name}: empty upload")));
        }

        let video_ref = VideoRef::parse(&format!("{}.{extension}", Uuid::new_v4()))?;
        let bucket = &self.settings.buckets.videos;
        self.blobs
            .put(bucket, video_ref.as_str(), data, content_type)
            .await?;

        info!(video = %video_ref, "Stored upload");
        Ok(UploadedVideo {
            public_url: self.blobs.public_url(bucket, video_ref.as_str()),
            video_ref,
        })
    }

    /// Submit a stored video to the provider and create its job in
    /// `processing`.
    ///
    /// An invalid reference is rejected before anything is contacted or
    /// stored. A provider failure leaves no job behind.
    #[instrument(skip(self))]
    pub async fn start_transcription(&self, video_ref: &str) -> Result<TranscriptionJob> {
        let video_ref = VideoRef::parse(video_ref)?;
        let audio_url = self
            .blobs
            .public_url(&self.settings.buckets.videos, video_ref.as_str());

        let provider_job_id = self.provider.submit(&audio_url).await?;

        let mut job = TranscriptionJob::new(video_ref);
        job.start_transcription(provider_job_id)?;
        let job = self.jobs.insert(job).await?;

        info!(job = %job.id(), provider = self.provider.name(), "Transcription started");
        Ok(job)
    }

    /// Check a transcription once.
    ///
    /// Completed jobs are answered from the stored record; the provider is
    /// only consulted while the job is `processing`. On provider completion
    /// the cues are segmented, serialized, uploaded and recorded, and the
    /// payload is returned in this same call.
    #[instrument(skip(self))]
    pub async fn check_transcription(&self, id: JobId) -> Result<TranscriptionReport> {
        let job = self.job(id).await?;
        if job.transcription_status() != TrackStatus::Processing {
            return Ok(self.transcription_report(&job));
        }

        let provider_job_id = job.provider_job_id().unwrap_or_default().to_string();
        let transcript = match self.provider.poll(&provider_job_id).await {
            Ok(transcript) => transcript,
            Err(e) => {
                error!(job = %id, "Provider poll failed: {e}");
                self.fail_transcription(id).await?;
                return Err(e);
            }
        };

        match transcript.status {
            ProviderStatus::Processing => {
                let job = self
                    .transition(id, |job| {
                        if job.transcription_status().is_terminal() {
                            return Ok(false);
                        }
                        Ok(job.record_transcription_progress(TrackStatus::Processing)?)
                    })
                    .await?;
                Ok(self.transcription_report(&job))
            }
            ProviderStatus::Error => {
                warn!(
                    job = %id,
                    reason = transcript.error.as_deref().unwrap_or("unknown"),
                    "Provider reported failure"
                );
                let job = self.fail_transcription(id).await?;
                Ok(self.transcription_report(&job))
            }
            ProviderStatus::Completed => self.finish_transcription(&job, transcript).await,
        }
    }

    async fn finish_transcription(
        &self,
        job: &TranscriptionJob,
        transcript: ProviderTranscript,
    ) -> Result<TranscriptionReport> {
        let id = job.id();
        let cues = segment(&transcript.words, self.settings.max_segment_ms);
        let srt = to_srt(&cues);
        let storage_path = format!("{}.srt", job.video_ref().stem());

        if let Err(e) = self
            .blobs
            .put(
                &self.settings.buckets.subtitles,
                &storage_path,
                Bytes::from(srt.clone()),
                "text/plain",
            )
            .await
        {
            error!(job = %id, "Subtitle upload failed: {e}");
            self.fail_transcription(id).await?;
            return Err(e);
        }

        let text = transcript.text.unwrap_or_else(|| {
            transcript
                .words
                .iter()
                .map(|w| w.text.as_str())
                .collect::<Vec<_>>()
                .join(" ")
        });
        let cue_count = cues.len();
        let artifact = SubtitleArtifact {
            srt,
            storage_path,
            cues,
        };

        let job = self
            .transition(id, |job| {
                if job.transcription_status() != TrackStatus::Processing {
                    return Ok(false);
                }
                job.complete_transcription(text.clone(), artifact.clone())?;
                Ok(true)
            })
            .await?;

        info!(job = %id, cues = cue_count, "Transcription completed");
        Ok(self.transcription_report(&job))
    }

    /// Move transcription to `error` if it is still `processing`
    async fn fail_transcription(&self, id: JobId) -> Result<TranscriptionJob> {
        self.transition(id, |job| {
            if job.transcription_status() != TrackStatus::Processing {
                return Ok(false);
            }
            job.fail_transcription()?;
            Ok(true)
        })
        .await
    }

    fn transcription_report(&self, job: &TranscriptionJob) -> TranscriptionReport {
        let mut report = TranscriptionReport {
            job_id: job.id(),
            status: job.transcription_status(),
            text: None,
            cues: Vec::new(),
            srt: None,
            subtitle_url: None,
        };

        if job.transcription_status() == TrackStatus::Completed {
            if let Some(artifact) = job.subtitle() {
                report.cues.clone_from(&artifact.cues);
                report.srt = Some(artifact.srt.clone());
                report.subtitle_url = Some(
                    self.blobs
                        .public_url(&self.settings.buckets.subtitles, &artifact.storage_path),
                );
            }
            report.text = job.transcript_text().map(str::to_string);
        }

        report
    }

    /// Gate a render: move the render track to `processing`.
    ///
    /// Fails with [`Error::RenderRejected`] (and leaves the job untouched)
    /// while transcription is not `completed` or another render is in
    /// flight. Of two concurrent calls on the same job at most one wins.
    /// A render stuck in `processing` past the configured lease is taken
    /// over.
    #[instrument(skip(self))]
    pub async fn begin_render(&self, id: JobId) -> Result<TranscriptionJob> {
        let lease = self.settings.render_lease;
        let mut took_over = false;
        let job = self
            .transition(id, |job| {
                let now = Utc::now();
                took_over = job.render_lease_expired(now, lease);
                job.begin_render_with_lease(now, lease)
                    .map_err(Error::RenderRejected)?;
                Ok(true)
            })
            .await?;
        if took_over {
            warn!(job = %id, "Took over an abandoned render");
        }
        info!(job = %id, "Render started");
        Ok(job)
    }

    /// Give up on an in-flight render: `processing -> error`.
    ///
    /// For callers that stop waiting on [`Self::run_render`] before it
    /// returns. A render that is not `processing` is left as it is.
    #[instrument(skip(self))]
    pub async fn abort_render(&self, id: JobId) -> Result<RenderReport> {
        let job = self.fail_render(id).await?;
        warn!(job = %id, status = ?job.render_status(), "Render aborted");
        Ok(self.render_report(&job))
    }

    /// Carry out a render gated by [`Self::begin_render`].
    ///
    /// Any fetch, renderer or storage failure moves the render track to
    /// `error` and is returned to the caller.
    #[instrument(skip(self, job, style), fields(job = %job.id()))]
    pub async fn run_render(
        &self,
        job: &TranscriptionJob,
        style: &SubtitleStyle,
    ) -> Result<RenderReport> {
        let id = job.id();
        let outcome = async {
            let rendered_path = self.produce_render(job, style).await?;
            self.transition(id, |job| {
                job.complete_render(rendered_path.clone())?;
                Ok(true)
            })
            .await
        }
        .await;

        match outcome {
            Ok(job) => {
                info!(path = job.rendered_video_path().unwrap_or_default(), "Render completed");
                Ok(self.render_report(&job))
            }
            Err(e) => {
                error!("Render failed: {e}");
                if let Err(mark) = self.fail_render(id).await {
                    warn!("Could not record render failure: {mark}");
                }
                Err(e)
            }
        }
    }

    /// [`Self::begin_render`] followed by [`Self::run_render`]
    pub async fn render(&self, id: JobId, style: &SubtitleStyle) -> Result<RenderReport> {
        let job = self.begin_render(id).await?;
        self.run_render(&job, style).await
    }

    async fn produce_render(
        &self,
        job: &TranscriptionJob,
        style: &SubtitleStyle,
    ) -> Result<String> {
        let artifact = job
            .subtitle()
            .ok_or(Error::RenderRejected(RenderRejection::TranscriptionNotReady))?;
        let resolved = resolve(style);
        debug!(force_style = %resolved.force_style(), "Resolved style");

        let source = self
            .blobs
            .get(&self.settings.buckets.videos, job.video_ref().as_str())
            .await?;
        let rendered = self
            .renderer
            .render(source, &artifact.srt, &resolved)
            .await?;

        let path = format!(
            "processed_{}_{}.mp4",
            job.video_ref().stem(),
            Uuid::new_v4().simple()
        );
        self.blobs
            .put(&self.settings.buckets.rendered, &path, rendered, "video/mp4")
            .await?;
        Ok(path)
    }

    /// Move render to `error` if it is still `processing`
    async fn fail_render(&self, id: JobId) -> Result<TranscriptionJob> {
        self.transition(id, |job| {
            if job.render_status() != Some(TrackStatus::Processing) {
                return Ok(false);
            }
            job.fail_render()?;
            Ok(true)
        })
        .await
    }

    /// Current render track of a job
    pub async fn render_status(&self, id: JobId) -> Result<RenderReport> {
        let job = self.job(id).await?;
        Ok(self.render_report(&job))
    }

    fn render_report(&self, job: &TranscriptionJob) -> RenderReport {
        let rendered_video_url = match (job.render_status(), job.rendered_video_path()) {
            (Some(TrackStatus::Completed), Some(path)) => {
                Some(self.blobs.public_url(&self.settings.buckets.rendered, path))
            }
            _ => None,
        };
        RenderReport {
            job_id: job.id(),
            status: job.render_status(),
            rendered_video_url,
        }
    }

    /// Read-modify-write a job with compare-and-set.
    ///
    /// `apply` returns `Ok(true)` when it changed the job and the change must
    /// be written, `Ok(false)` to leave the record as it is. On a revision
    /// conflict the record is re-read and `apply` runs again.
    async fn transition<F>(&self, id: JobId, mut apply: F) -> Result<TranscriptionJob>
    where
        F: FnMut(&mut TranscriptionJob) -> Result<bool> + Send,
    {
        let mut attempt = 1;
        loop {
            let mut job = self.job(id).await?;
            if !apply(&mut job)? {
                return Ok(job);
            }
            match self.jobs.compare_and_swap(job).await {
                Err(Error::Conflict(_)) if attempt < MAX_CAS_ATTEMPTS => {
                    debug!(job = %id, attempt, "Lost compare-and-set, retrying");
                    attempt += 1;
                }
                result => return result,
            }
        }
    }
}
