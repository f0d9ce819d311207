//! Two-track job state machine
//!
//! A [`TranscriptionJob`] carries a transcription track and a render track.
//! Both use [`TrackStatus`]; the render track does not exist until
//! transcription completes. Every transition is a method that checks the
//! current state first and leaves the job untouched when the edge is not
//! allowed.
//!
//! ```text
//! transcription: pending -> processing -> completed
//!                           processing -> error
//! render:        (absent) -> pending      when transcription completes
//!                pending | error | completed -> processing -> completed
//!                                               processing -> error
//! ```

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::subtitle::Cue;

/// Job identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(Uuid);

impl JobId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for JobId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Uuid::parse_str(s.trim())
            .map(Self)
            .map_err(|_| Error::InvalidJobId(s.to_string()))
    }
}

/// Storage path of an uploaded video inside the raw-videos bucket
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VideoRef(String);

impl VideoRef {
    /// Validate a caller-supplied reference.
    ///
    /// Must be a non-empty relative path without `..` segments.
    pub fn parse(raw: &str) -> Result<Self> {
        let path = raw.trim();
        let invalid = || Error::InvalidVideoRef(raw.to_string());

        if path.is_empty() || path.starts_with('/') || path.contains('\\') {
            return Err(invalid());
        }
        if path
            .split('/')
            .any(|segment| segment.is_empty() || segment == "." || segment == "..")
        {
            return Err(invalid());
        }

        Ok(Self(path.to_string()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// File name without directory or extension (`videos/ab12.mp4` -> `ab12`)
    #[must_use]
    pub fn stem(&self) -> &str {
        let name = self.0.rsplit('/').next().unwrap_or(&self.0);
        match name.rsplit_once('.') {
            Some((stem, _)) if !stem.is_empty() => stem,
            _ => name,
        }
    }
}

impl fmt::Display for VideoRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// State of one track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackStatus {
    Pending,
    Processing,
    Completed,
    Error,
}

impl TrackStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Error => "error",
        }
    }

    /// `completed` and `error` end a track
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Error)
    }
}

impl fmt::Display for TrackStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which of the two tracks a transition targets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Track {
    Transcription,
    Render,
}

impl fmt::Display for Track {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Transcription => "transcription",
            Self::Render => "render",
        })
    }
}

/// A transition that is not part of the state machine
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{track} track cannot move from {} to {to}", .from.map_or("absent", TrackStatus::as_str))]
pub struct TransitionError {
    pub track: Track,
    pub from: Option<TrackStatus>,
    pub to: TrackStatus,
}

/// Why a render trigger was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RenderRejection {
    AlreadyInProgress,
    TranscriptionNotReady,
}

impl RenderRejection {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::AlreadyInProgress => "already-in-progress",
            Self::TranscriptionNotReady => "transcription-not-ready",
        }
    }
}

impl fmt::Display for RenderRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Serialized subtitle file and where it was stored
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubtitleArtifact {
    /// SRT document
    pub srt: String,
    /// Path inside the subtitles bucket
    pub storage_path: String,
    /// Cues as produced by the segmenter
    #[serde(default)]
    pub cues: Vec<Cue>,
}

/// One transcription attempt for one uploaded video
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptionJob {
    id: JobId,
    video_ref: VideoRef,
    provider_job_id: Option<String>,
    transcription_status: TrackStatus,
    transcript_text: Option<String>,
    subtitle: Option<SubtitleArtifact>,
    render_status: Option<TrackStatus>,
    rendered_video_path: Option<String>,
    /// When the current or last render attempt entered `processing`
    #[serde(default)]
    render_started_at: Option<DateTime<Utc>>,
    /// Bumped by the store on every persisted write
    revision: u64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TranscriptionJob {
    /// Fresh job in `pending`, before the provider has been contacted
    #[must_use]
    pub fn new(video_ref: VideoRef) -> Self {
        let now = Utc::now();
        Self {
            id: JobId::new(),
            video_ref,
            provider_job_id: None,
            transcription_status: TrackStatus::Pending,
            transcript_text: None,
            subtitle: None,
            render_status: None,
            rendered_video_path: None,
            render_started_at: None,
            revision: 0,
            created_at: now,
            updated_at: now,
        }
    }

    #[must_use]
    pub fn id(&self) -> JobId {
        self.id
    }

    #[must_use]
    pub fn video_ref(&self) -> &VideoRef {
        &self.video_ref
    }

    #[must_use]
    pub fn provider_job_id(&self) -> Option<&str> {
        self.provider_job_id.as_deref()
    }

    #[must_use]
    pub fn transcription_status(&self) -> TrackStatus {
        self.transcription_status
    }

    #[must_use]
    pub fn transcript_text(&self) -> Option<&str> {
        self.transcript_text.as_deref()
    }

    /// Set only once transcription is `completed`
    #[must_use]
    pub fn subtitle(&self) -> Option<&SubtitleArtifact> {
        self.subtitle.as_ref()
    }

    /// `None` until transcription is `completed`
    #[must_use]
    pub fn render_status(&self) -> Option<TrackStatus> {
        self.render_status
    }

    /// Set only while render is `completed`
    #[must_use]
    pub fn rendered_video_path(&self) -> Option<&str> {
        self.rendered_video_path.as_deref()
    }

    #[must_use]
    pub fn render_started_at(&self) -> Option<DateTime<Utc>> {
        self.render_started_at
    }

    #[must_use]
    pub fn revision(&self) -> u64 {
        self.revision
    }

    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    #[must_use]
    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Called by stores when a write lands
    pub(crate) fn mark_persisted(&mut self) {
        self.revision += 1;
        self.updated_at = Utc::now();
    }

    fn transcription_edge(&self, to: TrackStatus) -> TransitionError {
        TransitionError {
            track: Track::Transcription,
            from: Some(self.transcription_status),
            to,
        }
    }

    fn render_edge(&self, to: TrackStatus) -> TransitionError {
        TransitionError {
            track: Track::Render,
            from: self.render_status,
            to,
        }
    }

    /// `pending -> processing`, recording the provider's job id
    pub fn start_transcription(
        &mut self,
        provider_job_id: impl Into<String>,
    ) -> std::result::Result<(), TransitionError> {
        if self.transcription_status != TrackStatus::Pending {
            return Err(self.transcription_edge(TrackStatus::Processing));
        }
        self.provider_job_id = Some(provider_job_id.into());
        self.transcription_status = TrackStatus::Processing;
        Ok(())
    }

    /// Record a non-terminal provider status.
    ///
    /// Returns `true` when the stored status actually changed, so callers
    /// can skip redundant writes.
    pub fn record_transcription_progress(
        &mut self,
        status: TrackStatus,
    ) -> std::result::Result<bool, TransitionError> {
        if status.is_terminal() || self.transcription_status.is_terminal() {
            return Err(self.transcription_edge(status));
        }
        if self.transcription_status == status {
            return Ok(false);
        }
        if status == TrackStatus::Pending {
            return Err(self.transcription_edge(status));
        }
        self.transcription_status = status;
        Ok(true)
    }

    /// `processing -> completed`; opens the render track in `pending`
    pub fn complete_transcription(
        &mut self,
        text: impl Into<String>,
        subtitle: SubtitleArtifact,
    ) -> std::result::Result<(), TransitionError> {
        if self.transcription_status != TrackStatus::Processing {
            return Err(self.transcription_edge(TrackStatus::Completed));
        }
        self.transcription_status = TrackStatus::Completed;
        self.transcript_text = Some(text.into());
        self.subtitle = Some(subtitle);
        self.render_status = Some(TrackStatus::Pending);
        Ok(())
    }

    /// `processing -> error`
    pub fn fail_transcription(&mut self) -> std::result::Result<(), TransitionError> {
        if self.transcription_status != TrackStatus::Processing {
            return Err(self.transcription_edge(TrackStatus::Error));
        }
        self.transcription_status = TrackStatus::Error;
        Ok(())
    }

    /// Enter render `processing`.
    ///
    /// Refused until transcription is `completed`, and while another render
    /// attempt is in flight. A previous `error` or `completed` render may be
    /// retried; the old rendered reference is cleared.
    pub fn begin_render(&mut self) -> std::result::Result<(), RenderRejection> {
        self.begin_render_with_lease(Utc::now(), Duration::ZERO)
    }

    /// [`Self::begin_render`] that also takes over a `processing` render
    /// whose lease has expired (see [`Self::render_lease_expired`]).
    pub fn begin_render_with_lease(
        &mut self,
        now: DateTime<Utc>,
        lease: Duration,
    ) -> std::result::Result<(), RenderRejection> {
        if self.transcription_status != TrackStatus::Completed {
            return Err(RenderRejection::TranscriptionNotReady);
        }
        match self.render_status {
            Some(TrackStatus::Processing) if !self.render_lease_expired(now, lease) => {
                Err(RenderRejection::AlreadyInProgress)
            }
            None => Err(RenderRejection::TranscriptionNotReady),
            Some(_) => {
                self.render_status = Some(TrackStatus::Processing);
                self.rendered_video_path = None;
                self.render_started_at = Some(now);
                Ok(())
            }
        }
    }

    /// Whether a `processing` render started at least `lease` before `now`.
    ///
    /// A zero lease never expires. A `processing` render with no recorded
    /// start counts as expired.
    #[must_use]
    pub fn render_lease_expired(&self, now: DateTime<Utc>, lease: Duration) -> bool {
        if self.render_status != Some(TrackStatus::Processing) || lease.is_zero() {
            return false;
        }
        self.render_started_at.is_none_or(|started| {
            now.signed_duration_since(started)
                .to_std()
                .is_ok_and(|age| age >= lease)
        })
    }

    /// `processing -> completed`, recording the rendered video path
    pub fn complete_render(
        &mut self,
        rendered_video_path: impl Into<String>,
    ) -> std::result::Result<(), TransitionError> {
        if self.render_status != Some(TrackStatus::Processing) {
            return Err(self.render_edge(TrackStatus::Completed));
        }
        self.render_status = Some(TrackStatus::Completed);
        self.rendered_video_path = Some(rendered_video_path.into());
        Ok(())
    }

    /// `processing -> error`
    pub fn fail_render(&mut self) -> std::result::Result<(), TransitionError> {
        if self.render_status != Some(TrackStatus::Processing) {
            return Err(self.render_edge(TrackStatus::Error));
        }
        self.render_status = Some(TrackStatus::Error);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn artifact() -> SubtitleArtifact {
        SubtitleArtifact {
            srt: "1\n00:00:00,000 --> 00:00:00,100\nhi\n\n".to_string(),
            storage_path: "clip.srt".to_string(),
            cues: vec![Cue {
                index: 1,
                start_ms: 0,
                end_ms: 100,
                text: "hi".to_string(),
            }],
        }
    }

    fn processing_job() -> TranscriptionJob {
        let mut job = TranscriptionJob::new(VideoRef::parse("videos/clip.mp4").unwrap());
        job.start_transcription("prov-1").unwrap();
        job
    }

    fn completed_job() -> TranscriptionJob {
        let mut job = processing_job();
        job.complete_transcription("hi", artifact()).unwrap();
        job
    }

    #[test]
    fn new_job_is_pending_without_render_track() {
        let job = TranscriptionJob::new(VideoRef::parse("a.mp4").unwrap());
        assert_eq!(job.transcription_status(), TrackStatus::Pending);
        assert_eq!(job.render_status(), None);
        assert_eq!(job.provider_job_id(), None);
        assert_eq!(job.revision(), 0);
    }

    #[test]
    fn start_records_provider_id() {
        let job = processing_job();
        assert_eq!(job.transcription_status(), TrackStatus::Processing);
        assert_eq!(job.provider_job_id(), Some("prov-1"));
    }

    #[test]
    fn start_twice_is_rejected() {
        let mut job = processing_job();
        let err = job.start_transcription("prov-2").unwrap_err();
        assert_eq!(err.from, Some(TrackStatus::Processing));
        assert_eq!(job.provider_job_id(), Some("prov-1"));
    }

    #[test]
    fn completion_opens_render_track() {
        let job = completed_job();
        assert_eq!(job.transcription_status(), TrackStatus::Completed);
        assert_eq!(job.render_status(), Some(TrackStatus::Pending));
        assert_eq!(job.subtitle().unwrap().storage_path, "clip.srt");
        assert_eq!(job.transcript_text(), Some("hi"));
    }

    #[test]
    fn pending_job_cannot_complete_or_fail() {
        let mut job = TranscriptionJob::new(VideoRef::parse("a.mp4").unwrap());
        assert!(job.complete_transcription("x", artifact()).is_err());
        assert!(job.fail_transcription().is_err());
        assert_eq!(job.transcription_status(), TrackStatus::Pending);
    }

    #[test]
    fn error_is_terminal() {
        let mut job = processing_job();
        job.fail_transcription().unwrap();
        assert!(job.complete_transcription("x", artifact()).is_err());
        assert!(job
            .record_transcription_progress(TrackStatus::Processing)
            .is_err());
        assert_eq!(job.transcription_status(), TrackStatus::Error);
    }

    #[test]
    fn progress_reports_only_real_changes() {
        let mut job = TranscriptionJob::new(VideoRef::parse("a.mp4").unwrap());
        assert_eq!(
            job.record_transcription_progress(TrackStatus::Processing),
            Ok(true)
        );
        assert_eq!(
            job.record_transcription_progress(TrackStatus::Processing),
            Ok(false)
        );
        assert!(job
            .record_transcription_progress(TrackStatus::Completed)
            .is_err());
    }

    #[test]
    fn render_before_transcription_completes_is_rejected() {
        let mut job = processing_job();
        let before = job.clone();
        assert_eq!(
            job.begin_render(),
            Err(RenderRejection::TranscriptionNotReady)
        );
        assert_eq!(job, before);
    }

    #[test]
    fn second_render_while_processing_is_rejected() {
        let mut job = completed_job();
        job.begin_render().unwrap();
        assert_eq!(job.begin_render(), Err(RenderRejection::AlreadyInProgress));
        assert_eq!(job.render_status(), Some(TrackStatus::Processing));
    }

    #[test]
    fn failed_render_can_be_retried() {
        let mut job = completed_job();
        job.begin_render().unwrap();
        job.fail_render().unwrap();
        assert_eq!(job.render_status(), Some(TrackStatus::Error));
        job.begin_render().unwrap();
        assert_eq!(job.render_status(), Some(TrackStatus::Processing));
    }

    #[test]
    fn re_render_clears_previous_output() {
        let mut job = completed_job();
        job.begin_render().unwrap();
        job.complete_render("processed_clip_1.mp4").unwrap();
        assert_eq!(job.rendered_video_path(), Some("processed_clip_1.mp4"));

        job.begin_render().unwrap();
        assert_eq!(job.rendered_video_path(), None);
        job.complete_render("processed_clip_2.mp4").unwrap();
        assert_eq!(job.rendered_video_path(), Some("processed_clip_2.mp4"));
    }

    #[test]
    fn stale_render_is_taken_over_after_its_lease() {
        let lease = Duration::from_secs(600);
        let started = Utc::now();
        let mut job = completed_job();
        job.begin_render_with_lease(started, lease).unwrap();
        assert_eq!(job.render_started_at(), Some(started));

        let soon = started + chrono::Duration::seconds(60);
        assert!(!job.render_lease_expired(soon, lease));
        assert_eq!(
            job.begin_render_with_lease(soon, lease),
            Err(RenderRejection::AlreadyInProgress)
        );

        let later = started + chrono::Duration::seconds(601);
        assert!(job.render_lease_expired(later, lease));
        job.begin_render_with_lease(later, lease).unwrap();
        assert_eq!(job.render_status(), Some(TrackStatus::Processing));
        assert_eq!(job.render_started_at(), Some(later));
    }

    #[test]
    fn zero_lease_never_takes_over() {
        let mut job = completed_job();
        job.begin_render().unwrap();
        let far = Utc::now() + chrono::Duration::days(30);
        assert!(!job.render_lease_expired(far, Duration::ZERO));
        assert_eq!(
            job.begin_render_with_lease(far, Duration::ZERO),
            Err(RenderRejection::AlreadyInProgress)
        );
    }

    #[test]
    fn render_completion_requires_processing() {
        let mut job = completed_job();
        let err = job.complete_render("x.mp4").unwrap_err();
        assert_eq!(err.track, Track::Render);
        assert_eq!(err.from, Some(TrackStatus::Pending));
        assert!(job.fail_render().is_err());
    }

    #[test]
    fn transition_error_message() {
        let mut job = processing_job();
        let err = job.fail_render().unwrap_err();
        assert_eq!(err.to_string(), "render track cannot move from absent to error");
    }

    #[test]
    fn video_ref_validation() {
        assert!(VideoRef::parse("").is_err());
        assert!(VideoRef::parse("   ").is_err());
        assert!(VideoRef::parse("/etc/passwd").is_err());
        assert!(VideoRef::parse("videos/../secret").is_err());
        assert!(VideoRef::parse("videos//a.mp4").is_err());
        assert_eq!(VideoRef::parse(" videos/a.mp4 ").unwrap().as_str(), "videos/a.mp4");
    }

    #[test]
    fn video_ref_stem() {
        assert_eq!(VideoRef::parse("videos/ab12.mp4").unwrap().stem(), "ab12");
        assert_eq!(VideoRef::parse("clip").unwrap().stem(), "clip");
        assert_eq!(VideoRef::parse(".hidden").unwrap().stem(), ".hidden");
    }

    #[test]
    fn job_id_parses_back() {
        let id = JobId::new();
        assert_eq!(id.to_string().parse::<JobId>().unwrap(), id);
        assert!(matches!("nope".parse::<JobId>(), Err(Error::InvalidJobId(_))));
    }

    #[test]
    fn job_record_serializes_lowercase_statuses() {
        let job = completed_job();
        let json = serde_json::to_string(&job).unwrap();
        assert!(json.contains("\"transcription_status\":\"completed\""));
        assert!(json.contains("\"render_status\":\"pending\""));
        let back: TranscriptionJob = serde_json::from_str(&json).unwrap();
        assert_eq!(back, job);
    }
}
