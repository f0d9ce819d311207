//! Transport-agnostic polling surface
//!
//! Four request/response operations for clients that poll: start a
//! transcription, read its status, trigger a render, read the render
//! status. Renders run in background tasks so `start_render` answers as soon
//! as the render gate has been passed.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::job::{JobId, RenderRejection, TrackStatus};
use crate::orchestrator::Orchestrator;
use crate::subtitle::SubtitleStyle;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartTranscriptionResponse {
    pub job_id: JobId,
}

/// `text` and `subtitleUrl` are present only when `status` is `completed`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptionStatusResponse {
    pub status: TrackStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtitle_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "kebab-case")]
pub enum StartRenderResponse {
    Accepted { job_id: JobId },
    Rejected { reason: RenderRejection },
}

/// `status` is `null` until transcription completes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderStatusResponse {
    pub status: Option<TrackStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rendered_video_url: Option<String>,
}

/// Polling front end over an [`Orchestrator`]
pub struct PollingService {
    orchestrator: Arc<Orchestrator>,
    renders: Mutex<JoinSet<()>>,
}

impl PollingService {
    #[must_use]
    pub fn new(orchestrator: Arc<Orchestrator>) -> Self {
        Self {
            orchestrator,
            renders: Mutex::new(JoinSet::new()),
        }
    }

    #[must_use]
    pub fn orchestrator(&self) -> &Arc<Orchestrator> {
        &self.orchestrator
    }

    pub async fn start_transcription(&self, video_ref: &str) -> Result<StartTranscriptionResponse> {
        let job = self.orchestrator.start_transcription(video_ref).await?;
        Ok(StartTranscriptionResponse { job_id: job.id() })
    }

    /// One check against the provider (or the stored record once completed)
    pub async fn transcription_status(&self, job_id: JobId) -> Result<TranscriptionStatusResponse> {
        let report = self.orchestrator.check_transcription(job_id).await?;
        Ok(TranscriptionStatusResponse {
            status: report.status,
            text: report.text,
            subtitle_url: report.subtitle_url,
        })
    }

    /// Pass the render gate and launch the render in the background.
    ///
    /// Gate refusals are answered as [`StartRenderResponse::Rejected`];
    /// unknown jobs and store failures are errors.
    pub async fn start_render(
        &self,
        job_id: JobId,
        style: SubtitleStyle,
    ) -> Result<StartRenderResponse> {
        let job = match self.orchestrator.begin_render(job_id).await {
            Ok(job) => job,
            Err(Error::RenderRejected(reason)) => {
                return Ok(StartRenderResponse::Rejected { reason });
            }
            Err(e) => return Err(e),
        };

        let orchestrator = Arc::clone(&self.orchestrator);
        let mut renders = self.renders.lock().await;
        while let Some(finished) = renders.try_join_next() {
            if let Err(e) = finished {
                warn!("Render task panicked: {e}");
            }
        }
        renders.spawn(async move {
            if let Err(e) = orchestrator.run_render(&job, &style).await {
                debug!(job = %job.id(), "Background render ended with error: {e}");
            }
        });

        Ok(StartRenderResponse::Accepted { job_id })
    }

    pub async fn render_status(&self, job_id: JobId) -> Result<RenderStatusResponse> {
        let report = self.orchestrator.render_status(job_id).await?;
        Ok(RenderStatusResponse {
            status: report.status,
            rendered_video_url: report.rendered_video_url,
        })
    }

    /// Wait for every background render to finish
    pub async fn drain(&self) {
        let mut renders = self.renders.lock().await;
        while let Some(finished) = renders.join_next().await {
            if let Err(e) = finished {
                warn!("Render task panicked: {e}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use bytes::Bytes;

    use super::*;
    use crate::collab::{BlobStore, ProviderTranscript, TranscriptionProvider, VideoRenderer};
    use crate::job::MemoryJobStore;
    use crate::subtitle::{ResolvedStyle, Word};

    struct InstantProvider;

    #[async_trait]
    impl TranscriptionProvider for InstantProvider {
        fn name(&self) -> &'static str {
            "instant"
        }

        async fn submit(&self, _audio_url: &str) -> Result<String> {
            Ok("prov".to_string())
        }

        async fn poll(&self, _id: &str) -> Result<ProviderTranscript> {
            Ok(ProviderTranscript::completed(
                "hi there",
                vec![Word::new("hi", 0, 100), Word::new("there", 150, 400)],
            ))
        }
    }

    #[derive(Default)]
    struct Blobs(std::sync::Mutex<std::collections::HashMap<String, Bytes>>);

    #[async_trait]
    impl BlobStore for Blobs {
        async fn put(&self, bucket: &str, path: &str, data: Bytes, _ct: &str) -> Result<()> {
            self.0.lock().unwrap().insert(format!("{bucket}/{path}"), data);
            Ok(())
        }

        async fn get(&self, bucket: &str, path: &str) -> Result<Bytes> {
            Ok(self
                .0
                .lock()
                .unwrap()
                .get(&format!("{bucket}/{path}"))
                .cloned()
                .unwrap_or_else(|| Bytes::from_static(b"VIDEO")))
        }

        fn public_url(&self, bucket: &str, path: &str) -> String {
            format!("mem://{bucket}/{path}")
        }
    }

    /// Renderer that waits until released, so a render can be held in flight
    struct GatedRenderer(tokio::sync::Semaphore);

    #[async_trait]
    impl VideoRenderer for GatedRenderer {
        fn name(&self) -> &'static str {
            "gated"
        }

        async fn render(&self, source: Bytes, _srt: &str, _style: &ResolvedStyle) -> Result<Bytes> {
            let _permit = self
                .0
                .acquire()
                .await
                .map_err(|e| Error::Renderer(e.to_string()))?;
            Ok(source)
        }
    }

    fn service() -> (PollingService, Arc<GatedRenderer>) {
        let renderer = Arc::new(GatedRenderer(tokio::sync::Semaphore::new(0)));
        let orchestrator = Orchestrator::new(
            Arc::new(InstantProvider),
            Arc::new(Blobs::default()),
            renderer.clone(),
            Arc::new(MemoryJobStore::new()),
        );
        (PollingService::new(Arc::new(orchestrator)), renderer)
    }

    #[tokio::test]
    async fn status_fields_only_when_completed() {
        let (service, _) = service();
        let started = service.start_transcription("clip.mp4").await.unwrap();

        let render = service.render_status(started.job_id).await.unwrap();
        assert_eq!(render.status, None);

        let status = service.transcription_status(started.job_id).await.unwrap();
        assert_eq!(status.status, TrackStatus::Completed);
        assert_eq!(status.text.as_deref(), Some("hi there"));
        assert_eq!(status.subtitle_url.as_deref(), Some("mem://subtitles/clip.srt"));

        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["subtitleUrl"], "mem://subtitles/clip.srt");
    }

    #[tokio::test]
    async fn render_rejected_before_transcription() {
        let (service, _) = service();
        let started = service.start_transcription("clip.mp4").await.unwrap();

        let response = service
            .start_render(started.job_id, SubtitleStyle::default())
            .await
            .unwrap();
        assert_eq!(
            response,
            StartRenderResponse::Rejected {
                reason: RenderRejection::TranscriptionNotReady
            }
        );
        assert_eq!(
            serde_json::to_value(&response).unwrap(),
            serde_json::json!({"result": "rejected", "reason": "transcription-not-ready"})
        );
    }

    #[tokio::test]
    async fn second_render_while_first_in_flight_is_rejected() {
        let (service, renderer) = service();
        let job_id = service.start_transcription("clip.mp4").await.unwrap().job_id;
        service.transcription_status(job_id).await.unwrap();

        let first = service
            .start_render(job_id, SubtitleStyle::default())
            .await
            .unwrap();
        let second = service
            .start_render(job_id, SubtitleStyle::default())
            .await
            .unwrap();

        assert_eq!(first, StartRenderResponse::Accepted { job_id });
        assert_eq!(
            second,
            StartRenderResponse::Rejected {
                reason: RenderRejection::AlreadyInProgress
            }
        );
        assert_eq!(
            service.render_status(job_id).await.unwrap().status,
            Some(TrackStatus::Processing)
        );

        renderer.0.add_permits(1);
        service.drain().await;

        let done = service.render_status(job_id).await.unwrap();
        assert_eq!(done.status, Some(TrackStatus::Completed));
        assert!(done
            .rendered_video_url
            .unwrap()
            .starts_with("mem://processed-videos/processed_clip_"));
    }

    #[tokio::test]
    async fn unknown_job_is_an_error_not_a_rejection() {
        let (service, _) = service();
        assert!(matches!(
            service.start_render(JobId::new(), SubtitleStyle::default()).await,
            Err(Error::JobNotFound(_))
        ));
    }
}
