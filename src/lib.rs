//! `subburn` - word-timed subtitles from uploaded video
//!
//! # Features
//!
//! - **Segmentation**: word-level timestamps into readable SRT cues
//! - **Job state machine**: transcription and render tracks with
//!   compare-and-set persistence
//! - **Collaborators**: AssemblyAI transcription, Supabase or local blob
//!   storage, ffmpeg subtitle burn-in
//! - **Polling surface**: stateless single checks plus cancellable wait loops
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use subburn::config::Config;
//! use subburn::job::MemoryJobStore;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load()?;
//!     let orchestrator = config.build_orchestrator(Arc::new(MemoryJobStore::new()))?;
//!     let job = orchestrator.start_transcription("clip.mp4").await?;
//!     let report = orchestrator.check_transcription(job.id()).await?;
//!     println!("{}: {}", job.id(), report.status);
//!     Ok(())
//! }
//! ```

pub mod collab;
pub mod config;
pub mod error;
pub mod job;
pub mod orchestrator;
pub mod poller;
pub mod service;
pub mod subtitle;

pub use error::{Error, Result};
pub use job::{JobId, TrackStatus, TranscriptionJob};
pub use orchestrator::{Orchestrator, OrchestratorSettings, RenderReport, TranscriptionReport};
pub use service::PollingService;
pub use subtitle::{segment, to_srt, Cue, SubtitleStyle, Word};

/// Version of subburn
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
