//! Job records: the two-track state machine and its persistence

pub mod state;
pub mod store;

pub use state::{
    JobId, RenderRejection, SubtitleArtifact, Track, TrackStatus, TranscriptionJob,
    TransitionError, VideoRef,
};
pub use store::{FileJobStore, JobStore, MemoryJobStore};
