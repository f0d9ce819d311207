//! External collaborators: transcription provider, blob storage, renderer
//!
//! Each concern is a trait so the orchestrator can be driven against fakes.

pub mod assemblyai;
pub mod blob;
pub mod ffmpeg;
pub mod local;
pub mod provider;
pub mod renderer;
pub mod supabase;

pub use assemblyai::AssemblyAiProvider;
pub use blob::{BlobStore, Buckets};
pub use ffmpeg::{FfmpegConfig, FfmpegRenderer};
pub use local::LocalBlobStore;
pub use provider::{ProviderStatus, ProviderTranscript, TranscriptionProvider};
pub use renderer::VideoRenderer;
pub use supabase::SupabaseStorage;
