//! Configuration loaded from `~/.config/subburn/config.toml`.
//!
//! Every section is optional. Secrets and endpoints can also come from the
//! environment, which wins over the file:
//!
//! | Variable | Field |
//! |---|---|
//! | `ASSEMBLYAI_API_KEY` | `provider.api_key` |
//! | `SUPABASE_URL` | `storage.supabase_url` (also selects the Supabase backend) |
//! | `SUPABASE_SERVICE_ROLE_KEY` | `storage.service_key` |
//! | `SUBBURN_DATA_DIR` | `data_dir` |

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::Deserialize;

use crate::collab::{
    AssemblyAiProvider, BlobStore, Buckets, FfmpegConfig, FfmpegRenderer, LocalBlobStore,
    SupabaseStorage,
};
use crate::job::JobStore;
use crate::orchestrator::{Orchestrator, OrchestratorSettings, DEFAULT_RENDER_LEASE};
use crate::subtitle::DEFAULT_MAX_SEGMENT_MS;

/// Top-level configuration file
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Job records and local blobs live here
    pub data_dir: Option<PathBuf>,
    pub provider: ProviderConfig,
    pub storage: StorageConfig,
    pub renderer: FfmpegConfig,
    pub segmenter: SegmenterConfig,
    pub poll: PollConfig,
    pub jobs: JobsConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub base_url: String,
    pub api_key: Option<String>,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: crate::collab::assemblyai::DEFAULT_BASE_URL.to_string(),
            api_key: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Directories under `local_root` (or `<data_dir>/blobs`)
    #[default]
    Local,
    Supabase,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub supabase_url: Option<String>,
    pub service_key: Option<String>,
    pub local_root: Option<PathBuf>,
    pub buckets: Buckets,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SegmenterConfig {
    pub max_segment_ms: u64,
}

impl Default for SegmenterConfig {
    fn default() -> Self {
        Self {
            max_segment_ms: DEFAULT_MAX_SEGMENT_MS,
        }
    }
}

/// Caller-side poll cadence
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PollConfig {
    pub transcription_interval_secs: u64,
    pub render_interval_secs: u64,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            transcription_interval_secs: 3,
            render_interval_secs: 5,
        }
    }
}

impl PollConfig {
    #[must_use]
    pub fn transcription_interval(&self) -> Duration {
        Duration::from_secs(self.transcription_interval_secs.max(1))
    }

    #[must_use]
    pub fn render_interval(&self) -> Duration {
        Duration::from_secs(self.render_interval_secs.max(1))
    }
}

/// Job record handling
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct JobsConfig {
    /// Seconds after which a render still `processing` (its process was
    /// killed or lost) may be started again. 0 never takes over.
    pub render_lease_secs: u64,
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            render_lease_secs: DEFAULT_RENDER_LEASE.as_secs(),
        }
    }
}

impl Config {
    /// Load the config file (if any) and apply environment overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from(&config_path())?;
        config.apply_env_from(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Load a specific file without environment overrides. A missing file
    /// yields the defaults.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;

        toml::from_str(&content).with_context(|| format!("invalid TOML in {}", path.display()))
    }

    /// Apply overrides from a variable lookup (the process environment in
    /// [`Config::load`])
    pub fn apply_env_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(key) = var("ASSEMBLYAI_API_KEY") {
            self.provider.api_key = Some(key);
        }
        if let Some(url) = var("SUPABASE_URL") {
            self.storage.supabase_url = Some(url);
            self.storage.backend = StorageBackend::Supabase;
        }
        if let Some(key) = var("SUPABASE_SERVICE_ROLE_KEY") {
            self.storage.service_key = Some(key);
        }
        if let Some(dir) = var("SUBBURN_DATA_DIR") {
            self.data_dir = Some(PathBuf::from(dir));
        }
    }

    #[must_use]
    pub fn data_dir(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("subburn")
        })
    }

    /// Directory for persisted job records
    #[must_use]
    pub fn jobs_dir(&self) -> PathBuf {
        self.data_dir().join("jobs")
    }

    #[must_use]
    pub fn settings(&self) -> OrchestratorSettings {
        OrchestratorSettings {
            buckets: self.storage.buckets.clone(),
            max_segment_ms: self.segmenter.max_segment_ms,
            render_lease: Duration::from_secs(self.jobs.render_lease_secs),
        }
    }

    /// Blob store selected by `storage.backend`
    pub fn blob_store(&self) -> Result<Arc<dyn BlobStore>> {
        match self.storage.backend {
            StorageBackend::Local => {
                let root = self
                    .storage
                    .local_root
                    .clone()
                    .unwrap_or_else(|| self.data_dir().join("blobs"));
                Ok(Arc::new(LocalBlobStore::new(root)))
            }
            StorageBackend::Supabase => {
                let (Some(url), Some(key)) =
                    (&self.storage.supabase_url, &self.storage.service_key)
                else {
                    bail!("Supabase storage needs SUPABASE_URL and SUPABASE_SERVICE_ROLE_KEY");
                };
                Ok(Arc::new(SupabaseStorage::new(url, key)?))
            }
        }
    }

    /// Wire the real collaborators into an orchestrator over `jobs`
    pub fn build_orchestrator(&self, jobs: Arc<dyn JobStore>) -> Result<Orchestrator> {
        let Some(api_key) = &self.provider.api_key else {
            bail!("no AssemblyAI API key configured (set ASSEMBLYAI_API_KEY)");
        };
        let provider = AssemblyAiProvider::with_base_url(api_key, &self.provider.base_url)?;
        let renderer = FfmpegRenderer::with_config(self.renderer.clone());

        Ok(Orchestrator::new(
            Arc::new(provider),
            self.blob_store()?,
            Arc::new(renderer),
            jobs,
        )
        .with_settings(self.settings()))
    }
}

/// Return the path to the config file.
#[must_use]
pub fn config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("subburn")
        .join("config.toml")
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::job::MemoryJobStore;

    #[test]
    fn parse_empty_config() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.poll.transcription_interval(), Duration::from_secs(3));
        assert_eq!(config.poll.render_interval(), Duration::from_secs(5));
        assert_eq!(config.segmenter.max_segment_ms, 5_000);
        assert_eq!(config.storage.backend, StorageBackend::Local);
        assert_eq!(config.settings().render_lease, Duration::from_secs(1800));
    }

    #[test]
    fn parse_full_config() {
        let toml_str = r#"
data_dir = "/var/lib/subburn"

[provider]
api_key = "aai-key"

[storage]
backend = "supabase"
supabase_url = "https://proj.supabase.co"
service_key = "service"

[storage.buckets]
rendered = "burned"

[renderer]
preset = "fast"
crf = 20

[segmenter]
max_segment_ms = 3000

[poll]
transcription_interval_secs = 1

[jobs]
render_lease_secs = 120
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.provider.api_key.as_deref(), Some("aai-key"));
        assert_eq!(config.provider.base_url, "https://api.assemblyai.com");
        assert_eq!(config.storage.backend, StorageBackend::Supabase);
        assert_eq!(config.storage.buckets.rendered, "burned");
        assert_eq!(config.storage.buckets.subtitles, "subtitles");
        assert_eq!(config.renderer.preset, "fast");
        assert_eq!(config.renderer.crf, 20);
        assert_eq!(config.settings().max_segment_ms, 3000);
        assert_eq!(config.poll.render_interval_secs, 5);
        assert_eq!(config.settings().render_lease, Duration::from_secs(120));
        assert_eq!(config.jobs_dir(), PathBuf::from("/var/lib/subburn/jobs"));
    }

    #[test]
    fn environment_overrides_file() {
        let env: HashMap<&str, &str> = [
            ("ASSEMBLYAI_API_KEY", "from-env"),
            ("SUPABASE_URL", "https://env.supabase.co"),
            ("SUPABASE_SERVICE_ROLE_KEY", "env-key"),
            ("SUBBURN_DATA_DIR", "/tmp/subburn"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config.provider.api_key = Some("from-file".to_string());
        config.apply_env_from(|key| env.get(key).map(|v| (*v).to_string()));

        assert_eq!(config.provider.api_key.as_deref(), Some("from-env"));
        assert_eq!(config.storage.backend, StorageBackend::Supabase);
        assert_eq!(config.storage.service_key.as_deref(), Some("env-key"));
        assert_eq!(config.data_dir(), PathBuf::from("/tmp/subburn"));
    }

    #[test]
    fn blank_environment_values_are_ignored() {
        let mut config = Config::default();
        config.apply_env_from(|_| Some("  ".to_string()));
        assert_eq!(config.provider.api_key, None);
        assert_eq!(config.storage.backend, StorageBackend::Local);
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn invalid_file_names_the_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[poll\n").unwrap();
        let err = Config::load_from(&path).unwrap_err();
        assert!(err.to_string().contains("config.toml"));
    }

    #[test]
    fn orchestrator_needs_api_key() {
        let err = Config::default()
            .build_orchestrator(Arc::new(MemoryJobStore::new()))
            .err()
            .unwrap();
        assert!(err.to_string().contains("ASSEMBLYAI_API_KEY"));
    }

    #[test]
    fn supabase_backend_needs_credentials() {
        let mut config = Config::default();
        config.storage.backend = StorageBackend::Supabase;
        assert!(config.blob_store().is_err());
    }
}
