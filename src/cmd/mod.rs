pub mod doctor;
pub mod jobs;
pub mod render;
pub mod segment;
pub mod transcribe;

use std::sync::Arc;

use anyhow::{Context, Result};

use subburn::config::Config;
use subburn::job::{FileJobStore, JobId};
use subburn::orchestrator::Orchestrator;

/// Load config and wire an orchestrator over the on-disk job store
pub async fn open() -> Result<(Config, Orchestrator)> {
    let config = Config::load()?;
    let jobs_dir = config.jobs_dir();
    let jobs = FileJobStore::open(&jobs_dir)
        .await
        .with_context(|| format!("failed to open job store at {}", jobs_dir.display()))?;
    let orchestrator = config.build_orchestrator(Arc::new(jobs))?;
    Ok((config, orchestrator))
}

pub fn parse_job_id(raw: &str) -> Result<JobId> {
    Ok(raw.parse::<JobId>()?)
}
