//! Persisted job records with compare-and-set writes
//!
//! Writers read a job, apply a transition, and hand the modified copy back
//! through [`JobStore::compare_and_swap`]. The write only lands if nobody
//! else wrote the record in between (the stored revision still matches the
//! one that was read); otherwise [`Error::Conflict`] is returned and the
//! caller re-reads. Two transitions on the same job can therefore never
//! both win silently. Different jobs never contend.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tokio::sync::{Mutex, RwLock};
use tracing::debug;

use super::state::{JobId, TranscriptionJob};
use crate::error::{Error, Result};

/// Storage for [`TranscriptionJob`] records
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Store a new job. Fails with [`Error::Conflict`] if the id is taken.
    async fn insert(&self, job: TranscriptionJob) -> Result<TranscriptionJob>;

    async fn get(&self, id: JobId) -> Result<Option<TranscriptionJob>>;

    /// Replace the stored record if its revision still equals
    /// `job.revision()`. Returns the record as written (revision bumped).
    async fn compare_and_swap(&self, job: TranscriptionJob) -> Result<TranscriptionJob>;

    /// All jobs, newest first
    async fn list(&self) -> Result<Vec<TranscriptionJob>>;
}

/// In-process store, used by the MCP server and tests
#[derive(Default)]
pub struct MemoryJobStore {
    jobs: RwLock<HashMap<JobId, TranscriptionJob>>,
}

impl MemoryJobStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn insert(&self, mut job: TranscriptionJob) -> Result<TranscriptionJob> {
        let mut jobs = self.jobs.write().await;
        if jobs.contains_key(&job.id()) {
            return Err(Error::Conflict(job.id()));
        }
        job.mark_persisted();
        jobs.insert(job.id(), job.clone());
        Ok(job)
    }

    async fn get(&self, id: JobId) -> Result<Option<TranscriptionJob>> {
        Ok(self.jobs.read().await.get(&id).cloned())
    }

    async fn compare_and_swap(&self, mut job: TranscriptionJob) -> Result<TranscriptionJob> {
        let mut jobs = self.jobs.write().await;
        let stored = jobs.get(&job.id()).ok_or(Error::JobNotFound(job.id()))?;
        if stored.revision() != job.revision() {
            debug!(
                job = %job.id(),
                stored = stored.revision(),
                attempted = job.revision(),
                "Revision mismatch"
            );
            return Err(Error::Conflict(job.id()));
        }
        job.mark_persisted();
        jobs.insert(job.id(), job.clone());
        Ok(job)
    }

    async fn list(&self) -> Result<Vec<TranscriptionJob>> {
        let mut jobs: Vec<_> = self.jobs.read().await.values().cloned().collect();
        jobs.sort_by_key(|job| std::cmp::Reverse(job.created_at()));
        Ok(jobs)
    }
}

/// One JSON file per job under a directory, so the CLI can pick a job up
/// again in a later invocation.
///
/// Writes are serialised within the process and land through a temp file
/// and rename, so a reader never sees a half-written record.
pub struct FileJobStore {
    dir: PathBuf,
    write_lock: Mutex<()>,
}

impl FileJobStore {
    /// Open (and create if needed) a store rooted at `dir`
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).await?;
        Ok(Self {
            dir,
            write_lock: Mutex::new(()),
        })
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, id: JobId) -> PathBuf {
        self.dir.join(format!("{id}.json"))
    }

    async fn read(&self, id: JobId) -> Result<Option<TranscriptionJob>> {
        match fs::read(self.path_for(id)).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn write(&self, job: &TranscriptionJob) -> Result<()> {
        let path = self.path_for(job.id());
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(job)?).await?;
        fs::rename(&tmp, &path).await?;
        Ok(())
    }
}

#[async_trait]
impl JobStore for FileJobStore {
    async fn insert(&self, mut job: TranscriptionJob) -> Result<TranscriptionJob> {
        let _guard = self.write_lock.lock().await;
        if self.read(job.id()).await?.is_some() {
            return Err(Error::Conflict(job.id()));
        }
        job.mark_persisted();
        self.write(&job).await?;
        Ok(job)
    }

    async fn get(&self, id: JobId) -> Result<Option<TranscriptionJob>> {
        self.read(id).await
    }

    async fn compare_and_swap(&self, mut job: TranscriptionJob) -> Result<TranscriptionJob> {
        let _guard = self.write_lock.lock().await;
        let stored = self
            .read(job.id())
            .await?
            .ok_or(Error::JobNotFound(job.id()))?;
        if stored.revision() != job.revision() {
            debug!(
                job = %job.id(),
                stored = stored.revision(),
                attempted = job.revision(),
                "Revision mismatch"
            );
            return Err(Error::Conflict(job.id()));
        }
        job.mark_persisted();
        self.write(&job).await?;
        Ok(job)
    }

    async fn list(&self) -> Result<Vec<TranscriptionJob>> {
        let mut jobs = Vec::new();
        let mut entries = fs::read_dir(&self.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let bytes = fs::read(&path).await?;
            jobs.push(serde_json::from_slice::<TranscriptionJob>(&bytes)?);
        }
        jobs.sort_by_key(|job| std::cmp::Reverse(job.created_at()));
        Ok(jobs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::state::VideoRef;

    fn job() -> TranscriptionJob {
        TranscriptionJob::new(VideoRef::parse("videos/clip.mp4").unwrap())
    }

    async fn exercise_cas(store: &dyn JobStore) {
        let stored = store.insert(job()).await.unwrap();
        assert_eq!(stored.revision(), 1);

        let mut first = store.get(stored.id()).await.unwrap().unwrap();
        let mut second = first.clone();

        first.start_transcription("prov-a").unwrap();
        second.start_transcription("prov-b").unwrap();

        let written = store.compare_and_swap(first).await.unwrap();
        assert_eq!(written.revision(), 2);

        let lost = store.compare_and_swap(second).await.unwrap_err();
        assert!(matches!(lost, Error::Conflict(id) if id == stored.id()));

        let current = store.get(stored.id()).await.unwrap().unwrap();
        assert_eq!(current.provider_job_id(), Some("prov-a"));
        assert_eq!(current.revision(), 2);
    }

    #[tokio::test]
    async fn memory_store_rejects_stale_writes() {
        exercise_cas(&MemoryJobStore::new()).await;
    }

    #[tokio::test]
    async fn file_store_rejects_stale_writes() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileJobStore::open(dir.path().join("jobs")).await.unwrap();
        exercise_cas(&store).await;
    }

    #[tokio::test]
    async fn duplicate_insert_conflicts() {
        let store = MemoryJobStore::new();
        let job = job();
        store.insert(job.clone()).await.unwrap();
        assert!(matches!(
            store.insert(job).await,
            Err(Error::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn cas_on_missing_job_is_not_found() {
        let store = MemoryJobStore::new();
        assert!(matches!(
            store.compare_and_swap(job()).await,
            Err(Error::JobNotFound(_))
        ));
    }

    #[tokio::test]
    async fn file_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let id = {
            let store = FileJobStore::open(dir.path()).await.unwrap();
            store.insert(job()).await.unwrap().id()
        };

        let reopened = FileJobStore::open(dir.path()).await.unwrap();
        let job = reopened.get(id).await.unwrap().unwrap();
        assert_eq!(job.video_ref().as_str(), "videos/clip.mp4");
        assert_eq!(reopened.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn missing_job_reads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileJobStore::open(dir.path()).await.unwrap();
        assert!(store.get(JobId::new()).await.unwrap().is_none());
    }
}
