//! Filesystem blob store
//!
//! Each bucket is a directory under a root. Useful offline and in tests;
//! public URLs are `file://` URLs, which a hosted transcription provider
//! cannot fetch.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::fs;
use tracing::debug;
use url::Url;

use super::blob::BlobStore;
use crate::error::{Error, Result};

pub struct LocalBlobStore {
    root: PathBuf,
}

impl LocalBlobStore {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn object_path(&self, bucket: &str, path: &str) -> Result<PathBuf> {
        let escapes = |part: &str| {
            part.is_empty()
                || part.starts_with('/')
                || part.contains('\\')
                || part.split('/').any(|s| s.is_empty() || s == "." || s == "..")
        };
        if escapes(bucket) || bucket.contains('/') || escapes(path) {
            return Err(Error::Storage(format!("invalid object path: {bucket}/{path}")));
        }
        Ok(self.root.join(bucket).join(path))
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn put(&self, bucket: &str, path: &str, data: Bytes, _content_type: &str) -> Result<()> {
        let target = self.object_path(bucket, path)?;
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&target, &data).await?;
        debug!(path = %target.display(), size = data.len(), "Stored object");
        Ok(())
    }

    async fn get(&self, bucket: &str, path: &str) -> Result<Bytes> {
        let target = self.object_path(bucket, path)?;
        match fs::read(&target).await {
            Ok(data) => Ok(Bytes::from(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(Error::Storage(format!("object not found: {bucket}/{path}")))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn public_url(&self, bucket: &str, path: &str) -> String {
        let target = self.root.join(bucket).join(path);
        Url::from_file_path(&target)
            .map_or_else(|()| target.display().to_string(), |url| url.to_string())
    }
}
