//! Object storage seam
//!
//! Three buckets are used: uploaded source videos, generated subtitle files
//! and rendered videos. Paths are relative to the bucket.

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Bucket names for the three artifact kinds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Buckets {
    pub videos: String,
    pub subtitles: String,
    pub rendered: String,
}

impl Default for Buckets {
    fn default() -> Self {
        Self {
            videos: "videos".to_string(),
            subtitles: "subtitles".to_string(),
            rendered: "processed-videos".to_string(),
        }
    }
}

/// Trait for blob stores
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Write `data` to `bucket/path`, replacing any existing object
    async fn put(&self, bucket: &str, path: &str, data: Bytes, content_type: &str) -> Result<()>;

    /// Read the object at `bucket/path`
    async fn get(&self, bucket: &str, path: &str) -> Result<Bytes>;

    /// URL a third party (the transcription provider, a browser) can fetch
    fn public_url(&self, bucket: &str, path: &str) -> String;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bucket_defaults() {
        let buckets = Buckets::default();
        assert_eq!(buckets.videos, "videos");
        assert_eq!(buckets.subtitles, "subtitles");
        assert_eq!(buckets.rendered, "processed-videos");
    }

    #[test]
    fn partial_bucket_table_keeps_defaults() {
        let buckets: Buckets = toml::from_str(r#"rendered = "out""#).unwrap();
        assert_eq!(buckets.rendered, "out");
        assert_eq!(buckets.videos, "videos");
    }
}
