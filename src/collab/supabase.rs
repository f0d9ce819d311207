//! Supabase Storage backend
//!
//! Objects are written with `POST /storage/v1/object/{bucket}/{path}`
//! (`x-upsert: true`) and read back through the public object URL.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Client;
use tracing::{debug, instrument};

use super::blob::BlobStore;
use crate::error::{Error, Result};

/// Supabase Storage client authenticated with a service-role key
pub struct SupabaseStorage {
    client: Client,
    base_url: String,
    service_key: String,
}

impl SupabaseStorage {
    pub fn new(base_url: impl Into<String>, service_key: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .use_rustls_tls()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(300))
            .build()
            .map_err(|e| Error::Storage(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            service_key: service_key.into(),
        })
    }

    fn object_url(&self, bucket: &str, path: &str) -> String {
        format!(
            "{}/storage/v1/object/{}/{}",
            self.base_url,
            urlencoding::encode(bucket),
            encode_path(path)
        )
    }
}

/// Percent-encode each segment, keeping the `/` separators
fn encode_path(path: &str) -> String {
    path.split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

#[async_trait]
impl BlobStore for SupabaseStorage {
    #[instrument(skip(self, data), fields(size = data.len()))]
    async fn put(&self, bucket: &str, path: &str, data: Bytes, content_type: &str) -> Result<()> {
        self.client
            .post(self.object_url(bucket, path))
            .bearer_auth(&self.service_key)
            .header("apikey", &self.service_key)
            .header("x-upsert", "true")
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(data)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| Error::Storage(format!("upload to {bucket}/{path} failed: {e}")))?;

        debug!("Stored object");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn get(&self, bucket: &str, path: &str) -> Result<Bytes> {
        let response = self
            .client
            .get(self.object_url(bucket, path))
            .bearer_auth(&self.service_key)
            .header("apikey", &self.service_key)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| Error::Storage(format!("download of {bucket}/{path} failed: {e}")))?;

        response
            .bytes()
            .await
            .map_err(|e| Error::Storage(format!("download of {bucket}/{path} failed: {e}")))
    }

    fn public_url(&self, bucket: &str, path: &str) -> String {
        format!(
            "{}/storage/v1/object/public/{}/{}",
            self.base_url,
            urlencoding::encode(bucket),
            encode_path(path)
        )
    }
}
