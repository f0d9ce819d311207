//! Subtitle burn-in seam

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::Result;
use crate::subtitle::ResolvedStyle;

/// Trait for video renderers that burn subtitles into frames
#[async_trait]
pub trait VideoRenderer: Send + Sync {
    /// Short renderer name for logs
    fn name(&self) -> &'static str;

    /// Produce a new MP4 with `srt` burned in using `style`.
    /// Audio is passed through unchanged.
    async fn render(&self, source: Bytes, srt: &str, style: &ResolvedStyle) -> Result<Bytes>;
}
