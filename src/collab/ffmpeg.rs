//! ffmpeg-based subtitle burner
//!
//! Writes the source video and SRT to uniquely named temp files, runs
//! `ffmpeg -vf subtitles=...:force_style=...` re-encoding video with
//! libx264 and copying audio, reads the output back and removes all three
//! files whether or not ffmpeg succeeded. Dropping a render in flight kills
//! ffmpeg and still removes the files.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::process::Command;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use super::renderer::VideoRenderer;
use crate::error::{Error, Result};
use crate::subtitle::ResolvedStyle;

/// How many trailing stderr lines end up in a render error
const STDERR_TAIL_LINES: usize = 8;

/// Configuration for the ffmpeg renderer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FfmpegConfig {
    /// Path to ffmpeg binary
    pub ffmpeg_path: String,
    /// x264 preset (e.g., "medium", "fast")
    pub preset: String,
    /// x264 constant rate factor
    pub crf: u8,
    /// Directory for per-render temp files (system temp dir when unset)
    pub temp_dir: Option<PathBuf>,
}

impl Default for FfmpegConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: which::which("ffmpeg").map_or_else(
                |_| "ffmpeg".to_string(),
                |p| p.to_string_lossy().to_string(),
            ),
            preset: "medium".to_string(),
            crf: 23,
            temp_dir: None,
        }
    }
}

/// Temp files for one render attempt
struct RenderFiles {
    input: PathBuf,
    subtitles: PathBuf,
    output: PathBuf,
}

impl RenderFiles {
    fn new(dir: &Path) -> Self {
        let tag = Uuid::new_v4();
        Self {
            input: dir.join(format!("input_{tag}.mp4")),
            subtitles: dir.join(format!("subtitles_{tag}.srt")),
            output: dir.join(format!("output_{tag}.mp4")),
        }
    }

}

impl Drop for RenderFiles {
    fn drop(&mut self) {
        for path in [&self.input, &self.subtitles, &self.output] {
            if let Err(e) = std::fs::remove_file(path) {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!(path = %path.display(), "Failed to remove temp file: {e}");
                }
            }
        }
    }
}

/// Renderer that shells out to ffmpeg
pub struct FfmpegRenderer {
    config: FfmpegConfig,
}

impl Default for FfmpegRenderer {
    fn default() -> Self {
        Self::with_config(FfmpegConfig::default())
    }
}

impl FfmpegRenderer {
    #[must_use]
    pub fn with_config(config: FfmpegConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn config(&self) -> &FfmpegConfig {
        &self.config
    }

    /// Check if ffmpeg is available
    pub async fn check_available(&self) -> bool {
        Command::new(&self.config.ffmpeg_path)
            .arg("-version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map(|s| s.success())
            .unwrap_or(false)
    }

    fn temp_dir(&self) -> PathBuf {
        self.config
            .temp_dir
            .clone()
            .unwrap_or_else(std::env::temp_dir)
    }

    /// `subtitles` filter with the style override
    fn build_filter(subtitle_file: &Path, style: &ResolvedStyle) -> String {
        let path_escaped = subtitle_file
            .to_string_lossy()
            .replace('\\', "\\\\")
            .replace(':', "\\:")
            .replace('\'', "\\'");
        format!(
            "subtitles='{path_escaped}':force_style='{}'",
            style.force_style()
        )
    }

    fn build_args(&self, files: &RenderFiles, style: &ResolvedStyle) -> Vec<String> {
        let mut args: Vec<String> = ["-hide_banner", "-loglevel", "error", "-y", "-i"]
            .iter()
            .map(std::string::ToString::to_string)
            .collect();

        args.push(files.input.to_string_lossy().to_string());
        args.push("-vf".to_string());
        args.push(Self::build_filter(&files.subtitles, style));
        args.extend([
            "-c:v".to_string(),
            "libx264".to_string(),
            "-preset".to_string(),
            self.config.preset.clone(),
            "-crf".to_string(),
            self.config.crf.to_string(),
            "-c:a".to_string(),
            "copy".to_string(),
        ]);
        args.push(files.output.to_string_lossy().to_string());
        args
    }

    async fn run(
        &self,
        files: &RenderFiles,
        source: &Bytes,
        srt: &str,
        style: &ResolvedStyle,
    ) -> Result<Bytes> {
        fs::write(&files.input, source).await?;
        fs::write(&files.subtitles, srt).await?;

        let args = self.build_args(files, style);
        debug!("ffmpeg args: {:?}", args);

        let output = Command::new(&self.config.ffmpeg_path)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                Error::Renderer(format!("failed to start {}: {e}", self.config.ffmpeg_path))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::Renderer(format!(
                "ffmpeg exited with {}: {}",
                output.status,
                stderr_tail(&stderr)
            )));
        }

        let rendered = fs::read(&files.output)
            .await
            .map_err(|e| Error::Renderer(format!("ffmpeg produced no output: {e}")))?;
        Ok(Bytes::from(rendered))
    }
}

fn stderr_tail(stderr: &str) -> String {
    let lines: Vec<&str> = stderr.lines().filter(|l| !l.trim().is_empty()).collect();
    let start = lines.len().saturating_sub(STDERR_TAIL_LINES);
    lines[start..].join(" | ")
}

#[async_trait]
impl VideoRenderer for FfmpegRenderer {
    fn name(&self) -> &'static str {
        "ffmpeg"
    }

    #[instrument(skip(self, source, srt, style), fields(size = source.len()))]
    async fn render(&self, source: Bytes, srt: &str, style: &ResolvedStyle) -> Result<Bytes> {
        let dir = self.temp_dir();
        fs::create_dir_all(&dir).await?;

        let files = RenderFiles::new(&dir);
        let result = self.run(&files, &source, srt, style).await;
        drop(files);

        let rendered = result?;
        info!(size = rendered.len(), "Burned subtitles into video");
        Ok(rendered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn renderer(dir: &Path, ffmpeg: &str) -> FfmpegRenderer {
        FfmpegRenderer::with_config(FfmpegConfig {
            ffmpeg_path: ffmpeg.to_string(),
            temp_dir: Some(dir.to_path_buf()),
            ..FfmpegConfig::default()
        })
    }

    #[test]
    fn filter_escapes_path_and_embeds_style() {
        let filter = FfmpegRenderer::build_filter(
            Path::new("C:\\tmp\\it's.srt"),
            &ResolvedStyle::default(),
        );
        assert!(filter.starts_with("subtitles='C\\:\\\\tmp\\\\it\\'s.srt':force_style='"));
        assert!(filter.contains("Alignment=2"));
        assert!(filter.ends_with("MarginV=20'"));
    }

    #[test]
    fn args_reencode_video_and_copy_audio() {
        let dir = tempfile::tempdir().unwrap();
        let renderer = renderer(dir.path(), "ffmpeg");
        let files = RenderFiles::new(dir.path());
        let args = renderer.build_args(&files, &ResolvedStyle::default());

        let joined = args.join(" ");
        assert!(joined.contains("-c:v libx264 -preset medium -crf 23 -c:a copy"));
        assert_eq!(args.last().unwrap(), &files.output.to_string_lossy().to_string());
        assert!(args.contains(&"-vf".to_string()));
    }

    #[test]
    fn stderr_tail_keeps_last_lines() {
        let stderr = (1..=20).map(|i| format!("line {i}")).collect::<Vec<_>>().join("\n");
        let tail = stderr_tail(&stderr);
        assert!(tail.starts_with("line 13"));
        assert!(tail.ends_with("line 20"));
    }

    #[tokio::test]
    async fn missing_binary_is_renderer_error_and_cleans_up() {
        let dir = tempfile::tempdir().unwrap();
        let renderer = renderer(dir.path(), "/nonexistent/ffmpeg-binary");

        let err = renderer
            .render(Bytes::from_static(b"not a video"), "", &ResolvedStyle::default())
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Renderer(_)));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
        assert!(!renderer.check_available().await);
    }

    /// Stand-in ffmpeg executable with the given shell body
    #[cfg(unix)]
    fn fake_ffmpeg(dir: &Path, body: &str) -> String {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join("ffmpeg");
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path.to_string_lossy().to_string()
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn successful_run_returns_output_and_cleans_up() {
        let bin = tempfile::tempdir().unwrap();
        let work = tempfile::tempdir().unwrap();
        let ffmpeg = fake_ffmpeg(
            bin.path(),
            r#"for last; do :; done; printf burned > "$last""#,
        );
        let renderer = renderer(work.path(), &ffmpeg);

        let rendered = renderer
            .render(Bytes::from_static(b"video"), "1\n", &ResolvedStyle::default())
            .await
            .unwrap();

        assert_eq!(&rendered[..], b"burned");
        assert_eq!(std::fs::read_dir(work.path()).unwrap().count(), 0);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn failing_run_reports_stderr_and_cleans_up() {
        let bin = tempfile::tempdir().unwrap();
        let work = tempfile::tempdir().unwrap();
        let ffmpeg = fake_ffmpeg(
            bin.path(),
            "echo 'Invalid data found' >&2; echo boom >&2; exit 3",
        );
        let renderer = renderer(work.path(), &ffmpeg);

        let err = renderer
            .render(Bytes::from_static(b"video"), "1\n", &ResolvedStyle::default())
            .await
            .unwrap_err();

        let message = match err {
            Error::Renderer(message) => message,
            other => panic!("expected renderer error, got {other:?}"),
        };
        assert!(message.contains("exit status: 3"), "{message}");
        assert!(message.ends_with("Invalid data found | boom"), "{message}");
        assert_eq!(std::fs::read_dir(work.path()).unwrap().count(), 0);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn dropped_run_cleans_up() {
        let bin = tempfile::tempdir().unwrap();
        let work = tempfile::tempdir().unwrap();
        let ffmpeg = fake_ffmpeg(bin.path(), "sleep 30");
        let renderer = renderer(work.path(), &ffmpeg);

        let style = ResolvedStyle::default();
        let render = renderer.render(Bytes::from_static(b"video"), "1\n", &style);
        let outcome = tokio::time::timeout(std::time::Duration::from_millis(200), render).await;

        assert!(outcome.is_err());
        assert_eq!(std::fs::read_dir(work.path()).unwrap().count(), 0);
    }
}
