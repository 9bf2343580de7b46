//! ffmpeg based HLS downloads.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use process_utils::{OutputStream, tokio_command};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{EngineError, Result};
use crate::progress::{
    ProgressEvent, ProgressSender, ProgressStage, parse_duration, parse_ffmpeg_status,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloaderConfig {
    /// Path or name of the ffmpeg binary.
    pub binary_path: String,
    /// Arguments placed before `-i`.
    pub input_args: Vec<String>,
    /// Arguments placed between the input and the output path.
    pub output_args: Vec<String>,
    pub user_agent: Option<String>,
    /// Replace an existing output instead of skipping the download.
    pub overwrite: bool,
}

impl Default for DownloaderConfig {
    fn default() -> Self {
        Self {
            binary_path: "ffmpeg".to_string(),
            input_args: Vec::new(),
            output_args: vec!["-c".to_string(), "copy".to_string()],
            user_agent: None,
            overwrite: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadRequest {
    /// Media playlist or any other input ffmpeg understands.
    pub input_uri: String,
    pub output_path: PathBuf,
    /// Extra HTTP headers sent with every request.
    pub headers: Vec<(String, String)>,
}

impl DownloadRequest {
    pub fn new(input_uri: impl Into<String>, output_path: impl Into<PathBuf>) -> Self {
        Self {
            input_uri: input_uri.into(),
            output_path: output_path.into(),
            headers: Vec::new(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadOutcome {
    Downloaded { path: PathBuf, bytes: u64 },
    /// The output already existed and overwriting is disabled.
    Skipped { path: PathBuf },
}

impl DownloadOutcome {
    pub fn path(&self) -> &Path {
        match self {
            Self::Downloaded { path, .. } | Self::Skipped { path } => path,
        }
    }
}

/// Fetches a video rendition into a local file.
#[async_trait]
pub trait VideoDownloader: Send + Sync {
    async fn download(
        &self,
        request: DownloadRequest,
        progress: &ProgressSender,
        cancel: &CancellationToken,
    ) -> Result<DownloadOutcome>;
}

pub struct FfmpegDownloader {
    config: DownloaderConfig,
}

impl FfmpegDownloader {
    pub fn new() -> Self {
        Self::with_config(DownloaderConfig::default())
    }

    pub fn with_config(config: DownloaderConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DownloaderConfig {
        &self.config
    }

    /// Build ffmpeg command arguments.
    pub fn build_args(&self, request: &DownloadRequest) -> Vec<String> {
        let mut args = vec!["-y".to_string(), "-hide_banner".to_string()];

        args.extend(self.config.input_args.iter().cloned());

        if let Some(ref ua) = self.config.user_agent {
            args.extend(["-user_agent".to_string(), ua.clone()]);
        }

        if !request.headers.is_empty() {
            let headers: String = request
                .headers
                .iter()
                .map(|(key, value)| format!("{key}: {value}\r\n"))
                .collect();
            args.extend(["-headers".to_string(), headers]);
        }

        args.extend(["-i".to_string(), request.input_uri.clone()]);
        args.extend(self.config.output_args.iter().cloned());
        args.push(request.output_path.to_string_lossy().into_owned());

        args
    }
}

impl Default for FfmpegDownloader {
    fn default() -> Self {
        Self::new()
    }
}

/// Folds ffmpeg stderr lines into progress events.
#[derive(Debug)]
struct ProgressTracker {
    label: String,
    duration_secs: Option<f64>,
    bytes: u64,
}

impl ProgressTracker {
    fn new(label: String) -> Self {
        Self {
            label,
            duration_secs: None,
            bytes: 0,
        }
    }

    fn observe(&mut self, line: &str) -> Option<ProgressEvent> {
        if self.duration_secs.is_none()
            && let Some(duration) = parse_duration(line)
        {
            self.duration_secs = Some(duration);
            return None;
        }

        let status = parse_ffmpeg_status(line)?;
        self.bytes = self.bytes.max(status.bytes);

        let mut event = ProgressEvent::new(ProgressStage::Download, self.label.as_str());
        event.bytes = status.bytes;
        event.media_secs = status.media_secs;
        event.speed_bytes_per_sec = status.speed_bytes_per_sec;
        event.playback_ratio = status.playback_ratio;

        match self.duration_secs {
            Some(total) if total > 0.0 => Some(event.with_percent(status.media_secs / total * 100.0)),
            _ => Some(event),
        }
    }
}

#[async_trait]
impl VideoDownloader for FfmpegDownloader {
    async fn download(
        &self,
        request: DownloadRequest,
        progress: &ProgressSender,
        cancel: &CancellationToken,
    ) -> Result<DownloadOutcome> {
        let output_path = request.output_path.clone();

        if !self.config.overwrite && tokio::fs::try_exists(&output_path).await? {
            info!("{} already exists, skipping download", output_path.display());
            return Ok(DownloadOutcome::Skipped { path: output_path });
        }

        if let Some(parent) = output_path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }

        let args = self.build_args(&request);
        debug!("Running {} {:?}", self.config.binary_path, args);

        let label = output_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let mut tracker = ProgressTracker::new(label);

        let mut command = tokio_command(&self.config.binary_path);
        command.args(&args).env("LC_ALL", "C");

        let output = process_utils::run_streaming(command, cancel, |stream, line| {
            if stream != OutputStream::Stderr {
                return;
            }
            if let Some(event) = tracker.observe(line) {
                progress.emit(event);
            }
        })
        .await?;

        if !output.success() {
            warn!(
                "ffmpeg exited with {:?} for {}",
                output.exit_code,
                output_path.display()
            );
            return Err(EngineError::ProcessFailed {
                program: self.config.binary_path.clone(),
                exit_code: output.exit_code,
                stderr: output.diagnostics(),
            });
        }

        let bytes = match tokio::fs::metadata(&output_path).await {
            Ok(meta) => meta.len(),
            Err(_) => tracker.bytes,
        };

        info!(
            "Downloaded {} ({} bytes) in {:.1}s",
            output_path.display(),
            bytes,
            output.duration.as_secs_f64()
        );
        Ok(DownloadOutcome::Downloaded {
            path: output_path,
            bytes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_args_default() {
        let downloader = FfmpegDownloader::new();
        let request = DownloadRequest::new(
            "https://cdn.example.com/720.m3u8",
            "/tmp/media-1/Show Episode 1.mp4",
        );

        assert_eq!(
            downloader.build_args(&request),
            vec![
                "-y",
                "-hide_banner",
                "-i",
                "https://cdn.example.com/720.m3u8",
                "-c",
                "copy",
                "/tmp/media-1/Show Episode 1.mp4",
            ]
        );
    }

    #[test]
    fn test_build_args_custom() {
        let downloader = FfmpegDownloader::with_config(DownloaderConfig {
            input_args: vec!["-loglevel".to_string(), "info".to_string()],
            output_args: vec![
                "-c".to_string(),
                "copy".to_string(),
                "-bsf:a".to_string(),
                "aac_adtstoasc".to_string(),
            ],
            user_agent: Some("anidl/0.1".to_string()),
            ..Default::default()
        });
        let request =
            DownloadRequest::new("in.m3u8", "out.mp4").with_header("Cookie", "session_id=abc");

        assert_eq!(
            downloader.build_args(&request),
            vec![
                "-y",
                "-hide_banner",
                "-loglevel",
                "info",
                "-user_agent",
                "anidl/0.1",
                "-headers",
                "Cookie: session_id=abc\r\n",
                "-i",
                "in.m3u8",
                "-c",
                "copy",
                "-bsf:a",
                "aac_adtstoasc",
                "out.mp4",
            ]
        );
    }

    #[test]
    fn test_tracker_computes_percent() {
        let mut tracker = ProgressTracker::new("ep.mp4".to_string());

        assert!(tracker.observe("Input #0, hls, from 'in.m3u8':").is_none());
        assert!(
            tracker
                .observe("  Duration: 00:00:40.00, start: 1.400000, bitrate: 0 kb/s")
                .is_none()
        );

        let event = tracker
            .observe("frame=  250 fps=0.0 q=-1.0 size=    2048kB time=00:00:10.00 bitrate=1677.7kbits/s speed=20.0x")
            .unwrap();
        assert_eq!(event.stage, ProgressStage::Download);
        assert_eq!(event.label, "ep.mp4");
        assert_eq!(event.percent, Some(25.0));
        assert_eq!(event.bytes, 2048 * 1024);
        assert_eq!(event.media_secs, 10.0);
        assert_eq!(event.playback_ratio, 20.0);
    }

    #[test]
    fn test_tracker_without_duration() {
        let mut tracker = ProgressTracker::new("ep.mp4".to_string());
        let event = tracker
            .observe("size=     512kB time=00:00:02.00 bitrate=2000.0kbits/s speed=1.0x")
            .unwrap();
        assert_eq!(event.percent, None);
        assert_eq!(event.bytes, 512 * 1024);
    }

    #[tokio::test]
    async fn test_existing_output_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let existing = dir.path().join("episode.mp4");
        std::fs::write(&existing, b"video").unwrap();

        let downloader = FfmpegDownloader::with_config(DownloaderConfig {
            binary_path: "definitely-not-ffmpeg".to_string(),
            ..Default::default()
        });
        let outcome = downloader
            .download(
                DownloadRequest::new("in.m3u8", existing.clone()),
                &ProgressSender::disabled(),
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(outcome, DownloadOutcome::Skipped { path: existing });
    }

    #[tokio::test]
    async fn test_missing_binary() {
        let dir = tempfile::tempdir().unwrap();
        let downloader = FfmpegDownloader::with_config(DownloaderConfig {
            binary_path: "definitely-not-ffmpeg".to_string(),
            ..Default::default()
        });

        let err = downloader
            .download(
                DownloadRequest::new("in.m3u8", dir.path().join("nested/episode.mp4")),
                &ProgressSender::disabled(),
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, EngineError::Spawn { .. }));
        assert!(dir.path().join("nested").is_dir());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_failing_process() {
        let dir = tempfile::tempdir().unwrap();
        let downloader = FfmpegDownloader::with_config(DownloaderConfig {
            binary_path: "false".to_string(),
            ..Default::default()
        });

        let err = downloader
            .download(
                DownloadRequest::new("in.m3u8", dir.path().join("episode.mp4")),
                &ProgressSender::disabled(),
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            EngineError::ProcessFailed {
                exit_code: Some(1),
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let dir = tempfile::tempdir().unwrap();
        let token = CancellationToken::new();
        token.cancel();

        let err = FfmpegDownloader::new()
            .download(
                DownloadRequest::new("in.m3u8", dir.path().join("episode.mp4")),
                &ProgressSender::disabled(),
                &token,
            )
            .await
            .unwrap_err();

        assert!(err.is_cancelled());
    }
}
