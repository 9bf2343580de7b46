//! mkvmerge muxing.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use process_utils::{OutputStream, tokio_command};
use serde::{Deserialize, Serialize};
use subtitles::RenderedSubtitle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{EngineError, Result};
use crate::progress::{ProgressEvent, ProgressSender, ProgressStage, parse_mkvmerge_progress};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MuxerConfig {
    /// Path or name of the mkvmerge binary.
    pub binary_path: String,
    /// Replace an existing output instead of skipping the job.
    pub overwrite: bool,
}

impl Default for MuxerConfig {
    fn default() -> Self {
        Self {
            binary_path: "mkvmerge".to_string(),
            overwrite: false,
        }
    }
}

/// One video plus the subtitle tracks to attach, in track order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MuxJob {
    pub video_path: PathBuf,
    pub output_path: PathBuf,
    pub tracks: Vec<RenderedSubtitle>,
}

impl MuxJob {
    /// The file actually written: `output_path` with an `mkv` extension.
    pub fn target_path(&self) -> PathBuf {
        self.output_path.with_extension("mkv")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MuxOutcome {
    Muxed { path: PathBuf },
    /// The target already existed and overwriting is disabled.
    Skipped { path: PathBuf },
}

impl MuxOutcome {
    pub fn path(&self) -> &Path {
        match self {
            Self::Muxed { path } | Self::Skipped { path } => path,
        }
    }
}

/// Combines a video with subtitle tracks into a Matroska file.
#[async_trait]
pub trait Muxer: Send + Sync {
    async fn mux(
        &self,
        job: MuxJob,
        progress: &ProgressSender,
        cancel: &CancellationToken,
    ) -> Result<MuxOutcome>;
}

pub struct MkvmergeMuxer {
    config: MuxerConfig,
}

impl MkvmergeMuxer {
    pub fn new() -> Self {
        Self::with_config(MuxerConfig::default())
    }

    pub fn with_config(config: MuxerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &MuxerConfig {
        &self.config
    }

    /// Build mkvmerge arguments. The first track is flagged as default.
    pub fn build_args(job: &MuxJob, output: &Path) -> Vec<String> {
        let mut args = vec![
            "--output".to_string(),
            output.to_string_lossy().into_owned(),
            job.video_path.to_string_lossy().into_owned(),
        ];

        for (index, track) in job.tracks.iter().enumerate() {
            let default = if index == 0 { "yes" } else { "no" };
            args.extend([
                "--track-name".to_string(),
                format!("0:{}", track.title),
                "--language".to_string(),
                format!("0:{}", track.language),
                "--default-track".to_string(),
                format!("0:{default}"),
                "--sub-charset".to_string(),
                "0:UTF-8".to_string(),
                track.path.to_string_lossy().into_owned(),
            ]);
        }

        args
    }
}

impl Default for MkvmergeMuxer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Muxer for MkvmergeMuxer {
    async fn mux(
        &self,
        job: MuxJob,
        progress: &ProgressSender,
        cancel: &CancellationToken,
    ) -> Result<MuxOutcome> {
        let target = job.target_path();

        if !self.config.overwrite && tokio::fs::try_exists(&target).await? {
            info!("{} already exists, skipping mux", target.display());
            return Ok(MuxOutcome::Skipped { path: target });
        }

        if let Some(parent) = target.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }

        let args = Self::build_args(&job, &target);
        debug!("Running {} {:?}", self.config.binary_path, args);

        let label = target
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let mut command = tokio_command(&self.config.binary_path);
        command.args(&args);

        let output = process_utils::run_streaming(command, cancel, |stream, line| {
            if stream == OutputStream::Stdout
                && let Some(percent) = parse_mkvmerge_progress(line)
            {
                progress.emit(ProgressEvent::new(ProgressStage::Mux, &label).with_percent(percent));
            }
        })
        .await?;

        if !output.success() {
            warn!(
                "mkvmerge exited with {:?} for {}",
                output.exit_code,
                target.display()
            );
            return Err(EngineError::MuxProcessFailed {
                exit_code: output.exit_code,
                stderr: output.diagnostics(),
            });
        }

        info!(
            "Muxed {} subtitle tracks into {} in {:.1}s",
            job.tracks.len(),
            target.display(),
            output.duration.as_secs_f64()
        );
        Ok(MuxOutcome::Muxed { path: target })
    }
}
