//! Per-episode pipeline.
//!
//! Each source is a player config document. For every episode the
//! orchestrator resolves the stream variant and downloads it into the work
//! directory. With hard subtitles the finished file is moved to the output
//! directory as is; with soft subtitles the download runs next to the
//! subtitle rendering and the two are muxed. Nothing reaches the output
//! directory before it is complete. Episodes run one after another; a
//! failing episode is recorded and the batch moves on.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anidl_engine::{DownloadOutcome, DownloadRequest, MuxJob, Muxer, ProgressSender, VideoDownloader};
use hls::{ResolutionSelector, Selection};
use subtitles::{
    MediaConfig, RenderedSubtitle, SessionContext, SubtitleExtractor, SubtitleFetcher,
    filter_locales, write_tracks,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::RunSettings;
use crate::error::{AppError, Result};
use crate::http::{MediaSource, is_remote};
use crate::naming::{NameFields, output_stem};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EpisodeOutcome {
    Completed { outputs: Vec<PathBuf> },
    Skipped { reason: String },
}

fn skipped(reason: impl Into<String>) -> EpisodeOutcome {
    EpisodeOutcome::Skipped {
        reason: reason.into(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EpisodeFailure {
    pub source: String,
    pub error: String,
}

/// What happened to each source of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub completed: Vec<String>,
    pub skipped: Vec<String>,
    pub failed: Vec<EpisodeFailure>,
    /// Files written to the output directory.
    pub outputs: Vec<PathBuf>,
    pub cancelled: bool,
}

impl RunSummary {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty() && !self.cancelled
    }
}

pub struct Orchestrator {
    source: Arc<dyn MediaSource>,
    fetcher: Arc<dyn SubtitleFetcher>,
    downloader: Arc<dyn VideoDownloader>,
    muxer: Arc<dyn Muxer>,
    settings: RunSettings,
    ctx: SessionContext,
    progress: ProgressSender,
    cancel: CancellationToken,
}

impl Orchestrator {
    pub fn new(
        source: Arc<dyn MediaSource>,
        fetcher: Arc<dyn SubtitleFetcher>,
        downloader: Arc<dyn VideoDownloader>,
        muxer: Arc<dyn Muxer>,
        settings: RunSettings,
        ctx: SessionContext,
    ) -> Self {
        Self {
            source,
            fetcher,
            downloader,
            muxer,
            settings,
            ctx,
            progress: ProgressSender::disabled(),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_progress(mut self, progress: ProgressSender) -> Self {
        self.progress = progress;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Process every source in order, then remove the work directory.
    pub async fn run(&self, sources: &[String]) -> RunSummary {
        let mut summary = RunSummary::default();

        for (index, source) in sources.iter().enumerate() {
            if self.cancel.is_cancelled() {
                summary.cancelled = true;
                break;
            }

            info!("[{}/{}] Processing {}", index + 1, sources.len(), source);

            let result = tokio::select! {
                _ = self.cancel.cancelled() => Err(AppError::Cancelled),
                result = self.process_episode(source) => result,
            };

            match result {
                Ok(EpisodeOutcome::Completed { outputs }) => {
                    for output in &outputs {
                        info!("Saved {}", output.display());
                    }
                    summary.completed.push(source.clone());
                    summary.outputs.extend(outputs);
                }
                Ok(EpisodeOutcome::Skipped { reason }) => {
                    info!(source = %source, "Skipped: {reason}");
                    summary.skipped.push(source.clone());
                }
                Err(e) if e.is_cancelled() || self.cancel.is_cancelled() => {
                    warn!("Cancelled while processing {source}");
                    summary.cancelled = true;
                    break;
                }
                Err(e) => {
                    error!(source = %source, "Episode failed: {e}");
                    summary.failed.push(EpisodeFailure {
                        source: source.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }

        self.cleanup().await;
        summary
    }

    async fn process_episode(&self, source: &str) -> Result<EpisodeOutcome> {
        let text = self.source.fetch_text(source, &self.ctx).await?;
        let config = MediaConfig::parse(&text)?;
        let metadata = &config.metadata;

        if !self.settings.episodes.matches(&metadata.episode_number) {
            return Ok(skipped(format!(
                "episode {} is outside the requested range",
                metadata.episode_number
            )));
        }

        if metadata.premium_only && !self.ctx.premium {
            warn!(media_id = %config.media_id, "Media requires a premium account");
            return Ok(skipped("premium only"));
        }

        if self.settings.subs_only {
            return self.subtitles_only(&config).await;
        }

        let stream_url = config
            .stream_url
            .as_deref()
            .ok_or_else(|| AppError::NoStream(config.media_id.clone()))?;
        let selection = self.select_variant(stream_url).await?;
        let stem = self.stem_for(&config, Some(selection.height));

        if self.settings.wants_soft_subtitles() {
            self.soft_subtitled(&config, &selection, &stem).await
        } else {
            self.direct(&config, &selection, &stem).await
        }
    }

    async fn select_variant(&self, stream_url: &str) -> Result<Selection> {
        let text = self.source.fetch_text(stream_url, &self.ctx).await?;
        let manifest = if is_remote(stream_url) {
            hls::parse_with_base(&text, stream_url)?
        } else {
            hls::parse(&text)?
        };

        let selector = ResolutionSelector::new(self.settings.auto_fallback);
        debug!(available = ?selector.available_heights(&manifest), "Parsed manifest");

        let selection = selector.select(&manifest, self.settings.quality)?;
        if let Some(warning) = selection.warning {
            warn!("{warning}");
        }
        info!("Selected {}p variant", selection.height);
        Ok(selection)
    }

    fn stem_for(&self, config: &MediaConfig, height: Option<u32>) -> String {
        let metadata = &config.metadata;
        let collection = if metadata.collection_title.is_empty() {
            &metadata.series_title
        } else {
            &metadata.collection_title
        };

        output_stem(
            &self.settings.output_template,
            &NameFields {
                series: &metadata.series_title,
                collection,
                episode_title: &metadata.episode_title,
                episode_number: &metadata.episode_number,
                height,
                sub_type: self.settings.sub_type,
            },
        )
    }

    fn download_request(&self, uri: &str, output: &Path) -> DownloadRequest {
        let request = DownloadRequest::new(uri, output);
        match self.ctx.session_id.as_deref() {
            Some(session_id) => request.with_header("Cookie", format!("session_id={session_id}")),
            None => request,
        }
    }

    fn media_dir(&self, config: &MediaConfig) -> PathBuf {
        self.settings
            .temp_dir
            .join(format!("media-{}", config.media_id))
    }

    fn subs_dir(&self, config: &MediaConfig) -> PathBuf {
        self.settings
            .temp_dir
            .join(format!("subs-{}", config.media_id))
    }

    /// Hard subtitles or no subtitles: the finished download is the output.
    async fn direct(
        &self,
        config: &MediaConfig,
        selection: &Selection,
        stem: &str,
    ) -> Result<EpisodeOutcome> {
        let target = self.settings.output_dir.join(format!("{stem}.mp4"));

        if !self.settings.overwrite && tokio::fs::try_exists(&target).await? {
            return Ok(skipped(format!("{} already exists", target.display())));
        }

        let staging = self.media_dir(config).join(format!("{stem}.mp4"));
        remove_stale(&staging).await?;

        let request = self.download_request(&selection.variant.uri, &staging);
        let outcome = self
            .downloader
            .download(request, &self.progress, &self.cancel)
            .await?;
        if let DownloadOutcome::Downloaded { bytes, .. } = &outcome {
            debug!("Downloaded {bytes} bytes");
        }

        move_file(outcome.path(), &target).await?;
        Ok(EpisodeOutcome::Completed {
            outputs: vec![target],
        })
    }

    async fn soft_subtitled(
        &self,
        config: &MediaConfig,
        selection: &Selection,
        stem: &str,
    ) -> Result<EpisodeOutcome> {
        let output_dir = &self.settings.output_dir;
        let video_target = output_dir.join(format!("{stem}.mp4"));
        let final_target = if self.settings.mux {
            output_dir.join(format!("{stem}.mkv"))
        } else {
            video_target.clone()
        };

        if !self.settings.overwrite && tokio::fs::try_exists(&final_target).await? {
            return Ok(skipped(format!("{} already exists", final_target.display())));
        }

        let media_dir = self.media_dir(config);
        let subs_dir = self.subs_dir(config);

        let staging = media_dir.join(format!("{stem}.mp4"));
        remove_stale(&staging).await?;
        let request = self.download_request(&selection.variant.uri, &staging);

        // A subtitle failure drops the download future, which stops ffmpeg.
        let (video, tracks) = tokio::try_join!(
            async {
                self.downloader
                    .download(request, &self.progress, &self.cancel)
                    .await
                    .map_err(AppError::from)
            },
            self.prepare_subtitles(config, &subs_dir, false),
        )?;
        let video_path = video.path().to_path_buf();

        if tracks.is_empty() {
            if !self.settings.overwrite && tokio::fs::try_exists(&video_target).await? {
                return Ok(skipped(format!(
                    "no subtitle tracks to attach and {} already exists",
                    video_target.display()
                )));
            }
            info!("No subtitle tracks to attach, keeping the plain video");
            move_file(&video_path, &video_target).await?;
            return Ok(EpisodeOutcome::Completed {
                outputs: vec![video_target],
            });
        }

        if !self.settings.mux {
            move_file(&video_path, &video_target).await?;
            let mut outputs = vec![video_target];
            outputs.extend(self.place_subtitles(&tracks, stem).await?);
            return Ok(EpisodeOutcome::Completed { outputs });
        }

        let muxed_path = media_dir.join(format!("{stem}.mkv"));
        remove_stale(&muxed_path).await?;
        let job = MuxJob {
            video_path,
            output_path: muxed_path,
            tracks,
        };
        let muxed = self.muxer.mux(job, &self.progress, &self.cancel).await?;
        move_file(muxed.path(), &final_target).await?;

        Ok(EpisodeOutcome::Completed {
            outputs: vec![final_target],
        })
    }

    async fn subtitles_only(&self, config: &MediaConfig) -> Result<EpisodeOutcome> {
        // The stream is only resolved to fill `:resolution` in the name.
        let height = match config.stream_url.as_deref() {
            Some(url) => match self.select_variant(url).await {
                Ok(selection) => Some(selection.height),
                Err(e) => {
                    debug!("Stream not resolved for naming: {e}");
                    None
                }
            },
            None => None,
        };

        let stem = self.stem_for(config, height);
        let tracks = self
            .prepare_subtitles(config, &self.subs_dir(config), true)
            .await?;
        let outputs = self.place_subtitles(&tracks, &stem).await?;

        if outputs.is_empty() {
            return Ok(skipped("subtitle files already exist"));
        }
        Ok(EpisodeOutcome::Completed { outputs })
    }

    /// Extract, filter and render the requested tracks into `dir`.
    ///
    /// Outside `strict` mode a media without subtitles or without any of the
    /// requested languages yields no tracks instead of an error.
    async fn prepare_subtitles(
        &self,
        config: &MediaConfig,
        dir: &Path,
        strict: bool,
    ) -> Result<Vec<RenderedSubtitle>> {
        let extractor = SubtitleExtractor::new(self.fetcher.as_ref());

        let tracks = match extractor.extract(config, &self.ctx).await {
            Ok(tracks) => tracks,
            Err(e) if e.is_recoverable() && !strict => {
                warn!(media_id = %config.media_id, "{e}, continuing without subtitles");
                return Ok(Vec::new());
            }
            Err(e) => return Err(e.into()),
        };

        let selection = filter_locales(tracks, self.settings.languages.wanted());

        if !selection.missing.is_empty() {
            warn!(
                "Subtitles not available in {} (available: {})",
                selection.missing.join(", "),
                selection.available.join(", ")
            );
        }

        if selection.selected.is_empty() {
            if strict {
                return Err(AppError::LanguagesUnavailable {
                    requested: selection.missing,
                    available: selection.available,
                });
            }
            return Ok(Vec::new());
        }

        Ok(write_tracks(dir, &selection.selected).await?)
    }

    /// Move rendered tracks into the output directory as `<stem>.<locale>.ass`.
    async fn place_subtitles(
        &self,
        tracks: &[RenderedSubtitle],
        stem: &str,
    ) -> Result<Vec<PathBuf>> {
        let mut placed = Vec::with_capacity(tracks.len());

        for track in tracks {
            let Some(file_name) = track.path.file_name() else {
                continue;
            };
            let target = self
                .settings
                .output_dir
                .join(format!("{stem}.{}", file_name.to_string_lossy()));

            if !self.settings.overwrite && tokio::fs::try_exists(&target).await? {
                info!("{} already exists, skipping", target.display());
                continue;
            }

            move_file(&track.path, &target).await?;
            placed.push(target);
        }

        Ok(placed)
    }

    async fn cleanup(&self) {
        let dir = &self.settings.temp_dir;

        if self.settings.keep_temp {
            info!("Keeping temporary files in {}", dir.display());
            return;
        }

        match tokio::fs::remove_dir_all(dir).await {
            Ok(()) => debug!("Removed {}", dir.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to remove {}: {e}", dir.display()),
        }
    }
}

/// Remove a leftover file from an earlier attempt.
async fn remove_stale(path: &Path) -> Result<()> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {
            debug!("Removed stale {}", path.display());
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// Rename `from` to `to`, copying when they sit on different file systems.
async fn move_file(from: &Path, to: &Path) -> Result<()> {
    if let Some(parent) = to.parent()
        && !parent.as_os_str().is_empty()
    {
        tokio::fs::create_dir_all(parent).await?;
    }

    if let Err(e) = tokio::fs::rename(from, to).await {
        debug!("Rename failed ({e}), copying {}", from.display());
        tokio::fs::copy(from, to).await?;
        tokio::fs::remove_file(from).await?;
    }
    Ok(())
}
