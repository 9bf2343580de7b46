//! Application configuration.
//!
//! Values come from an optional TOML file (`~/.config/anidl/config.toml` or
//! `--config`), then command line flags override them.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anidl_engine::{DownloaderConfig, MuxerConfig};
use clap::ValueEnum;
use hls::QualityRequest;
use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;
use subtitles::Locale;
use tracing::debug;

use crate::cli::Args;
use crate::episodes::EpisodeFilter;
use crate::error::{AppError, Result};
use crate::naming::DEFAULT_TEMPLATE;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SubType {
    /// Subtitles burned into the video stream
    #[default]
    Hard,
    /// Subtitles as separate tracks muxed into an mkv
    Soft,
}

impl SubType {
    /// Capitalized form used in output names.
    pub fn title(self) -> &'static str {
        match self {
            Self::Hard => "Hard",
            Self::Soft => "Soft",
        }
    }
}

/// Which subtitle tracks to fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LanguageSelection {
    All,
    None,
    /// Compact locale codes in preference order.
    Only(Vec<String>),
}

impl LanguageSelection {
    /// Parse a language list where `all` and `none` are only valid alone.
    pub fn parse(values: &[String]) -> Result<Self> {
        let values: Vec<&str> = values
            .iter()
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
            .collect();

        match values.as_slice() {
            [] => Ok(Self::None),
            [single] if single.eq_ignore_ascii_case("all") => Ok(Self::All),
            [single] if single.eq_ignore_ascii_case("none") => Ok(Self::None),
            _ => values
                .iter()
                .map(|value| {
                    subtitles::locale::normalize(value)
                        .parse::<Locale>()
                        .map(|locale| locale.code().to_string())
                        .map_err(|_| {
                            AppError::invalid_input(format!(
                                "invalid language `{value}`, expected all, none or one of: {}",
                                supported_languages()
                            ))
                        })
                })
                .collect::<Result<Vec<_>>>()
                .map(Self::Only),
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }

    /// Locales handed to the subtitle filter; empty means every track.
    pub fn wanted(&self) -> &[String] {
        match self {
            Self::Only(locales) => locales,
            Self::All | Self::None => &[],
        }
    }
}

fn supported_languages() -> String {
    Locale::iter().map(Locale::code).collect::<Vec<_>>().join(", ")
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub quality: QualityRequest,
    /// Fall back to the nearest lower quality when the requested one is missing.
    pub auto_fallback: bool,
    pub sub_type: SubType,
    pub languages: Vec<String>,
    pub subs_only: bool,
    pub mux: bool,
    pub keep_temp: bool,
    pub overwrite: bool,
    pub output_dir: PathBuf,
    pub output_template: String,
    /// Parent of the per-run work directory; the system temp dir when unset.
    pub temp_dir: Option<PathBuf>,
    pub ffmpeg_path: String,
    pub ffmpeg_output_args: Vec<String>,
    pub mkvmerge_path: String,
    pub request_timeout_secs: u64,
    pub user_agent: String,
    pub log_dir: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            quality: QualityRequest::Auto,
            auto_fallback: true,
            sub_type: SubType::default(),
            languages: vec!["enUS".to_string()],
            subs_only: false,
            mux: true,
            keep_temp: false,
            overwrite: false,
            output_dir: PathBuf::from("."),
            output_template: DEFAULT_TEMPLATE.to_string(),
            temp_dir: None,
            ffmpeg_path: "ffmpeg".to_string(),
            ffmpeg_output_args: vec!["-c".to_string(), "copy".to_string()],
            mkvmerge_path: "mkvmerge".to_string(),
            request_timeout_secs: 30,
            user_agent: format!("anidl/{}", env!("CARGO_PKG_VERSION")),
            log_dir: None,
        }
    }
}

impl AppConfig {
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("anidl").join("config.toml"))
    }

    /// Load from `path`, or from the default location when it exists.
    ///
    /// An explicit path that cannot be read is an error; a missing default
    /// file is not.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let (path, explicit) = match path {
            Some(path) => (path.to_path_buf(), true),
            None => match Self::default_path() {
                Some(path) => (path, false),
                None => return Ok(Self::default()),
            },
        };

        if !explicit && !path.exists() {
            debug!("No config file at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let text = std::fs::read_to_string(&path).map_err(|e| {
            AppError::config(format!("failed to read {}: {e}", path.display()))
        })?;
        debug!("Loaded config from {}", path.display());
        Self::from_toml(&text)
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Apply command line overrides.
    pub fn apply_args(&mut self, args: &Args) {
        if let Some(quality) = args.quality {
            self.quality = quality;
        }
        if args.no_fallback {
            self.auto_fallback = false;
        }
        if let Some(languages) = &args.languages {
            self.languages = languages.clone();
        }
        if let Some(sub_type) = args.sub_type {
            self.sub_type = sub_type;
        }
        if args.subs_only {
            self.subs_only = true;
        }
        if args.no_mux {
            self.mux = false;
        }
        if args.keep_temp {
            self.keep_temp = true;
        }
        if args.overwrite {
            self.overwrite = true;
        }
        if let Some(dir) = &args.output_dir {
            self.output_dir = dir.clone();
        }
        if let Some(template) = &args.output_template {
            self.output_template = template.clone();
        }
        if let Some(dir) = &args.temp_dir {
            self.temp_dir = Some(dir.clone());
        }
        if let Some(ffmpeg_args) = &args.ffmpeg_args {
            self.ffmpeg_output_args = ffmpeg_args.split_whitespace().map(str::to_string).collect();
        }
        if let Some(dir) = &args.log_dir {
            self.log_dir = Some(dir.clone());
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn downloader_config(&self) -> DownloaderConfig {
        DownloaderConfig {
            binary_path: self.ffmpeg_path.clone(),
            output_args: self.ffmpeg_output_args.clone(),
            user_agent: Some(self.user_agent.clone()),
            overwrite: self.overwrite,
            ..Default::default()
        }
    }

    pub fn muxer_config(&self) -> MuxerConfig {
        MuxerConfig {
            binary_path: self.mkvmerge_path.clone(),
            overwrite: self.overwrite,
        }
    }

    /// Resolve the settings the orchestrator runs with.
    pub fn run_settings(&self, episodes: EpisodeFilter) -> Result<RunSettings> {
        let languages = LanguageSelection::parse(&self.languages)?;

        if self.subs_only && languages.is_none() {
            return Err(AppError::config(
                "--subs-only needs at least one subtitle language",
            ));
        }

        let temp_dir = self
            .temp_dir
            .clone()
            .unwrap_or_else(std::env::temp_dir)
            .join(format!("anidl-{}", std::process::id()));

        Ok(RunSettings {
            quality: self.quality,
            auto_fallback: self.auto_fallback,
            sub_type: if self.subs_only {
                SubType::Soft
            } else {
                self.sub_type
            },
            languages,
            subs_only: self.subs_only,
            mux: self.mux,
            keep_temp: self.keep_temp,
            overwrite: self.overwrite,
            output_dir: self.output_dir.clone(),
            output_template: self.output_template.clone(),
            temp_dir,
            episodes,
        })
    }
}

/// Fully resolved per-run settings.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSettings {
    pub quality: QualityRequest,
    pub auto_fallback: bool,
    pub sub_type: SubType,
    pub languages: LanguageSelection,
    pub subs_only: bool,
    pub mux: bool,
    pub keep_temp: bool,
    pub overwrite: bool,
    pub output_dir: PathBuf,
    pub output_template: String,
    /// Per-run work directory, removed at the end unless `keep_temp`.
    pub temp_dir: PathBuf,
    pub episodes: EpisodeFilter,
}

impl RunSettings {
    /// Whether subtitles are fetched as separate tracks.
    pub fn wants_soft_subtitles(&self) -> bool {
        self.sub_type == SubType::Soft && !self.languages.is_none()
    }
}
