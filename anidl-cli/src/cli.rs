use std::path::PathBuf;

use clap::Parser;
use hls::QualityRequest;

use crate::config::SubType;
use crate::episodes::EpisodeFilter;

#[derive(Parser, Debug)]
#[command(name = "anidl")]
#[command(about = "Download anime episodes with hard or soft subtitles")]
#[command(version)]
pub struct Args {
    /// Player config documents (URLs or local files), one per episode
    #[arg(required = true, value_name = "SOURCE")]
    pub sources: Vec<String>,

    /// Configuration file path
    #[arg(short, long, env = "ANIDL_CONFIG")]
    pub config: Option<PathBuf>,

    /// Video quality: auto, 240p, 360p, 480p, 720p, 1080p...
    #[arg(long, value_name = "QUALITY")]
    pub quality: Option<QualityRequest>,

    /// Fail instead of falling back to a lower quality
    #[arg(long)]
    pub no_fallback: bool,

    /// Episodes to download, e.g. `all` or `1-3,5`
    #[arg(short, long, value_name = "RANGE")]
    pub episodes: Option<EpisodeFilter>,

    /// Subtitle languages: `all`, `none` or a list such as `enUS,deDE`
    #[arg(short, long, value_delimiter = ',')]
    pub languages: Option<Vec<String>>,

    /// Burned-in or separate subtitle tracks
    #[arg(short = 's', long, value_enum)]
    pub sub_type: Option<SubType>,

    /// Only download the subtitles
    #[arg(long)]
    pub subs_only: bool,

    /// Keep subtitles as separate files instead of muxing them
    #[arg(long)]
    pub no_mux: bool,

    /// Keep the temporary directory after the run
    #[arg(long)]
    pub keep_temp: bool,

    /// Overwrite existing output files
    #[arg(long)]
    pub overwrite: bool,

    /// Output directory
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Output name template (:series, :name, :epname, :ep, :resolution, :subType)
    #[arg(short = 't', long)]
    pub output_template: Option<String>,

    /// Directory for intermediate files
    #[arg(long)]
    pub temp_dir: Option<PathBuf>,

    /// ffmpeg output arguments
    #[arg(long, allow_hyphen_values = true, value_name = "ARGS")]
    pub ffmpeg_args: Option<String>,

    /// Session id sent with every request
    #[arg(long, env = "ANIDL_SESSION_ID")]
    pub session_id: Option<String>,

    /// The session has premium access
    #[arg(long)]
    pub premium: bool,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Suppress all output except errors
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Also write logs to daily files in this directory
    #[arg(long)]
    pub log_dir: Option<PathBuf>,
}
