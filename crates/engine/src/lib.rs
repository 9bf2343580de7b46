//! External tool engines.
//!
//! [`FfmpegDownloader`] fetches an HLS rendition into a local file and
//! [`MkvmergeMuxer`] combines a video with rendered subtitle tracks. Both
//! report progress through a [`ProgressSender`] and stop when their
//! cancellation token fires.

pub mod download;
pub mod error;
pub mod mux;
pub mod progress;

pub use download::{
    DownloadOutcome, DownloadRequest, DownloaderConfig, FfmpegDownloader, VideoDownloader,
};
pub use error::{EngineError, Result};
pub use mux::{MkvmergeMuxer, MuxJob, MuxOutcome, Muxer, MuxerConfig};
pub use progress::{ProgressEvent, ProgressSender, ProgressStage, progress_channel};
