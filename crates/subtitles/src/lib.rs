//! Subtitle extraction and ASS rendering.
//!
//! A player config document ([`MediaConfig`]) references one subtitle track
//! per locale. [`SubtitleExtractor`] resolves those references into
//! [`SubtitleTrack`]s, decoding encoded payloads where needed, and
//! [`render`] turns a track into an Advanced SubStation Alpha script.

pub mod config;
pub mod decode;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod locale;
pub mod render;
pub mod script;

pub use config::{MediaConfig, MediaMetadata, SubtitleRef};
pub use error::SubtitleError;
pub use extract::{LocaleSelection, SubtitleExtractor, filter_locales};
pub use fetch::{SessionContext, SubtitleFetcher};
pub use locale::Locale;
pub use render::{RenderedSubtitle, render, write_tracks};
pub use script::{EventDef, ScriptInfo, StyleDef, SubtitleTrack};
