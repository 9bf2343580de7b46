//! Resolving subtitle references into tracks.

use futures::future::try_join_all;
use tracing::{debug, info};

use crate::config::{MediaConfig, SubtitleRef};
use crate::decode::{decode_document, decode_payload};
use crate::error::{Result, SubtitleError};
use crate::fetch::{SessionContext, SubtitleFetcher};
use crate::locale;
use crate::script::{SubtitleTrack, parse_script};

/// Extracts every subtitle track of a media config.
pub struct SubtitleExtractor<'a> {
    fetcher: &'a dyn SubtitleFetcher,
}

impl<'a> SubtitleExtractor<'a> {
    pub fn new(fetcher: &'a dyn SubtitleFetcher) -> Self {
        Self { fetcher }
    }

    /// Resolve all tracks of `config`, in config order.
    ///
    /// Tracks are fetched concurrently; the first failure fails the whole
    /// extraction. A config without subtitle references yields
    /// [`SubtitleError::NoSubtitleTracks`].
    pub async fn extract(
        &self,
        config: &MediaConfig,
        ctx: &SessionContext,
    ) -> Result<Vec<SubtitleTrack>> {
        if config.subtitles.is_empty() {
            return Err(SubtitleError::NoSubtitleTracks);
        }

        let tracks = try_join_all(
            config
                .subtitles
                .iter()
                .map(|reference| self.resolve(reference, ctx)),
        )
        .await?;

        info!(
            media_id = %config.media_id,
            "Extracted {} subtitle tracks",
            tracks.len()
        );
        Ok(tracks)
    }

    async fn resolve(&self, reference: &SubtitleRef, ctx: &SessionContext) -> Result<SubtitleTrack> {
        let xml = if let Some((iv, data)) = reference.inline_payload() {
            decode_payload(&reference.id, iv, data)?
        } else if let Some(link) = reference.link.as_deref() {
            debug!(id = %reference.id, "Fetching subtitle from {}", link);
            let body = self.fetcher.fetch(link, ctx).await?;
            decode_document(&body, &reference.id)?
        } else {
            return Err(SubtitleError::unavailable(format!(
                "subtitle {} has neither a link nor an inline payload",
                reference.id
            )));
        };

        let mut track = parse_script(&xml)?;
        track.id = reference.id.clone();
        if !reference.title.is_empty() {
            track.title = reference.title.clone();
        }
        let source_locale = if reference.locale.is_empty() {
            &track.locale
        } else {
            &reference.locale
        };
        track.locale = locale::normalize(source_locale);

        Ok(track)
    }
}

/// Result of narrowing extracted tracks to the requested locales.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocaleSelection {
    /// Matching tracks, in requested order.
    pub selected: Vec<SubtitleTrack>,
    /// Requested locales with no matching track.
    pub missing: Vec<String>,
    /// Every locale the media offers.
    pub available: Vec<String>,
}

/// Keep the tracks whose locale is in `wanted`.
///
/// An empty `wanted` keeps every track in source order. Comparison ignores
/// separators and ASCII case; a locale requested twice is only kept once.
pub fn filter_locales(tracks: Vec<SubtitleTrack>, wanted: &[String]) -> LocaleSelection {
    let available: Vec<String> = tracks.iter().map(|t| t.locale.clone()).collect();

    if wanted.is_empty() {
        return LocaleSelection {
            selected: tracks,
            missing: Vec::new(),
            available,
        };
    }

    let mut remaining: Vec<Option<SubtitleTrack>> = tracks.into_iter().map(Some).collect();
    let mut selected = Vec::new();
    let mut missing = Vec::new();

    for requested in wanted {
        let key = locale::normalize(requested);
        let position = remaining.iter().position(|slot| {
            slot.as_ref()
                .is_some_and(|t| t.locale.eq_ignore_ascii_case(&key))
        });

        match position.and_then(|i| remaining[i].take()) {
            Some(track) => selected.push(track),
            None => {
                let already = selected
                    .iter()
                    .any(|t: &SubtitleTrack| t.locale.eq_ignore_ascii_case(&key));
                if !already {
                    missing.push(requested.clone());
                }
            }
        }
    }

    LocaleSelection {
        selected,
        missing,
        available,
    }
}
