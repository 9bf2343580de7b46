//! Master playlist parsing.
//!
//! Only the variant stream declarations (`#EXT-X-STREAM-INF`) are of
//! interest here. I-frame only renditions are ignored and every remaining
//! variant must declare a well formed `RESOLUTION`.

use m3u8_rs::{MasterPlaylist, Playlist};
use tracing::debug;
use url::Url;

use crate::error::ManifestError;

/// One rendition declared by a master playlist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variant {
    pub width: u32,
    pub height: u32,
    /// Media playlist location, absolute once resolved against a base url.
    pub uri: String,
    /// Peak bandwidth in bits per second, when declared.
    pub bandwidth: Option<u64>,
    pub codecs: Option<String>,
}

impl Variant {
    pub fn new(width: u32, height: u32, uri: impl Into<String>) -> Self {
        Self {
            width,
            height,
            uri: uri.into(),
            bandwidth: None,
            codecs: None,
        }
    }
}

/// The ordered variants of a master playlist.
///
/// Document order is preserved; it decides ties between variants sharing a
/// height.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Manifest {
    variants: Vec<Variant>,
}

impl Manifest {
    pub fn new(variants: Vec<Variant>) -> Self {
        Self { variants }
    }

    pub fn variants(&self) -> &[Variant] {
        &self.variants
    }

    pub fn len(&self) -> usize {
        self.variants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variants.is_empty()
    }

    /// Distinct heights, ascending.
    pub fn heights(&self) -> Vec<u32> {
        let mut heights: Vec<u32> = self.variants.iter().map(|v| v.height).collect();
        heights.sort_unstable();
        heights.dedup();
        heights
    }
}

impl FromIterator<Variant> for Manifest {
    fn from_iter<T: IntoIterator<Item = Variant>>(iter: T) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

/// Parse a master playlist, keeping variant uris exactly as written.
pub fn parse(text: &str) -> Result<Manifest, ManifestError> {
    let declared = scan_stream_declarations(text)?;
    let playlist = m3u8_rs::parse_playlist_res(text.as_bytes())
        .map_err(|e| ManifestError::malformed(format!("unparsable playlist: {e}")))?;

    match playlist {
        Playlist::MasterPlaylist(pl) => from_master(pl, declared),
        Playlist::MediaPlaylist(_) => Err(ManifestError::malformed(
            "expected a master playlist, found a media playlist",
        )),
    }
}

/// Parse a master playlist and resolve relative variant uris against
/// `base_url`, normally the location the playlist was fetched from.
pub fn parse_with_base(text: &str, base_url: &str) -> Result<Manifest, ManifestError> {
    let base = Url::parse(base_url).map_err(|e| ManifestError::invalid_url(base_url, e))?;
    let mut manifest = parse(text)?;

    for variant in &mut manifest.variants {
        let resolved = base
            .join(&variant.uri)
            .map_err(|e| ManifestError::invalid_url(variant.uri.as_str(), e))?;
        variant.uri = resolved.to_string();
    }

    Ok(manifest)
}

const STREAM_INF_TAG: &str = "#EXT-X-STREAM-INF:";

/// Split an attribute list on commas outside quoted strings.
fn split_attributes(list: &str) -> impl Iterator<Item = (&str, &str)> {
    let mut in_quotes = false;
    list.split(move |c| {
        if c == '"' {
            in_quotes = !in_quotes;
        }
        c == ',' && !in_quotes
    })
    .filter_map(|attr| attr.split_once('='))
    .map(|(key, value)| (key.trim(), value.trim()))
}

fn is_decimal_u32(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()) && s.parse::<u32>().is_ok()
}

/// Check every `#EXT-X-STREAM-INF` line and count them.
///
/// The playlist parser drops a declaration whose attributes it cannot read
/// and pairs the following uri with the wrong stream, so a bad `RESOLUTION`
/// has to be caught on the raw text.
fn scan_stream_declarations(text: &str) -> Result<usize, ManifestError> {
    let mut declared = 0;

    for (index, line) in text.lines().enumerate() {
        let Some(attributes) = line.trim().strip_prefix(STREAM_INF_TAG) else {
            continue;
        };
        declared += 1;

        let resolution = split_attributes(attributes)
            .find(|(key, _)| *key == "RESOLUTION")
            .map(|(_, value)| value);

        if let Some(value) = resolution {
            let well_formed = value
                .split_once('x')
                .is_some_and(|(w, h)| is_decimal_u32(w) && is_decimal_u32(h));
            if !well_formed {
                return Err(ManifestError::malformed(format!(
                    "line {}: invalid RESOLUTION `{value}`",
                    index + 1
                )));
            }
        }
    }

    Ok(declared)
}

fn from_master(playlist: MasterPlaylist, declared: usize) -> Result<Manifest, ManifestError> {
    let mut variants = Vec::with_capacity(playlist.variants.len());

    for stream in playlist.variants.into_iter().filter(|v| !v.is_i_frame) {
        let Some(resolution) = stream.resolution else {
            return Err(ManifestError::malformed(format!(
                "variant `{}` declares no RESOLUTION",
                stream.uri
            )));
        };

        let (Ok(width), Ok(height)) = (
            u32::try_from(resolution.width),
            u32::try_from(resolution.height),
        ) else {
            return Err(ManifestError::malformed(format!(
                "variant `{}` has an out of range resolution {}x{}",
                stream.uri, resolution.width, resolution.height
            )));
        };

        if height == 0 {
            return Err(ManifestError::malformed(format!(
                "variant `{}` has a zero height",
                stream.uri
            )));
        }

        variants.push(Variant {
            width,
            height,
            uri: stream.uri,
            bandwidth: (stream.bandwidth > 0).then_some(stream.bandwidth),
            codecs: stream.codecs,
        });
    }

    if variants.is_empty() {
        return Err(ManifestError::malformed("no variant streams declared"));
    }

    if variants.len() != declared {
        return Err(ManifestError::malformed(format!(
            "{declared} variant streams declared but {} could be read",
            variants.len()
        )));
    }

    debug!("Parsed master playlist with {} variants", variants.len());
    Ok(Manifest::new(variants))
}
