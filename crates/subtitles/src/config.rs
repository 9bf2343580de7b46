//! Player config document.
//!
//! The config describes one episode: its metadata, the master playlist
//! location and the subtitle tracks on offer. Subtitle references either
//! link to a script document or embed an encoded payload.

use serde::Deserialize;
use tracing::debug;

use crate::error::{Result, SubtitleError};

/// Episode metadata used for naming and filtering.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MediaMetadata {
    pub series_title: String,
    pub collection_title: String,
    pub episode_number: String,
    pub episode_title: String,
    pub premium_only: bool,
}

/// Reference to one subtitle track inside a player config.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SubtitleRef {
    #[serde(rename = "@id")]
    pub id: String,
    #[serde(rename = "@title")]
    pub title: String,
    #[serde(rename = "@locale")]
    pub locale: String,
    #[serde(rename = "@link")]
    pub link: Option<String>,
    #[serde(rename = "@default")]
    pub default_flag: Option<String>,
    pub iv: Option<String>,
    pub data: Option<String>,
}

impl SubtitleRef {
    pub fn is_default(&self) -> bool {
        self.default_flag.as_deref().is_some_and(flag)
    }

    /// Inline encoded payload as `(iv, data)`, if present.
    pub fn inline_payload(&self) -> Option<(&str, &str)> {
        match (&self.iv, &self.data) {
            (Some(iv), Some(data)) => Some((iv.as_str(), data.as_str())),
            _ => None,
        }
    }
}

/// A parsed player config.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MediaConfig {
    pub media_id: String,
    pub metadata: MediaMetadata,
    pub stream_url: Option<String>,
    pub subtitles: Vec<SubtitleRef>,
}

#[derive(Debug, Deserialize)]
struct ConfigDocument {
    media: MediaElement,
    #[serde(default)]
    subtitles: SubtitleList,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct MediaElement {
    #[serde(rename = "@id")]
    id: String,
    #[serde(rename = "@premium_only")]
    premium_only: String,
    series_title: String,
    collection_title: String,
    episode_number: String,
    episode_title: String,
    stream: Option<StreamElement>,
}

#[derive(Debug, Default, Deserialize)]
struct StreamElement {
    #[serde(rename = "@url")]
    url: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SubtitleList {
    subtitle: Vec<SubtitleRef>,
}

impl MediaConfig {
    pub fn parse(xml: &str) -> Result<Self> {
        let doc: ConfigDocument = quick_xml::de::from_str(xml)
            .map_err(|e| SubtitleError::unavailable(format!("invalid player config: {e}")))?;

        let media = doc.media;
        let config = Self {
            media_id: media.id,
            metadata: MediaMetadata {
                series_title: media.series_title.trim().to_string(),
                collection_title: media.collection_title.trim().to_string(),
                episode_number: media.episode_number.trim().to_string(),
                episode_title: media.episode_title.trim().to_string(),
                premium_only: flag(&media.premium_only),
            },
            stream_url: media
                .stream
                .map(|s| s.url.trim().to_string())
                .filter(|url| !url.is_empty()),
            subtitles: doc.subtitles.subtitle,
        };

        debug!(
            media_id = %config.media_id,
            subtitles = config.subtitles.len(),
            "Parsed player config"
        );
        Ok(config)
    }
}

fn flag(value: &str) -> bool {
    matches!(value.trim(), "1" | "true" | "yes")
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<config>
  <media id="123456" premium_only="0">
    <series_title>Space Brothers</series_title>
    <collection_title>Season 1</collection_title>
    <episode_number>7</episode_number>
    <episode_title>The Moon &amp; Back</episode_title>
    <stream url="https://cdn.example.com/hls/master.m3u8"/>
  </media>
  <subtitles>
    <subtitle id="9" title="English (US)" locale="en-US" link="https://cdn.example.com/subs/9.xml" default="1"/>
    <subtitle id="10" title="Deutsch" locale="de-DE">
      <iv>AAAA</iv>
      <data>BBBB</data>
    </subtitle>
  </subtitles>
</config>"#;

    #[test]
    fn test_parse_config() {
        let config = MediaConfig::parse(CONFIG).unwrap();

        assert_eq!(config.media_id, "123456");
        assert_eq!(config.metadata.series_title, "Space Brothers");
        assert_eq!(config.metadata.collection_title, "Season 1");
        assert_eq!(config.metadata.episode_number, "7");
        assert_eq!(config.metadata.episode_title, "The Moon & Back");
        assert!(!config.metadata.premium_only);
        assert_eq!(
            config.stream_url.as_deref(),
            Some("https://cdn.example.com/hls/master.m3u8")
        );

        assert_eq!(config.subtitles.len(), 2);
        let english = &config.subtitles[0];
        assert_eq!(english.locale, "en-US");
        assert_eq!(
            english.link.as_deref(),
            Some("https://cdn.example.com/subs/9.xml")
        );
        assert!(english.is_default());
        assert!(english.inline_payload().is_none());

        let german = &config.subtitles[1];
        assert!(!german.is_default());
        assert_eq!(german.inline_payload(), Some(("AAAA", "BBBB")));
    }

    #[test]
    fn test_premium_only_and_missing_subtitles() {
        let xml = r#"<config><media id="1" premium_only="1"><episode_number>2</episode_number></media></config>"#;
        let config = MediaConfig::parse(xml).unwrap();

        assert!(config.metadata.premium_only);
        assert!(config.stream_url.is_none());
        assert!(config.subtitles.is_empty());
    }

    #[test]
    fn test_missing_media_is_unavailable() {
        let err = MediaConfig::parse("<config><subtitles/></config>").unwrap_err();
        assert!(matches!(err, SubtitleError::SubtitleSourceUnavailable { .. }));
    }

    #[test]
    fn test_html_is_unavailable() {
        let err = MediaConfig::parse("<html><body>Sign in</body>").unwrap_err();
        assert!(matches!(err, SubtitleError::SubtitleSourceUnavailable { .. }));
    }
}
