//! ASS script rendering.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::Result;
use crate::locale;
use crate::script::SubtitleTrack;

const STYLE_FORMAT: &str = "Format: Name, Fontname, Fontsize, PrimaryColour, SecondaryColour, \
OutlineColour, BackColour, Bold, Italic, Underline, StrikeOut, ScaleX, ScaleY, Spacing, Angle, \
BorderStyle, Outline, Shadow, Alignment, MarginL, MarginR, MarginV, Encoding";

const EVENT_FORMAT: &str =
    "Format: Layer, Start, End, Style, Name, MarginL, MarginR, MarginV, Effect, Text";

/// A subtitle script written to disk, ready for muxing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedSubtitle {
    pub path: PathBuf,
    pub title: String,
    /// ISO 639-2/T language code.
    pub language: String,
}

/// Serialize a track as an Advanced SubStation Alpha script.
pub fn render(track: &SubtitleTrack) -> String {
    let mut lines = Vec::with_capacity(track.styles.len() + track.events.len() + 12);

    lines.push("[Script Info]".to_string());
    lines.push(format!("Title: {}", track.script.title));
    lines.push("ScriptType: v4.00+".to_string());
    lines.push(format!("WrapStyle: {}", track.script.wrap_style));
    lines.push(format!("PlayResX: {}", track.script.play_res_x));
    lines.push(format!("PlayResY: {}", track.script.play_res_y));
    lines.push(String::new());

    lines.push("[V4+ Styles]".to_string());
    lines.push(STYLE_FORMAT.to_string());
    lines.extend(
        track
            .styles
            .iter()
            .map(|style| format!("Style: {}", style.columns().join(","))),
    );
    lines.push(String::new());

    lines.push("[Events]".to_string());
    lines.push(EVENT_FORMAT.to_string());
    lines.extend(
        track
            .events
            .iter()
            .map(|event| format!("Dialogue: 0,{}", event.columns().join(","))),
    );

    let mut script = lines.join("\n");
    script.push('\n');
    script
}

/// Render `tracks` into `dir` as `<locale>.ass` files.
///
/// The returned list keeps the order of `tracks`. Tracks sharing a locale
/// get the subtitle id appended to their file name.
pub async fn write_tracks(dir: &Path, tracks: &[SubtitleTrack]) -> Result<Vec<RenderedSubtitle>> {
    tokio::fs::create_dir_all(dir).await?;

    let mut used = HashSet::new();
    let mut rendered = Vec::with_capacity(tracks.len());

    for track in tracks {
        let stem = if track.locale.is_empty() {
            format!("subtitle-{}", track.id)
        } else {
            track.locale.clone()
        };
        let stem = if used.insert(stem.clone()) {
            stem
        } else {
            let unique = format!("{stem}-{}", track.id);
            used.insert(unique.clone());
            unique
        };

        let path = dir.join(format!("{stem}.ass"));
        tokio::fs::write(&path, render(track)).await?;
        debug!("Wrote subtitle {}", path.display());

        rendered.push(RenderedSubtitle {
            path,
            title: track.title.clone(),
            language: locale::language_code(&track.locale).to_string(),
        });
    }

    Ok(rendered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::parse_script;
    use crate::script::tests::SCRIPT;

    #[test]
    fn test_render_full_script() {
        let track = parse_script(SCRIPT).unwrap();
        let expected = "[Script Info]
Title: Episode 1 - English
ScriptType: v4.00+
WrapStyle: 0
PlayResX: 640
PlayResY: 360

[V4+ Styles]
Format: Name, Fontname, Fontsize, PrimaryColour, SecondaryColour, OutlineColour, BackColour, Bold, Italic, Underline, StrikeOut, ScaleX, ScaleY, Spacing, Angle, BorderStyle, Outline, Shadow, Alignment, MarginL, MarginR, MarginV, Encoding
Style: Default,Arial,20,&H00FFFFFF,&H0000FFFF,&H00000000,&H7F404040,0,0,0,0,100,100,0,0,1,2,1,2,0010,0010,0018,1
Style: Sign,Verdana,16,&H00FFFFFF,&H0000FFFF,&H00000000,&H00000000,-1,0,0,0,100,100,0,0,1,1,0,8,0010,0010,0010,1

[Events]
Format: Layer, Start, End, Style, Name, MarginL, MarginR, MarginV, Effect, Text
Dialogue: 0,0:00:01.00,0:00:03.50,Default,,0000,0000,0000,,Hello, world
Dialogue: 0,0:00:04.00,0:00:06.00,Sign,Narrator,0000,0000,0000,,{\\i1}Later{\\i0}\\NThat day
Dialogue: 0,0:00:07.00,0:00:08.00,Default,,0000,0000,0000,,Fish & chips
";
        assert_eq!(render(&track), expected);
    }

    #[test]
    fn test_render_counts_match_source() {
        let mut track = parse_script(SCRIPT).unwrap();
        track.events.truncate(1);
        track.styles.clear();

        let output = render(&track);
        assert_eq!(output.lines().filter(|l| l.starts_with("Style: ")).count(), 0);
        assert_eq!(output.lines().filter(|l| l.starts_with("Dialogue: ")).count(), 1);
        assert!(output.contains("[V4+ Styles]\nFormat: "));
    }

    #[tokio::test]
    async fn test_write_tracks() {
        let dir = tempfile::tempdir().unwrap();
        let mut english = parse_script(SCRIPT).unwrap();
        english.id = "9".to_string();
        english.title = "English (US)".to_string();
        let mut german = english.clone();
        german.id = "10".to_string();
        german.locale = "deDE".to_string();
        german.title = "Deutsch".to_string();
        let mut english_signs = english.clone();
        english_signs.id = "11".to_string();

        let rendered = write_tracks(dir.path(), &[english.clone(), german, english_signs])
            .await
            .unwrap();

        let names: Vec<_> = rendered
            .iter()
            .map(|r| r.path.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["enUS.ass", "deDE.ass", "enUS-11.ass"]);
        assert_eq!(rendered[0].language, "eng");
        assert_eq!(rendered[1].language, "deu");
        assert_eq!(rendered[1].title, "Deutsch");

        let written = std::fs::read_to_string(&rendered[0].path).unwrap();
        assert_eq!(written, render(&english));
    }
}
