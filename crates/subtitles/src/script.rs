//! Subtitle script model and its XML form.
//!
//! A script document looks like
//!
//! ```xml
//! <subtitle_script title="Episode 1" wrap_style="0" play_res_x="640" play_res_y="360" lang_code="enUS">
//!   <styles><style name="Default" font_name="Arial" font_size="20" .../></styles>
//!   <events><event start="0:00:01.00" end="0:00:03.00" style="Default" text="Hi"/></events>
//! </subtitle_script>
//! ```
//!
//! Every value is kept as the source text so the rendered ASS reproduces it
//! verbatim.

use serde::Deserialize;

use crate::error::{Result, SubtitleError};

/// Script-level header fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScriptInfo {
    pub title: String,
    pub wrap_style: String,
    pub play_res_x: String,
    pub play_res_y: String,
}

/// One style row. Field order matches the ASS `[V4+ Styles]` columns.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct StyleDef {
    #[serde(rename = "@name")]
    pub name: String,
    #[serde(rename = "@font_name")]
    pub font_name: String,
    #[serde(rename = "@font_size")]
    pub font_size: String,
    #[serde(rename = "@primary_colour")]
    pub primary_colour: String,
    #[serde(rename = "@secondary_colour")]
    pub secondary_colour: String,
    #[serde(rename = "@outline_colour")]
    pub outline_colour: String,
    #[serde(rename = "@back_colour")]
    pub back_colour: String,
    #[serde(rename = "@bold")]
    pub bold: String,
    #[serde(rename = "@italic")]
    pub italic: String,
    #[serde(rename = "@underline")]
    pub underline: String,
    #[serde(rename = "@strikeout")]
    pub strikeout: String,
    #[serde(rename = "@scale_x")]
    pub scale_x: String,
    #[serde(rename = "@scale_y")]
    pub scale_y: String,
    #[serde(rename = "@spacing")]
    pub spacing: String,
    #[serde(rename = "@angle")]
    pub angle: String,
    #[serde(rename = "@border_style")]
    pub border_style: String,
    #[serde(rename = "@outline")]
    pub outline: String,
    #[serde(rename = "@shadow")]
    pub shadow: String,
    #[serde(rename = "@alignment")]
    pub alignment: String,
    #[serde(rename = "@margin_l")]
    pub margin_l: String,
    #[serde(rename = "@margin_r")]
    pub margin_r: String,
    #[serde(rename = "@margin_v")]
    pub margin_v: String,
    #[serde(rename = "@encoding")]
    pub encoding: String,
}

impl StyleDef {
    /// Column values in ASS order.
    pub fn columns(&self) -> [&str; 23] {
        [
            &self.name,
            &self.font_name,
            &self.font_size,
            &self.primary_colour,
            &self.secondary_colour,
            &self.outline_colour,
            &self.back_colour,
            &self.bold,
            &self.italic,
            &self.underline,
            &self.strikeout,
            &self.scale_x,
            &self.scale_y,
            &self.spacing,
            &self.angle,
            &self.border_style,
            &self.outline,
            &self.shadow,
            &self.alignment,
            &self.margin_l,
            &self.margin_r,
            &self.margin_v,
            &self.encoding,
        ]
    }
}

/// One dialogue event. The ASS layer column is always `0`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct EventDef {
    #[serde(rename = "@start")]
    pub start: String,
    #[serde(rename = "@end")]
    pub end: String,
    #[serde(rename = "@style")]
    pub style: String,
    #[serde(rename = "@name")]
    pub name: String,
    #[serde(rename = "@margin_l")]
    pub margin_l: String,
    #[serde(rename = "@margin_r")]
    pub margin_r: String,
    #[serde(rename = "@margin_v")]
    pub margin_v: String,
    #[serde(rename = "@effect")]
    pub effect: String,
    #[serde(rename = "@text")]
    pub text: String,
}

impl EventDef {
    /// Column values in ASS order, after the layer.
    pub fn columns(&self) -> [&str; 9] {
        [
            &self.start,
            &self.end,
            &self.style,
            &self.name,
            &self.margin_l,
            &self.margin_r,
            &self.margin_v,
            &self.effect,
            &self.text,
        ]
    }
}

/// A fully decoded subtitle track for one locale.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubtitleTrack {
    pub id: String,
    /// Compact locale code such as `enUS`.
    pub locale: String,
    pub title: String,
    pub script: ScriptInfo,
    pub styles: Vec<StyleDef>,
    pub events: Vec<EventDef>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ScriptDocument {
    #[serde(rename = "@title")]
    title: String,
    #[serde(rename = "@wrap_style")]
    wrap_style: String,
    #[serde(rename = "@play_res_x")]
    play_res_x: String,
    #[serde(rename = "@play_res_y")]
    play_res_y: String,
    #[serde(rename = "@lang_code")]
    lang_code: String,
    styles: StyleList,
    events: EventList,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct StyleList {
    style: Vec<StyleDef>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct EventList {
    event: Vec<EventDef>,
}

/// Parse a `<subtitle_script>` document.
///
/// The returned track carries the document's `lang_code` as locale; id and
/// title are left for the caller, who knows them from the config reference.
pub fn parse_script(xml: &str) -> Result<SubtitleTrack> {
    let doc: ScriptDocument = quick_xml::de::from_str(xml)
        .map_err(|e| SubtitleError::unavailable(format!("invalid subtitle script: {e}")))?;

    Ok(SubtitleTrack {
        id: String::new(),
        locale: doc.lang_code,
        title: doc.title.clone(),
        script: ScriptInfo {
            title: doc.title,
            wrap_style: doc.wrap_style,
            play_res_x: doc.play_res_x,
            play_res_y: doc.play_res_y,
        },
        styles: doc.styles.style,
        events: doc.events.event,
    })
}
