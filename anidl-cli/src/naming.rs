//! Output file naming.
//!
//! Names come from a template such as `:name Episode :ep [:resolution]`
//! and are sanitized so they are valid on Windows, Linux and macOS.

use crate::config::SubType;

pub const DEFAULT_TEMPLATE: &str = ":name Episode :ep [:resolution] [:subType]";

/// Characters that are invalid in Windows filenames
const WINDOWS_INVALID_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Windows reserved filenames (case-insensitive)
const WINDOWS_RESERVED_NAMES: &[&str] = &[
    "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
    "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
];

/// Values substituted into a name template.
#[derive(Debug, Clone, Copy)]
pub struct NameFields<'a> {
    pub series: &'a str,
    pub collection: &'a str,
    pub episode_title: &'a str,
    pub episode_number: &'a str,
    /// Unknown when the stream was not resolved.
    pub height: Option<u32>,
    pub sub_type: SubType,
}

#[derive(Debug, Clone, Copy)]
enum Placeholder {
    Series,
    Name,
    EpisodeName,
    Episode,
    Resolution,
    SubType,
}

// `:epname` must be tried before its prefix `:ep`.
const PLACEHOLDERS: &[(&str, Placeholder)] = &[
    (":series", Placeholder::Series),
    (":name", Placeholder::Name),
    (":epname", Placeholder::EpisodeName),
    (":ep", Placeholder::Episode),
    (":resolution", Placeholder::Resolution),
    (":subType", Placeholder::SubType),
];

/// Expand every placeholder of `template` in a single pass, so values that
/// happen to contain placeholder text are left alone.
pub fn expand_template(template: &str, fields: &NameFields<'_>) -> String {
    let mut out = String::with_capacity(template.len() + 32);
    let mut rest = template;

    while let Some(pos) = rest.find(':') {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos..];

        match PLACEHOLDERS.iter().find(|(token, _)| tail.starts_with(token)) {
            Some((token, placeholder)) => {
                out.push_str(&value_for(*placeholder, fields));
                rest = &tail[token.len()..];
            }
            None => {
                out.push(':');
                rest = &tail[1..];
            }
        }
    }

    out.push_str(rest);
    out
}

fn value_for(placeholder: Placeholder, fields: &NameFields<'_>) -> String {
    match placeholder {
        Placeholder::Series => fields.series.to_string(),
        Placeholder::Name => fields.collection.to_string(),
        Placeholder::EpisodeName => fields.episode_title.to_string(),
        Placeholder::Episode if fields.episode_number.is_empty() => {
            format!("({})", fields.episode_title)
        }
        Placeholder::Episode => fields.episode_number.to_string(),
        Placeholder::Resolution => fields
            .height
            .map(|height| format!("{height}p"))
            .unwrap_or_default(),
        Placeholder::SubType => fields.sub_type.title().to_string(),
    }
}

/// Expand and sanitize a template into a file stem.
pub fn output_stem(template: &str, fields: &NameFields<'_>) -> String {
    sanitize_filename(&expand_template(template, fields))
}

/// Sanitize a string for use in filenames across all platforms.
///
/// Control characters and characters invalid on Windows become a single
/// underscore per run, leading/trailing spaces and dots are trimmed,
/// Windows reserved names get an underscore prefix and an empty result
/// becomes `unnamed`.
pub fn sanitize_filename(input: &str) -> String {
    if input.is_empty() {
        return "unnamed".to_string();
    }

    let mut result = String::with_capacity(input.len());
    let mut last_was_replacement = false;

    for c in input.chars() {
        if c.is_control() || WINDOWS_INVALID_CHARS.contains(&c) {
            if !last_was_replacement {
                result.push('_');
                last_was_replacement = true;
            }
        } else {
            result.push(c);
            last_was_replacement = false;
        }
    }

    let trimmed = result.trim_matches(|c| c == ' ' || c == '.');
    if trimmed.is_empty() {
        return "unnamed".to_string();
    }

    let upper = trimmed.to_uppercase();
    let reserved = WINDOWS_RESERVED_NAMES
        .iter()
        .any(|name| upper == *name || upper.starts_with(&format!("{name}.")));
    if reserved {
        return format!("_{trimmed}");
    }

    trimmed.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields() -> NameFields<'static> {
        NameFields {
            series: "Space Brothers",
            collection: "Space Brothers Season 1",
            episode_title: "The Moon",
            episode_number: "7",
            height: Some(720),
            sub_type: SubType::Soft,
        }
    }

    #[test]
    fn test_default_template() {
        assert_eq!(
            expand_template(DEFAULT_TEMPLATE, &fields()),
            "Space Brothers Season 1 Episode 7 [720p] [Soft]"
        );
    }

    #[test]
    fn test_all_placeholders() {
        assert_eq!(
            expand_template(":series - :ep - :epname (:resolution, :subType)", &fields()),
            "Space Brothers - 7 - The Moon (720p, Soft)"
        );
    }

    #[test]
    fn test_missing_episode_number_uses_title() {
        let fields = NameFields {
            episode_number: "",
            sub_type: SubType::Hard,
            ..fields()
        };
        assert_eq!(
            expand_template(":name :ep :subType", &fields),
            "Space Brothers Season 1 (The Moon) Hard"
        );
    }

    #[test]
    fn test_unknown_resolution_is_empty() {
        let fields = NameFields {
            height: None,
            ..fields()
        };
        assert_eq!(expand_template(":ep:resolution", &fields), "7");
    }

    #[test]
    fn test_values_are_not_reexpanded() {
        let fields = NameFields {
            episode_title: "Re:ep :series",
            ..fields()
        };
        assert_eq!(expand_template(":epname", &fields), "Re:ep :series");
    }

    #[test]
    fn test_unknown_colons_are_kept() {
        assert_eq!(expand_template("a:b :unknown", &fields()), "a:b :unknown");
    }

    #[test]
    fn test_output_stem_is_sanitized() {
        let fields = NameFields {
            collection: "Re:Zero / Part 2?",
            ..fields()
        };
        assert_eq!(
            output_stem(":name Episode :ep", &fields),
            "Re_Zero _ Part 2_ Episode 7"
        );
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename(""), "unnamed");
        assert_eq!(sanitize_filename("???"), "_");
        assert_eq!(sanitize_filename("hello?world"), "hello_world");
        assert_eq!(sanitize_filename("  hello  "), "hello");
        assert_eq!(sanitize_filename("...hello..."), "hello");
        assert_eq!(sanitize_filename("CON"), "_CON");
        assert_eq!(sanitize_filename("nul.mkv"), "_nul.mkv");
        assert_eq!(sanitize_filename("進撃の巨人?"), "進撃の巨人_");
        assert_eq!(sanitize_filename("tab\there"), "tab_here");
    }
}
