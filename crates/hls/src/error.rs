use thiserror::Error;

/// Errors raised while reading a master playlist.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ManifestError {
    #[error("malformed manifest: {reason}")]
    MalformedManifest { reason: String },

    #[error("invalid manifest url `{url}`: {reason}")]
    InvalidUrl { url: String, reason: String },
}

impl ManifestError {
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedManifest {
            reason: reason.into(),
        }
    }

    pub fn invalid_url(url: impl Into<String>, reason: impl ToString) -> Self {
        Self::InvalidUrl {
            url: url.into(),
            reason: reason.to_string(),
        }
    }
}

/// Errors raised while choosing a rendition.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SelectionError {
    #[error("manifest has no variants to select from")]
    NoVariants,

    #[error(
        "{requested}p is not available (available: {})",
        format_heights(.available)
    )]
    ResolutionUnavailable { requested: u32, available: Vec<u32> },
}

/// A quality string that is neither `auto` nor a positive height.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("invalid quality `{0}`, expected `auto` or a height such as `720p`")]
pub struct QualityParseError(pub String);

fn format_heights(heights: &[u32]) -> String {
    heights
        .iter()
        .map(|h| format!("{h}p"))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unavailable_message_lists_heights() {
        let err = SelectionError::ResolutionUnavailable {
            requested: 1080,
            available: vec![360, 480, 720],
        };
        assert_eq!(
            err.to_string(),
            "1080p is not available (available: 360p, 480p, 720p)"
        );
    }
}
