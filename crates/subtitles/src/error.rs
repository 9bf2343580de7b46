use thiserror::Error;

pub type Result<T> = std::result::Result<T, SubtitleError>;

/// Errors raised while extracting or writing subtitles.
#[derive(Debug, Error)]
pub enum SubtitleError {
    #[error("subtitle source unavailable: {reason}")]
    SubtitleSourceUnavailable { reason: String },

    #[error("media has no subtitle tracks")]
    NoSubtitleTracks,

    #[error("failed to decode subtitle {id}: {reason}")]
    Decode { id: String, reason: String },

    #[error("subtitle I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SubtitleError {
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::SubtitleSourceUnavailable {
            reason: reason.into(),
        }
    }

    pub fn decode(id: impl Into<String>, reason: impl ToString) -> Self {
        Self::Decode {
            id: id.into(),
            reason: reason.to_string(),
        }
    }

    /// Whether the caller may carry on without subtitles.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::NoSubtitleTracks)
    }
}
