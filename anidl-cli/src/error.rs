use thiserror::Error;

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Manifest error: {0}")]
    Manifest(#[from] hls::ManifestError),

    #[error("Selection error: {0}")]
    Selection(#[from] hls::SelectionError),

    #[error("Subtitle error: {0}")]
    Subtitle(#[from] subtitles::SubtitleError),

    #[error("Engine error: {0}")]
    Engine(#[from] anidl_engine::EngineError),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("No stream available for media {0}")]
    NoStream(String),

    #[error(
        "None of the requested subtitle languages ({}) are available (available: {})",
        .requested.join(", "),
        .available.join(", ")
    )]
    LanguagesUnavailable {
        requested: Vec<String>,
        available: Vec<String>,
    },

    #[error("Operation cancelled")]
    Cancelled,
}

impl AppError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled | Self::Engine(anidl_engine::EngineError::Cancelled))
    }
}

impl From<toml::de::Error> for AppError {
    fn from(error: toml::de::Error) -> Self {
        AppError::Config(error.to_string())
    }
}
