use async_trait::async_trait;

use crate::error::Result;

/// Per-call session state handed to every component that talks to the
/// service.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionContext {
    pub session_id: Option<String>,
    pub premium: bool,
}

impl SessionContext {
    pub fn new(session_id: Option<String>, premium: bool) -> Self {
        Self {
            session_id,
            premium,
        }
    }

    pub fn anonymous() -> Self {
        Self::default()
    }
}

/// Source of linked subtitle documents.
///
/// Implementations should map every failure to
/// [`SubtitleError::SubtitleSourceUnavailable`](crate::SubtitleError::SubtitleSourceUnavailable).
#[async_trait]
pub trait SubtitleFetcher: Send + Sync {
    async fn fetch(&self, location: &str, ctx: &SessionContext) -> Result<String>;
}
