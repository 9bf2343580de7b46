use std::sync::OnceLock;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{COOKIE, HeaderValue};
use subtitles::{SessionContext, SubtitleError, SubtitleFetcher};
use tracing::debug;

use crate::error::{AppError, Result};

pub fn install_rustls_provider() {
    static PROVIDER_INSTALLED: OnceLock<()> = OnceLock::new();
    PROVIDER_INSTALLED.get_or_init(|| {
        if let Err(e) = rustls::crypto::aws_lc_rs::default_provider().install_default() {
            debug!(existing_provider = ?e, "rustls CryptoProvider already installed");
        }
    });
}

/// Source of text documents: player configs and manifests.
#[async_trait]
pub trait MediaSource: Send + Sync {
    async fn fetch_text(&self, location: &str, ctx: &SessionContext) -> Result<String>;
}

/// Whether `location` is fetched over HTTP rather than read from disk.
pub fn is_remote(location: &str) -> bool {
    let lower = location.trim_start().to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

/// HTTP client for remote documents; local paths are read from disk.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: reqwest::Client,
}

impl HttpClient {
    pub fn new(timeout: Duration, user_agent: &str) -> Result<Self> {
        install_rustls_provider();

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()?;

        Ok(Self { client })
    }

    async fn get_text(&self, url: &str, ctx: &SessionContext) -> Result<String> {
        let mut request = self.client.get(url);

        if let Some(session_id) = ctx.session_id.as_deref() {
            let cookie = HeaderValue::from_str(&format!("session_id={session_id}"))
                .map_err(|_| AppError::invalid_input("session id contains invalid characters"))?;
            request = request.header(COOKIE, cookie);
        }

        debug!(url, "GET");
        let response = request.send().await?.error_for_status()?;
        Ok(response.text().await?)
    }
}

#[async_trait]
impl MediaSource for HttpClient {
    async fn fetch_text(&self, location: &str, ctx: &SessionContext) -> Result<String> {
        if is_remote(location) {
            self.get_text(location, ctx).await
        } else {
            Ok(tokio::fs::read_to_string(location).await?)
        }
    }
}

#[async_trait]
impl SubtitleFetcher for HttpClient {
    async fn fetch(&self, location: &str, ctx: &SessionContext) -> subtitles::error::Result<String> {
        self.fetch_text(location, ctx)
            .await
            .map_err(|e| SubtitleError::unavailable(format!("{location}: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> HttpClient {
        HttpClient::new(Duration::from_secs(5), "anidl-test").unwrap()
    }

    #[test]
    fn test_is_remote() {
        assert!(is_remote("https://example.com/a.xml"));
        assert!(is_remote("HTTP://example.com/a.xml"));
        assert!(!is_remote("/tmp/a.xml"));
        assert!(!is_remote("configs\\a.xml"));
    }

    #[tokio::test]
    async fn test_reads_local_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.xml");
        std::fs::write(&path, "<config/>").unwrap();

        let text = client()
            .fetch_text(path.to_str().unwrap(), &SessionContext::anonymous())
            .await
            .unwrap();
        assert_eq!(text, "<config/>");
    }

    #[tokio::test]
    async fn test_missing_local_subtitle_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.xml");

        let err = client()
            .fetch(path.to_str().unwrap(), &SessionContext::anonymous())
            .await
            .unwrap_err();
        assert!(matches!(err, SubtitleError::SubtitleSourceUnavailable { .. }));
    }
}
