use std::time::Duration;

use async_trait::async_trait;
use cc_service::{FetchError, ListFetcher};

/// Fetches lists from local paths, `file://` URLs and http(s) URLs.
pub struct CliFetcher {
    client: reqwest::Client,
}

impl CliFetcher {
    pub fn new() -> Result<Self, String> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("cc-cli/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| format!("Failed to build HTTP client: {}", e))?;
        Ok(Self { client })
    }

    async fn fetch_http(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let http_error = |e: reqwest::Error| FetchError::Http {
            url: url.to_string(),
            message: e.to_string(),
        };

        let response = self
            .client
            .get(url)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(http_error)?;
        let body = response.bytes().await.map_err(http_error)?;
        Ok(body.to_vec())
    }
}

#[async_trait]
impl ListFetcher for CliFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        if url.starts_with("http://") || url.starts_with("https://") {
            return self.fetch_http(url).await;
        }

        let path = match url.strip_prefix("file://") {
            Some(path) => path,
            None if !url.contains("://") => url,
            None => return Err(FetchError::UnsupportedUrl(url.to_string())),
        };

        tokio::fs::read(path).await.map_err(|source| FetchError::Io {
            url: url.to_string(),
            source,
        })
    }
}
