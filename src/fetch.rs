//! HTTP retrieval of archive bytes.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;

/// Connection timeout: time to establish the TCP connection.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Overall request timeout for one archive download.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15 * 60);

/// Failure retrieving an archive; aborts the run before any decoding.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("server returned HTTP {0}")]
    Status(u16),
}

/// Retrieves the full archive byte buffer for a URL.
#[async_trait]
pub trait Fetch: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError>;
}

/// reqwest-backed fetcher used by the service.
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("unbale/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client })
    }
}

#[async_trait]
impl Fetch for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let response = self.client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        let bytes = response.bytes().await?;
        Ok(bytes.to_vec())
    }
}
