//! The upload sink: where extracted member files are delivered.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::debug;

/// Connection timeout for the sink endpoint.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Per-upload request timeout.
const UPLOAD_TIMEOUT: Duration = Duration::from_secs(10 * 60);

/// Failure handing one file to the sink. Logged by the dispatcher, never
/// retried, never propagated into the run result.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("upload request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("sink returned HTTP {0}")]
    Status(u16),
}

/// Accepts one extracted file's bytes under a name and destination directory.
#[async_trait]
pub trait UploadSink: Send + Sync {
    async fn upload(&self, content: Vec<u8>, name: &str, directory: &str) -> Result<(), SinkError>;
}

/// HTTP sink that PUTs each file to `{base_url}/{directory}/{name}`.
pub struct HttpUploadSink {
    client: reqwest::Client,
    base_url: String,
}

impl HttpUploadSink {
    pub fn new(base_url: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("unbale/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(UPLOAD_TIMEOUT)
            .build()
            .context("Failed to create upload client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn target_url(&self, name: &str, directory: &str) -> String {
        format!("{}/{}/{}", self.base_url, directory, name.trim_start_matches('/'))
    }
}

#[async_trait]
impl UploadSink for HttpUploadSink {
    async fn upload(&self, content: Vec<u8>, name: &str, directory: &str) -> Result<(), SinkError> {
        let url = self.target_url(name, directory);
        debug!("uploading {} bytes to {}", content.len(), url);

        let response = self.client.put(&url).body(content).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(SinkError::Status(status.as_u16()));
        }

        Ok(())
    }
}
