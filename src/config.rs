//! Service configuration.
//!
//! Externalizes what the original design hard-coded: the listen port, the
//! sink endpoint, the accepted format set, and the dispatch concurrency cap.

use std::collections::HashSet;

use crate::archive::FormatTag;

/// Configuration for one service instance.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Port the intake server listens on.
    pub listen_port: u16,

    /// Base URL of the upload sink.
    pub upload_url: String,

    /// Formats this deployment will decode. A recognized suffix outside
    /// this set fails the run; unrecognized suffixes still fall back to raw.
    pub supported_formats: HashSet<FormatTag>,

    /// Maximum in-flight uploads per run.
    pub max_concurrent_uploads: usize,
}

impl ServiceConfig {
    /// Every format the pipeline can decode.
    pub fn all_formats() -> HashSet<FormatTag> {
        HashSet::from([
            FormatTag::Zip,
            FormatTag::TarGz,
            FormatTag::Rar,
            FormatTag::TarXz,
            FormatTag::Raw,
        ])
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.upload_url.is_empty() {
            return Err(ConfigError::MissingUploadUrl);
        }

        if self.max_concurrent_uploads == 0 {
            return Err(ConfigError::ZeroConcurrency);
        }

        Ok(())
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            listen_port: 8080,
            upload_url: String::new(),
            supported_formats: Self::all_formats(),
            max_concurrent_uploads: 8,
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("upload sink URL is required")]
    MissingUploadUrl,

    #[error("at least one concurrent upload slot is required")]
    ZeroConcurrency,
}
