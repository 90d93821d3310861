//! The extraction pipeline: fetch, classify, decode, dispatch.
//!
//! One [`Pipeline::run`] invocation owns its archive bytes and decoder state
//! from fetch to drain. Every non-directory entry is dispatched to the
//! upload sink as a detached task; the loop never waits on a dispatch's
//! completion, only on a concurrency permit. Run-level failures (fetch,
//! disabled format, malformed container, failed decompression) abort before
//! dispatch; per-entry failures are counted and absorbed.

use std::collections::HashSet;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::archive::{self, file_name_from_url, ArchiveName, FormatTag, OpenError};
use crate::config::ServiceConfig;
use crate::fetch::{Fetch, FetchError};
use crate::sink::UploadSink;

/// Run-level failure; everything finer-grained is absorbed into the summary.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("failed to fetch '{url}': {source}")]
    Fetch { url: String, source: FetchError },

    #[error("format '{0}' is not enabled in this deployment")]
    FormatDisabled(FormatTag),

    #[error(transparent)]
    Open(#[from] OpenError),
}

/// Structured outcome of one run.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    /// Format the archive was classified as.
    pub format: FormatTag,
    /// Directory every upload of this run was routed to.
    pub destination: String,
    /// Number of file entries handed to the sink.
    pub files_dispatched: usize,
    /// Directory markers encountered and skipped.
    pub directories_skipped: usize,
    /// Entries dropped for per-entry read errors or unsupported types.
    pub entries_skipped: usize,
    /// Set when the stream corrupted mid-traversal; entries dispatched
    /// before that point stand.
    pub stream_error: Option<String>,
    /// Upload failures, known only when the caller awaited completion.
    pub uploads_failed: Option<usize>,
}

/// Composes the fetch collaborator, decoder factory, and upload sink.
pub struct Pipeline {
    fetcher: Arc<dyn Fetch>,
    sink: Arc<dyn UploadSink>,
    supported_formats: HashSet<FormatTag>,
    limiter: Arc<Semaphore>,
}

impl Pipeline {
    pub fn new(config: &ServiceConfig, fetcher: Arc<dyn Fetch>, sink: Arc<dyn UploadSink>) -> Self {
        Self {
            fetcher,
            sink,
            supported_formats: config.supported_formats.clone(),
            limiter: Arc::new(Semaphore::new(config.max_concurrent_uploads)),
        }
    }

    /// Run one extraction, leaving the dispatched uploads detached.
    ///
    /// Returns as soon as the entry stream is drained; the uploads it
    /// launched complete (or fail) on their own.
    pub async fn run(
        &self,
        url: &str,
        directory_override: Option<&str>,
    ) -> Result<RunSummary, PipelineError> {
        let (summary, _detached) = self.execute(url, directory_override).await?;
        Ok(summary)
    }

    /// Run one extraction and await every dispatched upload.
    ///
    /// Same pipeline, but the summary additionally reports how many uploads
    /// failed. Used by the one-shot CLI and by tests.
    pub async fn run_to_completion(
        &self,
        url: &str,
        directory_override: Option<&str>,
    ) -> Result<RunSummary, PipelineError> {
        let (mut summary, dispatched) = self.execute(url, directory_override).await?;

        let mut failed = 0;
        for handle in dispatched {
            match handle.await {
                Ok(true) => {}
                _ => failed += 1,
            }
        }
        summary.uploads_failed = Some(failed);
        Ok(summary)
    }

    async fn execute(
        &self,
        url: &str,
        directory_override: Option<&str>,
    ) -> Result<(RunSummary, Vec<JoinHandle<bool>>), PipelineError> {
        let file_name = file_name_from_url(url);
        let name = ArchiveName::parse(file_name);
        let format = name.format();

        if !self.supported_formats.contains(&format) {
            return Err(PipelineError::FormatDisabled(format));
        }

        let destination = match directory_override {
            Some(dir) if !dir.is_empty() => dir.to_string(),
            _ if !name.base.is_empty() => name.base.clone(),
            _ => "archive".to_string(),
        };

        info!("fetching {} (format {}, destination '{}')", url, format, destination);

        let bytes = self
            .fetcher
            .fetch(url)
            .await
            .map_err(|source| PipelineError::Fetch {
                url: url.to_string(),
                source,
            })?;
        debug!("fetched {} bytes from {}", bytes.len(), url);

        let handle = archive::open(bytes, format, file_name)?;

        let mut summary = RunSummary {
            format,
            destination: destination.clone(),
            files_dispatched: 0,
            directories_skipped: 0,
            entries_skipped: 0,
            stream_error: None,
            uploads_failed: None,
        };
        let mut dispatched = Vec::new();

        for item in handle {
            match item {
                Ok(entry) if entry.is_dir => {
                    summary.directories_skipped += 1;
                }
                Ok(entry) => {
                    summary.files_dispatched += 1;
                    dispatched.push(self.dispatch(entry.name, entry.content, &destination));
                }
                Err(e) if e.is_fatal() => {
                    warn!("entry stream for {} ended early: {}", url, e);
                    summary.stream_error = Some(e.to_string());
                    break;
                }
                Err(e) => {
                    warn!("skipping entry in {}: {}", url, e);
                    summary.entries_skipped += 1;
                }
            }
        }

        info!(
            "drained {}: {} files dispatched, {} directories, {} entries skipped",
            url, summary.files_dispatched, summary.directories_skipped, summary.entries_skipped
        );
        Ok((summary, dispatched))
    }

    /// Launch one upload as a detached unit of work.
    ///
    /// The loop never waits on a dispatch; the concurrency permit is taken
    /// inside the task, so at most `max_concurrent_uploads` are in flight.
    fn dispatch(&self, name: String, content: Vec<u8>, directory: &str) -> JoinHandle<bool> {
        let limiter = self.limiter.clone();
        let sink = self.sink.clone();
        let directory = directory.to_string();

        tokio::spawn(async move {
            let _permit = match limiter.acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => return false,
            };
            match sink.upload(content, &name, &directory).await {
                Ok(()) => {
                    debug!("uploaded '{}' to '{}'", name, directory);
                    true
                }
                Err(e) => {
                    warn!("upload of '{}' to '{}' failed: {}", name, directory, e);
                    false
                }
            }
        })
    }
}
