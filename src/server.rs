//! HTTP intake for extraction requests.
//!
//! The front door accepts a JSON request naming the archive URL, launches
//! the pipeline as a detached task, and acknowledges immediately. The
//! response never reflects the extraction outcome; run results are
//! observable through logs and the structured summaries they carry.

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{extract::State, response::IntoResponse, routing::post, Json, Router};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::pipeline::Pipeline;

/// Inbound extraction request.
#[derive(Debug, Deserialize)]
pub struct ExtractRequest {
    /// Archive to fetch and extract.
    pub file_url: String,
    /// Optional destination directory; overrides the URL-derived one.
    #[serde(default)]
    pub directory_target: Option<String>,
}

/// Acknowledgement returned as soon as the request is accepted.
#[derive(Debug, Serialize)]
pub struct AckResponse {
    pub message: String,
}

/// Bind the intake server and serve until shutdown.
pub async fn serve(port: u16, pipeline: Arc<Pipeline>) -> Result<()> {
    let app = Router::new()
        .route("/", post(handle_extract))
        .with_state(pipeline);

    let addr = SocketAddr::new(Ipv4Addr::UNSPECIFIED.into(), port);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    info!("intake server listening on http://{}", addr);

    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}

/// Accept one extraction request and respond optimistically.
async fn handle_extract(
    State(pipeline): State<Arc<Pipeline>>,
    Json(request): Json<ExtractRequest>,
) -> impl IntoResponse {
    info!("accepted extraction request for {}", request.file_url);

    tokio::spawn(async move {
        let result = pipeline
            .run(&request.file_url, request.directory_target.as_deref())
            .await;
        match result {
            Ok(summary) => info!(
                "extraction of {} complete: {} files dispatched to '{}'",
                request.file_url, summary.files_dispatched, summary.destination
            ),
            Err(e) => warn!("extraction of {} failed: {}", request.file_url, e),
        }
    });

    Json(AckResponse {
        message: "success".to_string(),
    })
}
