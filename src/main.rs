//! unbale - archive fetch/extract/relay service
//!
//! `serve` runs the HTTP intake; `extract` runs one pipeline invocation to
//! completion from the command line.

use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use unbale::config::ServiceConfig;
use unbale::fetch::HttpFetcher;
use unbale::pipeline::Pipeline;
use unbale::server;
use unbale::sink::HttpUploadSink;

#[derive(Parser)]
#[command(name = "unbale")]
#[command(version)]
#[command(about = "Fetches remote archives and relays their member files to an upload sink")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging (use RUST_LOG=debug for more detail)
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP intake server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "8080", env = "UNBALE_PORT")]
        port: u16,

        /// Base URL of the upload sink
        #[arg(long, env = "UNBALE_UPLOAD_URL")]
        upload_url: String,

        /// Maximum in-flight uploads per run
        #[arg(short, long, default_value = "8")]
        concurrent: usize,
    },

    /// Fetch and extract a single archive, waiting for every upload
    Extract {
        /// URL of the archive to fetch
        url: String,

        /// Base URL of the upload sink
        #[arg(long, env = "UNBALE_UPLOAD_URL")]
        upload_url: String,

        /// Destination directory override (defaults to the archive's base name)
        #[arg(short, long)]
        directory: Option<String>,

        /// Maximum in-flight uploads
        #[arg(short, long, default_value = "8")]
        concurrent: usize,
    },
}

fn build_pipeline(config: &ServiceConfig) -> Result<Pipeline> {
    config.validate()?;
    let fetcher = Arc::new(HttpFetcher::new()?);
    let sink = Arc::new(HttpUploadSink::new(&config.upload_url)?);
    Ok(Pipeline::new(config, fetcher, sink))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(if cli.verbose {
                "unbale=debug"
            } else {
                "unbale=info"
            })
        }))
        .init();

    match cli.command {
        Commands::Serve {
            port,
            upload_url,
            concurrent,
        } => {
            let config = ServiceConfig {
                listen_port: port,
                upload_url,
                max_concurrent_uploads: concurrent,
                ..ServiceConfig::default()
            };
            let pipeline = Arc::new(build_pipeline(&config)?);
            server::serve(config.listen_port, pipeline).await?;
        }

        Commands::Extract {
            url,
            upload_url,
            directory,
            concurrent,
        } => {
            let config = ServiceConfig {
                upload_url,
                max_concurrent_uploads: concurrent,
                ..ServiceConfig::default()
            };
            let pipeline = build_pipeline(&config)?;
            let summary = pipeline
                .run_to_completion(&url, directory.as_deref())
                .await?;

            println!("\n=== Extraction Summary ===");
            println!("Format:      {}", summary.format);
            println!("Destination: {}", summary.destination);
            println!(
                "Entries:     {} uploaded, {} directories, {} skipped",
                summary.files_dispatched, summary.directories_skipped, summary.entries_skipped
            );
            if let Some(failed) = summary.uploads_failed {
                if failed > 0 {
                    println!("Uploads:     {} failed", failed);
                }
            }
            if let Some(stream_error) = summary.stream_error {
                println!("Stream ended early: {}", stream_error);
            }
        }
    }

    Ok(())
}
