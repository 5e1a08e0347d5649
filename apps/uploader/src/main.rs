//! Command-line uploader.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use bigfile_client::{HttpTransport, UploadEvent, UploadOrchestrator, UploadOutcome, UploaderConfig};
use bigfile_transfer::DEFAULT_CHUNK_SIZE;
use clap::Parser;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Upload a file to a bigfile server, resuming any earlier partial upload.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// File to upload.
    path: PathBuf,

    /// Name to store the file under. Defaults to the file's own name.
    #[arg(long)]
    name: Option<String>,

    /// Server base URL.
    #[arg(long, env = "BIGFILE_SERVER", default_value = "http://127.0.0.1:8686")]
    server: String,

    /// Chunk size in bytes.
    #[arg(long, env = "BIGFILE_CHUNK_SIZE", default_value_t = DEFAULT_CHUNK_SIZE)]
    chunk_size: u64,

    /// Chunk uploads in flight at once.
    #[arg(long, env = "BIGFILE_CONCURRENCY", default_value_t = 4)]
    concurrency: usize,

    /// Retries per chunk, and rounds for chunks still missing.
    #[arg(long, env = "BIGFILE_RETRIES", default_value_t = 3)]
    retries: u32,

    /// Pause between retries, in milliseconds.
    #[arg(long, env = "BIGFILE_RETRY_DELAY_MS", default_value_t = 500)]
    retry_delay_ms: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,bigfile=debug")),
        )
        .init();

    let cli = Cli::parse();
    let file_name = match cli.name {
        Some(name) => name,
        None => cli
            .path
            .file_name()
            .and_then(|n| n.to_str())
            .map(str::to_owned)
            .context("cannot derive a file name from the path; pass --name")?,
    };

    let transport = Arc::new(HttpTransport::new(cli.server.as_str())?);
    let config = UploaderConfig {
        chunk_size: cli.chunk_size,
        concurrency: cli.concurrency,
        max_retries: cli.retries,
        retry_delay: Duration::from_millis(cli.retry_delay_ms),
    };

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        }
    });

    let (events_tx, mut events_rx) = mpsc::channel(256);
    let reporter = tokio::spawn(async move {
        while let Some(event) = events_rx.recv().await {
            report(&event);
        }
    });

    let orchestrator = UploadOrchestrator::new(transport, config, cancel);
    let result = orchestrator
        .upload_file(&cli.path, &file_name, &events_tx)
        .await;
    drop(events_tx);
    let _ = reporter.await;

    match result.with_context(|| format!("uploading {}", cli.path.display()))? {
        UploadOutcome::AlreadyStored { fingerprint } => {
            println!("{file_name}: already on server ({fingerprint})");
        }
        UploadOutcome::Uploaded {
            fingerprint,
            chunks_sent,
            chunk_count,
            size,
        } => {
            println!(
                "{file_name}: uploaded {chunks_sent}/{chunk_count} chunks, {size} bytes ({fingerprint})"
            );
        }
    }
    Ok(())
}

fn report(event: &UploadEvent) {
    match event {
        UploadEvent::Hashing { percent } => info!(percent, "hashing"),
        UploadEvent::Checked {
            fingerprint,
            missing,
            total,
        } => info!(%fingerprint, missing, total, "server state checked"),
        UploadEvent::ChunkUploaded {
            index, progress, ..
        } => {
            let percent = (progress * 100.0).round();
            info!(index, percent, "chunk uploaded")
        }
        UploadEvent::ChunkFailed { index, error } => {
            tracing::warn!(index, %error, "chunk failed, will retry")
        }
        UploadEvent::Merged { size } => info!(size, "merged"),
    }
}
