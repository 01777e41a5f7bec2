//! immich-sync: mirror one Immich album into a local directory.
//!
//! Fetches the album's asset list from the Immich HTTP API, diffs it against
//! the local directory by SHA-1 checksum, downloads missing assets with
//! bounded concurrency and exponential-backoff retries, then removes local
//! files the album no longer contains. Optionally extracts embedded JPEG
//! previews from raw files via an external tool such as exiftool.

#![warn(clippy::all)]

mod cli;
mod config;
mod immich;
mod progress;
mod report;
pub mod retry;
mod sync;

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use immich::ImmichClient;
use progress::SyncObserver;
use report::ProgressReporter;
use sync::{CommandThumbnailExtractor, SyncOptions, ThumbnailExtractor};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = cli::Cli::parse();

    let filter = match cli.log_level {
        cli::LogLevel::Debug => "debug",
        cli::LogLevel::Info => "info",
        cli::LogLevel::Warn => "warn",
        cli::LogLevel::Error => "error",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .init();

    let config = config::Config::load(&cli)?;
    tracing::debug!(?config, "Resolved configuration");

    let api = Arc::new(ImmichClient::new(&config.url, &config.api_key)?);

    let thumbnails: Option<Arc<dyn ThumbnailExtractor>> = if config.raw {
        let extractor = config
            .thumbnail_command
            .as_deref()
            .and_then(CommandThumbnailExtractor::from_command_line)
            .unwrap_or_default();
        Some(Arc::new(extractor))
    } else {
        None
    };

    let reporter = Arc::new(ProgressReporter::new(config.no_progress_bar));
    let observer: Arc<dyn SyncObserver> = reporter.clone();

    let opts = SyncOptions {
        album: config.album.clone(),
        photodir: config.photodir.clone(),
        concurrency: config.concurrency,
        retry: config.retry,
    };

    tracing::info!(
        album = %opts.album,
        photodir = %opts.photodir.display(),
        concurrency = opts.concurrency,
        "Starting immich-sync"
    );

    let result = sync::sync_album(api, &opts, thumbnails, observer).await;
    reporter.finish();
    let summary = result?;

    tracing::info!(
        downloaded = summary.downloaded,
        skipped = summary.skipped,
        orphans_removed = summary.orphans_removed,
        bytes = summary.bytes_downloaded,
        "Sync finished in {}",
        format_duration(summary.elapsed)
    );
    println!("✔ Done! Synced {} assets.", summary.synced.len());

    Ok(())
}

fn format_duration(d: Duration) -> String {
    let total_secs = d.as_secs();
    let hours = total_secs / 3600;
    let mins = (total_secs % 3600) / 60;
    let secs = total_secs % 60;

    if hours > 0 {
        format!("{}h {:02}m {:02}s", hours, mins, secs)
    } else if mins > 0 {
        format!("{}m {:02}s", mins, secs)
    } else {
        format!("{}s", secs)
    }
}
