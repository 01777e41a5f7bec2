//! The sync engine: resolve the album, diff it against the local directory,
//! download what is missing, and remove what the album no longer contains.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::{stream, StreamExt, TryStreamExt};

use crate::immich::{Album, AssetMetadata, ImmichApi};
use crate::progress::SyncObserver;
use crate::retry::RetryConfig;

pub mod checksum;
pub mod download;
pub mod error;
pub mod plan;
pub mod remote;
pub mod thumb;
#[cfg(test)]
pub mod testing;

pub use error::SyncError;
pub use thumb::{CommandThumbnailExtractor, ThumbnailExtractor};

use checksum::delete_orphans;
use download::download_all;
use plan::build_plan;
use remote::Remote;

/// Everything one run needs besides the API client.
#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// Album name, matched exactly against the server's album list.
    pub album: String,
    /// Local directory the album is mirrored into.
    pub photodir: PathBuf,
    /// Limit on concurrent remote calls.
    pub concurrency: usize,
    /// Retry schedule for per-asset calls.
    pub retry: RetryConfig,
}

/// What a completed run did.
#[derive(Debug)]
pub struct SyncSummary {
    /// Asset ids present locally when the run finished.
    pub synced: BTreeSet<String>,
    pub downloaded: usize,
    pub skipped: usize,
    pub orphans_removed: usize,
    pub bytes_downloaded: u64,
    pub elapsed: Duration,
}

/// Mirror one album into `opts.photodir`.
///
/// Runs the full pipeline: album lookup, per-asset metadata refresh, local
/// diff, bounded downloads, orphan removal. If any download fails the run
/// returns the first failure and leaves the orphan pass for a later run, so
/// a flaky connection can never delete local files.
pub async fn sync_album(
    api: Arc<dyn ImmichApi>,
    opts: &SyncOptions,
    thumbnails: Option<Arc<dyn ThumbnailExtractor>>,
    observer: Arc<dyn SyncObserver>,
) -> Result<SyncSummary, SyncError> {
    let started = Instant::now();

    tokio::fs::create_dir_all(&opts.photodir)
        .await
        .map_err(|source| SyncError::Destination {
            path: opts.photodir.clone(),
            source,
        })?;

    let remote = Remote::new(api, opts.concurrency, opts.retry);

    let album = resolve_album(&remote, &opts.album).await?;
    tracing::info!("Syncing album '{}' ({})", album.album_name, album.id);

    let entries = remote.get_album(&album.id).await?.assets;
    observer.metadata_queued(entries.len());
    tracing::info!("Album lists {} assets", entries.len());

    let assets = fetch_metadata(&remote, entries, observer.as_ref(), opts.concurrency).await?;

    let plan = build_plan(
        &remote,
        assets,
        &opts.photodir,
        observer.as_ref(),
        opts.concurrency,
    )
    .await?;
    let skipped = plan.already_synced.len();
    tracing::info!(
        "{} assets already synced, {} to download ({} bytes)",
        skipped,
        plan.to_download.len(),
        plan.total_bytes - plan.done_bytes
    );

    let results = download_all(
        &remote,
        plan.to_download,
        &opts.photodir,
        thumbnails.as_deref(),
        observer.as_ref(),
        opts.concurrency,
    )
    .await;

    let mut synced = plan.already_synced;
    let mut downloaded = 0usize;
    let mut bytes_downloaded = 0u64;
    let mut first_failure: Option<SyncError> = None;
    for result in results {
        match result.error {
            None => {
                downloaded += 1;
                bytes_downloaded += result.bytes_written;
                synced.insert(result.asset_id);
            }
            Some(source) => {
                tracing::error!("Failed to download asset {}: {}", result.asset_id, source);
                if first_failure.is_none() {
                    first_failure = Some(SyncError::Download {
                        asset_id: result.asset_id,
                        source,
                    });
                }
            }
        }
    }
    // On failure, skip the orphan pass: with an incomplete picture of the
    // album we must not delete anything. Finished files stay for the next run.
    if let Some(err) = first_failure {
        return Err(err);
    }

    let orphans_removed =
        delete_orphans(&opts.photodir, &synced).map_err(|source| SyncError::Destination {
            path: opts.photodir.clone(),
            source,
        })?;
    if orphans_removed > 0 {
        tracing::info!("Removed {} orphaned files", orphans_removed);
    }

    Ok(SyncSummary {
        synced,
        downloaded,
        skipped,
        orphans_removed,
        bytes_downloaded,
        elapsed: started.elapsed(),
    })
}

/// Find the album by exact name. Shared albums are listed first and win a
/// name clash with a private album.
async fn resolve_album(remote: &Remote, name: &str) -> Result<Album, SyncError> {
    let mut albums = remote.list_albums(true).await?;
    albums.extend(remote.list_albums(false).await?);
    albums
        .into_iter()
        .find(|album| album.album_name == name)
        .ok_or_else(|| SyncError::AlbumNotFound(name.to_string()))
}

/// Refresh the metadata of every album entry, `concurrency` at a time.
/// Aborts on the first asset whose metadata cannot be fetched even with
/// retries.
async fn fetch_metadata(
    remote: &Remote,
    entries: Vec<AssetMetadata>,
    observer: &dyn SyncObserver,
    concurrency: usize,
) -> Result<Vec<AssetMetadata>, SyncError> {
    stream::iter(entries)
        .map(|entry| async move {
            let info = remote.asset_info(&entry.id).await?;
            observer.metadata_fetched(&info.id);
            Ok::<_, SyncError>(info)
        })
        .buffered(concurrency.max(1))
        .try_collect()
        .await
}
