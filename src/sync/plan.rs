use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use futures_util::{stream, StreamExt};

use super::checksum::file_checksum;
use super::error::SyncError;
use super::remote::Remote;
use crate::immich::AssetMetadata;
use crate::progress::SyncObserver;

/// Partition of an album's assets into work already done and work to do.
///
/// Every asset id lands in exactly one of `already_synced` and
/// `to_download`. `done_bytes` counts the bytes of the already-synced
/// assets so a byte-progress frontend can start ahead.
#[derive(Debug, Default)]
pub struct SyncPlan {
    pub already_synced: BTreeSet<String>,
    pub to_download: Vec<AssetMetadata>,
    pub total_bytes: u64,
    pub done_bytes: u64,
}

/// Classify every asset against the local directory.
///
/// Size probes share the remote limiter; checksums run on the blocking
/// pool. A local file that cannot be read is treated as absent, so the run
/// falls back to re-downloading instead of failing.
pub async fn build_plan(
    remote: &Remote,
    assets: Vec<AssetMetadata>,
    photodir: &Path,
    observer: &dyn SyncObserver,
    concurrency: usize,
) -> Result<SyncPlan, SyncError> {
    let local_files =
        scan_local_files(photodir).map_err(|source| SyncError::Destination {
            path: photodir.to_path_buf(),
            source,
        })?;

    let checks = stream::iter(assets)
        .map(|asset| {
            let local = local_candidate(photodir, &local_files, &asset);
            async move { classify(remote, asset, local, observer).await }
        })
        .buffered(concurrency.max(1));
    tokio::pin!(checks);

    let mut plan = SyncPlan::default();
    while let Some(result) = checks.next().await {
        let outcome = result?;
        plan.total_bytes += outcome.asset.file_size;
        if outcome.already_synced {
            plan.done_bytes += outcome.asset.file_size;
            plan.already_synced.insert(outcome.asset.id);
        } else {
            plan.to_download.push(outcome.asset);
        }
    }

    observer.plan_ready(plan.total_bytes, plan.done_bytes, plan.to_download.len());
    Ok(plan)
}

struct Classified {
    asset: AssetMetadata,
    already_synced: bool,
}

async fn classify(
    remote: &Remote,
    mut asset: AssetMetadata,
    local: Option<PathBuf>,
    observer: &dyn SyncObserver,
) -> Result<Classified, SyncError> {
    // The catalog reports 0 when it does not know the size.
    if asset.file_size == 0 {
        asset.file_size = remote.asset_size(&asset.id).await?;
    }

    let already_synced = match &local {
        Some(path) => checksum_matches(path, &asset.checksum).await,
        None => false,
    };
    observer.checksum_checked(&asset.id, already_synced);
    Ok(Classified {
        asset,
        already_synced,
    })
}

/// The local file to verify for an asset: the expected `{id}{ext}` name
/// when present, otherwise any file sharing the asset's stem (covers a
/// remote rename that changed the extension).
fn local_candidate(
    photodir: &Path,
    local_files: &HashMap<String, PathBuf>,
    asset: &AssetMetadata,
) -> Option<PathBuf> {
    let expected = photodir.join(asset.local_file_name());
    if expected.is_file() {
        return Some(expected);
    }
    local_files.get(&asset.id).cloned()
}

async fn checksum_matches(path: &Path, expected: &str) -> bool {
    let owned = path.to_path_buf();
    match tokio::task::spawn_blocking(move || file_checksum(&owned)).await {
        Ok(Ok(digest)) => digest == expected,
        Ok(Err(e)) => {
            tracing::warn!("Cannot read {}, scheduling re-download: {}", path.display(), e);
            false
        }
        Err(e) => {
            tracing::warn!("Checksum task for {} failed: {}", path.display(), e);
            false
        }
    }
}

/// Regular files directly inside `dir`, keyed by file stem.
fn scan_local_files(dir: &Path) -> std::io::Result<HashMap<String, PathBuf>> {
    let mut files = HashMap::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        if let Some(stem) = path.file_stem() {
            files
                .entry(stem.to_string_lossy().into_owned())
                .or_insert(path);
        }
    }
    Ok(files)
}
