use std::path::{Path, PathBuf};

use futures_util::{stream, StreamExt};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;

use super::error::DownloadError;
use super::remote::Remote;
use super::thumb::ThumbnailExtractor;
use crate::immich::AssetMetadata;
use crate::progress::SyncObserver;
use crate::retry::retry_with_backoff;

/// Outcome of one asset's download. Success when `error` is `None`.
#[derive(Debug)]
pub struct DownloadResult {
    pub asset_id: String,
    pub bytes_written: u64,
    pub error: Option<DownloadError>,
}

/// Download every asset with bounded concurrency, returning one result per
/// asset.
///
/// The pipeline always drains: a failed asset never cancels its siblings,
/// so every task gets to clean up its own temp file. The caller decides
/// what a failed result means for the run.
pub async fn download_all(
    remote: &Remote,
    assets: Vec<AssetMetadata>,
    photodir: &Path,
    thumbnails: Option<&dyn ThumbnailExtractor>,
    observer: &dyn SyncObserver,
    concurrency: usize,
) -> Vec<DownloadResult> {
    stream::iter(assets)
        .map(|asset| async move {
            download_one(remote, asset, photodir, thumbnails, observer).await
        })
        .buffer_unordered(concurrency.max(1))
        .collect()
        .await
}

async fn download_one(
    remote: &Remote,
    asset: AssetMetadata,
    photodir: &Path,
    thumbnails: Option<&dyn ThumbnailExtractor>,
    observer: &dyn SyncObserver,
) -> DownloadResult {
    let dest = photodir.join(asset.local_file_name());
    let part = part_path(&dest);

    // One limiter slot covers the whole download, retries included.
    let _permit = remote.download_permit().await;

    let result = retry_with_backoff(remote.retry(), || {
        attempt_download(remote, &asset, &dest, &part, observer)
    })
    .await;

    match result {
        Ok(bytes_written) => {
            if let Some(extractor) = thumbnails {
                extract_thumbnail(extractor, &asset, &dest, photodir).await;
            }
            observer.asset_completed(&asset.id, bytes_written);
            tracing::debug!(bytes = bytes_written, "Downloaded {}", dest.display());
            DownloadResult {
                asset_id: asset.id,
                bytes_written,
                error: None,
            }
        }
        Err(error) => DownloadResult {
            asset_id: asset.id,
            bytes_written: 0,
            error: Some(error),
        },
    }
}

/// Single attempt: stream into the temp file and promote it. Any leftover
/// temp file from a previous attempt is deleted first, and a failed attempt
/// removes its own temp file before returning.
async fn attempt_download(
    remote: &Remote,
    asset: &AssetMetadata,
    dest: &Path,
    part: &Path,
    observer: &dyn SyncObserver,
) -> Result<u64, DownloadError> {
    let _ = fs::remove_file(part).await;
    match stream_to_file(remote, asset, dest, part, observer).await {
        Ok(bytes_written) => Ok(bytes_written),
        Err(e) => {
            let _ = fs::remove_file(part).await;
            Err(e)
        }
    }
}

async fn stream_to_file(
    remote: &Remote,
    asset: &AssetMetadata,
    dest: &Path,
    part: &Path,
    observer: &dyn SyncObserver,
) -> Result<u64, DownloadError> {
    let download = remote.open_original(&asset.id).await?;
    observer.download_started(
        &asset.id,
        download.content_length.unwrap_or(asset.file_size),
    );

    let mut file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(part)
        .await?;

    let mut bytes_written = 0u64;
    let mut body = download.stream;
    while let Some(chunk) = body.next().await {
        let chunk = chunk?;
        file.write_all(&chunk).await?;
        bytes_written += chunk.len() as u64;
        observer.bytes_transferred(&asset.id, chunk.len() as u64);
    }
    file.flush().await?;
    drop(file);

    // The destination either keeps its old content or atomically becomes
    // the new download; it is never half-written.
    fs::rename(part, dest).await?;
    Ok(bytes_written)
}

/// `path` with `.part` appended to the full file name.
fn part_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".part");
    PathBuf::from(name)
}

/// Best effort preview next to a non-JPEG download; a failure is logged
/// and never fails the asset.
async fn extract_thumbnail(
    extractor: &dyn ThumbnailExtractor,
    asset: &AssetMetadata,
    dest: &Path,
    photodir: &Path,
) {
    let is_jpg = dest
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("jpg"))
        .unwrap_or(false);
    if is_jpg {
        return;
    }
    let target = photodir.join(format!("{}.jpg", asset.id));
    match extractor.extract(dest, &target).await {
        Ok(()) => tracing::debug!("Extracted preview {}", target.display()),
        Err(e) => tracing::warn!("Preview extraction failed for {}: {}", dest.display(), e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::immich::ImmichApi;
    use crate::progress::{NullObserver, SyncCounters};
    use crate::retry::RetryConfig;
    use crate::sync::testing::{digest_of, FakeApi};
    use crate::sync::thumb::CommandThumbnailExtractor;
    use std::fs as std_fs;
    use std::sync::atomic::Ordering;
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::TempDir;

    fn meta(id: &str, name: &str, body: &[u8]) -> AssetMetadata {
        AssetMetadata {
            id: id.to_string(),
            original_file_name: name.to_string(),
            file_size: body.len() as u64,
            checksum: digest_of(body),
        }
    }

    fn remote_over(api: Arc<FakeApi>) -> Remote {
        Remote::new(
            api as Arc<dyn ImmichApi>,
            5,
            RetryConfig {
                attempts: 3,
                backoff_factor: Duration::ZERO,
            },
        )
    }

    #[test]
    fn test_part_path_appends_to_full_name() {
        assert_eq!(
            part_path(Path::new("/photos/a1.jpg")),
            PathBuf::from("/photos/a1.jpg.part")
        );
        assert_eq!(part_path(Path::new("/photos/a2")), PathBuf::from("/photos/a2.part"));
    }

    #[tokio::test]
    async fn test_download_writes_destination_and_removes_part() {
        let dir = TempDir::new().unwrap();
        let body = b"hello world".to_vec();
        let api = Arc::new(FakeApi::new().with_body("a1", &body));
        let remote = remote_over(api);
        let counters = SyncCounters::default();

        let results = download_all(
            &remote,
            vec![meta("a1", "beach.jpg", &body)],
            dir.path(),
            None,
            &counters,
            5,
        )
        .await;

        assert_eq!(results.len(), 1);
        assert!(results[0].error.is_none());
        assert_eq!(results[0].bytes_written, 11);
        assert_eq!(std_fs::read(dir.path().join("a1.jpg")).unwrap(), body);
        assert!(!dir.path().join("a1.jpg.part").exists());
        assert_eq!(counters.bytes_transferred.load(Ordering::Relaxed), 11);
        assert_eq!(counters.assets_completed.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn test_download_replaces_existing_destination() {
        let dir = TempDir::new().unwrap();
        std_fs::write(dir.path().join("a1.jpg"), b"old stale bytes").unwrap();
        let body = b"fresh".to_vec();
        let api = Arc::new(FakeApi::new().with_body("a1", &body));
        let remote = remote_over(api);

        let results = download_all(
            &remote,
            vec![meta("a1", "beach.jpg", &body)],
            dir.path(),
            None,
            &NullObserver,
            5,
        )
        .await;

        assert!(results[0].error.is_none());
        assert_eq!(std_fs::read(dir.path().join("a1.jpg")).unwrap(), body);
    }

    #[tokio::test]
    async fn test_persistent_stream_failure_leaves_nothing_behind() {
        let dir = TempDir::new().unwrap();
        let body = b"will never fully arrive".to_vec();
        let api = Arc::new(
            FakeApi::new()
                .with_body("a1", &body)
                .fail_stream("a1", 99),
        );
        let remote = remote_over(api);

        let results = download_all(
            &remote,
            vec![meta("a1", "beach.jpg", &body)],
            dir.path(),
            None,
            &NullObserver,
            5,
        )
        .await;

        assert!(results[0].error.is_some());
        assert!(!dir.path().join("a1.jpg").exists());
        assert!(!dir.path().join("a1.jpg.part").exists());
    }

    #[tokio::test]
    async fn test_transient_stream_failure_recovers() {
        let dir = TempDir::new().unwrap();
        let body = b"second try works".to_vec();
        let api = Arc::new(
            FakeApi::new()
                .with_body("a1", &body)
                .fail_stream("a1", 1),
        );
        let remote = remote_over(api);

        let results = download_all(
            &remote,
            vec![meta("a1", "beach.jpg", &body)],
            dir.path(),
            None,
            &NullObserver,
            5,
        )
        .await;

        assert!(results[0].error.is_none());
        assert_eq!(std_fs::read(dir.path().join("a1.jpg")).unwrap(), body);
        assert!(!dir.path().join("a1.jpg.part").exists());
    }

    #[tokio::test]
    async fn test_failed_asset_does_not_cancel_siblings() {
        let dir = TempDir::new().unwrap();
        let good = b"good bytes".to_vec();
        let bad = b"bad bytes".to_vec();
        let api = Arc::new(
            FakeApi::new()
                .with_body("ok", &good)
                .with_body("broken", &bad)
                .fail_stream("broken", 99),
        );
        let remote = remote_over(api);

        let results = download_all(
            &remote,
            vec![meta("broken", "x.jpg", &bad), meta("ok", "y.jpg", &good)],
            dir.path(),
            None,
            &NullObserver,
            2,
        )
        .await;

        assert_eq!(results.len(), 2);
        let ok = results.iter().find(|r| r.asset_id == "ok").unwrap();
        let broken = results.iter().find(|r| r.asset_id == "broken").unwrap();
        assert!(ok.error.is_none());
        assert!(broken.error.is_some());
        assert_eq!(std_fs::read(dir.path().join("ok.jpg")).unwrap(), good);
    }

    #[tokio::test]
    async fn test_thumbnail_extracted_for_non_jpeg() {
        let dir = TempDir::new().unwrap();
        let body = b"raw sensor data".to_vec();
        let api = Arc::new(FakeApi::new().with_body("a1", &body));
        let remote = remote_over(api);
        let extractor =
            CommandThumbnailExtractor::new("sh", vec!["-c".into(), "printf PREVIEW".into()]);

        let results = download_all(
            &remote,
            vec![meta("a1", "shot.cr2", &body)],
            dir.path(),
            Some(&extractor),
            &NullObserver,
            5,
        )
        .await;

        assert!(results[0].error.is_none());
        assert_eq!(std_fs::read(dir.path().join("a1.cr2")).unwrap(), body);
        assert_eq!(std_fs::read(dir.path().join("a1.jpg")).unwrap(), b"PREVIEW");
    }

    #[tokio::test]
    async fn test_thumbnail_skipped_for_jpeg() {
        let dir = TempDir::new().unwrap();
        let body = b"jpeg bytes".to_vec();
        let api = Arc::new(FakeApi::new().with_body("a1", &body));
        let remote = remote_over(api);
        // A command that would clobber the download if it ran.
        let extractor =
            CommandThumbnailExtractor::new("sh", vec!["-c".into(), "printf WRONG".into()]);

        let results = download_all(
            &remote,
            vec![meta("a1", "beach.JPG", &body)],
            dir.path(),
            Some(&extractor),
            &NullObserver,
            5,
        )
        .await;

        assert!(results[0].error.is_none());
        assert_eq!(std_fs::read(dir.path().join("a1.JPG")).unwrap(), body);
    }

    #[tokio::test]
    async fn test_thumbnail_failure_keeps_asset() {
        let dir = TempDir::new().unwrap();
        let body = b"raw".to_vec();
        let api = Arc::new(FakeApi::new().with_body("a1", &body));
        let remote = remote_over(api);
        let extractor = CommandThumbnailExtractor::new("false", vec![]);

        let results = download_all(
            &remote,
            vec![meta("a1", "shot.cr2", &body)],
            dir.path(),
            Some(&extractor),
            &NullObserver,
            5,
        )
        .await;

        assert!(results[0].error.is_none());
        assert_eq!(std_fs::read(dir.path().join("a1.cr2")).unwrap(), body);
        assert!(!dir.path().join("a1.jpg").exists());
    }
}
