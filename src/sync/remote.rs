use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use super::error::SyncError;
use crate::immich::{Album, AlbumDetail, ApiError, AssetDownload, AssetMetadata, ImmichApi};
use crate::retry::{retry_with_backoff, RetryConfig};

/// Sync-side view of the catalog: per-asset calls run under one shared
/// concurrency limiter and retry with backoff.
///
/// A single semaphore gates metadata fetches, size probes, and downloads
/// together, so total in-flight work never exceeds the configured capacity.
/// Album-level calls happen once per run and pass through ungated.
pub struct Remote {
    api: Arc<dyn ImmichApi>,
    limiter: Arc<Semaphore>,
    retry: RetryConfig,
}

impl Remote {
    pub fn new(api: Arc<dyn ImmichApi>, capacity: usize, retry: RetryConfig) -> Self {
        Self {
            api,
            limiter: Arc::new(Semaphore::new(capacity.max(1))),
            retry,
        }
    }

    pub fn retry(&self) -> &RetryConfig {
        &self.retry
    }

    pub async fn list_albums(&self, shared_only: bool) -> Result<Vec<Album>, ApiError> {
        self.api.list_albums(shared_only).await
    }

    pub async fn get_album(&self, album_id: &str) -> Result<AlbumDetail, ApiError> {
        self.api.get_album(album_id).await
    }

    /// Fresh metadata for one asset. The limiter slot is held across the
    /// whole retry loop, backoff sleeps included.
    pub async fn asset_info(&self, asset_id: &str) -> Result<AssetMetadata, SyncError> {
        let _permit = self.limiter.acquire().await.expect("limiter never closed");
        retry_with_backoff(&self.retry, || self.api.asset_info(asset_id))
            .await
            .map_err(|source| SyncError::RemoteFetch {
                asset_id: asset_id.to_string(),
                source,
            })
    }

    /// Probe an asset's byte size, limited and retried like `asset_info`.
    pub async fn asset_size(&self, asset_id: &str) -> Result<u64, SyncError> {
        let _permit = self.limiter.acquire().await.expect("limiter never closed");
        retry_with_backoff(&self.retry, || self.api.asset_size(asset_id))
            .await
            .map_err(|source| SyncError::RemoteFetch {
                asset_id: asset_id.to_string(),
                source,
            })
    }

    /// Take one limiter slot for the duration of a download, retries
    /// included. Retry handling lives with the caller because each attempt
    /// opens a new stream.
    pub async fn download_permit(&self) -> OwnedSemaphorePermit {
        self.limiter
            .clone()
            .acquire_owned()
            .await
            .expect("limiter never closed")
    }

    pub async fn open_original(&self, asset_id: &str) -> Result<AssetDownload, ApiError> {
        self.api.open_original(asset_id).await
    }
}
