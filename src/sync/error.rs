use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::immich::ApiError;

/// Why a single asset's download failed after all attempts.
#[derive(Error, Debug)]
pub enum DownloadError {
    #[error(transparent)]
    Remote(#[from] ApiError),
    #[error("Disk error: {0}")]
    Disk(#[from] io::Error),
}

/// Terminal errors for a sync run. Transient failures are retried below this
/// level; anything surfacing here aborts the run.
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Album not found: {0}")]
    AlbumNotFound(String),

    #[error("Fetching asset {asset_id} failed after retries: {source}")]
    RemoteFetch {
        asset_id: String,
        #[source]
        source: ApiError,
    },

    #[error("Downloading asset {asset_id} failed: {source}")]
    Download {
        asset_id: String,
        #[source]
        source: DownloadError,
    },

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("Cannot use destination {}: {source}", path.display())]
    Destination {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}
