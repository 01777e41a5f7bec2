//! Hand-rolled fakes shared by the sync tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use futures_util::stream;

use crate::immich::{
    Album, AlbumDetail, ApiError, AssetDownload, AssetMetadata, ByteStream, ImmichApi,
};

/// SHA-1/base64 digest of a byte slice, matching what the engine computes
/// for files on disk.
pub fn digest_of(data: &[u8]) -> String {
    use base64::Engine;
    use sha1::{Digest, Sha1};
    let mut hasher = Sha1::new();
    hasher.update(data);
    base64::engine::general_purpose::STANDARD.encode(hasher.finalize())
}

/// Tracks how many calls are in flight and the highest count seen.
#[derive(Debug, Default)]
pub struct Gauge {
    current: AtomicUsize,
    peak: AtomicUsize,
}

impl Gauge {
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

fn enter(gauge: &Arc<Gauge>) -> GaugeGuard {
    let now = gauge.current.fetch_add(1, Ordering::SeqCst) + 1;
    gauge.peak.fetch_max(now, Ordering::SeqCst);
    GaugeGuard {
        gauge: Arc::clone(gauge),
    }
}

pub struct GaugeGuard {
    gauge: Arc<Gauge>,
}

impl Drop for GaugeGuard {
    fn drop(&mut self) {
        self.gauge.current.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Scripted catalog: albums, per-asset metadata, sizes, bodies, and failure
/// injection. The gauge spans metadata calls, size probes, and the whole
/// lifetime of each byte stream, so tests can observe the concurrency bound.
pub struct FakeApi {
    shared_albums: Vec<Album>,
    private_albums: Vec<Album>,
    details: HashMap<String, AlbumDetail>,
    infos: HashMap<String, AssetMetadata>,
    sizes: HashMap<String, u64>,
    bodies: HashMap<String, Vec<u8>>,
    info_failures: Mutex<HashMap<String, u32>>,
    stream_failures: Mutex<HashMap<String, u32>>,
    pub info_calls: AtomicUsize,
    pub size_calls: AtomicUsize,
    pub gauge: Arc<Gauge>,
}

impl FakeApi {
    pub fn new() -> Self {
        Self {
            shared_albums: Vec::new(),
            private_albums: Vec::new(),
            details: HashMap::new(),
            infos: HashMap::new(),
            sizes: HashMap::new(),
            bodies: HashMap::new(),
            info_failures: Mutex::new(HashMap::new()),
            stream_failures: Mutex::new(HashMap::new()),
            info_calls: AtomicUsize::new(0),
            size_calls: AtomicUsize::new(0),
            gauge: Arc::new(Gauge::default()),
        }
    }

    /// Register an album and the metadata of its assets.
    pub fn with_album(mut self, name: &str, shared: bool, assets: Vec<AssetMetadata>) -> Self {
        let id = format!("album-{}", self.details.len());
        let album = Album {
            id: id.clone(),
            album_name: name.to_string(),
        };
        if shared {
            self.shared_albums.push(album);
        } else {
            self.private_albums.push(album);
        }
        for asset in &assets {
            self.infos.insert(asset.id.clone(), asset.clone());
        }
        self.details.insert(id, AlbumDetail { assets });
        self
    }

    pub fn with_info(mut self, asset: AssetMetadata) -> Self {
        self.infos.insert(asset.id.clone(), asset);
        self
    }

    pub fn with_size(mut self, asset_id: &str, size: u64) -> Self {
        self.sizes.insert(asset_id.to_string(), size);
        self
    }

    pub fn with_body(mut self, asset_id: &str, body: &[u8]) -> Self {
        self.bodies.insert(asset_id.to_string(), body.to_vec());
        self
    }

    /// Make the next `count` metadata fetches for this asset fail.
    pub fn fail_info(self, asset_id: &str, count: u32) -> Self {
        self.info_failures
            .lock()
            .unwrap()
            .insert(asset_id.to_string(), count);
        self
    }

    /// Make the next `count` byte streams for this asset break midway.
    pub fn fail_stream(self, asset_id: &str, count: u32) -> Self {
        self.stream_failures
            .lock()
            .unwrap()
            .insert(asset_id.to_string(), count);
        self
    }
}

fn take_failure(map: &Mutex<HashMap<String, u32>>, asset_id: &str) -> bool {
    let mut map = map.lock().unwrap();
    match map.get_mut(asset_id) {
        Some(n) if *n > 0 => {
            *n -= 1;
            true
        }
        _ => false,
    }
}

fn not_found(what: &str) -> ApiError {
    ApiError::Status {
        status: 404,
        url: what.to_string(),
    }
}

/// Yield the body in small chunks, optionally breaking midway. The gauge
/// guard lives inside the stream state so the download counts as in-flight
/// until the stream is consumed or dropped.
fn scripted_stream(body: Vec<u8>, fail_midway: bool, guard: GaugeGuard) -> ByteStream {
    let mut chunks: Vec<Result<Bytes, ApiError>> = body
        .chunks(4)
        .map(|c| Ok(Bytes::copy_from_slice(c)))
        .collect();
    if fail_midway {
        chunks.truncate(chunks.len() / 2);
        chunks.push(Err(ApiError::Status {
            status: 502,
            url: "stream".to_string(),
        }));
    }
    Box::pin(stream::unfold(
        (chunks.into_iter(), guard),
        |(mut chunks, guard)| async move {
            tokio::task::yield_now().await;
            chunks.next().map(|item| (item, (chunks, guard)))
        },
    ))
}

#[async_trait::async_trait]
impl ImmichApi for FakeApi {
    async fn list_albums(&self, shared_only: bool) -> Result<Vec<Album>, ApiError> {
        Ok(if shared_only {
            self.shared_albums.clone()
        } else {
            self.private_albums.clone()
        })
    }

    async fn get_album(&self, album_id: &str) -> Result<AlbumDetail, ApiError> {
        self.details
            .get(album_id)
            .cloned()
            .ok_or_else(|| not_found(album_id))
    }

    async fn asset_info(&self, asset_id: &str) -> Result<AssetMetadata, ApiError> {
        self.info_calls.fetch_add(1, Ordering::SeqCst);
        let _guard = enter(&self.gauge);
        tokio::task::yield_now().await;
        if take_failure(&self.info_failures, asset_id) {
            return Err(ApiError::Status {
                status: 500,
                url: asset_id.to_string(),
            });
        }
        self.infos
            .get(asset_id)
            .cloned()
            .ok_or_else(|| not_found(asset_id))
    }

    async fn asset_size(&self, asset_id: &str) -> Result<u64, ApiError> {
        self.size_calls.fetch_add(1, Ordering::SeqCst);
        let _guard = enter(&self.gauge);
        tokio::task::yield_now().await;
        Ok(self.sizes.get(asset_id).copied().unwrap_or(0))
    }

    async fn open_original(&self, asset_id: &str) -> Result<AssetDownload, ApiError> {
        let body = self
            .bodies
            .get(asset_id)
            .cloned()
            .ok_or_else(|| not_found(asset_id))?;
        let fail_midway = take_failure(&self.stream_failures, asset_id);
        let guard = enter(&self.gauge);
        Ok(AssetDownload {
            content_length: Some(body.len() as u64),
            stream: scripted_stream(body, fail_midway, guard),
        })
    }
}
