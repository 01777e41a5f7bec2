use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Receives progress events from the sync engine.
///
/// The engine reports what happened and never writes to the console itself;
/// frontends decide how to render. Every method defaults to a no-op so an
/// implementation overrides only the events it cares about.
pub trait SyncObserver: Send + Sync {
    /// The album resolved to this many assets; metadata fetch is starting.
    fn metadata_queued(&self, _total: usize) {}

    /// Fresh metadata for one asset arrived.
    fn metadata_fetched(&self, _asset_id: &str) {}

    /// A local candidate was compared against the remote digest.
    fn checksum_checked(&self, _asset_id: &str, _already_synced: bool) {}

    /// Planning finished: byte totals and the number of pending downloads.
    fn plan_ready(&self, _total_bytes: u64, _done_bytes: u64, _pending: usize) {}

    /// A download attempt opened its byte stream.
    fn download_started(&self, _asset_id: &str, _expected_bytes: u64) {}

    /// A chunk of this many bytes was written to the temp file.
    fn bytes_transferred(&self, _asset_id: &str, _delta: u64) {}

    /// The asset was promoted to its final path.
    fn asset_completed(&self, _asset_id: &str, _bytes_written: u64) {}
}

/// Observer that drops every event.
#[allow(dead_code)]
pub struct NullObserver;

impl SyncObserver for NullObserver {}

/// Plain atomic counters, for tests and non-interactive callers.
#[derive(Debug, Default)]
#[allow(dead_code)]
pub struct SyncCounters {
    pub metadata_fetched: AtomicUsize,
    pub checksums_checked: AtomicUsize,
    pub assets_completed: AtomicUsize,
    pub bytes_transferred: AtomicU64,
}

impl SyncObserver for SyncCounters {
    fn metadata_fetched(&self, _asset_id: &str) {
        self.metadata_fetched.fetch_add(1, Ordering::Relaxed);
    }

    fn checksum_checked(&self, _asset_id: &str, _already_synced: bool) {
        self.checksums_checked.fetch_add(1, Ordering::Relaxed);
    }

    fn bytes_transferred(&self, _asset_id: &str, delta: u64) {
        self.bytes_transferred.fetch_add(delta, Ordering::Relaxed);
    }

    fn asset_completed(&self, _asset_id: &str, _bytes_written: u64) {
        self.assets_completed.fetch_add(1, Ordering::Relaxed);
    }
}
