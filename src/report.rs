//! Terminal progress rendering. The sync engine only emits observer events;
//! everything indicatif-specific stays here.

use std::io::IsTerminal;
use std::sync::Mutex;

use indicatif::{ProgressBar, ProgressStyle};

use crate::progress::SyncObserver;

/// Renders the pipeline phases as progress bars: one counting bar while
/// metadata is fetched, one while local files are checked, then a byte bar
/// for the downloads. The phases never overlap, so one bar is live at a time.
pub struct ProgressReporter {
    no_progress_bar: bool,
    state: Mutex<Bars>,
}

#[derive(Default)]
struct Bars {
    total_assets: u64,
    metadata: Option<ProgressBar>,
    check: Option<ProgressBar>,
    bytes: Option<ProgressBar>,
}

/// Asset-count bar for the metadata and checksum phases. Hidden when the user
/// passed `--no-progress-bar` or stdout is not a TTY (piped output, cron jobs).
fn create_count_bar(no_progress_bar: bool, total: u64) -> ProgressBar {
    if no_progress_bar || !std::io::stdout().is_terminal() {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new(total);
    pb.set_style(
        ProgressStyle::with_template(
            "[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}",
        )
        .expect("valid template")
        .progress_chars("=> "),
    );
    pb
}

fn create_byte_bar(no_progress_bar: bool, total: u64) -> ProgressBar {
    if no_progress_bar || !std::io::stdout().is_terminal() {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new(total);
    pb.set_style(
        ProgressStyle::with_template(
            "[{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec}, {eta}) {msg}",
        )
        .expect("valid template")
        .progress_chars("=> "),
    );
    pb
}

impl ProgressReporter {
    pub fn new(no_progress_bar: bool) -> Self {
        Self {
            no_progress_bar,
            state: Mutex::new(Bars::default()),
        }
    }

    /// Clear whatever is still on screen. Safe to call after a failed run.
    pub fn finish(&self) {
        let Ok(mut bars) = self.state.lock() else { return };
        for pb in [bars.metadata.take(), bars.check.take(), bars.bytes.take()]
            .into_iter()
            .flatten()
        {
            pb.finish_and_clear();
        }
    }
}

// Rendering must never take the sync down, so a poisoned lock simply drops
// the event.
impl SyncObserver for ProgressReporter {
    fn metadata_queued(&self, total: usize) {
        let Ok(mut bars) = self.state.lock() else { return };
        bars.total_assets = total as u64;
        let pb = create_count_bar(self.no_progress_bar, total as u64);
        pb.set_message("fetching metadata");
        bars.metadata = Some(pb);
    }

    fn metadata_fetched(&self, _asset_id: &str) {
        let Ok(bars) = self.state.lock() else { return };
        if let Some(pb) = &bars.metadata {
            pb.inc(1);
        }
    }

    fn checksum_checked(&self, _asset_id: &str, _already_synced: bool) {
        let Ok(mut bars) = self.state.lock() else { return };
        if let Some(pb) = bars.metadata.take() {
            pb.finish_and_clear();
        }
        if bars.check.is_none() {
            let pb = create_count_bar(self.no_progress_bar, bars.total_assets);
            pb.set_message("checking local files");
            bars.check = Some(pb);
        }
        if let Some(pb) = &bars.check {
            pb.inc(1);
        }
    }

    fn plan_ready(&self, total_bytes: u64, done_bytes: u64, pending: usize) {
        let Ok(mut bars) = self.state.lock() else { return };
        if let Some(pb) = bars.metadata.take() {
            pb.finish_and_clear();
        }
        if let Some(pb) = bars.check.take() {
            pb.finish_and_clear();
        }
        if pending == 0 {
            return;
        }
        let pb = create_byte_bar(self.no_progress_bar, total_bytes);
        pb.set_position(done_bytes);
        pb.set_message(format!("downloading {pending} assets"));
        bars.bytes = Some(pb);
    }

    fn bytes_transferred(&self, _asset_id: &str, delta: u64) {
        let Ok(bars) = self.state.lock() else { return };
        if let Some(pb) = &bars.bytes {
            pb.inc(delta);
        }
    }

    fn asset_completed(&self, asset_id: &str, _bytes_written: u64) {
        let Ok(bars) = self.state.lock() else { return };
        if let Some(pb) = &bars.bytes {
            pb.set_message(asset_id.to_string());
        }
    }
}
