//! Progress reporting.
//!
//! This module provides [`ProgressCallback`] for monitoring a split and
//! [`ProgressInfo`] for per-frame snapshots.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use framesplit::{ProgressCallback, ProgressInfo, SplitOptions};
//!
//! struct PrintProgress;
//!
//! impl ProgressCallback for PrintProgress {
//!     fn on_progress(&self, info: &ProgressInfo) {
//!         if let Some(pct) = info.percentage {
//!             println!("{pct:.1}% complete ({} failed)", info.failed);
//!         }
//!     }
//! }
//!
//! let report = framesplit::split_images_shared(
//!     "scan.tif",
//!     "scan",
//!     &SplitOptions::new().with_progress(Arc::new(PrintProgress)),
//! );
//! println!("{}", report.diagnostics);
//! ```

use std::sync::Arc;
use std::time::{Duration, Instant};

/// A snapshot of split progress.
///
/// Delivered to [`ProgressCallback::on_progress`] at a cadence controlled
/// by [`SplitOptions::with_batch_size`](crate::SplitOptions::with_batch_size).
#[derive(Debug, Clone)]
pub struct ProgressInfo {
    /// How many frames have been attempted so far.
    pub current: u64,
    /// Total frames in the container.
    pub total: Option<u64>,
    /// How many of the attempted frames failed.
    pub failed: u64,
    /// Completion percentage (0.0 – 100.0), if `total` is known and non-zero.
    pub percentage: Option<f32>,
    /// Wall-clock time elapsed since the split started.
    pub elapsed: Duration,
    /// Estimated time remaining, based on current throughput.
    pub estimated_remaining: Option<Duration>,
    /// The frame index that was just attempted.
    pub current_frame: Option<u32>,
}

/// Trait for receiving progress updates during a split.
///
/// Implementations must be [`Send`] and [`Sync`] so one callback can be
/// shared between splits running on different threads.
pub trait ProgressCallback: Send + Sync {
    /// Called after frames are attempted.
    fn on_progress(&self, info: &ProgressInfo);
}

/// Discards all progress notifications. The default callback.
pub(crate) struct NoOpProgress;

impl ProgressCallback for NoOpProgress {
    fn on_progress(&self, _info: &ProgressInfo) {}
}

/// Tracks progress timing and emits callbacks.
pub(crate) struct ProgressTracker {
    callback: Arc<dyn ProgressCallback>,
    total: Option<u64>,
    current: u64,
    failed: u64,
    batch_size: u64,
    start_time: Instant,
    items_since_last_report: u64,
}

impl ProgressTracker {
    pub(crate) fn new(
        callback: Arc<dyn ProgressCallback>,
        total: Option<u64>,
        batch_size: u64,
    ) -> Self {
        Self {
            callback,
            total,
            current: 0,
            failed: 0,
            batch_size: batch_size.max(1),
            start_time: Instant::now(),
            items_since_last_report: 0,
        }
    }

    /// Record one attempted frame and fire the callback if the batch
    /// threshold is reached.
    pub(crate) fn advance(&mut self, frame_index: u32, succeeded: bool) {
        self.current += 1;
        if !succeeded {
            self.failed += 1;
        }
        self.items_since_last_report += 1;

        if self.items_since_last_report >= self.batch_size {
            self.report(Some(frame_index));
            self.items_since_last_report = 0;
        }
    }

    /// Unconditionally emit a final progress report.
    pub(crate) fn finish(&mut self) {
        self.report(None);
    }

    fn report(&self, frame_index: Option<u32>) {
        let elapsed = self.start_time.elapsed();

        let percentage = self
            .total
            .filter(|&t| t > 0)
            .map(|t| (self.current as f32 / t as f32) * 100.0);

        let estimated_remaining = if self.current > 0 {
            self.total.map(|t| {
                let remaining = t.saturating_sub(self.current);
                let per_item = elapsed / self.current as u32;
                per_item * remaining as u32
            })
        } else {
            None
        };

        let info = ProgressInfo {
            current: self.current,
            total: self.total,
            failed: self.failed,
            percentage,
            elapsed,
            estimated_remaining,
            current_frame: frame_index,
        };

        self.callback.on_progress(&info);
    }
}
