//! Statistics for micro-batchers.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::config::MicroBatchConfig;

/// What caused a batch to be cut from the queue.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum FlushReason {
    Size,
    Time,
    Drain,
}

#[derive(Debug, Default)]
pub(crate) struct MicroBatchStats {
    pub submitted: AtomicU64,
    pub rejected: AtomicU64,
    pub batches: AtomicU64,
    pub size_flushes: AtomicU64,
    pub time_flushes: AtomicU64,
    pub drain_flushes: AtomicU64,
    pub in_flight: AtomicU64,
    pub failed_batches: AtomicU64,
}

impl MicroBatchStats {
    pub fn on_flush(&self, reason: FlushReason) {
        self.batches.fetch_add(1, Ordering::Relaxed);

        let counter = match reason {
            FlushReason::Size => &self.size_flushes,
            FlushReason::Time => &self.time_flushes,
            FlushReason::Drain => &self.drain_flushes,
        };

        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self, cfg: &MicroBatchConfig, queued: usize) -> Stats {
        Stats {
            submitted: self.submitted.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            queued: queued as u64,
            batches: self.batches.load(Ordering::Relaxed),
            size_flushes: self.size_flushes.load(Ordering::Relaxed),
            time_flushes: self.time_flushes.load(Ordering::Relaxed),
            drain_flushes: self.drain_flushes.load(Ordering::Relaxed),
            in_flight: self.in_flight.load(Ordering::Relaxed),
            failed_batches: self.failed_batches.load(Ordering::Relaxed),
            batch_size: cfg.batch_size as u64,
            max_parallel: cfg.max_parallel as u64,
        }
    }
}

/// Point-in-time view of a batcher's counters.
///
/// Returned by [`MicroBatcher::stats()`](crate::MicroBatcher::stats).
///
/// # Example
///
/// ```rust,ignore
/// let stats = batcher.stats();
/// println!("queued: {}/{}", stats.queued, stats.batch_size);
/// println!("batches: {} ({} by size, {} by time)",
///     stats.batches, stats.size_flushes, stats.time_flushes);
/// ```
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct Stats {
    /// Jobs accepted by `submit`.
    pub submitted: u64,

    /// Submissions refused because shutdown was in progress.
    pub rejected: u64,

    /// Jobs waiting in the queue for the next flush.
    pub queued: u64,

    /// Batches cut from the queue, whatever the trigger.
    pub batches: u64,

    /// Batches cut because the queue reached `batch_size`.
    pub size_flushes: u64,

    /// Batches cut because `batch_interval` elapsed.
    pub time_flushes: u64,

    /// Batches cut while draining on shutdown.
    pub drain_flushes: u64,

    /// Processor calls currently running.
    pub in_flight: u64,

    /// Processor calls that returned an error or panicked.
    pub failed_batches: u64,

    /// Configured number of jobs that triggers a flush.
    pub batch_size: u64,

    /// Configured number of processor calls allowed to run at once.
    pub max_parallel: u64,
}
