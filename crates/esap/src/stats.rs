//! 📊 Delivery counters, because "how many did we lose?" deserves a better answer than "uh... some?"

use std::sync::atomic::{AtomicU64, Ordering};

/// 📊 Lock-free counters bumped from the append path and the flush worker.
#[derive(Debug, Default)]
pub struct AppenderStats {
    accepted: AtomicU64,
    dropped: AtomicU64,
    failed: AtomicU64,
    batches_sent: AtomicU64,
    batches_failed: AtomicU64,
    records_delivered: AtomicU64,
}

/// 📸 A plain copy of the counters at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatsSnapshot {
    /// Records that made it into the buffer.
    pub accepted: u64,
    /// Records dropped because the buffer was full.
    pub dropped: u64,
    /// Events that never became a record (layout, encoding, appender not started).
    pub failed: u64,
    pub batches_sent: u64,
    pub batches_failed: u64,
    /// Records inside batches the cluster accepted.
    pub records_delivered: u64,
}

impl AppenderStats {
    pub(crate) fn record_accepted(&self) {
        self.accepted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_batch(&self, records: usize, delivered: bool) {
        if delivered {
            self.batches_sent.fetch_add(1, Ordering::Relaxed);
            self.records_delivered
                .fetch_add(records as u64, Ordering::Relaxed);
        } else {
            self.batches_failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            accepted: self.accepted.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            batches_sent: self.batches_sent.load(Ordering::Relaxed),
            batches_failed: self.batches_failed.load(Ordering::Relaxed),
            records_delivered: self.records_delivered.load(Ordering::Relaxed),
        }
    }
}
