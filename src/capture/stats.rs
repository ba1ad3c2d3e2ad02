use std::sync::atomic::{AtomicU64, Ordering};

/// Snapshot of the capture pipeline counters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CaptureStats {
    pub captures: u64,
    pub delivered: u64,
    pub local_only: u64,
    pub failed: u64,
    pub delivery_attempts: u64,
    pub trigger_failures: u64,
    pub reclaim_passes: u64,
}

impl CaptureStats {
    pub fn delivery_success_rate(&self) -> f64 {
        if self.captures == 0 {
            0.0
        } else {
            self.delivered as f64 / self.captures as f64
        }
    }
}

#[derive(Debug, Default)]
pub(super) struct CaptureCounters {
    pub captures: AtomicU64,
    pub delivered: AtomicU64,
    pub local_only: AtomicU64,
    pub failed: AtomicU64,
    pub delivery_attempts: AtomicU64,
    pub trigger_failures: AtomicU64,
    pub reclaim_passes: AtomicU64,
}

impl CaptureCounters {
    /// Bump a counter, returning the new value
    pub fn bump(counter: &AtomicU64) -> u64 {
        counter.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn snapshot(&self) -> CaptureStats {
        CaptureStats {
            captures: self.captures.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            local_only: self.local_only.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            delivery_attempts: self.delivery_attempts.load(Ordering::Relaxed),
            trigger_failures: self.trigger_failures.load(Ordering::Relaxed),
            reclaim_passes: self.reclaim_passes.load(Ordering::Relaxed),
        }
    }
}
