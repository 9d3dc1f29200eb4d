//! Router metrics
//!
//! Atomic counters shared across the router's loops; `snapshot()` gives a
//! consistent-enough copy for logging and tests.

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters for one destination router
#[derive(Debug, Default)]
pub struct RouterMetrics {
    /// Jobs marked Executing by pickups
    pub picked_up: AtomicU64,

    /// Pickup cycles that returned nothing
    pub empty_pickups: AtomicU64,

    pub succeeded: AtomicU64,
    pub failed: AtomicU64,
    pub aborted: AtomicU64,
    pub waiting: AtomicU64,
    pub throttled: AtomicU64,

    /// Jobs aborted before dispatch because they outlived retention
    pub expired: AtomicU64,

    /// Whole-batch transform failures (counted separately from delivery)
    pub transform_failures: AtomicU64,

    /// Batches flushed by workers
    pub batches_dispatched: AtomicU64,

    /// Status rows committed by the writer
    pub statuses_written: AtomicU64,
}

impl RouterMetrics {
    pub const fn new() -> Self {
        Self {
            picked_up: AtomicU64::new(0),
            empty_pickups: AtomicU64::new(0),
            succeeded: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            aborted: AtomicU64::new(0),
            waiting: AtomicU64::new(0),
            throttled: AtomicU64::new(0),
            expired: AtomicU64::new(0),
            transform_failures: AtomicU64::new(0),
            batches_dispatched: AtomicU64::new(0),
            statuses_written: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn record_pickup(&self, count: u64) {
        if count == 0 {
            self.empty_pickups.fetch_add(1, Ordering::Relaxed);
        } else {
            self.picked_up.fetch_add(count, Ordering::Relaxed);
        }
    }

    #[inline]
    pub fn record_state(&self, state: ferry_protocol::JobState) {
        use ferry_protocol::JobState;
        match state {
            JobState::Succeeded => self.succeeded.fetch_add(1, Ordering::Relaxed),
            JobState::Failed => self.failed.fetch_add(1, Ordering::Relaxed),
            JobState::Aborted => self.aborted.fetch_add(1, Ordering::Relaxed),
            JobState::Waiting => self.waiting.fetch_add(1, Ordering::Relaxed),
            JobState::Throttled => self.throttled.fetch_add(1, Ordering::Relaxed),
            _ => 0,
        };
    }

    #[inline]
    pub fn record_expired(&self) {
        self.expired.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_transform_failure(&self) {
        self.transform_failures.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_batch(&self) {
        self.batches_dispatched.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_statuses_written(&self, count: u64) {
        self.statuses_written.fetch_add(count, Ordering::Relaxed);
    }

    /// Point-in-time copy of the counters
    pub fn snapshot(&self) -> RouterMetricsSnapshot {
        RouterMetricsSnapshot {
            picked_up: self.picked_up.load(Ordering::Relaxed),
            empty_pickups: self.empty_pickups.load(Ordering::Relaxed),
            succeeded: self.succeeded.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            aborted: self.aborted.load(Ordering::Relaxed),
            waiting: self.waiting.load(Ordering::Relaxed),
            throttled: self.throttled.load(Ordering::Relaxed),
            expired: self.expired.load(Ordering::Relaxed),
            transform_failures: self.transform_failures.load(Ordering::Relaxed),
            batches_dispatched: self.batches_dispatched.load(Ordering::Relaxed),
            statuses_written: self.statuses_written.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time snapshot of router metrics
#[derive(Debug, Clone, Copy, Default)]
pub struct RouterMetricsSnapshot {
    pub picked_up: u64,
    pub empty_pickups: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub aborted: u64,
    pub waiting: u64,
    pub throttled: u64,
    pub expired: u64,
    pub transform_failures: u64,
    pub batches_dispatched: u64,
    pub statuses_written: u64,
}

impl RouterMetricsSnapshot {
    /// Jobs the router has finished deciding this run
    pub fn finalized(&self) -> u64 {
        self.succeeded + self.failed + self.aborted + self.waiting + self.throttled
    }
}
