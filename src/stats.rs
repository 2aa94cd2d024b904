//! Consumer statistics

use std::sync::atomic::{AtomicU64, Ordering};

/// Per-consumer statistics
pub struct ConsumerStats {
    /// Deliveries received
    pub payloads_received: AtomicU64,
    /// Deliveries that failed to decode
    pub payloads_rejected: AtomicU64,
    /// Handlers invoked
    pub compensations_dispatched: AtomicU64,
    /// Handlers that returned `Ok`
    pub compensations_completed: AtomicU64,
    /// Handlers that returned an error
    pub compensations_failed: AtomicU64,
    /// Compensation entries with no registered handler
    pub compensations_skipped: AtomicU64,
}

impl ConsumerStats {
    /// Zeroed counters
    pub fn new() -> Self {
        Self {
            payloads_received: AtomicU64::new(0),
            payloads_rejected: AtomicU64::new(0),
            compensations_dispatched: AtomicU64::new(0),
            compensations_completed: AtomicU64::new(0),
            compensations_failed: AtomicU64::new(0),
            compensations_skipped: AtomicU64::new(0),
        }
    }

    pub(crate) fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Read all counters
    pub fn snapshot(&self) -> ConsumerStatsSnapshot {
        ConsumerStatsSnapshot {
            payloads_received: self.payloads_received.load(Ordering::Relaxed),
            payloads_rejected: self.payloads_rejected.load(Ordering::Relaxed),
            compensations_dispatched: self.compensations_dispatched.load(Ordering::Relaxed),
            compensations_completed: self.compensations_completed.load(Ordering::Relaxed),
            compensations_failed: self.compensations_failed.load(Ordering::Relaxed),
            compensations_skipped: self.compensations_skipped.load(Ordering::Relaxed),
        }
    }
}

impl Default for ConsumerStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time copy of [`ConsumerStats`]
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ConsumerStatsSnapshot {
    /// Deliveries received
    pub payloads_received: u64,
    /// Deliveries that failed to decode
    pub payloads_rejected: u64,
    /// Handlers invoked
    pub compensations_dispatched: u64,
    /// Handlers that returned `Ok`
    pub compensations_completed: u64,
    /// Handlers that returned an error
    pub compensations_failed: u64,
    /// Compensation entries with no registered handler
    pub compensations_skipped: u64,
}
