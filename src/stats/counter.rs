use std::sync::atomic::{AtomicU64, Ordering};

use crate::report::ResultRecord;

/// Running request/success counts shared between workers and the coordinator.
#[derive(Debug, Default)]
pub struct LiveCounter {
    requests: AtomicU64,
    successes: AtomicU64,
}

impl LiveCounter {
    /// Counts one completed attempt.
    pub fn record(&self, record: &ResultRecord) {
        if record.is_success() {
            self.successes.fetch_add(1, Ordering::Relaxed);
        }
        self.requests.fetch_add(1, Ordering::Release);
    }

    /// Returns `(requests, successes)`.
    ///
    /// `successes` never exceeds `requests`.
    pub fn load(&self) -> (u64, u64) {
        let requests = self.requests.load(Ordering::Acquire);
        let successes = self.successes.load(Ordering::Relaxed);
        (requests, successes.min(requests))
    }
}
