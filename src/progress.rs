//! Live progress reporting for running tests.
use std::fmt;

use parking_lot::Mutex;
use serde::Serialize;
use strum::Display;
use tokio::sync::watch;

/// Run state of a fixed-duration test.
///
/// State transitions: `Idle → Running → Stopping → Done` (Done is terminal)
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default, Display, Serialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum RunState {
    /// Not started yet.
    #[default]
    Idle,
    /// Workers active, coordinator ticking.
    Running,
    /// Deadline passed, waiting for workers to finish.
    Stopping,
    /// Summary computed.
    Done,
}

/// A point-in-time view of an in-progress fixed-duration test.
#[derive(Clone, Copy, PartialEq, Debug, Default, Serialize)]
pub struct ProgressSnapshot {
    /// Current run state.
    pub state: RunState,
    /// Elapsed seconds, clamped to `[0, target]`.
    pub elapsed: f64,
    /// Target duration in seconds.
    pub target: u64,
    /// Requests completed so far.
    pub requests: u64,
    /// Successful requests so far.
    pub success: u64,
    /// Successes per second of elapsed time.
    pub qps: f64,
}

impl fmt::Display for ProgressSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:.2}s/{}s, requests={}, success={}, qps={:.2}",
            self.elapsed, self.target, self.requests, self.success, self.qps
        )
    }
}

/// A consumer of live progress.
///
/// Drivers call the sink inline, so implementations must return promptly and
/// never block on a slow consumer.
pub trait ProgressSink: Send + Sync {
    /// Called about once per second during a fixed-duration test.
    fn on_progress(&self, snapshot: &ProgressSnapshot);

    /// Called after every completion during a fixed-count test.
    #[allow(unused_variables)]
    fn on_completed(&self, completed: u64, total: u64) {}
}

/// A sink that publishes snapshots through a [`watch`] channel.
///
/// Each update replaces the whole snapshot, so receivers never observe a mix of
/// two ticks.
#[derive(Debug)]
pub struct WatchSink {
    tx: watch::Sender<ProgressSnapshot>,
}

impl WatchSink {
    /// Creates the sink and a receiver for it.
    pub fn channel() -> (Self, watch::Receiver<ProgressSnapshot>) {
        let (tx, rx) = watch::channel(ProgressSnapshot::default());
        (Self { tx }, rx)
    }
}

impl ProgressSink for WatchSink {
    fn on_progress(&self, snapshot: &ProgressSnapshot) {
        // `send_replace` stores the value even when no receiver is alive.
        self.tx.send_replace(*snapshot);
    }
}

/// A sink that keeps only the most recent snapshot, for polling consumers.
#[derive(Debug, Default)]
pub struct LatestSnapshot {
    latest: Mutex<Option<ProgressSnapshot>>,
}

impl LatestSnapshot {
    /// Returns the most recent snapshot, if any was delivered.
    pub fn get(&self) -> Option<ProgressSnapshot> {
        *self.latest.lock()
    }
}

impl ProgressSink for LatestSnapshot {
    fn on_progress(&self, snapshot: &ProgressSnapshot) {
        *self.latest.lock() = Some(*snapshot);
    }
}
