//! The per-request result record and the per-run test summary.
use std::time::Duration;

use serde::Serialize;

/// The outcome of one completed request attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultRecord {
    /// The response text, empty on failure.
    pub response: String,
    /// The reasoning text, empty on failure or when the model produced none.
    pub reasoning: String,
    /// Wall-clock time from start of the call to its completion.
    pub elapsed: Duration,
    /// The error message, present iff the attempt failed.
    pub error: Option<String>,
}

impl ResultRecord {
    /// Creates a successful record.
    pub fn success(response: String, reasoning: String, elapsed: Duration) -> Self {
        Self { response, reasoning, elapsed, error: None }
    }

    /// Creates a failed record.
    pub fn failure(elapsed: Duration, error: String) -> Self {
        Self { response: String::new(), reasoning: String::new(), elapsed, error: Some(error) }
    }

    /// Returns true if the attempt succeeded.
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// Elapsed time in seconds.
    pub fn elapsed_secs(&self) -> f64 {
        self.elapsed.as_secs_f64()
    }
}

/// Latency distribution over successful attempts, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LatencyStats {
    /// Fastest successful attempt.
    pub min: f64,
    /// Median latency.
    pub median: f64,
    /// Slowest successful attempt.
    pub max: f64,
    /// Standard deviation.
    pub stdev: f64,
}

/// Statistics shared by both test modes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CoreStats {
    /// Number of attempts.
    pub total: u64,
    /// Number of successful attempts.
    pub success: u64,
    /// Number of failed attempts.
    pub failed: u64,
    /// Success percentage, 2 decimals. Zero when nothing was attempted.
    pub success_rate: f64,
    /// Mean latency of successful attempts in seconds.
    pub avg_time: f64,
    /// 95th-percentile latency of successful attempts in seconds.
    ///
    /// Zero when fewer than 20 attempts succeeded.
    pub p95_time: f64,
    /// Successful attempts per second of wall time.
    pub qps: f64,
    /// Up to 5 failure descriptions, in completion order.
    pub failures: Vec<String>,
    /// Latency distribution, absent when nothing succeeded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency: Option<LatencyStats>,
}

/// Mode-specific fields of a test summary.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum RunMode {
    /// A test bounded by a request count.
    FixedCount {
        /// Wall time from first submission to last completion, in seconds.
        total_wall_time: f64,
    },
    /// A test bounded by wall-clock time.
    FixedDuration {
        /// Actual elapsed time of the run, in seconds.
        duration: f64,
        /// The requested duration, in seconds.
        target_duration: u64,
    },
}

/// The final summary of one test run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TestSummary {
    /// Number of concurrent workers used.
    pub concurrency: u32,
    /// Statistics common to both modes.
    #[serde(flatten)]
    pub stats: CoreStats,
    /// Mode-specific fields.
    #[serde(flatten)]
    pub mode: RunMode,
}

impl TestSummary {
    /// The wall time the throughput was computed against, in seconds.
    pub fn wall_time(&self) -> f64 {
        match self.mode {
            RunMode::FixedCount { total_wall_time } => total_wall_time,
            RunMode::FixedDuration { duration, .. } => duration,
        }
    }
}
