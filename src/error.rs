//! Error types surfaced to callers of the test drivers.
//!
//! Per-request failures never show up here: they are recorded in-band as failed
//! [`ResultRecord`](crate::ResultRecord)s. Only invalid configuration and fatal
//! driver failures abort a run.
use thiserror::Error;
use tokio::task::JoinError;

/// Invalid run configuration, rejected before any worker starts.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    /// The fixed-count total was zero.
    #[error("total requests must be at least 1")]
    ZeroTotal,

    /// The concurrency was zero.
    #[error("concurrency must be at least 1")]
    ZeroConcurrency,

    /// The fixed-duration budget was shorter than one second.
    #[error("duration must be at least 1 second")]
    ZeroDuration,

    /// The fixed-duration budget does not fit into a deadline.
    #[error("duration of {0}s is too long")]
    DurationTooLong(u64),

    /// The temperature was not a finite value in `0.0..=2.0`.
    #[error("temperature must be within 0.0..=2.0, got {0}")]
    InvalidTemperature(f32),

    /// The max output tokens was zero.
    #[error("max tokens must be at least 1")]
    ZeroMaxTokens,

    /// The prompt was empty or whitespace only.
    #[error("prompt cannot be empty")]
    EmptyPrompt,
}

/// Errors that abort a test run instead of producing a summary.
#[derive(Debug, Error)]
pub enum BenchError {
    /// The run was misconfigured.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A worker task panicked or could not be joined.
    #[error("worker failed: {0}")]
    Worker(#[from] JoinError),
}

/// Result type used by the test drivers.
pub type BenchResult<T> = std::result::Result<T, BenchError>;
