//! A load testing and latency measurement harness for chat-completion style HTTP APIs.
//!
//! chatbench issues synthetic requests against a chat completion endpoint,
//! measures per-request latency and outcome, and reduces the results into a
//! [`TestSummary`]: success rate, mean and p95 latency, throughput and a small
//! sample of failures.
//!
//! Two test modes are available:
//!
//! - **Fixed count**: run exactly N requests with a bounded number in flight.
//! - **Fixed duration**: keep a set of workers busy for a wall-clock budget,
//!   with live progress delivered to an optional [`ProgressSink`].
//!
//! The wire protocol lives behind the [`RequestIssuer`] trait. An issuer for
//! OpenAI-compatible APIs is provided in [`openai`] (feature `http`).
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use anyhow::Result;
//! use async_trait::async_trait;
//! use chatbench::{CountOpts, IssuerOutput, RequestIssuer, RequestParameters};
//!
//! struct Echo;
//!
//! #[async_trait]
//! impl RequestIssuer for Echo {
//!     async fn issue(&self, params: &RequestParameters) -> Result<IssuerOutput> {
//!         // call the target API here
//!         Ok(IssuerOutput { content: params.prompt.clone(), reasoning: String::new() })
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let opts = CountOpts { total: 100, concurrency: 10 };
//!     let summary = chatbench::run_fixed_count(Arc::new(Echo), RequestParameters::new("hello"), opts).await?;
//!     println!("{:.2}% succeeded, {} qps", summary.stats.success_rate, summary.stats.qps);
//!     Ok(())
//! }
//! ```
#![deny(missing_docs)]

mod error;
mod executor;
mod histogram;
mod progress;
mod report;
mod request;
mod runner;

pub mod cli;
#[cfg(feature = "http")]
pub mod openai;
pub mod reporter;
pub mod stats;

pub use crate::{
    error::{BenchError, BenchResult, ConfigError},
    executor::execute,
    progress::{LatestSnapshot, ProgressSink, ProgressSnapshot, RunState, WatchSink},
    report::{CoreStats, LatencyStats, ResultRecord, RunMode, TestSummary},
    request::{DEFAULT_SYSTEM_PROMPT, IssuerOutput, RequestIssuer, RequestParameters},
    runner::{CountOpts, DurationOpts, JOIN_GRACE, Runner, TICK, run_fixed_count, run_fixed_duration},
};
