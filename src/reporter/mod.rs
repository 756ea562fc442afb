//! This module defines a trait for printing test summaries.
mod json;
mod text;

pub use json::JsonReporter;
pub use text::TextReporter;

use crate::report::TestSummary;

/// A trait for reporting test results.
pub trait BenchReporter {
    /// Print the summary to the given writer.
    fn print(&self, w: &mut dyn std::io::Write, summary: &TestSummary) -> anyhow::Result<()>;
}
