use std::io::Write;

use crate::report::TestSummary;

use super::BenchReporter;

/// Prints the summary as pretty JSON.
pub struct JsonReporter;

impl BenchReporter for JsonReporter {
    fn print(&self, w: &mut dyn Write, summary: &TestSummary) -> anyhow::Result<()> {
        serde_json::to_writer_pretty(&mut *w, summary)?;
        writeln!(w)?;
        Ok(())
    }
}
