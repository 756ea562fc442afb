use crossterm::style::{StyledContent, Stylize};
use std::io::Write;
use tabled::{
    builder::Builder,
    settings::{
        Alignment, Color, Margin, Padding, Style,
        object::{Cell, Rows},
        themes::Colorization,
    },
};

use crate::report::{CoreStats, RunMode, TestSummary};

/// Prints the summary as colored plain text.
pub struct TextReporter;

impl super::BenchReporter for TextReporter {
    fn print(&self, w: &mut dyn Write, summary: &TestSummary) -> anyhow::Result<()> {
        print_summary(w, summary)?;
        writeln!(w)?;

        if summary.stats.success > 0 {
            print_latency(w, &summary.stats)?;
            writeln!(w)?;
        }

        print_failures(w, &summary.stats.failures)?;

        Ok(())
    }
}

fn render_success_rate(success_rate: f64) -> StyledContent<String> {
    let text = format!("{:.2}%", success_rate);
    if success_rate >= 100.0 {
        text.green().bold()
    } else if success_rate >= 99.0 {
        text.yellow().bold()
    } else {
        text.red().bold()
    }
}

#[rustfmt::skip]
fn print_summary(w: &mut dyn Write, summary: &TestSummary) -> anyhow::Result<()> {
    let stats = &summary.stats;

    writeln!(w, "{}", "Summary".h1())?;
    match summary.mode {
        RunMode::FixedCount { total_wall_time } => {
            writeln!(w, "  Mode:          {}", "fixed count".green().bold())?;
            writeln!(w, "  Wall time:     {}", format!("{total_wall_time:.3}s").green().bold())?;
        }
        RunMode::FixedDuration { duration, target_duration } => {
            writeln!(w, "  Mode:          {}", "fixed duration".green().bold())?;
            writeln!(w, "  Duration:      {} (target: {target_duration}s)", format!("{duration:.3}s").green().bold())?;
        }
    }
    writeln!(w,     "  Concurrency:   {}", format!("{}", summary.concurrency).green().bold())?;
    writeln!(w,     "  Success rate:  {}", render_success_rate(stats.success_rate))?;
    writeln!(w)?;

    let counts = vec![
        vec!["Total".to_owned(), "Success".to_owned(), "Failed".to_owned(), "QPS".to_owned()],
        vec![
            stats.total.to_string(),
            stats.success.to_string(),
            stats.failed.to_string(),
            format!("{:.2}/s", stats.qps),
        ],
    ];
    let mut counts = Builder::from(counts).build();
    counts
        .with(Style::empty())
        .with(Alignment::center())
        .with(Padding::new(2, 2, 0, 0))
        .with(Colorization::exact([Color::BOLD], Rows::new(0..=0)))
        .with(Colorization::exact([Color::FG_GREEN], Cell::new(1, 1)))
        .with(Colorization::exact([Color::FG_RED], Cell::new(1, 2)))
        .with(Colorization::exact([Color::FG_GREEN], Cell::new(1, 3)));
    writeln!(w, "{}", counts)?;

    Ok(())
}

fn print_latency(w: &mut dyn Write, stats: &CoreStats) -> anyhow::Result<()> {
    writeln!(w, "{}", "Latencies".h1())?;

    let secs = |v: f64| format!("{v:.3}s");
    // p95 is only reported once enough requests succeeded
    let p95 = if stats.p95_time > 0.0 { secs(stats.p95_time) } else { "-".to_owned() };

    let mut header = vec!["Avg".to_owned(), "P95".to_owned()];
    let mut values = vec![secs(stats.avg_time), p95];
    if let Some(latency) = stats.latency {
        header.extend(["Min", "Med", "Max", "Stdev"].map(str::to_owned));
        values.extend([latency.min, latency.median, latency.max, latency.stdev].map(secs));
    }

    let mut table = Builder::from(vec![header, values]).build();
    table
        .with(Style::empty())
        .with(Margin::new(1, 0, 0, 0))
        .with(Alignment::center())
        .with(Colorization::exact([Color::FG_GREEN], Rows::new(1..=1)))
        .with(Colorization::exact([Color::FG_BLUE], Cell::new(0, 0)))
        .with(Colorization::exact([Color::FG_MAGENTA], Cell::new(0, 1)));
    writeln!(w, "{}", table)?;
    Ok(())
}

fn print_failures(w: &mut dyn Write, failures: &[String]) -> anyhow::Result<()> {
    if failures.is_empty() {
        return Ok(());
    }
    writeln!(w, "{}", "Failures (sample)".h1())?;
    for failure in failures {
        writeln!(w, "{}", format!("  - {failure}").red())?;
    }
    Ok(())
}

trait ReportStyle {
    fn h1(&self) -> StyledContent<&str>;
}

impl<T: AsRef<str>> ReportStyle for T {
    fn h1(&self) -> StyledContent<&str> {
        self.as_ref().bold().underlined().yellow()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{report::LatencyStats, reporter::BenchReporter};

    fn summary(success: u64, failures: Vec<String>) -> TestSummary {
        let failed = failures.len() as u64;
        TestSummary {
            concurrency: 5,
            stats: CoreStats {
                total: success + failed,
                success,
                failed,
                success_rate: if failed == 0 && success == 0 {
                    0.0
                } else {
                    success as f64 / (success + failed) as f64 * 100.0
                },
                avg_time: 0.25,
                p95_time: 0.0,
                qps: 4.0,
                failures,
                latency: (success > 0).then_some(LatencyStats { min: 0.1, median: 0.2, max: 0.9, stdev: 0.05 }),
            },
            mode: RunMode::FixedCount { total_wall_time: 2.5 },
        }
    }

    fn render(summary: &TestSummary) -> String {
        let mut out = Vec::new();
        TextReporter.print(&mut out, summary).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn prints_summary_and_latency() {
        let text = render(&summary(10, vec![]));
        assert!(text.contains("Summary"));
        assert!(text.contains("fixed count"));
        assert!(text.contains("2.500s"));
        assert!(text.contains("100.00%"));
        assert!(text.contains("Latencies"));
        assert!(text.contains("0.900s"));
        assert!(!text.contains("Failures"));
    }

    #[test]
    fn prints_failures_without_latency() {
        let text = render(&summary(0, vec!["Req-30.000s: timeout".into()]));
        assert!(text.contains("0.00%"));
        assert!(!text.contains("Latencies"));
        assert!(text.contains("Failures (sample)"));
        assert!(text.contains("Req-30.000s: timeout"));
    }
}
