//! This module provides a CLI interface for running load tests.
//!
//! # Examples
//!
//! ```no_run
//! use std::{sync::Arc, time::Duration};
//!
//! use chatbench::{cli::BenchCli, openai::OpenAiIssuer};
//! use clap::Parser;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let cli = BenchCli::parse();
//!     let issuer = OpenAiIssuer::new(&cli.base_url, &cli.api_key, &cli.model, cli.timeout.into())?;
//!     chatbench::cli::run(&cli, Arc::new(issuer)).await
//! }
//! ```
//!
//! ```shell
//! # fixed-count test: 100 requests, 10 in flight
//! $ chatbench --base-url http://localhost:8000/v1 -m qwen2.5 -n 100 -c 10
//!
//! # fixed-duration test: 10 workers for 2 minutes
//! $ chatbench --base-url http://localhost:8000/v1 -m qwen2.5 -d 2m -c 10
//! ```
use std::{
    io::{self, IsTerminal, Write, stderr, stdout},
    num::{NonZeroU32, NonZeroU64},
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use anyhow::bail;
use chrono::{Local, TimeDelta};
use clap::{
    Parser, ValueEnum,
    builder::{
        Styles,
        styling::{AnsiColor, Effects},
    },
};
use crossterm::{
    cursor::MoveToColumn,
    queue,
    style::{Print, Stylize},
    terminal::{Clear, ClearType},
};
use tokio::{select, signal};
use tokio_util::sync::CancellationToken;

use crate::{
    executor::execute,
    progress::{ProgressSink, ProgressSnapshot},
    reporter::{BenchReporter, JsonReporter, TextReporter},
    request::{DEFAULT_SYSTEM_PROMPT, RequestIssuer, RequestParameters},
    runner::{CountOpts, DurationOpts, Runner},
};

/// Number of response characters shown by the connectivity check.
const PREVIEW_CHARS: usize = 100;

#[derive(Parser, Clone, Debug)]
#[clap(
    version,
    about,
    styles(Styles::styled()
        .header(AnsiColor::Yellow.on_default() | Effects::BOLD)
        .usage(AnsiColor::Yellow.on_default() | Effects::BOLD)
        .literal(AnsiColor::Green.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::Cyan.on_default())
    )
)]
#[allow(missing_docs)]
pub struct BenchCli {
    /// API base URL, e.g. https://api.openai.com/v1
    #[clap(long, env = "OPENAI_BASE_URL")]
    pub base_url: String,

    /// API key sent as a bearer token
    #[clap(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub api_key: String,

    /// Model name
    #[clap(long, short = 'm')]
    pub model: String,

    /// Timeout of a single request
    ///
    /// Examples: --timeout 30s, --timeout 2m
    #[clap(long, default_value = "30s")]
    pub timeout: humantime::Duration,

    /// Prompt sent with every request
    #[clap(long, short = 'p', default_value = "Hello, ChatGPT")]
    pub prompt: String,

    /// System prompt sent with every request
    #[clap(long, default_value = DEFAULT_SYSTEM_PROMPT)]
    pub system_prompt: String,

    /// Sampling temperature
    #[clap(long, default_value_t = 0.7)]
    pub temperature: f32,

    /// Maximum number of output tokens
    #[clap(long, default_value_t = 4096)]
    pub max_tokens: u32,

    /// Consume responses as streams
    #[clap(long)]
    pub stream: bool,

    /// Number of requests in fixed-count mode
    #[clap(long, short = 'n', default_value = "10", conflicts_with = "duration")]
    pub total: NonZeroU64,

    /// Number of requests in flight
    #[clap(long, short = 'c', default_value = "5")]
    pub concurrency: NonZeroU32,

    /// Run in fixed-duration mode for this long
    ///
    /// Sub-second parts are ignored. Examples: -d 60s, -d 5m
    #[clap(long, short = 'd')]
    pub duration: Option<humantime::Duration>,

    /// Skip the connectivity check before the test
    #[clap(long)]
    pub skip_check: bool,

    /// Do not show live progress
    #[clap(long, short = 'q')]
    pub quiet: bool,

    /// Output format for the report
    #[clap(short, long, value_enum, default_value_t = ReportFormat::Text, ignore_case = true)]
    pub output: ReportFormat,
}

/// The test mode selected on the command line.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TestMode {
    /// Run a fixed number of requests.
    FixedCount(CountOpts),
    /// Run for a fixed time budget.
    FixedDuration(DurationOpts),
}

impl BenchCli {
    /// The request parameters of the test.
    pub fn request_params(&self) -> RequestParameters {
        RequestParameters {
            prompt: self.prompt.clone(),
            system_prompt: self.system_prompt.clone(),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            stream: self.stream,
        }
    }

    /// The selected test mode. `--duration` selects fixed-duration mode.
    pub fn mode(&self) -> TestMode {
        let concurrency = self.concurrency.get();
        match self.duration {
            Some(d) => TestMode::FixedDuration(DurationOpts {
                duration_secs: std::time::Duration::from(d).as_secs(),
                concurrency,
            }),
            None => TestMode::FixedCount(CountOpts { total: self.total.get(), concurrency }),
        }
    }
}

/// Test report format.
#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum ReportFormat {
    /// Report in plain text format. See [`TextReporter`].
    Text,

    /// Report in JSON format. See [`JsonReporter`].
    Json,
}

/// Run the test described by `cli` against `issuer` and print the report to stdout.
///
/// Ctrl+C stops the test early; requests in flight still complete and the
/// report covers what finished.
pub async fn run<I>(cli: &BenchCli, issuer: Arc<I>) -> anyhow::Result<()>
where
    I: RequestIssuer + ?Sized + 'static,
{
    let params = cli.request_params();
    params.validate()?;

    if !cli.skip_check {
        check_connectivity(issuer.as_ref(), &params).await?;
    }

    let cancel = CancellationToken::new();
    let mut runner = Runner::new(issuer, params).with_cancel(cancel.clone());
    let progress = (!cli.quiet && stderr().is_terminal()).then(|| Arc::new(ConsoleProgress::default()));
    if let Some(progress) = &progress {
        runner = runner.with_progress(progress.clone());
    }

    let mode = cli.mode();
    announce(mode);
    let test = async {
        match mode {
            TestMode::FixedCount(opts) => runner.run_fixed_count(opts).await,
            TestMode::FixedDuration(opts) => runner.run_fixed_duration(opts).await,
        }
    };
    tokio::pin!(test);

    let summary = loop {
        select! {
            biased;
            res = &mut test => break res?,
            res = signal::ctrl_c(), if !cancel.is_cancelled() => {
                res?;
                tracing::info!("interrupted, waiting for in-flight requests");
                cancel.cancel();
            }
        }
    };
    if let Some(progress) = &progress {
        progress.finish();
    }

    let reporter: &dyn BenchReporter = match cli.output {
        ReportFormat::Text => &TextReporter,
        ReportFormat::Json => &JsonReporter,
    };
    reporter.print(&mut stdout(), &summary)
}

async fn check_connectivity<I>(issuer: &I, params: &RequestParameters) -> anyhow::Result<()>
where
    I: RequestIssuer + ?Sized,
{
    eprintln!("Checking connectivity...");
    let record = execute(issuer, params).await;
    if let Some(error) = &record.error {
        bail!("connectivity check failed: {error}");
    }

    eprintln!("Connected, response time: {:.3}s", record.elapsed_secs());
    if !record.reasoning.is_empty() {
        eprintln!("Reasoning: {}", record.reasoning);
    }
    eprintln!("Response: {}...", preview(&record.response));
    Ok(())
}

fn preview(text: &str) -> &str {
    match text.char_indices().nth(PREVIEW_CHARS) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

fn announce(mode: TestMode) {
    match mode {
        TestMode::FixedCount(opts) => {
            eprintln!("Starting fixed-count test: {} requests / {} concurrency", opts.total, opts.concurrency);
        }
        TestMode::FixedDuration(opts) => {
            eprintln!("Starting fixed-duration test: {}s / {} concurrency", opts.duration_secs, opts.concurrency);
            if let Some(end) = end_time(opts.duration_secs) {
                eprintln!("Test will end at {end}");
            }
        }
    }
}

fn end_time(secs: u64) -> Option<String> {
    let delta = TimeDelta::try_seconds(i64::try_from(secs).ok()?)?;
    let end = Local::now().checked_add_signed(delta)?;
    Some(end.format("%H:%M:%S").to_string())
}

/// Redraws a single progress line on stderr.
#[derive(Debug, Default)]
struct ConsoleProgress {
    drawn: AtomicBool,
}

impl ConsoleProgress {
    fn draw(&self, line: String) {
        let mut err = stderr().lock();
        let res = queue!(err, MoveToColumn(0), Clear(ClearType::CurrentLine), Print(line)).and_then(|_| err.flush());
        if res.is_ok() {
            self.drawn.store(true, Ordering::Relaxed);
        }
    }

    fn finish(&self) {
        if self.drawn.load(Ordering::Relaxed) {
            let _ = writeln!(io::stderr());
        }
    }
}

impl ProgressSink for ConsoleProgress {
    fn on_progress(&self, snapshot: &ProgressSnapshot) {
        self.draw(format!("{} {snapshot}", "Running".cyan().bold()));
    }

    fn on_completed(&self, completed: u64, total: u64) {
        self.draw(format!("{} {completed}/{total}", "Completed".cyan().bold()));
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use anyhow::{Result, anyhow};
    use async_trait::async_trait;

    use super::*;
    use crate::request::IssuerOutput;

    const BASE: [&str; 7] = ["chatbench", "--base-url", "http://localhost/v1", "--api-key", "sk-test", "-m", "m"];

    fn parse(args: &[&str]) -> Result<BenchCli, clap::Error> {
        BenchCli::try_parse_from(BASE.iter().chain(args))
    }

    #[test]
    fn defaults_select_fixed_count() {
        let cli = parse(&[]).unwrap();
        assert_eq!(cli.mode(), TestMode::FixedCount(CountOpts { total: 10, concurrency: 5 }));
        assert_eq!(cli.request_params(), RequestParameters::new("Hello, ChatGPT"));
        assert_eq!(Duration::from(cli.timeout), Duration::from_secs(30));
    }

    #[test]
    fn duration_selects_fixed_duration() {
        let cli = parse(&["-d", "2m", "-c", "8"]).unwrap();
        assert_eq!(cli.mode(), TestMode::FixedDuration(DurationOpts { duration_secs: 120, concurrency: 8 }));
    }

    #[test]
    fn total_conflicts_with_duration() {
        assert!(parse(&["-n", "20", "-d", "10s"]).is_err());
    }

    #[test]
    fn zero_concurrency_is_rejected() {
        assert!(parse(&["-c", "0"]).is_err());
        assert!(parse(&["-n", "0"]).is_err());
    }

    #[test]
    fn preview_truncates_on_char_boundary() {
        let text = "你好".repeat(80);
        assert_eq!(preview(&text).chars().count(), PREVIEW_CHARS);
        assert_eq!(preview("short"), "short");
    }

    #[test]
    fn end_time_is_formatted() {
        let end = end_time(60).unwrap();
        assert_eq!(end.len(), "00:00:00".len());
        assert_eq!(end_time(u64::MAX), None);
    }

    struct Stub(bool);

    #[async_trait]
    impl RequestIssuer for Stub {
        async fn issue(&self, _: &RequestParameters) -> Result<IssuerOutput> {
            if self.0 {
                Ok(IssuerOutput { content: "pong".into(), reasoning: String::new() })
            } else {
                Err(anyhow!("401 unauthorized"))
            }
        }
    }

    #[tokio::test]
    async fn run_prints_report() {
        let cli = parse(&["-n", "4", "-c", "2", "-q", "-o", "json"]).unwrap();
        run(&cli, Arc::new(Stub(true))).await.unwrap();
    }

    #[tokio::test]
    async fn run_aborts_when_check_fails() {
        let cli = parse(&["-q"]).unwrap();
        let err = run(&cli, Arc::new(Stub(false))).await.unwrap_err();
        assert!(err.to_string().contains("401 unauthorized"));
    }
}
