//! The fixed-count and fixed-duration test drivers.
//!
//! Both drivers fan requests out to tokio worker tasks, collect one
//! [`ResultRecord`] per completed attempt through an unbounded channel, and
//! hand the complete record list to [`stats::summarize`] once every worker has
//! been joined.
use std::{
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use tokio::{
    select,
    sync::mpsc,
    task::JoinSet,
    time::{self, Instant, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;

use crate::{
    error::{BenchResult, ConfigError},
    executor::execute,
    progress::{ProgressSink, ProgressSnapshot, RunState},
    report::{ResultRecord, RunMode, TestSummary},
    request::{RequestIssuer, RequestParameters},
    stats::{self, LiveCounter, round_to},
};

/// Interval between progress ticks of a fixed-duration test.
pub const TICK: Duration = Duration::from_secs(1);

/// How long a fixed-duration test waits for each in-flight worker after the
/// deadline before moving on without it.
pub const JOIN_GRACE: Duration = Duration::from_secs(1);

/// Options for a fixed-count test.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CountOpts {
    /// Number of requests to run.
    pub total: u64,
    /// Maximum number of requests in flight.
    pub concurrency: u32,
}

impl CountOpts {
    /// Checks the options before a run starts.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.total == 0 {
            return Err(ConfigError::ZeroTotal);
        }
        if self.concurrency == 0 {
            return Err(ConfigError::ZeroConcurrency);
        }
        Ok(())
    }
}

/// Options for a fixed-duration test.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DurationOpts {
    /// Time budget in seconds.
    pub duration_secs: u64,
    /// Number of persistent workers.
    pub concurrency: u32,
}

impl DurationOpts {
    /// Checks the options before a run starts.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.duration_secs == 0 {
            return Err(ConfigError::ZeroDuration);
        }
        if self.concurrency == 0 {
            return Err(ConfigError::ZeroConcurrency);
        }
        Ok(())
    }
}

/// A test runner bound to one request issuer and one set of parameters.
pub struct Runner<I>
where
    I: RequestIssuer + ?Sized,
{
    issuer: Arc<I>,
    params: Arc<RequestParameters>,
    cancel: CancellationToken,
    sink: Option<Arc<dyn ProgressSink>>,
}

impl<I> Runner<I>
where
    I: RequestIssuer + ?Sized + 'static,
{
    /// Create a new runner for the given issuer and parameters.
    pub fn new(issuer: Arc<I>, params: RequestParameters) -> Self {
        Self {
            issuer,
            params: Arc::new(params),
            cancel: CancellationToken::new(),
            sink: None,
        }
    }

    /// Use `cancel` to stop the run early.
    ///
    /// Cancelling stops workers from starting new requests; in-flight requests
    /// finish naturally and are included in the summary.
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Deliver live progress to `sink`.
    pub fn with_progress(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Run exactly `opts.total` requests with at most `opts.concurrency` in flight.
    ///
    /// Fewer requests run only if the run is cancelled.
    pub async fn run_fixed_count(&self, opts: CountOpts) -> BenchResult<TestSummary> {
        opts.validate()?;
        self.params.validate()?;

        let total = opts.total;
        let workers = u64::from(opts.concurrency).min(total);
        let seq = Arc::new(AtomicU64::new(0));
        let completed = Arc::new(AtomicU64::new(0));
        let (res_tx, mut res_rx) = mpsc::unbounded_channel();

        tracing::info!(total, concurrency = opts.concurrency, "starting fixed-count test");
        let t = Instant::now();

        let mut set = JoinSet::new();
        for worker in 0..workers {
            let issuer = self.issuer.clone();
            let params = self.params.clone();
            let cancel = self.cancel.clone();
            let sink = self.sink.clone();
            let seq = seq.clone();
            let completed = completed.clone();
            let res_tx = res_tx.clone();

            set.spawn(async move {
                while !cancel.is_cancelled() && seq.fetch_add(1, Ordering::Relaxed) < total {
                    let record = execute(issuer.as_ref(), &params).await;
                    // the receiver lives until every worker is joined
                    let _ = res_tx.send(record);
                    let done = completed.fetch_add(1, Ordering::Relaxed) + 1;
                    if let Some(sink) = &sink {
                        sink.on_completed(done, total);
                    }
                }
                tracing::debug!(worker, "worker finished");
            });
        }
        drop(res_tx);

        join_all(&mut set).await?;
        let elapsed = t.elapsed();
        let records = drain(&mut res_rx);

        tracing::info!(requests = records.len(), ?elapsed, "fixed-count test finished");
        Ok(TestSummary {
            concurrency: opts.concurrency,
            stats: stats::summarize(&records, elapsed),
            mode: RunMode::FixedCount { total_wall_time: round_to(elapsed.as_secs_f64(), 3) },
        })
    }

    /// Keep `opts.concurrency` workers busy until `opts.duration_secs` have passed.
    ///
    /// A worker checks the deadline only between requests, so the run may
    /// overrun by the length of one request. After the deadline each worker is
    /// given [`JOIN_GRACE`] to finish; once one fails to, the remaining workers
    /// are left running and their results are discarded.
    pub async fn run_fixed_duration(&self, opts: DurationOpts) -> BenchResult<TestSummary> {
        opts.validate()?;
        self.params.validate()?;

        let target = opts.duration_secs;
        let counter = Arc::new(LiveCounter::default());
        let stop = self.cancel.child_token();
        let (res_tx, mut res_rx) = mpsc::unbounded_channel();

        let start = Instant::now();
        let deadline = start
            .checked_add(Duration::from_secs(target))
            .ok_or(ConfigError::DurationTooLong(target))?;
        tracing::info!(
            state = %RunState::Idle,
            duration = target,
            concurrency = opts.concurrency,
            "starting fixed-duration test"
        );

        let mut set = JoinSet::new();
        for worker in 0..opts.concurrency {
            let issuer = self.issuer.clone();
            let params = self.params.clone();
            let stop = stop.clone();
            let counter = counter.clone();
            let res_tx = res_tx.clone();

            set.spawn(async move {
                while !stop.is_cancelled() && Instant::now() < deadline {
                    let record = execute(issuer.as_ref(), &params).await;
                    counter.record(&record);
                    if res_tx.send(record).is_err() {
                        // the driver has stopped collecting
                        break;
                    }
                }
                tracing::debug!(worker, "worker finished");
            });
        }
        drop(res_tx);

        tracing::info!(state = %RunState::Running, "workers started");
        let mut ticker = time::interval_at(start + TICK, TICK);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            select! {
                biased;
                _ = stop.cancelled() => break,
                _ = time::sleep_until(deadline) => break,
                _ = ticker.tick() => {
                    let snapshot = snapshot(RunState::Running, start, target, &counter);
                    self.report(&snapshot);
                }
            }
        }

        stop.cancel();
        tracing::info!(state = %RunState::Stopping, "deadline reached, waiting for workers");
        join_with_grace(&mut set, JOIN_GRACE).await?;
        let elapsed = start.elapsed();
        let records = drain(&mut res_rx);

        let mut last = snapshot(RunState::Done, start, target, &counter);
        last.requests = records.len() as u64;
        last.success = records.iter().filter(|r| r.is_success()).count() as u64;
        self.report(&last);
        tracing::info!(state = %RunState::Done, requests = records.len(), ?elapsed, "fixed-duration test finished");

        Ok(TestSummary {
            concurrency: opts.concurrency,
            stats: stats::summarize(&records, elapsed),
            mode: RunMode::FixedDuration {
                duration: round_to(elapsed.as_secs_f64(), 3),
                target_duration: target,
            },
        })
    }

    fn report(&self, snapshot: &ProgressSnapshot) {
        match &self.sink {
            Some(sink) => sink.on_progress(snapshot),
            None => tracing::debug!(%snapshot, "progress"),
        }
    }
}

/// Runs a fixed-count test. See [`Runner::run_fixed_count`].
pub async fn run_fixed_count<I>(
    issuer: Arc<I>,
    params: RequestParameters,
    opts: CountOpts,
) -> BenchResult<TestSummary>
where
    I: RequestIssuer + ?Sized + 'static,
{
    Runner::new(issuer, params).run_fixed_count(opts).await
}

/// Runs a fixed-duration test. See [`Runner::run_fixed_duration`].
pub async fn run_fixed_duration<I>(
    issuer: Arc<I>,
    params: RequestParameters,
    opts: DurationOpts,
    sink: Option<Arc<dyn ProgressSink>>,
) -> BenchResult<TestSummary>
where
    I: RequestIssuer + ?Sized + 'static,
{
    let mut runner = Runner::new(issuer, params);
    runner.sink = sink;
    runner.run_fixed_duration(opts).await
}

fn snapshot(state: RunState, start: Instant, target: u64, counter: &LiveCounter) -> ProgressSnapshot {
    let (requests, success) = counter.load();
    let elapsed = start.elapsed().as_secs_f64().max(1e-6);
    ProgressSnapshot {
        state,
        elapsed: round_to(elapsed.min(target as f64), 2),
        target,
        requests,
        success,
        qps: round_to(success as f64 / elapsed, 2),
    }
}

async fn join_all(set: &mut JoinSet<()>) -> BenchResult<()> {
    while let Some(res) = set.join_next().await {
        res?;
    }
    Ok(())
}

/// Joins workers, giving each one up to `grace` to finish. The first worker
/// that overruns its grace detaches all that remain.
async fn join_with_grace(set: &mut JoinSet<()>, grace: Duration) -> BenchResult<()> {
    loop {
        match time::timeout(grace, set.join_next()).await {
            Ok(Some(res)) => res?,
            Ok(None) => return Ok(()),
            Err(_) => {
                tracing::warn!(workers = set.len(), "workers still busy after grace period, detaching");
                set.detach_all();
                return Ok(());
            }
        }
    }
}

/// Closes the channel and takes everything sent before the close.
fn drain(rx: &mut mpsc::UnboundedReceiver<ResultRecord>) -> Vec<ResultRecord> {
    rx.close();
    let mut records = Vec::new();
    while let Ok(record) = rx.try_recv() {
        records.push(record);
    }
    records
}
