//! Statistics aggregation for test runs.
//!
//! [`summarize`] reduces the result records of one run into [`CoreStats`]. Both
//! test drivers feed it the full record list once every worker has finished and
//! layer their mode-specific fields on top.
//!
//! All numeric outputs are rounded with [`round_to`]: rates to 2 places and
//! times to 3 places.

mod counter;

pub use counter::LiveCounter;

use std::time::Duration;

use crate::{
    histogram::LatencyHistogram,
    report::{CoreStats, ResultRecord},
};

/// Minimum number of successful attempts before a p95 latency is reported.
pub const P95_MIN_SAMPLES: usize = 20;

/// Maximum number of failure descriptions kept in a summary.
pub const MAX_FAILURE_SAMPLES: usize = 5;

/// Rounds `value` to `places` decimal places, half away from zero.
pub fn round_to(value: f64, places: i32) -> f64 {
    let scale = 10f64.powi(places);
    (value * scale).round() / scale
}

/// Computes the 95th-percentile of the given latencies in seconds.
///
/// Returns 0 when there are fewer than [`P95_MIN_SAMPLES`] values. Otherwise the
/// values are sorted ascending and the one at index `floor(0.95 * n)` is taken.
pub fn p95(latencies: &[f64]) -> f64 {
    if latencies.len() < P95_MIN_SAMPLES {
        return 0.0;
    }
    let mut sorted = latencies.to_vec();
    sorted.sort_by(f64::total_cmp);
    let idx = (sorted.len() as f64 * 0.95) as usize;
    sorted.get(idx.min(sorted.len() - 1)).copied().unwrap_or_default()
}

/// Formats a failed record for the failure sample.
fn describe_failure(record: &ResultRecord) -> String {
    let error = record.error.as_deref().unwrap_or_default();
    format!("Req-{:.3}s: {error}", record.elapsed_secs())
}

/// Reduces result records into summary statistics.
///
/// `elapsed` is the wall time of the run, used for throughput. Records are
/// expected in completion order, which is the order failures are sampled in.
pub fn summarize(records: &[ResultRecord], elapsed: Duration) -> CoreStats {
    let total = records.len() as u64;
    let latencies: Vec<f64> = records
        .iter()
        .filter(|r| r.is_success())
        .map(ResultRecord::elapsed_secs)
        .collect();
    let success = latencies.len() as u64;

    let success_rate = if total == 0 {
        0.0
    } else {
        round_to(success as f64 / total as f64 * 100.0, 2)
    };

    let avg_time = if latencies.is_empty() {
        0.0
    } else {
        latencies.iter().sum::<f64>() / latencies.len() as f64
    };

    let wall = elapsed.as_secs_f64();
    let qps = if wall > 0.0 { success as f64 / wall } else { 0.0 };

    let failures = records
        .iter()
        .filter(|r| !r.is_success())
        .take(MAX_FAILURE_SAMPLES)
        .map(describe_failure)
        .collect();

    CoreStats {
        total,
        success,
        failed: total - success,
        success_rate,
        avg_time: round_to(avg_time, 3),
        p95_time: round_to(p95(&latencies), 3),
        qps: round_to(qps, 2),
        failures,
        latency: latency_stats(records),
    }
}

fn latency_stats(records: &[ResultRecord]) -> Option<crate::report::LatencyStats> {
    let mut hist = match LatencyHistogram::new() {
        Ok(hist) => hist,
        Err(e) => {
            tracing::debug!("failed to create latency histogram: {e}");
            return None;
        }
    };
    for r in records.iter().filter(|r| r.is_success()) {
        if let Err(e) = hist.record(r.elapsed) {
            tracing::debug!(latency = ?r.elapsed, "failed to record latency: {e}");
        }
    }
    hist.latency_stats()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ok(ms: u64) -> ResultRecord {
        ResultRecord::success("ok".into(), String::new(), Duration::from_millis(ms))
    }

    fn err(ms: u64, msg: &str) -> ResultRecord {
        ResultRecord::failure(Duration::from_millis(ms), msg.into())
    }

    #[test]
    fn round_to_places() {
        assert_eq!(round_to(66.666_666, 2), 66.67);
        assert_eq!(round_to(0.123_456, 3), 0.123);
        assert_eq!(round_to(0.0, 3), 0.0);
    }

    #[test]
    fn empty_input() {
        let stats = summarize(&[], Duration::from_secs(1));
        assert_eq!(stats.total, 0);
        assert_eq!(stats.success, 0);
        assert_eq!(stats.failed, 0);
        assert_eq!(stats.success_rate, 0.0);
        assert_eq!(stats.avg_time, 0.0);
        assert_eq!(stats.p95_time, 0.0);
        assert_eq!(stats.qps, 0.0);
        assert!(stats.failures.is_empty());
        assert!(stats.latency.is_none());
    }

    #[test]
    fn counts_and_rate() {
        let records = vec![ok(100), err(50, "boom"), ok(300)];
        let stats = summarize(&records, Duration::from_secs(2));
        assert_eq!(stats.total, 3);
        assert_eq!(stats.success, 2);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.success + stats.failed, stats.total);
        assert_eq!(stats.success_rate, 66.67);
        assert_eq!(stats.avg_time, 0.2);
        assert_eq!(stats.qps, 1.0);
        assert_eq!(stats.failures, vec!["Req-0.050s: boom".to_owned()]);
    }

    #[test]
    fn p95_needs_twenty_successes() {
        let records: Vec<_> = (1..=19).map(|i| ok(i * 100)).collect();
        let stats = summarize(&records, Duration::from_secs(1));
        assert_eq!(stats.p95_time, 0.0);
        assert!(stats.avg_time > 0.0);
    }

    #[test]
    fn p95_takes_floor_index() {
        // 20 successes: index floor(0.95 * 20) = 19, the largest value.
        let mut records: Vec<_> = (1..=20).rev().map(|i| ok(i * 10)).collect();
        records.push(err(1, "ignored"));
        let stats = summarize(&records, Duration::from_secs(1));
        assert_eq!(stats.p95_time, 0.2);

        // 40 successes: index 38 of 10..=400ms.
        let records: Vec<_> = (1..=40).map(|i| ok(i * 10)).collect();
        assert_eq!(summarize(&records, Duration::from_secs(1)).p95_time, 0.39);
    }

    #[test]
    fn zero_elapsed_has_zero_qps() {
        let records = vec![ok(10), ok(20)];
        assert_eq!(summarize(&records, Duration::ZERO).qps, 0.0);
    }

    #[test]
    fn qps_is_rounded() {
        let records = vec![ok(10); 10];
        let stats = summarize(&records, Duration::from_secs(3));
        assert_eq!(stats.qps, 3.33);
    }

    #[test]
    fn failure_sample_is_bounded() {
        let records: Vec<_> = (0..12).map(|i| err(i, &format!("timeout #{i}"))).collect();
        let stats = summarize(&records, Duration::from_secs(1));
        assert_eq!(stats.success, 0);
        assert_eq!(stats.failed, 12);
        assert_eq!(stats.success_rate, 0.0);
        assert_eq!(stats.failures.len(), MAX_FAILURE_SAMPLES);
        // completion order is kept
        assert!(stats.failures[0].ends_with("timeout #0"));
        assert!(stats.failures[4].ends_with("timeout #4"));

        let records = vec![err(1, "a"), err(2, "b")];
        assert_eq!(summarize(&records, Duration::from_secs(1)).failures.len(), 2);
    }

    #[test]
    fn summarize_is_deterministic() {
        let records: Vec<_> = (0..50)
            .map(|i| if i % 7 == 0 { err(i, "bad gateway") } else { ok(i * 3 + 1) })
            .collect();
        let elapsed = Duration::from_millis(1234);
        let a = serde_json::to_string(&summarize(&records, elapsed)).unwrap();
        let b = serde_json::to_string(&summarize(&records, elapsed)).unwrap();
        assert_eq!(a, b);
    }
}
