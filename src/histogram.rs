//! A simple wrapper around [`hdrhistogram::Histogram`] for latency measurements.
use std::time::Duration;

use hdrhistogram::{
    Histogram,
    errors::{CreationError, RecordError},
};

use crate::{report::LatencyStats, stats::round_to};

/// A simple wrapper around [`hdrhistogram::Histogram`] for latency measurements.
pub(crate) struct LatencyHistogram {
    hist: Histogram<u64>,
}

impl LatencyHistogram {
    /// Creates a new latency histogram with 3 significant figures.
    pub fn new() -> Result<Self, CreationError> {
        Ok(Self { hist: Histogram::<u64>::new(3)? })
    }

    /// Records a latency value.
    pub fn record(&mut self, d: Duration) -> Result<(), RecordError> {
        let nanos = u64::try_from(d.as_nanos()).unwrap_or(u64::MAX);
        self.hist.record(nanos)
    }

    pub fn is_empty(&self) -> bool {
        self.hist.is_empty()
    }

    pub fn max(&self) -> Duration {
        Duration::from_nanos(self.hist.max())
    }

    pub fn min(&self) -> Duration {
        Duration::from_nanos(self.hist.min())
    }

    pub fn stdev(&self) -> Duration {
        Duration::from_nanos(self.hist.stdev() as u64)
    }

    pub fn median(&self) -> Duration {
        Duration::from_nanos(self.hist.value_at_quantile(0.5))
    }

    /// Summarizes the recorded values in seconds, rounded to 3 places.
    ///
    /// Returns `None` if nothing was recorded.
    pub fn latency_stats(&self) -> Option<LatencyStats> {
        if self.is_empty() {
            return None;
        }
        let secs = |d: Duration| round_to(d.as_secs_f64(), 3);
        Some(LatencyStats {
            min: secs(self.min()),
            median: secs(self.median()),
            max: secs(self.max()),
            stdev: secs(self.stdev()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_histogram_has_no_stats() {
        let hist = LatencyHistogram::new().unwrap();
        assert!(hist.latency_stats().is_none());
    }

    #[test]
    fn summarizes_recorded_latencies() {
        let mut hist = LatencyHistogram::new().unwrap();
        for ms in [100, 200, 300] {
            hist.record(Duration::from_millis(ms)).unwrap();
        }
        let stats = hist.latency_stats().unwrap();
        assert_eq!(stats.min, 0.1);
        assert_eq!(stats.median, 0.2);
        assert_eq!(stats.max, 0.3);
        assert!(stats.stdev > 0.0);
    }
}
