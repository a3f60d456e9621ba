// Rolling RTT statistics: thread-safe append-only samples plus
// incremental outcome counters and retrospective aggregate queries.

use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::error::Error;
use crate::probe::ProbeOutcome;

/// One recorded measurement: a monotonic timestamp and an RTT in
/// milliseconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub at: Instant,
    pub value_ms: f64,
}

/// Thread-safe statistics store. One probe worker owns the writing side;
/// the worker and any external query layer read concurrently.
///
/// All mutation is serialized by a single lock, which keeps the invariant
/// "`count` equals the number of stored samples, `timeout_count` equals the
/// number of timeout outcomes" trivially true under concurrent `add` calls.
pub struct StatsStore {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    samples: Vec<Sample>,
    count: u64,
    timeout_count: u64,
    error_count: u64,
}

impl StatsStore {
    pub fn new() -> Self {
        StatsStore {
            inner: Mutex::new(Inner::default()),
        }
    }

    /// Records one raw value. Non-negative values append a timestamped
    /// sample; negative values are the legacy timeout sentinel and only
    /// bump the timeout counter.
    pub fn add(&self, value_ms: f64) {
        let mut inner = self.inner.lock();
        if value_ms < 0.0 {
            inner.timeout_count += 1;
        } else {
            inner.push(Instant::now(), value_ms);
        }
    }

    /// Records one tagged probe outcome. Successes become samples; timeouts
    /// and errors land in their respective counters and are excluded from
    /// aggregates.
    pub fn record(&self, outcome: &ProbeOutcome) {
        let mut inner = self.inner.lock();
        match outcome {
            ProbeOutcome::Success(rtt_ms) => inner.push(Instant::now(), *rtt_ms),
            ProbeOutcome::Timeout => inner.timeout_count += 1,
            ProbeOutcome::Error(_) => inner.error_count += 1,
        }
    }

    pub fn count(&self) -> u64 {
        self.inner.lock().count
    }

    pub fn timeout_count(&self) -> u64 {
        self.inner.lock().timeout_count
    }

    pub fn error_count(&self) -> u64 {
        self.inner.lock().error_count
    }

    /// Mean of all stored values. Errors on an empty store instead of
    /// dividing by zero.
    pub fn average(&self) -> Result<f64, Error> {
        let inner = self.inner.lock();
        mean(inner.samples.iter().map(|s| s.value_ms)).ok_or(Error::NoSamples)
    }

    /// Population standard deviation (divide by N, not N-1) of all stored
    /// values.
    pub fn std_dev(&self) -> Result<f64, Error> {
        let inner = self.inner.lock();
        population_std_dev(&inner.samples).ok_or(Error::NoSamples)
    }

    /// Mean over the trailing window of `secs` seconds.
    ///
    /// The window is anchored at the timestamp of the most recently
    /// appended sample, not at wall-clock now: once the producing worker
    /// stops, the windowed aggregates freeze at their last values rather
    /// than emptying out.
    pub fn average_period(&self, secs: u64) -> Result<f64, Error> {
        let inner = self.inner.lock();
        mean(inner.trailing_window(secs).iter().map(|s| s.value_ms)).ok_or(Error::NoSamples)
    }

    /// Population standard deviation over the trailing window of `secs`
    /// seconds, anchored like [`StatsStore::average_period`].
    pub fn std_dev_period(&self, secs: u64) -> Result<f64, Error> {
        let inner = self.inner.lock();
        population_std_dev(&inner.trailing_window(secs)).ok_or(Error::NoSamples)
    }

    /// Samples within `secs` seconds of the first sample, in append order.
    pub fn first_n_sec(&self, secs: u64) -> Vec<Sample> {
        let inner = self.inner.lock();
        match inner.samples.first() {
            None => Vec::new(),
            Some(first) => match first.at.checked_add(Duration::from_secs(secs)) {
                // Window reaches past what Instant can represent:
                // everything qualifies.
                None => inner.samples.clone(),
                Some(limit) => inner
                    .samples
                    .iter()
                    .copied()
                    .filter(|s| s.at < limit)
                    .collect(),
            },
        }
    }

    /// Samples within `secs` seconds of the last sample, in append order.
    pub fn last_n_sec(&self, secs: u64) -> Vec<Sample> {
        let inner = self.inner.lock();
        inner.trailing_window(secs)
    }

    #[cfg(test)]
    fn add_at(&self, at: Instant, value_ms: f64) {
        self.inner.lock().push(at, value_ms);
    }
}

impl Default for StatsStore {
    fn default() -> Self {
        StatsStore::new()
    }
}

impl Inner {
    fn push(&mut self, at: Instant, value_ms: f64) {
        self.samples.push(Sample { at, value_ms });
        self.count += 1;
    }

    /// Samples newer than `last - secs`, strictly: with one sample per
    /// second, a 5-second window holds exactly the 5 most recent samples.
    fn trailing_window(&self, secs: u64) -> Vec<Sample> {
        let last = match self.samples.last() {
            Some(last) => last.at,
            None => return Vec::new(),
        };
        match last.checked_sub(Duration::from_secs(secs)) {
            // Window reaches past the process start: everything qualifies.
            None => self.samples.clone(),
            Some(cutoff) => self
                .samples
                .iter()
                .copied()
                .filter(|s| s.at > cutoff)
                .collect(),
        }
    }
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let mut sum = 0.0;
    let mut n = 0u64;
    for v in values {
        sum += v;
        n += 1;
    }
    if n == 0 {
        None
    } else {
        Some(sum / n as f64)
    }
}

fn population_std_dev(samples: &[Sample]) -> Option<f64> {
    let avg = mean(samples.iter().map(|s| s.value_ms))?;
    let variance = samples
        .iter()
        .map(|s| {
            let d = s.value_ms - avg;
            d * d
        })
        .sum::<f64>()
        / samples.len() as f64;
    Some(variance.sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    const EPSILON: f64 = 1e-9;

    #[test]
    fn test_add_and_average() {
        let store = StatsStore::new();
        assert!(matches!(store.average(), Err(Error::NoSamples)));

        for v in [10.0, 20.0, 30.0, 40.0] {
            store.add(v);
        }
        assert_eq!(store.count(), 4);
        assert!((store.average().unwrap() - 25.0).abs() < EPSILON);
    }

    #[test]
    fn test_negative_values_become_timeouts() {
        let store = StatsStore::new();
        store.add(5.0);
        store.add(-1.0);
        store.add(7.0);
        store.add(-1.0);
        store.add(-1.0);

        assert_eq!(store.count(), 2);
        assert_eq!(store.timeout_count(), 3);
        assert!((store.average().unwrap() - 6.0).abs() < EPSILON);
    }

    #[test]
    fn test_record_tagged_outcomes() {
        let store = StatsStore::new();
        store.record(&ProbeOutcome::Success(12.5));
        store.record(&ProbeOutcome::Timeout);
        store.record(&ProbeOutcome::Error("connection refused".to_string()));
        store.record(&ProbeOutcome::Success(7.5));

        assert_eq!(store.count(), 2);
        assert_eq!(store.timeout_count(), 1);
        assert_eq!(store.error_count(), 1);
        // Failed probes never pollute the aggregates.
        assert!((store.average().unwrap() - 10.0).abs() < EPSILON);
    }

    #[test]
    fn test_std_dev_identical_values_is_zero() {
        let store = StatsStore::new();
        for _ in 0..5 {
            store.add(42.0);
        }
        assert!(store.std_dev().unwrap().abs() < EPSILON);
    }

    #[test]
    fn test_std_dev_population() {
        let store = StatsStore::new();
        // Population std dev of [2, 4, 4, 4, 5, 5, 7, 9] is exactly 2.
        for v in [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0] {
            store.add(v);
        }
        assert!((store.std_dev().unwrap() - 2.0).abs() < EPSILON);
    }

    #[test]
    fn test_concurrent_adds_lose_nothing() {
        const WRITERS: usize = 8;
        const SUCCESSES_PER_WRITER: u64 = 400;
        const TIMEOUTS_PER_WRITER: u64 = 100;

        let store = Arc::new(StatsStore::new());
        let mut handles = Vec::new();
        for _ in 0..WRITERS {
            let store = Arc::clone(&store);
            handles.push(std::thread::spawn(move || {
                for i in 0..SUCCESSES_PER_WRITER {
                    store.add(i as f64);
                }
                for _ in 0..TIMEOUTS_PER_WRITER {
                    store.add(-1.0);
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(store.count(), WRITERS as u64 * SUCCESSES_PER_WRITER);
        assert_eq!(store.timeout_count(), WRITERS as u64 * TIMEOUTS_PER_WRITER);
        assert_eq!(store.last_n_sec(u64::MAX / 2).len() as u64, store.count());
    }

    #[test]
    fn test_average_period_anchored_to_last_sample() {
        let store = StatsStore::new();
        let base = Instant::now();
        // One sample per second for 10 seconds, values 0..=9.
        for i in 0..10u64 {
            store.add_at(base + Duration::from_secs(i), i as f64);
        }

        // Anchored at the last sample (t=9), a 5 s window holds t=5..=9.
        let avg = store.average_period(5).unwrap();
        assert!((avg - 7.0).abs() < EPSILON);

        let window = store.last_n_sec(5);
        assert_eq!(window.len(), 5);
        assert_eq!(window[0].value_ms, 5.0);
        assert_eq!(window[4].value_ms, 9.0);
    }

    #[test]
    fn test_first_n_sec_window() {
        let store = StatsStore::new();
        let base = Instant::now();
        for i in 0..10u64 {
            store.add_at(base + Duration::from_secs(i), i as f64);
        }

        let window = store.first_n_sec(3);
        assert_eq!(window.len(), 3);
        assert_eq!(window[0].value_ms, 0.0);
        assert_eq!(window[2].value_ms, 2.0);
    }

    #[test]
    fn test_huge_windows_return_everything() {
        let store = StatsStore::new();
        store.add(1.0);
        store.add(2.0);

        // Windows far beyond what Instant arithmetic can represent must
        // degrade to "all samples", not panic.
        assert_eq!(store.first_n_sec(u64::MAX).len(), 2);
        assert_eq!(store.last_n_sec(u64::MAX).len(), 2);
        assert!((store.average_period(u64::MAX).unwrap() - 1.5).abs() < EPSILON);
    }

    #[test]
    fn test_window_order_is_append_order() {
        let store = StatsStore::new();
        let base = Instant::now();
        for (i, v) in [3.0, 1.0, 2.0].iter().enumerate() {
            store.add_at(base + Duration::from_secs(i as u64), *v);
        }
        let window = store.last_n_sec(60);
        let values: Vec<f64> = window.iter().map(|s| s.value_ms).collect();
        assert_eq!(values, vec![3.0, 1.0, 2.0]);
    }

    #[test]
    fn test_empty_store_queries() {
        let store = StatsStore::new();
        assert!(matches!(store.std_dev(), Err(Error::NoSamples)));
        assert!(matches!(store.average_period(10), Err(Error::NoSamples)));
        assert!(matches!(store.std_dev_period(10), Err(Error::NoSamples)));
        assert!(store.first_n_sec(10).is_empty());
        assert!(store.last_n_sec(10).is_empty());
    }
}
