// Recurring probe scheduling loop: one worker, one target, one stats store.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::ProbeConfig;
use crate::error::Error;
use crate::probe::{self, ProbeOutcome};
use crate::stats::StatsStore;

/// A long-running measurement unit: probes one target/port pair on a fixed
/// schedule and records every outcome in its own [`StatsStore`].
///
/// Lifecycle: Created (configured, not running) -> Running -> Stopped.
/// Stopped is terminal: a stopped worker cannot be restarted, it is
/// replaced through the registry. Scheduling is fixed-deadline-from-last-
/// start: each deadline is computed before the probe runs, so a probe that
/// outlives the interval (including its timeout) slips the next deadline
/// instead of bunching probes up.
pub struct ProbeWorker {
    config: Mutex<Option<ProbeConfig>>,
    stats: Arc<StatsStore>,
    running: Arc<AtomicBool>,
    stopped: AtomicBool,
    token: CancellationToken,
}

impl ProbeWorker {
    pub fn new() -> Self {
        ProbeWorker {
            config: Mutex::new(None),
            stats: Arc::new(StatsStore::new()),
            running: Arc::new(AtomicBool::new(false)),
            stopped: AtomicBool::new(false),
            token: CancellationToken::new(),
        }
    }

    pub fn with_config(config: ProbeConfig) -> Self {
        let worker = ProbeWorker::new();
        *worker.config.lock() = Some(config);
        worker
    }

    /// Replaces the configuration. Must precede `start()`; rejected while
    /// the scheduling loop is active.
    pub fn set_options(&self, config: ProbeConfig) -> Result<(), Error> {
        if self.running() {
            return Err(Error::AlreadyRunning);
        }
        *self.config.lock() = Some(config);
        Ok(())
    }

    pub fn config(&self) -> Option<ProbeConfig> {
        self.config.lock().clone()
    }

    /// The worker's statistics store, readable concurrently with the
    /// scheduling loop by any query layer.
    pub fn stats(&self) -> Arc<StatsStore> {
        Arc::clone(&self.stats)
    }

    pub fn running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Spawns the scheduling loop and returns immediately. Guarded against
    /// concurrent double invocation and against restarting a stopped
    /// worker; fails if no options were set.
    pub fn start(&self) -> Result<(), Error> {
        let config = self.config.lock().clone().ok_or(Error::NotConfigured)?;
        if self.stopped.load(Ordering::SeqCst) {
            return Err(Error::AlreadyRunning);
        }
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(Error::AlreadyRunning);
        }

        let token = self.token.clone();
        let stats = Arc::clone(&self.stats);
        let running = Arc::clone(&self.running);
        info!(target = %config.target, port = config.port, interval_secs = config.interval_secs, "probe worker starting");
        tokio::spawn(async move {
            schedule_loop(config, stats, running, token).await;
        });
        Ok(())
    }

    /// Clears the running flag and cancels the loop's token, making the
    /// Stopped state final. Returns immediately; an in-flight probe still
    /// completes and is recorded, after which no further samples appear.
    /// The stop latency is bounded by one probe timeout, not by the
    /// interval.
    pub fn stop(&self) -> Result<(), Error> {
        self.stopped.store(true, Ordering::SeqCst);
        self.running.store(false, Ordering::SeqCst);
        self.token.cancel();
        Ok(())
    }
}

impl Default for ProbeWorker {
    fn default() -> Self {
        ProbeWorker::new()
    }
}

async fn schedule_loop(
    config: ProbeConfig,
    stats: Arc<StatsStore>,
    running: Arc<AtomicBool>,
    token: CancellationToken,
) {
    let interval = config.interval();
    loop {
        // Deadline is anchored at probe start, not probe completion.
        let next = Instant::now() + interval;

        let outcome = probe::run_probe(
            &config.target,
            config.port,
            config.timeout(),
            config.payload_size,
        )
        .await;
        match &outcome {
            ProbeOutcome::Success(rtt_ms) => {
                debug!(target = %config.target, rtt_ms, "probe succeeded")
            }
            ProbeOutcome::Timeout => warn!(target = %config.target, "probe timed out"),
            ProbeOutcome::Error(reason) => {
                warn!(target = %config.target, %reason, "probe failed")
            }
        }
        // Every outcome is recorded; a failed probe never stops the worker.
        stats.record(&outcome);

        tokio::select! {
            _ = token.cancelled() => break,
            _ = tokio::time::sleep_until(tokio::time::Instant::from_std(next)) => {}
        }
        if !running.load(Ordering::SeqCst) {
            break;
        }
    }
    running.store(false, Ordering::SeqCst);
    info!(target = %config.target, "probe worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProbeOptions;

    fn quick_config(port: u16) -> ProbeConfig {
        let mut options = ProbeOptions::new("127.0.0.1");
        options.port = Some(port);
        options.interval_secs = Some(1);
        options.timeout_secs = Some(1);
        options.resolve()
    }

    #[test]
    fn test_start_without_options_fails() {
        let worker = ProbeWorker::new();
        assert!(matches!(worker.start(), Err(Error::NotConfigured)));
        assert!(!worker.running());
    }

    #[tokio::test]
    async fn test_double_start_is_rejected() {
        let worker = ProbeWorker::with_config(quick_config(1));
        assert!(worker.start().is_ok());
        assert!(matches!(worker.start(), Err(Error::AlreadyRunning)));
        worker.stop().unwrap();
    }

    #[tokio::test]
    async fn test_stopped_worker_cannot_restart() {
        let worker = ProbeWorker::with_config(quick_config(1));
        worker.start().unwrap();
        worker.stop().unwrap();
        // Stopped is terminal: a replacement worker is created instead.
        assert!(matches!(worker.start(), Err(Error::AlreadyRunning)));
        assert!(!worker.running());
    }

    #[tokio::test]
    async fn test_set_options_rejected_while_running() {
        let worker = ProbeWorker::with_config(quick_config(1));
        worker.start().unwrap();
        assert!(matches!(
            worker.set_options(quick_config(2)),
            Err(Error::AlreadyRunning)
        ));
        worker.stop().unwrap();
    }
}
