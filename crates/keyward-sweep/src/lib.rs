//! Background expiry sweeper for Keyward.
//!
//! A [`Sweeper`] owns one tokio task that periodically drains expired
//! sessions from a [`SweepTarget`] in bounded batches. Each pass keeps
//! asking for batches until one comes back short (or the per-pass cap is
//! hit), so a large backlog is cleared without any single store call
//! scanning everything.
//!
//! # Lifecycle
//!
//! ```ignore
//! let handle = Sweeper::spawn(manager.clone(), SweepConfig::default());
//! // ...
//! handle.trigger();                     // run a pass now
//! let metrics = handle.shutdown().await; // stop between batches
//! ```
//!
//! Dropping the [`SweeperHandle`] also stops the task, after the batch in
//! progress (if any) finishes.

#![allow(async_fn_in_trait)]

use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::sync::{Notify, watch};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};
use tracing::{debug, error, info, warn};

// ---------------------------------------------------------------------------
// Target
// ---------------------------------------------------------------------------

/// Something that can remove expired entries in bounded batches.
pub trait SweepTarget: Send + Sync + 'static {
    type Error: Display + Send;

    /// Removes up to `limit` expired entries and returns how many went.
    /// A result below `limit` means nothing more is currently expired.
    fn sweep_batch(&self, limit: usize) -> impl Future<Output = Result<usize, Self::Error>> + Send;
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Sweeper configuration.
#[derive(Debug, Clone)]
pub struct SweepConfig {
    /// Time between the end of one pass and the start of the next.
    pub interval: Duration,
    /// Entries requested per batch.
    pub batch_size: usize,
    /// Upper bound on batches in one pass. The rest waits for the next pass.
    pub max_batches_per_pass: u32,
    /// Random delay (0..max) added before the first pass so several
    /// processes started together do not sweep in lockstep.
    pub initial_jitter: Duration,
    /// Fraction of `interval` (0.0-1.0) a pass may take before a warning
    /// is logged.
    pub budget_warn_threshold: f64,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
            batch_size: 500,
            max_batches_per_pass: 64,
            initial_jitter: Duration::from_secs(1),
            budget_warn_threshold: 0.5,
        }
    }
}

impl SweepConfig {
    /// Shortest interval accepted.
    pub const MIN_INTERVAL: Duration = Duration::from_millis(10);

    /// Config with the given interval and defaults elsewhere.
    pub fn with_interval(interval: Duration) -> Self {
        Self {
            interval,
            ..Default::default()
        }
    }

    /// Clamp out-of-range values. Called by [`Sweeper::spawn`].
    ///
    /// - `interval` raised to [`Self::MIN_INTERVAL`]
    /// - `batch_size` and `max_batches_per_pass` raised to 1
    /// - `budget_warn_threshold` clamped to `0.0..=1.0`
    pub fn validated(mut self) -> Self {
        if self.interval < Self::MIN_INTERVAL {
            warn!(
                interval_ms = self.interval.as_millis() as u64,
                min_ms = Self::MIN_INTERVAL.as_millis() as u64,
                "sweep interval below minimum, clamping"
            );
            self.interval = Self::MIN_INTERVAL;
        }
        if self.batch_size == 0 {
            warn!("sweep batch_size of 0 would never remove anything, using 1");
            self.batch_size = 1;
        }
        self.max_batches_per_pass = self.max_batches_per_pass.max(1);
        self.budget_warn_threshold = self.budget_warn_threshold.clamp(0.0, 1.0);
        self
    }
}

// ---------------------------------------------------------------------------
// Metrics
// ---------------------------------------------------------------------------

/// Counters accumulated over the sweeper's lifetime.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepMetrics {
    /// Passes started.
    pub passes: u64,
    /// Batches that completed successfully.
    pub batches: u64,
    /// Entries removed across all passes.
    pub removed: u64,
    /// Batches that returned an error. The pass ends at the first one.
    pub failures: u64,
    pub last_pass: Duration,
    pub max_pass: Duration,
}

// ---------------------------------------------------------------------------
// Sweeper
// ---------------------------------------------------------------------------

/// Spawns sweeper tasks.
pub struct Sweeper;

impl Sweeper {
    /// Starts a sweeper task for `target` on the current tokio runtime.
    pub fn spawn<T: SweepTarget>(target: Arc<T>, config: SweepConfig) -> SweeperHandle {
        let config = config.validated();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let trigger = Arc::new(Notify::new());

        let jitter = if config.initial_jitter.is_zero() {
            Duration::ZERO
        } else {
            let max = config.initial_jitter.as_millis().max(1) as u64;
            Duration::from_millis(rand::rng().random_range(0..max))
        };

        info!(
            interval_s = config.interval.as_secs_f64(),
            batch_size = config.batch_size,
            jitter_ms = jitter.as_millis() as u64,
            "sweeper started"
        );

        let task = tokio::spawn(run(target, config, jitter, shutdown_rx, trigger.clone()));

        SweeperHandle {
            shutdown_tx,
            trigger,
            task,
        }
    }
}

/// Control handle for a running sweeper.
pub struct SweeperHandle {
    shutdown_tx: watch::Sender<bool>,
    trigger: Arc<Notify>,
    task: JoinHandle<SweepMetrics>,
}

impl SweeperHandle {
    /// Runs a pass as soon as the sweeper is idle. Triggers made while a
    /// pass is running coalesce into one extra pass.
    pub fn trigger(&self) {
        self.trigger.notify_one();
    }

    /// Whether the task has exited.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Stops the sweeper and returns its final metrics.
    ///
    /// A batch already in flight runs to completion; no new batch starts.
    pub async fn shutdown(self) -> SweepMetrics {
        let _ = self.shutdown_tx.send(true);
        match self.task.await {
            Ok(metrics) => metrics,
            Err(e) => {
                error!(error = %e, "sweeper task ended abnormally");
                SweepMetrics::default()
            }
        }
    }
}

async fn run<T: SweepTarget>(
    target: Arc<T>,
    config: SweepConfig,
    jitter: Duration,
    mut shutdown: watch::Receiver<bool>,
    trigger: Arc<Notify>,
) -> SweepMetrics {
    let mut metrics = SweepMetrics::default();
    let mut next = Instant::now() + config.interval + jitter;

    loop {
        tokio::select! {
            biased;
            _ = shutdown.changed() => break,
            _ = trigger.notified() => debug!("sweep triggered"),
            _ = time::sleep_until(next) => {}
        }
        if *shutdown.borrow() {
            break;
        }

        run_pass(target.as_ref(), &config, &shutdown, &mut metrics).await;
        next = Instant::now() + config.interval;
    }

    info!(
        passes = metrics.passes,
        removed = metrics.removed,
        failures = metrics.failures,
        "sweeper stopped"
    );
    metrics
}

async fn run_pass<T: SweepTarget>(
    target: &T,
    config: &SweepConfig,
    shutdown: &watch::Receiver<bool>,
    metrics: &mut SweepMetrics,
) {
    let started = Instant::now();
    metrics.passes += 1;
    let mut removed = 0usize;

    for _ in 0..config.max_batches_per_pass {
        if *shutdown.borrow() {
            break;
        }
        match target.sweep_batch(config.batch_size).await {
            Ok(n) => {
                metrics.batches += 1;
                removed += n;
                if n < config.batch_size {
                    break;
                }
            }
            Err(e) => {
                metrics.failures += 1;
                warn!(pass = metrics.passes, error = %e, "sweep batch failed");
                break;
            }
        }
    }

    let elapsed = started.elapsed();
    metrics.removed += removed as u64;
    metrics.last_pass = elapsed;
    metrics.max_pass = metrics.max_pass.max(elapsed);

    let utilization = elapsed.as_secs_f64() / config.interval.as_secs_f64();
    if utilization >= config.budget_warn_threshold {
        warn!(
            pass = metrics.passes,
            elapsed_ms = elapsed.as_secs_f64() * 1000.0,
            interval_ms = config.interval.as_secs_f64() * 1000.0,
            utilization_pct = format!("{:.1}", utilization * 100.0),
            "sweep pass approaching interval"
        );
    }

    if removed > 0 {
        info!(pass = metrics.passes, removed, "sweep pass finished");
    } else {
        debug!(pass = metrics.passes, "sweep pass found nothing");
    }
}
