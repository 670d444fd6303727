//! Integration tests for the sweeper task.
//!
//! Runs with paused tokio time: the runtime auto-advances to the next
//! timer whenever every task is idle, so a 60 s interval costs nothing.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use keyward_sweep::{SweepConfig, SweepTarget, Sweeper};

// =========================================================================
// Helpers
// =========================================================================

/// A target holding `remaining` expired entries.
#[derive(Default)]
struct Backlog {
    remaining: AtomicUsize,
    calls: AtomicU64,
}

impl Backlog {
    fn with(n: usize) -> Arc<Self> {
        Arc::new(Self {
            remaining: AtomicUsize::new(n),
            calls: AtomicU64::new(0),
        })
    }
}

impl SweepTarget for Backlog {
    type Error = String;

    async fn sweep_batch(&self, limit: usize) -> Result<usize, String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let current = self.remaining.load(Ordering::SeqCst);
        let take = current.min(limit);
        self.remaining.fetch_sub(take, Ordering::SeqCst);
        Ok(take)
    }
}

/// A backlog whose every batch takes `delay` to complete.
struct SlowBacklog {
    inner: Backlog,
    delay: Duration,
}

impl SweepTarget for SlowBacklog {
    type Error = String;

    async fn sweep_batch(&self, limit: usize) -> Result<usize, String> {
        tokio::time::sleep(self.delay).await;
        self.inner.sweep_batch(limit).await
    }
}

/// A target whose backend is always down.
struct Broken;

impl SweepTarget for Broken {
    type Error = String;

    async fn sweep_batch(&self, _limit: usize) -> Result<usize, String> {
        Err("store unreachable".into())
    }
}

fn config(interval_secs: u64, batch: usize) -> SweepConfig {
    SweepConfig {
        interval: Duration::from_secs(interval_secs),
        batch_size: batch,
        initial_jitter: Duration::ZERO,
        ..Default::default()
    }
}

// =========================================================================
// SweepConfig
// =========================================================================

#[test]
fn test_default_config_sweeps_every_minute_in_batches_of_500() {
    let cfg = SweepConfig::default();
    assert_eq!(cfg.interval, Duration::from_secs(60));
    assert_eq!(cfg.batch_size, 500);
}

#[test]
fn test_validated_clamps_degenerate_values() {
    let cfg = SweepConfig {
        interval: Duration::ZERO,
        batch_size: 0,
        max_batches_per_pass: 0,
        budget_warn_threshold: 3.0,
        ..Default::default()
    }
    .validated();

    assert_eq!(cfg.interval, SweepConfig::MIN_INTERVAL);
    assert_eq!(cfg.batch_size, 1);
    assert_eq!(cfg.max_batches_per_pass, 1);
    assert_eq!(cfg.budget_warn_threshold, 1.0);
}

// =========================================================================
// Passes
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_no_pass_before_first_interval() {
    let target = Backlog::with(10);
    let handle = Sweeper::spawn(target.clone(), config(60, 500));

    tokio::time::sleep(Duration::from_secs(59)).await;

    assert_eq!(target.calls.load(Ordering::SeqCst), 0);
    let metrics = handle.shutdown().await;
    assert_eq!(metrics.passes, 0);
}

#[tokio::test(start_paused = true)]
async fn test_pass_drains_backlog_in_batches() {
    let target = Backlog::with(1_200);
    let handle = Sweeper::spawn(target.clone(), config(60, 500));

    tokio::time::sleep(Duration::from_secs(61)).await;
    let metrics = handle.shutdown().await;

    assert_eq!(metrics.passes, 1);
    assert_eq!(metrics.batches, 3, "500 + 500 + 200 (short batch ends the pass)");
    assert_eq!(metrics.removed, 1_200);
    assert_eq!(target.remaining.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn test_passes_repeat_on_interval() {
    let target = Backlog::with(0);
    let handle = Sweeper::spawn(target.clone(), config(10, 100));

    tokio::time::sleep(Duration::from_secs(35)).await;
    let metrics = handle.shutdown().await;

    assert_eq!(metrics.passes, 3);
    assert_eq!(metrics.removed, 0);
}

#[tokio::test(start_paused = true)]
async fn test_max_batches_caps_one_pass() {
    let target = Backlog::with(1_000);
    let cfg = SweepConfig {
        max_batches_per_pass: 2,
        ..config(60, 100)
    };
    let handle = Sweeper::spawn(target.clone(), cfg);

    tokio::time::sleep(Duration::from_secs(61)).await;
    let metrics = handle.shutdown().await;

    assert_eq!(metrics.batches, 2);
    assert_eq!(target.remaining.load(Ordering::SeqCst), 800);
}

#[tokio::test(start_paused = true)]
async fn test_trigger_runs_pass_immediately() {
    let target = Backlog::with(7);
    let handle = Sweeper::spawn(target.clone(), config(3_600, 500));

    handle.trigger();
    tokio::time::sleep(Duration::from_millis(1)).await;

    assert_eq!(target.remaining.load(Ordering::SeqCst), 0);
    let metrics = handle.shutdown().await;
    assert_eq!(metrics.passes, 1);
    assert_eq!(metrics.removed, 7);
}

// =========================================================================
// Failures and shutdown
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_failed_batch_is_counted_and_sweeper_keeps_running() {
    let handle = Sweeper::spawn(Arc::new(Broken), config(10, 100));

    tokio::time::sleep(Duration::from_secs(25)).await;

    assert!(!handle.is_finished());
    let metrics = handle.shutdown().await;
    assert_eq!(metrics.passes, 2);
    assert_eq!(metrics.failures, 2);
    assert_eq!(metrics.batches, 0);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_while_idle_returns_promptly() {
    let handle = Sweeper::spawn(Backlog::with(0), config(3_600, 100));

    let metrics = tokio::time::timeout(Duration::from_secs(1), handle.shutdown())
        .await
        .expect("shutdown should not wait for the interval");

    assert_eq!(metrics.passes, 0);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_lets_in_flight_batch_finish_and_starts_no_more() {
    let target = Arc::new(SlowBacklog {
        inner: Backlog {
            remaining: AtomicUsize::new(1_000),
            calls: AtomicU64::new(0),
        },
        delay: Duration::from_secs(5),
    });
    let handle = Sweeper::spawn(target.clone(), config(10, 100));

    // The first pass starts at 10 s; its first batch is pending until 15 s.
    tokio::time::sleep(Duration::from_secs(12)).await;
    assert_eq!(target.inner.calls.load(Ordering::SeqCst), 0);

    let started = tokio::time::Instant::now();
    let metrics = handle.shutdown().await;

    assert!(started.elapsed() >= Duration::from_secs(3));
    assert_eq!(metrics.passes, 1);
    assert_eq!(metrics.batches, 1);
    assert_eq!(metrics.removed, 100);
    assert_eq!(target.inner.calls.load(Ordering::SeqCst), 1);
    assert_eq!(target.inner.remaining.load(Ordering::SeqCst), 900);
}
