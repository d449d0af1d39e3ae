//! Scheduled full rebuild of the index (asupersync background task).
//!
//! [`RefreshWorker`] pulls a complete snapshot from a [`VectorSource`] every
//! `interval` and hands it to [`IndexCoordinator::insert_bulk`]. A failed
//! cycle (unreadable source, invalid snapshot) keeps the previous index.
//!
//! The worker loops until the parent `Cx` is cancelled.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use asupersync::Cx;
use prefmatch_core::tracing_config::span_names;
use prefmatch_core::{AnnEngine, MatchConfig, MatchResult, VectorSource};
use tracing::{debug, error, info, info_span};

use crate::coordinator::IndexCoordinator;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct RefreshWorkerConfig {
    /// Time between rebuilds. Default: 300s.
    pub interval: Duration,
    /// Run one cycle immediately when the worker starts. Default: true.
    pub refresh_on_start: bool,
}

impl Default for RefreshWorkerConfig {
    fn default() -> Self {
        Self::from_match_config(&MatchConfig::default())
    }
}

impl RefreshWorkerConfig {
    #[must_use]
    pub const fn from_match_config(config: &MatchConfig) -> Self {
        Self {
            interval: config.refresh_interval(),
            refresh_on_start: true,
        }
    }

    #[must_use]
    pub const fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    #[must_use]
    pub const fn with_refresh_on_start(mut self, enabled: bool) -> Self {
        self.refresh_on_start = enabled;
        self
    }
}

// ---------------------------------------------------------------------------
// Metrics
// ---------------------------------------------------------------------------

/// Lock-free counters for refresh telemetry.
#[derive(Debug, Default)]
pub struct RefreshMetrics {
    pub cycles: AtomicU64,
    pub successes: AtomicU64,
    pub failures: AtomicU64,
    /// Vectors loaded by the most recent successful cycle.
    pub last_loaded: AtomicU64,
    /// Total rebuild time in microseconds.
    pub rebuild_time_us: AtomicU64,
}

impl RefreshMetrics {
    #[must_use]
    pub fn snapshot(&self) -> RefreshMetricsSnapshot {
        RefreshMetricsSnapshot {
            cycles: self.cycles.load(Ordering::Relaxed),
            successes: self.successes.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            last_loaded: self.last_loaded.load(Ordering::Relaxed),
            rebuild_time_us: self.rebuild_time_us.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshMetricsSnapshot {
    pub cycles: u64,
    pub successes: u64,
    pub failures: u64,
    pub last_loaded: u64,
    pub rebuild_time_us: u64,
}

// ---------------------------------------------------------------------------
// Worker
// ---------------------------------------------------------------------------

/// Periodically rebuilds the coordinator's index from a snapshot source.
pub struct RefreshWorker<E: AnnEngine = Box<dyn AnnEngine>> {
    config: RefreshWorkerConfig,
    source: Arc<dyn VectorSource>,
    coordinator: Arc<IndexCoordinator<E>>,
    metrics: Arc<RefreshMetrics>,
}

impl<E: AnnEngine> std::fmt::Debug for RefreshWorker<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshWorker")
            .field("config", &self.config)
            .field("source", &self.source.name())
            .finish_non_exhaustive()
    }
}

impl<E: AnnEngine> RefreshWorker<E> {
    #[must_use]
    pub fn new(
        config: RefreshWorkerConfig,
        source: Arc<dyn VectorSource>,
        coordinator: Arc<IndexCoordinator<E>>,
    ) -> Self {
        Self {
            config,
            source,
            coordinator,
            metrics: Arc::new(RefreshMetrics::default()),
        }
    }

    #[must_use]
    pub const fn metrics(&self) -> &Arc<RefreshMetrics> {
        &self.metrics
    }

    /// Run the refresh loop until `cx` is cancelled.
    ///
    /// Cycle failures are logged and counted; the loop keeps going.
    ///
    /// # Errors
    ///
    /// Currently always returns `Ok(())` once cancelled.
    pub async fn run(&self, cx: &Cx) -> MatchResult<()> {
        self.run_until(|| cx.is_cancel_requested()).await
    }

    /// Loop body shared by [`run`](Self::run). `stop` is checked before and
    /// after every sleep.
    async fn run_until(&self, stop: impl Fn() -> bool) -> MatchResult<()> {
        info!(
            target: "prefmatch.refresh",
            interval_s = self.config.interval.as_secs(),
            source = self.source.name(),
            "refresh worker started"
        );

        if self.config.refresh_on_start {
            self.run_logged_cycle();
        }

        loop {
            if stop() {
                break;
            }
            asupersync::time::sleep(asupersync::time::wall_now(), self.config.interval).await;
            if stop() {
                break;
            }
            self.run_logged_cycle();
        }

        info!(
            target: "prefmatch.refresh",
            cycles = self.metrics.cycles.load(Ordering::Relaxed),
            "refresh worker shutting down (cancel requested)"
        );
        Ok(())
    }

    /// Perform one full rebuild. Returns the number of users now indexed.
    ///
    /// # Errors
    ///
    /// Returns the source or coordinator error; the previous index is kept.
    pub fn run_cycle(&self) -> MatchResult<usize> {
        let _span = info_span!(target: "prefmatch.refresh", span_names::REFRESH_CYCLE).entered();
        self.metrics.cycles.fetch_add(1, Ordering::Relaxed);
        let start = Instant::now();

        let result = self
            .source
            .snapshot()
            .and_then(|snapshot| self.coordinator.insert_bulk(snapshot));

        match result {
            Ok(summary) => {
                let rebuild_us = u64::try_from(start.elapsed().as_micros()).unwrap_or(u64::MAX);
                self.metrics
                    .rebuild_time_us
                    .fetch_add(rebuild_us, Ordering::Relaxed);
                self.metrics.successes.fetch_add(1, Ordering::Relaxed);
                self.metrics
                    .last_loaded
                    .store(summary.loaded as u64, Ordering::Relaxed);
                debug!(
                    target: "prefmatch.refresh",
                    loaded = summary.loaded,
                    duplicates = summary.duplicates,
                    rebuild_us,
                    "refresh cycle complete"
                );
                Ok(summary.loaded)
            }
            Err(err) => {
                self.metrics.failures.fetch_add(1, Ordering::Relaxed);
                Err(err)
            }
        }
    }

    fn run_logged_cycle(&self) {
        if let Err(err) = self.run_cycle() {
            error!(
                target: "prefmatch.refresh",
                source = self.source.name(),
                error = %err,
                "refresh cycle failed, keeping previous index"
            );
        }
    }
}
