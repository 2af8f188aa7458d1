//! Progress metrics and logging setup.
//!
//! Provides structured logging and counters for monitoring simulation and
//! pipeline runs.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Metrics collector shared by a simulation run.
pub struct Metrics {
    step_count: AtomicU64,
    step_nanos: AtomicU64,
    unique_count: AtomicU64,
    log_every: u64,
    pub counters: Mutex<HashMap<String, AtomicU64>>,
    start_time: Instant,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new(1000)
    }
}

impl Metrics {
    /// Creates a collector that logs progress every `log_every` steps.
    #[must_use]
    pub fn new(log_every: u64) -> Self {
        Self {
            step_count: AtomicU64::new(0),
            step_nanos: AtomicU64::new(0),
            unique_count: AtomicU64::new(0),
            log_every: log_every.max(1),
            counters: Mutex::new(HashMap::new()),
            start_time: Instant::now(),
        }
    }

    /// Records a completed step with its duration.
    pub fn record_step(&self, duration: Duration, step: u64, dry_mass_fg: f64, unique: usize) {
        let count = self.step_count.fetch_add(1, Ordering::Relaxed) + 1;
        self.step_nanos
            .fetch_add(duration.as_nanos() as u64, Ordering::Relaxed);
        self.unique_count.store(unique as u64, Ordering::Relaxed);

        if count % self.log_every == 0 {
            tracing::info!(
                step,
                dry_mass_fg,
                unique,
                duration_us = duration.as_micros() as u64,
                "Simulation step"
            );
        }
    }

    /// Increments a named counter.
    pub fn increment_counter(&self, name: &str) {
        let mut counters = self.counters.lock().unwrap_or_else(|e| e.into_inner());
        counters
            .entry(name.to_string())
            .or_insert_with(|| AtomicU64::new(0))
            .fetch_add(1, Ordering::Relaxed);
    }

    #[must_use]
    pub fn counter(&self, name: &str) -> u64 {
        let counters = self.counters.lock().unwrap_or_else(|e| e.into_inner());
        counters
            .get(name)
            .map_or(0, |c| c.load(Ordering::Relaxed))
    }

    #[must_use]
    pub fn step_count(&self) -> u64 {
        self.step_count.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn unique_count(&self) -> u64 {
        self.unique_count.load(Ordering::Relaxed)
    }

    /// Mean wall time per recorded step.
    #[must_use]
    pub fn mean_step_time(&self) -> Duration {
        let steps = self.step_count();
        if steps == 0 {
            return Duration::ZERO;
        }
        Duration::from_nanos(self.step_nanos.load(Ordering::Relaxed) / steps)
    }

    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }
}

/// Initialize the tracing subscriber.
///
/// `RUST_LOG` takes precedence over `default_level`. Calling this more than
/// once is harmless.
pub fn init_logging(default_level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(default_level))
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing::subscriber::set_global_default(
        tracing_subscriber::FmtSubscriber::builder()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .finish(),
    )
    .ok();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_new() {
        let metrics = Metrics::new(10);
        assert_eq!(metrics.step_count(), 0);
        assert_eq!(metrics.mean_step_time(), Duration::ZERO);
    }

    #[test]
    fn test_record_step() {
        let metrics = Metrics::new(10);
        metrics.record_step(Duration::from_millis(4), 1, 100.0, 3);
        metrics.record_step(Duration::from_millis(2), 2, 101.0, 5);
        assert_eq!(metrics.step_count(), 2);
        assert_eq!(metrics.unique_count(), 5);
        assert_eq!(metrics.mean_step_time(), Duration::from_millis(3));
    }

    #[test]
    fn test_increment_counter() {
        let metrics = Metrics::default();
        metrics.increment_counter("divisions");
        metrics.increment_counter("divisions");
        assert_eq!(metrics.counter("divisions"), 2);
        assert_eq!(metrics.counter("missing"), 0);
    }
}
