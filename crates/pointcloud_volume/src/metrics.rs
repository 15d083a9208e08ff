//! Loader metrics collection.
//!
//! Feature-gated and runtime-toggled so the worker pays nothing when
//! disabled.
//!
//! # Usage
//!
//! ```ignore
//! use pointcloud_volume::metrics::COLLECT_METRICS;
//!
//! // Compile with --features metrics
//! // Runtime toggle:
//! COLLECT_METRICS.store(false, Ordering::Relaxed);
//!
//! let snapshot = volume.loader_metrics();
//! println!("{:.1} us/node", snapshot.avg_load_timing_us());
//! ```

use std::collections::VecDeque;
#[cfg(feature = "metrics")]
use std::sync::atomic::Ordering;
use std::sync::atomic::AtomicBool;

/// Runtime toggle for metrics collection.
/// Set to false to disable metrics gathering at runtime.
pub static COLLECT_METRICS: AtomicBool = AtomicBool::new(true);

/// Check if metrics collection is enabled (both compile-time and runtime).
#[inline]
pub fn is_enabled() -> bool {
    #[cfg(feature = "metrics")]
    {
        COLLECT_METRICS.load(Ordering::Relaxed)
    }
    #[cfg(not(feature = "metrics"))]
    {
        false
    }
}

/// Rolling window for storing recent values (e.g., timing history).
#[derive(Debug, Clone)]
pub struct RollingWindow<T> {
    buffer: VecDeque<T>,
    capacity: usize,
}

impl<T> RollingWindow<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            buffer: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Push a new value, evicting the oldest if at capacity.
    pub fn push(&mut self, value: T) {
        if self.buffer.len() >= self.capacity {
            self.buffer.pop_front();
        }
        self.buffer.push_back(value);
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
    }

    /// Iterate over values (oldest to newest).
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.buffer.iter()
    }

    pub fn last(&self) -> Option<&T> {
        self.buffer.back()
    }
}

impl RollingWindow<u64> {
    pub fn sum(&self) -> u64 {
        self.buffer.iter().sum()
    }

    pub fn average(&self) -> f64 {
        if self.buffer.is_empty() {
            0.0
        } else {
            self.sum() as f64 / self.buffer.len() as f64
        }
    }

    pub fn min_max(&self) -> Option<(u64, u64)> {
        let min = self.buffer.iter().min()?;
        let max = self.buffer.iter().max()?;
        Some((*min, *max))
    }
}

impl Default for RollingWindow<u64> {
    fn default() -> Self {
        Self::new(256)
    }
}

/// Counters kept by the background loader.
#[derive(Debug, Clone, Default)]
pub struct LoaderMetrics {
    /// Rolling window of per-payload load times in microseconds.
    pub load_timings: RollingWindow<u64>,
    pub nodes_loaded: u64,
    pub nodes_failed: u64,
    pub bytes_loaded: u64,
    /// Batches that stopped on cancellation.
    pub batches_cancelled: u64,
}

impl LoaderMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one published payload.
    pub fn record_load(&mut self, timing_us: u64, bytes: u64) {
        if !is_enabled() {
            return;
        }
        self.load_timings.push(timing_us);
        self.nodes_loaded += 1;
        self.bytes_loaded += bytes;
    }

    pub fn record_failure(&mut self) {
        if is_enabled() {
            self.nodes_failed += 1;
        }
    }

    pub fn record_cancelled_batch(&mut self) {
        if is_enabled() {
            self.batches_cancelled += 1;
        }
    }

    pub fn avg_load_timing_us(&self) -> f64 {
        self.load_timings.average()
    }

    pub fn loaded_mb(&self) -> f64 {
        self.bytes_loaded as f64 / 1_048_576.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rolling_window() {
        let mut window = RollingWindow::new(3);
        assert!(window.is_empty());

        window.push(10u64);
        window.push(20);
        window.push(30);
        assert_eq!(window.sum(), 60);
        assert_eq!(window.average(), 20.0);

        // oldest evicted
        window.push(40);
        assert_eq!(window.len(), 3);
        assert_eq!(window.sum(), 90);
        assert_eq!(window.min_max(), Some((20, 40)));
    }

    #[cfg(feature = "metrics")]
    #[test]
    fn test_loader_metrics() {
        let mut metrics = LoaderMetrics::new();
        metrics.record_load(100, 1024);
        metrics.record_load(300, 1024);
        metrics.record_failure();

        assert_eq!(metrics.nodes_loaded, 2);
        assert_eq!(metrics.nodes_failed, 1);
        assert_eq!(metrics.bytes_loaded, 2048);
        assert_eq!(metrics.avg_load_timing_us(), 200.0);
    }

    #[cfg(not(feature = "metrics"))]
    #[test]
    fn test_disabled_metrics_record_nothing() {
        let mut metrics = LoaderMetrics::new();
        metrics.record_load(100, 1024);
        assert_eq!(metrics.nodes_loaded, 0);
        assert!(metrics.load_timings.is_empty());
    }
}
