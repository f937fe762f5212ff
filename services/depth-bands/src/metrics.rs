//! Snapshot pipeline metrics
//!
//! Counters and a build latency window for Prometheus-style exposition.

use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use crate::bands::SellTruncation;

/// Counters for one snapshot pipeline.
pub struct PipelineMetrics {
    pub snapshots_built: AtomicU64,
    pub snapshots_failed: AtomicU64,

    pub buy_bands_emitted: AtomicU64,
    pub sell_bands_emitted: AtomicU64,

    // Sell side cut short by the band cap or the price ceiling
    pub sell_truncations: AtomicU64,
    pub truncated_levels: AtomicU64,

    pub build_ns: Mutex<LatencyTracker>,
}

impl PipelineMetrics {
    pub fn new() -> Self {
        Self {
            snapshots_built: AtomicU64::new(0),
            snapshots_failed: AtomicU64::new(0),
            buy_bands_emitted: AtomicU64::new(0),
            sell_bands_emitted: AtomicU64::new(0),
            sell_truncations: AtomicU64::new(0),
            truncated_levels: AtomicU64::new(0),
            build_ns: Mutex::new(LatencyTracker::new(256)),
        }
    }

    /// Record a stored snapshot.
    pub fn record_snapshot(&self, buy_bands: usize, sell_bands: usize, build_ns: u64) {
        self.snapshots_built.fetch_add(1, Ordering::Relaxed);
        self.buy_bands_emitted
            .fetch_add(buy_bands as u64, Ordering::Relaxed);
        self.sell_bands_emitted
            .fetch_add(sell_bands as u64, Ordering::Relaxed);
        if let Ok(mut tracker) = self.build_ns.lock() {
            tracker.record(build_ns);
        }
    }

    pub fn record_truncation(&self, truncation: &SellTruncation) {
        self.sell_truncations.fetch_add(1, Ordering::Relaxed);
        self.truncated_levels
            .fetch_add(truncation.dropped_levels as u64, Ordering::Relaxed);
    }

    pub fn record_failure(&self) {
        self.snapshots_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// p99 snapshot build time in nanoseconds.
    pub fn build_p99_ns(&self) -> Option<u64> {
        self.build_ns.lock().ok().and_then(|t| t.percentile(99))
    }

    /// Export metrics as a BTreeMap for Prometheus-style exposition.
    pub fn export(&self) -> BTreeMap<String, u64> {
        let mut m = BTreeMap::new();
        m.insert("snapshots_built".to_string(), self.snapshots_built.load(Ordering::Relaxed));
        m.insert("snapshots_failed".to_string(), self.snapshots_failed.load(Ordering::Relaxed));
        m.insert("buy_bands_emitted".to_string(), self.buy_bands_emitted.load(Ordering::Relaxed));
        m.insert("sell_bands_emitted".to_string(), self.sell_bands_emitted.load(Ordering::Relaxed));
        m.insert("sell_truncations".to_string(), self.sell_truncations.load(Ordering::Relaxed));
        m.insert("truncated_levels".to_string(), self.truncated_levels.load(Ordering::Relaxed));
        if let Ok(tracker) = self.build_ns.lock() {
            if let Some(avg) = tracker.average() {
                m.insert("build_ns_avg".to_string(), avg);
            }
            if let Some(p99) = tracker.percentile(99) {
                m.insert("build_ns_p99".to_string(), p99);
            }
        }
        m
    }
}

impl Default for PipelineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Bounded window of latency samples.
pub struct LatencyTracker {
    samples: VecDeque<u64>,
    max_samples: usize,
}

impl LatencyTracker {
    pub fn new(max_samples: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(max_samples),
            max_samples: max_samples.max(1),
        }
    }

    /// Record a sample, evicting the oldest once the window is full.
    pub fn record(&mut self, value: u64) {
        if self.samples.len() >= self.max_samples {
            self.samples.pop_front();
        }
        self.samples.push_back(value);
    }

    /// Get a percentile value (0-100).
    pub fn percentile(&self, p: usize) -> Option<u64> {
        if self.samples.is_empty() {
            return None;
        }

        let mut sorted: Vec<u64> = self.samples.iter().copied().collect();
        sorted.sort_unstable();

        let idx = (p.min(100) as f64 / 100.0 * (sorted.len() - 1) as f64) as usize;
        sorted.get(idx).copied()
    }

    pub fn average(&self) -> Option<u64> {
        if self.samples.is_empty() {
            return None;
        }
        let sum: u64 = self.samples.iter().sum();
        Some(sum / self.samples.len() as u64)
    }

    pub fn count(&self) -> usize {
        self.samples.len()
    }
}
