//! Counters for cache traffic.

use std::sync::atomic::{AtomicU64, Ordering};

/// Metrics collector for subject cache operations.
#[derive(Debug, Default)]
pub struct CacheMetrics {
    lookups: AtomicU64,
    loads: AtomicU64,
    load_failures: AtomicU64,
    invalidations: AtomicU64,
    invalidation_failures: AtomicU64,
}

impl CacheMetrics {
    /// Create a new metrics collector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a cache lookup (hit or miss).
    pub fn record_lookup(&self) {
        self.lookups.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a store load triggered by a miss.
    pub fn record_load(&self) {
        self.loads.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a store load that failed.
    pub fn record_load_failure(&self) {
        self.load_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an invalidation request.
    pub fn record_invalidation(&self) {
        self.invalidations.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an invalidation that faulted and was swallowed.
    pub fn record_invalidation_failure(&self) {
        self.invalidation_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Share of lookups served without a store load.
    pub fn hit_ratio(&self) -> f64 {
        let lookups = self.lookups.load(Ordering::Relaxed);
        let loads = self.loads.load(Ordering::Relaxed);

        if lookups == 0 {
            0.0
        } else {
            lookups.saturating_sub(loads) as f64 / lookups as f64
        }
    }

    /// Get metrics summary.
    pub fn summary(&self) -> MetricsSummary {
        MetricsSummary {
            lookups: self.lookups.load(Ordering::Relaxed),
            loads: self.loads.load(Ordering::Relaxed),
            load_failures: self.load_failures.load(Ordering::Relaxed),
            invalidations: self.invalidations.load(Ordering::Relaxed),
            invalidation_failures: self.invalidation_failures.load(Ordering::Relaxed),
            hit_ratio: self.hit_ratio(),
        }
    }

    /// Reset all metrics.
    pub fn reset(&self) {
        self.lookups.store(0, Ordering::Relaxed);
        self.loads.store(0, Ordering::Relaxed);
        self.load_failures.store(0, Ordering::Relaxed);
        self.invalidations.store(0, Ordering::Relaxed);
        self.invalidation_failures.store(0, Ordering::Relaxed);
    }
}

/// Point-in-time copy of [`CacheMetrics`].
#[derive(Debug, Clone, PartialEq)]
pub struct MetricsSummary {
    pub lookups: u64,
    pub loads: u64,
    pub load_failures: u64,
    pub invalidations: u64,
    pub invalidation_failures: u64,
    pub hit_ratio: f64,
}
