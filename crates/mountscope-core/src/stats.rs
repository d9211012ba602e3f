//! Resolver counters and the metrics sink they are flushed to.

use std::sync::atomic::{AtomicU64, Ordering};

use mountscope_common::error::Result;

/// Destination of resolver metrics.
pub trait StatsSink: Send + Sync {
    /// Adds `value` to the counter `metric`.
    ///
    /// # Errors
    ///
    /// Returns an error if the sample cannot be delivered.
    fn count(&self, metric: &str, value: u64, tags: &[&str]) -> Result<()>;

    /// Sets the gauge `metric` to `value`.
    ///
    /// # Errors
    ///
    /// Returns an error if the sample cannot be delivered.
    fn gauge(&self, metric: &str, value: f64, tags: &[&str]) -> Result<()>;
}

/// Sink that emits every sample as a structured log event.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingStatsSink;

impl StatsSink for TracingStatsSink {
    fn count(&self, metric: &str, value: u64, tags: &[&str]) -> Result<()> {
        tracing::info!(metric, value, tags = ?tags, "count");
        Ok(())
    }

    fn gauge(&self, metric: &str, value: f64, tags: &[&str]) -> Result<()> {
        tracing::info!(metric, value, tags = ?tags, "gauge");
        Ok(())
    }
}

/// Hit and miss counters, split between cache and procfs resolutions.
#[derive(Debug, Default)]
pub struct ResolverStats {
    cache_hits: AtomicU64,
    cache_miss: AtomicU64,
    proc_hits: AtomicU64,
    proc_miss: AtomicU64,
}

/// Point-in-time copy of [`ResolverStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// Lookups served from the cache.
    pub cache_hits: u64,
    /// Lookups that missed the cache.
    pub cache_miss: u64,
    /// Lookups served after a procfs rescan.
    pub proc_hits: u64,
    /// Lookups that failed after a procfs rescan.
    pub proc_miss: u64,
}

impl ResolverStats {
    pub(crate) fn cache_hit(&self) {
        let _ = self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn cache_miss(&self) {
        let _ = self.cache_miss.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn proc_hit(&self) {
        let _ = self.proc_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn proc_miss(&self) {
        let _ = self.proc_miss.fetch_add(1, Ordering::Relaxed);
    }

    /// Reads the counters without resetting them.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            cache_miss: self.cache_miss.load(Ordering::Relaxed),
            proc_hits: self.proc_hits.load(Ordering::Relaxed),
            proc_miss: self.proc_miss.load(Ordering::Relaxed),
        }
    }

    /// Reads and resets the counters.
    pub fn swap(&self) -> StatsSnapshot {
        StatsSnapshot {
            cache_hits: self.cache_hits.swap(0, Ordering::Relaxed),
            cache_miss: self.cache_miss.swap(0, Ordering::Relaxed),
            proc_hits: self.proc_hits.swap(0, Ordering::Relaxed),
            proc_miss: self.proc_miss.swap(0, Ordering::Relaxed),
        }
    }
}
