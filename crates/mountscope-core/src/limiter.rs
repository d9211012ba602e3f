//! Per mount ID throttling of procfs rescans.
//!
//! Each tracked mount ID owns a small token bucket refilled once per period.
//! The key space is bounded: when a new ID arrives at capacity, the least
//! recently used ID is forgotten. Forgetting an ID only resets its budget.

use std::time::{Duration, Instant};

use indexmap::IndexMap;
use mountscope_common::error::{MountError, Result};

#[derive(Debug, Clone, Copy)]
struct Bucket {
    tokens: u32,
    refilled_at: Instant,
}

impl Bucket {
    fn refill(&mut self, now: Instant, period: Duration, burst: u32) {
        if self.tokens >= burst {
            self.refilled_at = now;
            return;
        }

        let elapsed = now.saturating_duration_since(self.refilled_at);
        let periods = elapsed.as_nanos() / period.as_nanos();
        if periods == 0 {
            return;
        }

        let gained = u32::try_from(periods).unwrap_or(u32::MAX);
        self.tokens = self.tokens.saturating_add(gained).min(burst);
        self.refilled_at = now;
    }
}

/// Counters reported by the limiter since the last swap.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LimiterStats {
    /// Rescans let through.
    pub allowed: u64,
    /// Rescans throttled or failed.
    pub dropped: u64,
}

/// Bounded per-key rate limiter.
#[derive(Debug)]
pub struct FallbackLimiter {
    buckets: IndexMap<u32, Bucket>,
    capacity: usize,
    period: Duration,
    burst: u32,
    stats: LimiterStats,
}

impl FallbackLimiter {
    /// Creates a limiter tracking up to `capacity` keys, each allowed `burst`
    /// attempts per `period`.
    ///
    /// # Errors
    ///
    /// Returns [`MountError::Config`] if any parameter is zero.
    pub fn new(capacity: usize, period: Duration, burst: u32) -> Result<Self> {
        if capacity == 0 || period.is_zero() || burst == 0 {
            return Err(MountError::Config {
                message: format!(
                    "invalid fallback limiter: capacity={capacity} period={period:?} burst={burst}"
                ),
            });
        }
        Ok(Self {
            buckets: IndexMap::with_capacity(capacity),
            capacity,
            period,
            burst,
            stats: LimiterStats::default(),
        })
    }

    /// Checks whether a rescan for `key` is allowed now and records the attempt.
    pub fn is_allowed(&mut self, key: u32) -> bool {
        self.is_allowed_at(key, Instant::now())
    }

    /// Same as [`Self::is_allowed`] with an explicit clock.
    pub fn is_allowed_at(&mut self, key: u32, now: Instant) -> bool {
        let (period, burst) = (self.period, self.burst);
        let bucket = self.bucket(key, now);
        bucket.refill(now, period, burst);

        if bucket.tokens > 0 {
            bucket.tokens -= 1;
            self.stats.allowed += 1;
            true
        } else {
            self.stats.dropped += 1;
            false
        }
    }

    /// Records an attempt for `key` that did not lead to a resolution.
    ///
    /// The attempt consumes budget like an allowed one, so a failing mount ID
    /// backs off instead of rescanning again right away.
    pub fn count(&mut self, key: u32) {
        self.count_at(key, Instant::now());
    }

    /// Same as [`Self::count`] with an explicit clock.
    pub fn count_at(&mut self, key: u32, now: Instant) {
        let (period, burst) = (self.period, self.burst);
        let bucket = self.bucket(key, now);
        bucket.refill(now, period, burst);
        bucket.tokens = bucket.tokens.saturating_sub(1);
        self.stats.dropped += 1;
    }

    /// Returns and resets the counters.
    pub fn swap_stats(&mut self) -> LimiterStats {
        std::mem::take(&mut self.stats)
    }

    /// Number of tracked keys.
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    /// Returns `true` if no key is tracked.
    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    fn bucket(&mut self, key: u32, now: Instant) -> &mut Bucket {
        if let Some(idx) = self.buckets.get_index_of(&key) {
            let last = self.buckets.len() - 1;
            self.buckets.move_index(idx, last);
        } else {
            if self.buckets.len() >= self.capacity {
                let _ = self.buckets.shift_remove_index(0);
            }
            let _ = self.buckets.insert(
                key,
                Bucket {
                    tokens: self.burst,
                    refilled_at: now,
                },
            );
        }

        let last = self.buckets.len() - 1;
        &mut self.buckets[last]
    }
}
