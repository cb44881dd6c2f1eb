//! Lock-free cache statistics.
//!
//! Counters are plain atomics updated with relaxed ordering; a snapshot is
//! therefore consistent per counter but not across counters.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

/// Running statistics for a single cache
#[derive(Debug)]
pub struct CacheStatistics {
    enabled: AtomicBool,
    hits: AtomicU64,
    misses: AtomicU64,
    puts: AtomicU64,
    removals: AtomicU64,
    evictions: AtomicU64,
    expirations: AtomicU64,
    get_time_ns: AtomicU64,
    put_time_ns: AtomicU64,
    remove_time_ns: AtomicU64,
    last_cleared_at: Mutex<DateTime<Utc>>,
}

/// Point-in-time copy of cache statistics
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheStatisticsSnapshot {
    pub hits: u64,
    pub misses: u64,
    pub gets: u64,
    pub puts: u64,
    pub removals: u64,
    pub evictions: u64,
    pub expirations: u64,
    pub hit_percentage: f64,
    pub miss_percentage: f64,
    pub average_get_time_micros: f64,
    pub average_put_time_micros: f64,
    pub average_remove_time_micros: f64,
    pub since: DateTime<Utc>,
}

impl CacheStatistics {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled: AtomicBool::new(enabled),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            puts: AtomicU64::new(0),
            removals: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
            expirations: AtomicU64::new(0),
            get_time_ns: AtomicU64::new(0),
            put_time_ns: AtomicU64::new(0),
            remove_time_ns: AtomicU64::new(0),
            last_cleared_at: Mutex::new(Utc::now()),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    /// Turn recording on or off; existing counts are kept
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    #[inline]
    fn add(&self, counter: &AtomicU64, n: u64) {
        if self.is_enabled() {
            counter.fetch_add(n, Ordering::Relaxed);
        }
    }

    pub fn record_hits(&self, n: u64) {
        self.add(&self.hits, n);
    }

    pub fn record_misses(&self, n: u64) {
        self.add(&self.misses, n);
    }

    pub fn record_puts(&self, n: u64) {
        self.add(&self.puts, n);
    }

    pub fn record_removals(&self, n: u64) {
        self.add(&self.removals, n);
    }

    pub fn record_evictions(&self, n: u64) {
        self.add(&self.evictions, n);
    }

    pub fn record_expirations(&self, n: u64) {
        self.add(&self.expirations, n);
    }

    pub fn record_get_time(&self, elapsed: Duration) {
        self.add(&self.get_time_ns, elapsed.as_nanos() as u64);
    }

    pub fn record_put_time(&self, elapsed: Duration) {
        self.add(&self.put_time_ns, elapsed.as_nanos() as u64);
    }

    pub fn record_remove_time(&self, elapsed: Duration) {
        self.add(&self.remove_time_ns, elapsed.as_nanos() as u64);
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    pub fn gets(&self) -> u64 {
        self.hits() + self.misses()
    }

    pub fn puts(&self) -> u64 {
        self.puts.load(Ordering::Relaxed)
    }

    pub fn removals(&self) -> u64 {
        self.removals.load(Ordering::Relaxed)
    }

    pub fn evictions(&self) -> u64 {
        self.evictions.load(Ordering::Relaxed)
    }

    pub fn expirations(&self) -> u64 {
        self.expirations.load(Ordering::Relaxed)
    }

    /// Percentage of gets that were hits, 0.0 when nothing was read
    pub fn hit_percentage(&self) -> f64 {
        percentage(self.hits(), self.gets())
    }

    pub fn miss_percentage(&self) -> f64 {
        percentage(self.misses(), self.gets())
    }

    pub fn average_get_time_micros(&self) -> f64 {
        average_micros(self.get_time_ns.load(Ordering::Relaxed), self.gets())
    }

    pub fn average_put_time_micros(&self) -> f64 {
        average_micros(self.put_time_ns.load(Ordering::Relaxed), self.puts())
    }

    pub fn average_remove_time_micros(&self) -> f64 {
        average_micros(self.remove_time_ns.load(Ordering::Relaxed), self.removals())
    }

    /// Reset every counter to zero
    pub fn clear(&self) {
        for counter in [
            &self.hits,
            &self.misses,
            &self.puts,
            &self.removals,
            &self.evictions,
            &self.expirations,
            &self.get_time_ns,
            &self.put_time_ns,
            &self.remove_time_ns,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
        *self.last_cleared_at.lock() = Utc::now();
    }

    pub fn snapshot(&self) -> CacheStatisticsSnapshot {
        CacheStatisticsSnapshot {
            hits: self.hits(),
            misses: self.misses(),
            gets: self.gets(),
            puts: self.puts(),
            removals: self.removals(),
            evictions: self.evictions(),
            expirations: self.expirations(),
            hit_percentage: self.hit_percentage(),
            miss_percentage: self.miss_percentage(),
            average_get_time_micros: self.average_get_time_micros(),
            average_put_time_micros: self.average_put_time_micros(),
            average_remove_time_micros: self.average_remove_time_micros(),
            since: *self.last_cleared_at.lock(),
        }
    }
}

impl Default for CacheStatistics {
    fn default() -> Self {
        Self::new(false)
    }
}

fn percentage(part: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 / total as f64 * 100.0
    }
}

fn average_micros(total_ns: u64, count: u64) -> f64 {
    if count == 0 {
        0.0
    } else {
        total_ns as f64 / count as f64 / 1_000.0
    }
}
