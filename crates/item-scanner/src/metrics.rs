//! Telemetry counters for the item scanner.
//!
//! Counters live on the scanner instance so independent services (and tests)
//! never share state.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::Serialize;

#[derive(Debug, Default)]
pub struct ScannerMetrics {
    scans: AtomicU64,
    items: AtomicU64,
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    extraction_misses: AtomicU64,
    evictions: AtomicU64,
    scan_lat_ns: AtomicU64,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
pub struct ScannerMetricsSnapshot {
    pub scans: u64,
    pub items: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub extraction_misses: u64,
    pub evictions: u64,
    pub hit_rate: f64,
    pub avg_scan_ms: f64,
}

impl ScannerMetrics {
    pub fn record_scan(&self, items: usize, duration: Duration) {
        self.scans.fetch_add(1, Ordering::Relaxed);
        self.items.fetch_add(items as u64, Ordering::Relaxed);
        self.scan_lat_ns
            .fetch_add(duration_to_nanos(duration), Ordering::Relaxed);
    }

    pub fn record_lookup(&self, cache_hit: bool) {
        if cache_hit {
            self.cache_hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.cache_misses.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_extraction_miss(&self) {
        self.extraction_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_eviction(&self) {
        self.evictions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> ScannerMetricsSnapshot {
        let scans = self.scans.load(Ordering::Relaxed);
        let hits = self.cache_hits.load(Ordering::Relaxed);
        let misses = self.cache_misses.load(Ordering::Relaxed);
        let lookups = hits + misses;
        ScannerMetricsSnapshot {
            scans,
            items: self.items.load(Ordering::Relaxed),
            cache_hits: hits,
            cache_misses: misses,
            extraction_misses: self.extraction_misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            hit_rate: if lookups == 0 {
                0.0
            } else {
                hits as f64 * 100.0 / lookups as f64
            },
            avg_scan_ms: if scans == 0 {
                0.0
            } else {
                (self.scan_lat_ns.load(Ordering::Relaxed) as f64 / scans as f64) / 1_000_000.0
            },
        }
    }
}

fn duration_to_nanos(duration: Duration) -> u64 {
    let nanos = duration.as_nanos();
    if nanos > u64::MAX as u128 {
        u64::MAX
    } else {
        nanos as u64
    }
}
