//! Per-pipeline counters.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::Serialize;

#[derive(Debug, Default)]
pub struct PipelineMetrics {
    passes: AtomicU64,
    empty_passes: AtomicU64,
    failed_passes: AtomicU64,
    expected_closures: AtomicU64,
    dispatched: AtomicU64,
    flagged: AtomicU64,
    hidden: AtomicU64,
    annotated: AtomicU64,
    skipped_items: AtomicU64,
    coalesced_triggers: AtomicU64,
    pass_lat_ns: AtomicU64,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
pub struct PipelineMetricsSnapshot {
    pub passes: u64,
    pub empty_passes: u64,
    pub failed_passes: u64,
    pub expected_closures: u64,
    pub dispatched: u64,
    pub flagged: u64,
    pub hidden: u64,
    pub annotated: u64,
    pub skipped_items: u64,
    pub coalesced_triggers: u64,
    pub avg_pass_ms: f64,
}

impl PipelineMetrics {
    pub fn record_pass(&self, duration: Duration) {
        self.passes.fetch_add(1, Ordering::Relaxed);
        self.pass_lat_ns
            .fetch_add(duration.as_nanos().min(u64::MAX as u128) as u64, Ordering::Relaxed);
    }

    pub fn record_empty(&self) {
        self.empty_passes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failure(&self, expected_closure: bool) {
        self.failed_passes.fetch_add(1, Ordering::Relaxed);
        if expected_closure {
            self.expected_closures.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_dispatch(&self, dispatched: usize, flagged: usize) {
        self.dispatched
            .fetch_add(dispatched as u64, Ordering::Relaxed);
        self.flagged.fetch_add(flagged as u64, Ordering::Relaxed);
    }

    pub fn record_applied(&self, hidden: usize, annotated: usize, skipped: usize) {
        self.hidden.fetch_add(hidden as u64, Ordering::Relaxed);
        self.annotated
            .fetch_add(annotated as u64, Ordering::Relaxed);
        self.skipped_items
            .fetch_add(skipped as u64, Ordering::Relaxed);
    }

    pub fn record_coalesced(&self) {
        self.coalesced_triggers.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> PipelineMetricsSnapshot {
        let passes = self.passes.load(Ordering::Relaxed);
        PipelineMetricsSnapshot {
            passes,
            empty_passes: self.empty_passes.load(Ordering::Relaxed),
            failed_passes: self.failed_passes.load(Ordering::Relaxed),
            expected_closures: self.expected_closures.load(Ordering::Relaxed),
            dispatched: self.dispatched.load(Ordering::Relaxed),
            flagged: self.flagged.load(Ordering::Relaxed),
            hidden: self.hidden.load(Ordering::Relaxed),
            annotated: self.annotated.load(Ordering::Relaxed),
            skipped_items: self.skipped_items.load(Ordering::Relaxed),
            coalesced_triggers: self.coalesced_triggers.load(Ordering::Relaxed),
            avg_pass_ms: if passes == 0 {
                0.0
            } else {
                (self.pass_lat_ns.load(Ordering::Relaxed) as f64 / passes as f64) / 1_000_000.0
            },
        }
    }
}
