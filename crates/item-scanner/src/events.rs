use std::time::Duration;

use feedguard_core_types::NodeId;
use tracing::{debug, trace};

use crate::metrics::ScannerMetrics;
use crate::strategies::ExtractStrategy;

pub fn emit_scan(
    metrics: &ScannerMetrics,
    candidate_count: usize,
    item_count: usize,
    duration: Duration,
) {
    metrics.record_scan(item_count, duration);
    debug!(
        target: "feedguard.scanner",
        candidate_count,
        item_count,
        elapsed_ms = duration.as_secs_f64() * 1000.0,
        "scan.completed"
    );
}

pub fn emit_extract(node: NodeId, strategy: Option<ExtractStrategy>) {
    trace!(
        target: "feedguard.scanner",
        %node,
        strategy = strategy.map(|s| s.name()).unwrap_or("none"),
        "scan.extracted"
    );
}

pub fn emit_eviction(metrics: &ScannerMetrics, node: NodeId) {
    metrics.record_eviction();
    trace!(target: "feedguard.scanner", %node, "cache.evicted");
}
