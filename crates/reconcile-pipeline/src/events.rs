use std::time::Duration;

use feedguard_core_types::{Identifier, NodeId, PassId};
use tracing::{debug, info, warn};
use visual_state::ApplyError;

use crate::errors::ReconcileError;
use crate::metrics::PipelineMetrics;
use crate::pipeline::PassReport;

pub fn emit_pass_completed(metrics: &PipelineMetrics, report: &PassReport, duration: Duration) {
    metrics.record_pass(duration);
    metrics.record_applied(report.hidden, report.annotated, report.skipped);
    debug!(
        target: "feedguard.pipeline",
        pass = %report.pass_id,
        auto_hide = report.auto_hide,
        scanned = report.scanned,
        dispatched = report.dispatched,
        flagged = report.flagged,
        hidden = report.hidden,
        annotated = report.annotated,
        skipped = report.skipped,
        elapsed_ms = duration.as_secs_f64() * 1000.0,
        "pass.completed"
    );
}

/// Expected transport closures stay at debug; anything else is a warning.
pub fn emit_pass_failed(
    metrics: &PipelineMetrics,
    pass_id: &PassId,
    err: &ReconcileError,
    duration: Duration,
) {
    let expected = err.is_expected_closure();
    metrics.record_pass(duration);
    metrics.record_failure(expected);
    if expected {
        debug!(target: "feedguard.pipeline", pass = %pass_id, error = %err, "pass.aborted");
    } else {
        warn!(target: "feedguard.pipeline", pass = %pass_id, error = %err, "pass.failed");
    }
}

pub fn emit_item_skipped(pass_id: &PassId, id: &Identifier, node: NodeId, err: &ApplyError) {
    warn!(
        target: "feedguard.pipeline",
        pass = %pass_id,
        identifier = %id,
        %node,
        error = %err,
        "item.skipped"
    );
}

pub fn emit_coalesced(metrics: &PipelineMetrics) {
    metrics.record_coalesced();
    debug!(target: "feedguard.pipeline", "trigger.coalesced");
}

pub fn emit_auto_hide_changed(from: bool, to: bool) {
    info!(target: "feedguard.pipeline", from, to, "settings.auto_hide");
}
