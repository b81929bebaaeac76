use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::time::timeout;
use tracing::trace;

use classification::{ClassificationAuthority, ClassificationError};
use feedguard_core_types::{Identifier, PassId};
use feedguard_document::DocumentTree;
use item_scanner::{CacheConfig, ItemScanner, MarkupTable};
use visual_state::{AnnotateOutcome, ResetSummary, VisualStateApplier};

use crate::config::PipelineConfig;
use crate::errors::ReconcileError;
use crate::events;
use crate::metrics::{PipelineMetrics, PipelineMetricsSnapshot};
use crate::settings::SettingsStore;

/// External collaborators of a pipeline.
#[derive(Clone)]
pub struct PipelinePorts {
    pub doc: Arc<dyn DocumentTree>,
    pub authority: Arc<dyn ClassificationAuthority>,
    pub settings: Arc<dyn SettingsStore>,
}

/// What one completed pass did.
#[derive(Clone, Debug, Serialize)]
pub struct PassReport {
    pub pass_id: PassId,
    pub started_at: DateTime<Utc>,
    pub auto_hide: bool,
    pub reset: ResetSummary,
    pub scanned: usize,
    pub dispatched: usize,
    pub flagged: usize,
    pub hidden: usize,
    pub annotated: usize,
    pub skipped: usize,
}

impl PassReport {
    fn new(auto_hide: bool) -> Self {
        Self {
            pass_id: PassId::new(),
            started_at: Utc::now(),
            auto_hide,
            reset: ResetSummary::default(),
            scanned: 0,
            dispatched: 0,
            flagged: 0,
            hidden: 0,
            annotated: 0,
            skipped: 0,
        }
    }
}

pub struct ReconcilePipeline {
    doc: Arc<dyn DocumentTree>,
    markup: Arc<MarkupTable>,
    scanner: ItemScanner,
    applier: VisualStateApplier,
    authority: Arc<dyn ClassificationAuthority>,
    settings: Arc<dyn SettingsStore>,
    /// Identifiers dispatched during the current episode.
    processed: Mutex<HashSet<Identifier>>,
    last_auto_hide: Mutex<Option<bool>>,
    config: PipelineConfig,
    metrics: PipelineMetrics,
}

impl ReconcilePipeline {
    pub fn new(
        ports: PipelinePorts,
        markup: Arc<MarkupTable>,
        cache: &CacheConfig,
        config: PipelineConfig,
    ) -> Self {
        let PipelinePorts {
            doc,
            authority,
            settings,
        } = ports;
        Self {
            scanner: ItemScanner::new(Arc::clone(&doc), Arc::clone(&markup), cache),
            applier: VisualStateApplier::new(Arc::clone(&doc), Arc::clone(&markup)),
            doc,
            markup,
            authority,
            settings,
            processed: Mutex::new(HashSet::new()),
            last_auto_hide: Mutex::new(None),
            config,
            metrics: PipelineMetrics::default(),
        }
    }

    /// Runs one full pass. `auto_hide_override` wins over the persisted
    /// setting.
    ///
    /// A classification failure aborts the rest of the pass; whatever the
    /// reset stripped stays stripped until the next trigger.
    pub async fn run_pass(
        &self,
        auto_hide_override: Option<bool>,
    ) -> Result<PassReport, ReconcileError> {
        let started = Instant::now();
        let auto_hide = match auto_hide_override {
            Some(value) => value,
            None => self.settings.auto_hide().await,
        };
        self.note_auto_hide(auto_hide);
        let mut report = PassReport::new(auto_hide);

        let root = self.markup.content_root(self.doc.as_ref());
        report.reset = self.applier.reset(root);

        self.processed.lock().clear();
        self.scanner.clear_cache();

        let items = self.scanner.scan();
        report.scanned = items.len();

        let batch: Vec<Identifier> = {
            let mut processed = self.processed.lock();
            items
                .identifiers()
                .filter(|id| processed.insert((*id).clone()))
                .cloned()
                .collect()
        };
        if batch.is_empty() {
            self.metrics.record_empty();
            events::emit_pass_completed(&self.metrics, &report, started.elapsed());
            return Ok(report);
        }
        report.dispatched = batch.len();

        let results = match self.classify(&batch).await {
            Ok(results) => results,
            Err(err) => {
                events::emit_pass_failed(&self.metrics, &report.pass_id, &err, started.elapsed());
                return Err(err);
            }
        };
        report.flagged = results.len();
        self.metrics.record_dispatch(batch.len(), results.len());

        for result in &results {
            // The element may have been recycled while classification was in flight.
            let Some(node) = items.get(&result.identifier) else {
                trace!(target: "feedguard.pipeline", identifier = %result.identifier, "flagged item no longer mapped");
                continue;
            };
            if auto_hide {
                match self.applier.hide(node) {
                    Ok(_) => report.hidden += 1,
                    Err(err) => {
                        events::emit_item_skipped(&report.pass_id, &result.identifier, node, &err);
                        report.skipped += 1;
                    }
                }
            } else {
                match self.applier.annotate(node, &result.identifier, result.raw_count) {
                    Ok(AnnotateOutcome::Attached { .. }) => report.annotated += 1,
                    Ok(AnnotateOutcome::AlreadyAnnotated(_)) | Ok(AnnotateOutcome::SkippedHidden) => {}
                    Err(err) => {
                        events::emit_item_skipped(&report.pass_id, &result.identifier, node, &err);
                        report.skipped += 1;
                    }
                }
            }
        }

        events::emit_pass_completed(&self.metrics, &report, started.elapsed());
        Ok(report)
    }

    async fn classify(
        &self,
        batch: &[Identifier],
    ) -> Result<Vec<classification::ClassificationResult>, ReconcileError> {
        let limit = self.config.classify_timeout();
        match timeout(limit, self.authority.classify(batch)).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(ClassificationError::Timeout(self.config.classify_timeout_ms).into()),
        }
    }

    fn note_auto_hide(&self, auto_hide: bool) {
        let mut last = self.last_auto_hide.lock();
        if let Some(previous) = *last {
            if previous != auto_hide {
                events::emit_auto_hide_changed(previous, auto_hide);
            }
        }
        *last = Some(auto_hide);
    }

    pub fn processed_len(&self) -> usize {
        self.processed.lock().len()
    }

    pub fn scanner(&self) -> &ItemScanner {
        &self.scanner
    }

    pub fn applier(&self) -> &VisualStateApplier {
        &self.applier
    }

    pub fn metrics(&self) -> &PipelineMetrics {
        &self.metrics
    }

    pub fn metrics_snapshot(&self) -> PipelineMetricsSnapshot {
        self.metrics.snapshot()
    }
}
