//! The assembled FeedGuard service.
//!
//! One instance owns one document. Every reconciliation trigger (coalesced
//! host changes, navigation, settings change) flows through a single driver
//! task into the pipeline's single-flight gate.

use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::select;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use change_coalescer::{wait_for_element, ChangeCoalescer, CoalescedChange, CoalescerState};
use classification::{
    ClassificationAuthority, RemoteClassifier, ReportState, ReportStateStore, TieredAuthority,
};
use feedguard_core_types::Identifier;
use feedguard_document::{DocumentTree, MutationSource, NodeId};
use item_scanner::{MarkupSources, MarkupTable, ScannerMetricsSnapshot};
use reconcile_pipeline::{
    GateOutcome, PipelineMetricsSnapshot, PipelinePorts, ReconcilePipeline, SettingsStore,
    SingleFlight,
};

use crate::config::FeedGuardConfig;
use crate::errors::ServiceError;

/// Host-side collaborators.
#[derive(Clone)]
pub struct FeedGuardPorts {
    pub doc: Arc<dyn DocumentTree>,
    pub mutations: Arc<dyn MutationSource>,
    pub authority: Arc<dyn ClassificationAuthority>,
    pub settings: Arc<dyn SettingsStore>,
    pub reports: Arc<dyn ReportStateStore>,
}

/// Why a reconciliation pass was requested.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Trigger {
    Startup,
    Mutations { batches: usize },
    Navigation { url: String },
    AutoHideChanged(bool),
}

impl Trigger {
    pub fn auto_hide_override(&self) -> Option<bool> {
        match self {
            Trigger::AutoHideChanged(value) => Some(*value),
            _ => None,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Trigger::Startup => "startup",
            Trigger::Mutations { .. } => "mutations",
            Trigger::Navigation { .. } => "navigation",
            Trigger::AutoHideChanged(_) => "auto_hide",
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceState {
    Created,
    Running,
    ShutDown,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct ServiceMetrics {
    pub scanner: ScannerMetricsSnapshot,
    pub pipeline: PipelineMetricsSnapshot,
}

struct Receivers {
    changes: mpsc::UnboundedReceiver<CoalescedChange>,
    triggers: mpsc::UnboundedReceiver<Trigger>,
}

pub struct FeedGuard {
    config: FeedGuardConfig,
    markup: Arc<MarkupTable>,
    doc: Arc<dyn DocumentTree>,
    mutations: Arc<dyn MutationSource>,
    reports: Arc<dyn ReportStateStore>,
    gate: Arc<SingleFlight>,
    coalescer: ChangeCoalescer,
    triggers: mpsc::UnboundedSender<Trigger>,
    receivers: Mutex<Option<Receivers>>,
    driver: Mutex<Option<JoinHandle<()>>>,
    state: Mutex<ServiceState>,
    shutdown: CancellationToken,
}

impl FeedGuard {
    pub fn new(config: FeedGuardConfig, ports: FeedGuardPorts) -> Result<Self, ServiceError> {
        Self::assemble(config, ports, MarkupTable::standard())
    }

    /// Same as [`FeedGuard::new`], for hosts whose markup differs from the
    /// stock table.
    pub fn with_markup(
        config: FeedGuardConfig,
        ports: FeedGuardPorts,
        sources: MarkupSources,
    ) -> Result<Self, ServiceError> {
        let markup = MarkupTable::from_sources(sources)?;
        Self::assemble(config, ports, Arc::new(markup))
    }

    fn assemble(
        config: FeedGuardConfig,
        ports: FeedGuardPorts,
        markup: Arc<MarkupTable>,
    ) -> Result<Self, ServiceError> {
        config.validate()?;

        let pipeline = ReconcilePipeline::new(
            PipelinePorts {
                doc: Arc::clone(&ports.doc),
                authority: ports.authority,
                settings: ports.settings,
            },
            Arc::clone(&markup),
            &config.cache,
            config.pipeline.clone(),
        );

        let (change_tx, changes) = mpsc::unbounded_channel();
        let coalescer = ChangeCoalescer::new(
            Arc::clone(&ports.doc),
            Arc::clone(&ports.mutations),
            markup.scan_containers.clone(),
            markup.content_region.clone(),
            config.coalescer.clone(),
            change_tx,
        );
        let (triggers, trigger_rx) = mpsc::unbounded_channel();

        Ok(Self {
            config,
            markup,
            doc: ports.doc,
            mutations: ports.mutations,
            reports: ports.reports,
            gate: Arc::new(SingleFlight::new(Arc::new(pipeline))),
            coalescer,
            triggers,
            receivers: Mutex::new(Some(Receivers {
                changes,
                triggers: trigger_rx,
            })),
            driver: Mutex::new(None),
            state: Mutex::new(ServiceState::Created),
            shutdown: CancellationToken::new(),
        })
    }

    /// Builds the stock tiered authority (edge cache + threshold) in front of
    /// `remote`.
    pub fn with_remote(
        config: FeedGuardConfig,
        doc: Arc<dyn DocumentTree>,
        mutations: Arc<dyn MutationSource>,
        remote: Arc<dyn RemoteClassifier>,
        settings: Arc<dyn SettingsStore>,
        reports: Arc<dyn ReportStateStore>,
    ) -> Result<Self, ServiceError> {
        let authority = Arc::new(TieredAuthority::new(remote, &config.authority));
        Self::new(
            config,
            FeedGuardPorts {
                doc,
                mutations,
                authority,
                settings,
                reports,
            },
        )
    }

    pub fn state(&self) -> ServiceState {
        *self.state.lock()
    }

    pub fn config(&self) -> &FeedGuardConfig {
        &self.config
    }

    /// Waits (bounded) for the content region, starts observing and runs the
    /// first pass. A region that never shows up is logged and the whole
    /// document is observed instead.
    pub async fn start(&self) -> Result<(), ServiceError> {
        let receivers = {
            let mut state = self.state.lock();
            match *state {
                ServiceState::Running => return Err(ServiceError::AlreadyStarted),
                ServiceState::ShutDown => return Err(ServiceError::ShutDown),
                ServiceState::Created => {}
            }
            let receivers = self
                .receivers
                .lock()
                .take()
                .ok_or(ServiceError::AlreadyStarted)?;
            *state = ServiceState::Running;
            receivers
        };

        let region = self.wait_for_region(self.config.discovery.content_timeout()).await;
        if self.shutdown.is_cancelled() {
            return Err(ServiceError::ShutDown);
        }

        let task = tokio::spawn(drive(
            Arc::clone(&self.gate),
            receivers,
            self.shutdown.clone(),
        ));
        *self.driver.lock() = Some(task);
        self.coalescer.start();
        info!(
            target: "feedguard.service",
            region = ?region,
            quiet_window_ms = self.config.coalescer.quiet_window_ms,
            "feedguard started"
        );
        self.send(Trigger::Startup);
        Ok(())
    }

    /// The host switched pages: wait (bounded) for the new content region,
    /// then reconcile.
    pub async fn navigated(&self, url: &str) {
        if self.state() != ServiceState::Running {
            debug!(target: "feedguard.service", url, "navigation ignored; not running");
            return;
        }
        self.wait_for_region(self.config.discovery.navigation_timeout())
            .await;
        self.send(Trigger::Navigation {
            url: url.to_string(),
        });
    }

    /// Settings changed elsewhere; the new value overrides the persisted one
    /// for the pass it triggers.
    pub fn set_auto_hide(&self, auto_hide: bool) {
        self.send(Trigger::AutoHideChanged(auto_hide));
    }

    /// Runs a pass through the gate and waits for it, bypassing the driver.
    pub async fn reconcile_now(&self) -> GateOutcome {
        self.gate.request_pass(None).await
    }

    pub async fn report_state(&self, id: &Identifier) -> ReportState {
        self.reports.get_report_state(id).await
    }

    pub async fn set_report_state(&self, id: &Identifier, state: ReportState) {
        self.reports.set_report_state(id, state).await;
    }

    pub fn coalescer_state(&self) -> CoalescerState {
        self.coalescer.state()
    }

    pub fn metrics(&self) -> ServiceMetrics {
        let pipeline = self.gate.pipeline();
        ServiceMetrics {
            scanner: pipeline.scanner().metrics(),
            pipeline: pipeline.metrics_snapshot(),
        }
    }

    /// Stops observing and the driver. In-flight passes run to completion.
    /// Safe to call repeatedly.
    pub fn shutdown(&self) {
        {
            let mut state = self.state.lock();
            if *state == ServiceState::ShutDown {
                return;
            }
            *state = ServiceState::ShutDown;
        }
        self.shutdown.cancel();
        self.coalescer.stop();
        if let Some(driver) = self.driver.lock().take() {
            driver.abort();
        }
        info!(target: "feedguard.service", "feedguard shut down");
    }

    async fn wait_for_region(&self, limit: std::time::Duration) -> Option<NodeId> {
        let waited = select! {
            _ = self.shutdown.cancelled() => return None,
            waited = wait_for_element(
                self.doc.as_ref(),
                self.mutations.as_ref(),
                &self.markup.content_region,
                limit,
            ) => waited,
        };
        match waited {
            Ok(region) => Some(region),
            Err(err) => {
                warn!(target: "feedguard.service", error = %err, "content region unavailable; using document root");
                None
            }
        }
    }

    fn send(&self, trigger: Trigger) {
        if self.triggers.send(trigger).is_err() {
            debug!(target: "feedguard.service", "driver gone; trigger dropped");
        }
    }
}

impl Drop for FeedGuard {
    fn drop(&mut self) {
        self.shutdown();
    }
}

async fn drive(gate: Arc<SingleFlight>, receivers: Receivers, shutdown: CancellationToken) {
    let Receivers {
        mut changes,
        mut triggers,
    } = receivers;

    loop {
        let trigger = select! {
            biased;
            _ = shutdown.cancelled() => break,
            Some(trigger) = triggers.recv() => trigger,
            Some(change) = changes.recv() => Trigger::Mutations { batches: change.batches },
            else => break,
        };
        debug!(target: "feedguard.service", kind = trigger.kind(), ?trigger, "trigger received");

        // Passes are detached so a trigger arriving mid-pass reaches the gate
        // and collapses into the rerun.
        let gate = Arc::clone(&gate);
        tokio::spawn(async move {
            gate.request_pass(trigger.auto_hide_override()).await;
        });
    }
    debug!(target: "feedguard.service", "driver stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use classification::{ClassificationError, ClassificationResult, InMemoryReportStore};
    use feedguard_document::MemoryDocument;
    use reconcile_pipeline::MemorySettings;

    struct Nothing;

    #[async_trait]
    impl ClassificationAuthority for Nothing {
        async fn classify(
            &self,
            _ids: &[Identifier],
        ) -> Result<Vec<ClassificationResult>, ClassificationError> {
            Ok(Vec::new())
        }
    }

    fn ports(doc: &Arc<MemoryDocument>) -> FeedGuardPorts {
        FeedGuardPorts {
            doc: doc.clone(),
            mutations: doc.clone(),
            authority: Arc::new(Nothing),
            settings: Arc::new(MemorySettings::default()),
            reports: Arc::new(InMemoryReportStore::new()),
        }
    }

    fn service(config: FeedGuardConfig) -> (FeedGuard, Arc<MemoryDocument>) {
        let doc = Arc::new(MemoryDocument::new());
        let guard = FeedGuard::new(config, ports(&doc))
        .expect("service");
        (guard, doc)
    }

    #[test]
    fn invalid_config_is_rejected() {
        let mut config = FeedGuardConfig::default();
        config.cache.capacity = 0;
        let doc = Arc::new(MemoryDocument::new());
        let result = FeedGuard::new(
            config,
            FeedGuardPorts {
                doc: doc.clone(),
                mutations: doc,
                authority: Arc::new(Nothing),
                settings: Arc::new(MemorySettings::default()),
                reports: Arc::new(InMemoryReportStore::new()),
            },
        );
        assert!(matches!(result, Err(ServiceError::Config(_))));
    }

    #[test]
    fn broken_custom_markup_is_rejected() {
        let doc = Arc::new(MemoryDocument::new());
        let sources = MarkupSources {
            content_region: "[unterminated".to_string(),
            ..MarkupSources::default()
        };
        let result = FeedGuard::with_markup(FeedGuardConfig::default(), ports(&doc), sources);
        assert!(matches!(result, Err(ServiceError::Markup(_))));

        let custom = MarkupSources {
            content_region: "main#feed".to_string(),
            ..MarkupSources::default()
        };
        assert!(FeedGuard::with_markup(FeedGuardConfig::default(), ports(&doc), custom).is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn missing_region_degrades_to_document_root() {
        let (guard, doc) = service(FeedGuardConfig::default());
        guard.start().await.expect("start");
        assert_eq!(guard.state(), ServiceState::Running);
        assert_eq!(guard.coalescer_state(), CoalescerState::Observing);
        assert_eq!(doc.observer_count(), 1);

        assert!(matches!(guard.start().await, Err(ServiceError::AlreadyStarted)));
        guard.shutdown();
        guard.shutdown();
        assert_eq!(guard.state(), ServiceState::ShutDown);
        assert!(matches!(guard.start().await, Err(ServiceError::ShutDown)));
    }

    #[test]
    fn only_settings_triggers_carry_an_override() {
        assert_eq!(Trigger::AutoHideChanged(true).auto_hide_override(), Some(true));
        assert_eq!(Trigger::Mutations { batches: 3 }.auto_hide_override(), None);
        assert_eq!(Trigger::Startup.auto_hide_override(), None);
    }
}
