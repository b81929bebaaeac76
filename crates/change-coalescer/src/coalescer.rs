//! Debounced observation of host structural changes.
//!
//! While observing, a single task owns the subscription and a cancellable
//! quiet-window timer. Only batches that add an item container (or a subtree
//! holding one) inside the content region restart the timer; when it fires,
//! one [`CoalescedChange`] is sent, however many qualifying batches arrived
//! in the window. Without a content region the whole document is observed.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::select;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use feedguard_document::{DocumentTree, MutationBatch, MutationSource, SelectorList};

use crate::config::CoalescerConfig;

/// Emitted once per quiet window.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CoalescedChange {
    /// Qualifying batches folded into this trigger.
    pub batches: usize,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CoalescerState {
    Stopped,
    Observing,
}

/// Which additions count: item containers, within the content region.
#[derive(Clone, Debug)]
struct Scope {
    containers: SelectorList,
    region: SelectorList,
}

struct Observation {
    shutdown: CancellationToken,
    task: JoinHandle<()>,
}

pub struct ChangeCoalescer {
    doc: Arc<dyn DocumentTree>,
    source: Arc<dyn MutationSource>,
    scope: Scope,
    config: CoalescerConfig,
    triggers: mpsc::UnboundedSender<CoalescedChange>,
    observation: Mutex<Option<Observation>>,
}

impl ChangeCoalescer {
    pub fn new(
        doc: Arc<dyn DocumentTree>,
        source: Arc<dyn MutationSource>,
        containers: SelectorList,
        region: SelectorList,
        config: CoalescerConfig,
        triggers: mpsc::UnboundedSender<CoalescedChange>,
    ) -> Self {
        Self {
            doc,
            source,
            scope: Scope { containers, region },
            config,
            triggers,
            observation: Mutex::new(None),
        }
    }

    pub fn state(&self) -> CoalescerState {
        match self.observation.lock().as_ref() {
            Some(observation) if !observation.task.is_finished() => CoalescerState::Observing,
            _ => CoalescerState::Stopped,
        }
    }

    /// `Stopped -> Observing`. Returns `false` when already observing.
    pub fn start(&self) -> bool {
        let mut slot = self.observation.lock();
        if let Some(observation) = slot.as_ref() {
            if !observation.task.is_finished() {
                debug!(target: "feedguard.coalescer", "start ignored; already observing");
                return false;
            }
        }

        // Subscribe before spawning so no batch slips between the two.
        let rx = self.source.subscribe();
        let shutdown = CancellationToken::new();
        let task = tokio::spawn(observe(
            rx,
            Arc::clone(&self.doc),
            self.scope.clone(),
            self.config.clone(),
            self.triggers.clone(),
            shutdown.clone(),
        ));
        *slot = Some(Observation { shutdown, task });
        debug!(
            target: "feedguard.coalescer",
            quiet_window_ms = self.config.quiet_window_ms,
            "observer started"
        );
        true
    }

    /// `Observing -> Stopped`. Cancels any pending quiet-window timer and
    /// drops the subscription. Safe to call repeatedly.
    pub fn stop(&self) -> bool {
        let Some(observation) = self.observation.lock().take() else {
            return false;
        };
        observation.shutdown.cancel();
        observation.task.abort();
        debug!(target: "feedguard.coalescer", "observer stopped");
        true
    }
}

impl Drop for ChangeCoalescer {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn observe(
    mut rx: tokio::sync::broadcast::Receiver<MutationBatch>,
    doc: Arc<dyn DocumentTree>,
    scope: Scope,
    config: CoalescerConfig,
    triggers: mpsc::UnboundedSender<CoalescedChange>,
    shutdown: CancellationToken,
) {
    let quiet = config.quiet_window();
    let mut deadline: Option<Instant> = None;
    let mut pending = 0usize;

    loop {
        select! {
            biased;
            _ = shutdown.cancelled() => break,
            received = rx.recv() => match received {
                Ok(batch) => {
                    if qualifies(doc.as_ref(), &scope, &batch) {
                        pending += 1;
                        deadline = Some(Instant::now() + quiet);
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    // Dropped batches may have carried items; assume they did.
                    warn!(target: "feedguard.coalescer", skipped, "mutation stream lagged");
                    pending += 1;
                    deadline = Some(Instant::now() + quiet);
                }
                Err(RecvError::Closed) => {
                    debug!(target: "feedguard.coalescer", "mutation source closed");
                    break;
                }
            },
            _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                deadline = None;
                let batches = std::mem::take(&mut pending);
                debug!(target: "feedguard.coalescer", batches, "quiet window elapsed");
                if triggers.send(CoalescedChange { batches }).is_err() {
                    debug!(target: "feedguard.coalescer", "trigger receiver dropped");
                    break;
                }
            }
        }
    }
}

fn qualifies(doc: &dyn DocumentTree, scope: &Scope, batch: &MutationBatch) -> bool {
    if doc.find_within(doc.root(), &scope.region).is_none() {
        return batch
            .added_nodes()
            .any(|node| doc.find_within(node, &scope.containers).is_some());
    }
    batch.added_nodes().any(|node| {
        if doc.closest(node, &scope.region).is_some() {
            return doc.find_within(node, &scope.containers).is_some();
        }
        // a freshly rendered page may bring the region along with its items
        doc.query_all(node, &scope.region)
            .into_iter()
            .any(|region| doc.query_first(region, &scope.containers).is_some())
    })
}
