//! Single-flight gate around the reconciliation pass.
//!
//! At most one pass runs at a time. Requests arriving while a pass is in
//! flight are folded into exactly one rerun, which starts once the current
//! pass ends and uses the most recent explicit auto-hide override.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::errors::ReconcileError;
use crate::events;
use crate::pipeline::{PassReport, ReconcilePipeline};

#[derive(Debug)]
pub enum GateOutcome {
    /// This caller drove `passes` passes; `last` is the final one.
    Ran {
        passes: usize,
        last: Result<PassReport, ReconcileError>,
    },
    /// Another caller is running and will pick this request up.
    Coalesced,
}

impl GateOutcome {
    pub fn passes(&self) -> usize {
        match self {
            GateOutcome::Ran { passes, .. } => *passes,
            GateOutcome::Coalesced => 0,
        }
    }
}

pub struct SingleFlight {
    pipeline: Arc<ReconcilePipeline>,
    running: tokio::sync::Mutex<()>,
    pending: AtomicBool,
    /// Latest explicit override not yet consumed by a pass. Plain triggers
    /// never clear it.
    pending_override: Mutex<Option<bool>>,
}

impl SingleFlight {
    pub fn new(pipeline: Arc<ReconcilePipeline>) -> Self {
        Self {
            pipeline,
            running: tokio::sync::Mutex::new(()),
            pending: AtomicBool::new(false),
            pending_override: Mutex::new(None),
        }
    }

    pub fn pipeline(&self) -> &Arc<ReconcilePipeline> {
        &self.pipeline
    }

    pub fn is_running(&self) -> bool {
        self.running.try_lock().is_err()
    }

    pub async fn request_pass(&self, auto_hide_override: Option<bool>) -> GateOutcome {
        if let Some(value) = auto_hide_override {
            *self.pending_override.lock() = Some(value);
        }
        self.pending.store(true, Ordering::SeqCst);

        let mut passes = 0;
        let mut last = None;
        loop {
            let Ok(guard) = self.running.try_lock() else {
                // The running owner re-checks `pending` before releasing.
                return match last {
                    Some(last) => GateOutcome::Ran { passes, last },
                    None => {
                        events::emit_coalesced(self.pipeline.metrics());
                        GateOutcome::Coalesced
                    }
                };
            };
            while self.pending.swap(false, Ordering::SeqCst) {
                let auto_hide = self.pending_override.lock().take();
                last = Some(self.pipeline.run_pass(auto_hide).await);
                passes += 1;
            }
            drop(guard);

            if !self.pending.load(Ordering::SeqCst) {
                break;
            }
        }

        match last {
            Some(last) => GateOutcome::Ran { passes, last },
            None => GateOutcome::Coalesced,
        }
    }
}
