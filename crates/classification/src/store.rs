use async_trait::async_trait;
use dashmap::DashMap;

use feedguard_core_types::Identifier;

use crate::model::ReportState;

/// Local overlay store recording what the user did with an item.
#[async_trait]
pub trait ReportStateStore: Send + Sync {
    async fn get_report_state(&self, id: &Identifier) -> ReportState;
    async fn set_report_state(&self, id: &Identifier, state: ReportState);
}

#[derive(Default)]
pub struct InMemoryReportStore {
    states: DashMap<Identifier, ReportState>,
}

impl InMemoryReportStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}

#[async_trait]
impl ReportStateStore for InMemoryReportStore {
    async fn get_report_state(&self, id: &Identifier) -> ReportState {
        self.states
            .get(id)
            .map(|state| *state)
            .unwrap_or_default()
    }

    async fn set_report_state(&self, id: &Identifier, state: ReportState) {
        // NotReported is the implicit default; don't keep it around.
        if state == ReportState::NotReported {
            self.states.remove(id);
        } else {
            self.states.insert(id.clone(), state);
        }
    }
}
