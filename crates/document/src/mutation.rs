use tokio::sync::broadcast;

use feedguard_core_types::NodeId;

/// One structural change under `target`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct MutationRecord {
    pub target: NodeId,
    pub added: Vec<NodeId>,
    pub removed: Vec<NodeId>,
}

/// Records delivered together by the host, mirroring one observer callback.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct MutationBatch {
    pub records: Vec<MutationRecord>,
}

impl MutationBatch {
    pub fn single(record: MutationRecord) -> Self {
        Self {
            records: vec![record],
        }
    }

    pub fn added_nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.records
            .iter()
            .flat_map(|record| record.added.iter().copied())
    }

    pub fn is_empty(&self) -> bool {
        self.records
            .iter()
            .all(|record| record.added.is_empty() && record.removed.is_empty())
    }
}

/// Structural-change notification facility of the host.
///
/// Each receiver is one observation subscription; dropping it detaches.
pub trait MutationSource: Send + Sync {
    fn subscribe(&self) -> broadcast::Receiver<MutationBatch>;
}
