use thiserror::Error;

use feedguard_core_types::NodeId;

#[derive(Debug, Error, Clone, Eq, PartialEq)]
pub enum ApplyError {
    /// The candidate is gone, or no container in its neighbourhood can carry
    /// the marker. Aborts that item only.
    #[error("no container found for {0}")]
    ContainerNotFound(NodeId),
    #[error("host rejected mutation on {0}")]
    Rejected(NodeId),
}
