use thiserror::Error;

use classification::ClassificationError;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ReconcileError {
    /// The classification call failed; the pass was abandoned and markers
    /// from the reset stay cleared until the next trigger.
    #[error("classification failed: {0}")]
    Classification(#[from] ClassificationError),
}

impl ReconcileError {
    pub fn is_expected_closure(&self) -> bool {
        match self {
            ReconcileError::Classification(err) => err.is_expected_closure(),
        }
    }
}
