use serde::{Deserialize, Serialize};

use feedguard_core_types::Identifier;

/// Flagged answer for one identifier. Identifiers without an answer are
/// unflagged.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassificationResult {
    pub identifier: Identifier,
    pub effective_score: f64,
    pub raw_count: u64,
}

impl ClassificationResult {
    pub fn new(identifier: Identifier, effective_score: f64, raw_count: u64) -> Self {
        Self {
            identifier,
            effective_score,
            raw_count,
        }
    }
}

/// The local user's own relationship with an item.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportState {
    #[default]
    NotReported,
    Reported,
    Removed,
}
