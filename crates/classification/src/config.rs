use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthorityConfig {
    /// How long edge-cached answers (flagged or not) are reused.
    pub edge_ttl_ms: u64,
    /// Upper bound on edge-cached identifiers; the oldest answers go first.
    pub edge_capacity: usize,
    /// Minimum effective score for an item to count as flagged.
    pub threshold: f64,
}

impl Default for AuthorityConfig {
    fn default() -> Self {
        Self {
            edge_ttl_ms: 300_000,
            edge_capacity: 5_000,
            threshold: 1.0,
        }
    }
}

impl AuthorityConfig {
    pub fn edge_ttl(&self) -> Duration {
        Duration::from_millis(self.edge_ttl_ms)
    }
}
