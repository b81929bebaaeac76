use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::time::Instant;
use tracing::{debug, warn};

use feedguard_core_types::Identifier;

use crate::config::AuthorityConfig;
use crate::errors::ClassificationError;
use crate::model::ClassificationResult;

/// Answers "which of these items are flagged?".
///
/// Only flagged items appear in the response, in request order.
#[async_trait]
pub trait ClassificationAuthority: Send + Sync {
    async fn classify(
        &self,
        ids: &[Identifier],
    ) -> Result<Vec<ClassificationResult>, ClassificationError>;
}

/// The authoritative source behind the edge cache. May answer with scores
/// below the inclusion threshold.
#[async_trait]
pub trait RemoteClassifier: Send + Sync {
    async fn lookup(
        &self,
        ids: &[Identifier],
    ) -> Result<Vec<ClassificationResult>, ClassificationError>;
}

#[derive(Clone, Debug)]
struct EdgeEntry {
    answer: Option<ClassificationResult>,
    stored_at: Instant,
}

/// Edge cache plus threshold filter in front of a [`RemoteClassifier`].
pub struct TieredAuthority {
    remote: Arc<dyn RemoteClassifier>,
    edge: DashMap<Identifier, EdgeEntry>,
    ttl: Duration,
    capacity: usize,
    threshold: f64,
}

impl TieredAuthority {
    pub fn new(remote: Arc<dyn RemoteClassifier>, config: &AuthorityConfig) -> Self {
        Self {
            remote,
            edge: DashMap::new(),
            ttl: config.edge_ttl(),
            capacity: config.edge_capacity.max(1),
            threshold: config.threshold,
        }
    }

    pub fn edge_len(&self) -> usize {
        self.edge.len()
    }

    pub fn clear_edge(&self) {
        self.edge.clear();
    }

    fn cached(&self, id: &Identifier, now: Instant) -> Option<Option<ClassificationResult>> {
        let entry = self.edge.get(id).map(|entry| entry.clone())?;
        if now.saturating_duration_since(entry.stored_at) < self.ttl {
            return Some(entry.answer);
        }
        self.edge.remove(id);
        None
    }

    /// Drops expired answers, then the oldest ones beyond capacity.
    fn prune(&self, now: Instant) -> usize {
        let before = self.edge.len();
        self.edge
            .retain(|_, entry| now.saturating_duration_since(entry.stored_at) < self.ttl);

        let excess = self.edge.len().saturating_sub(self.capacity);
        if excess > 0 {
            let mut by_age: Vec<(Identifier, Instant)> = self
                .edge
                .iter()
                .map(|entry| (entry.key().clone(), entry.value().stored_at))
                .collect();
            by_age.sort_by_key(|(_, stored_at)| *stored_at);
            for (id, _) in by_age.into_iter().take(excess) {
                self.edge.remove(&id);
            }
        }
        before.saturating_sub(self.edge.len())
    }

    fn flagged(&self, result: &ClassificationResult) -> bool {
        result.effective_score >= self.threshold
    }
}

#[async_trait]
impl ClassificationAuthority for TieredAuthority {
    async fn classify(
        &self,
        ids: &[Identifier],
    ) -> Result<Vec<ClassificationResult>, ClassificationError> {
        let now = Instant::now();
        let mut answers: Vec<Option<Option<ClassificationResult>>> =
            ids.iter().map(|id| self.cached(id, now)).collect();

        let missing: Vec<Identifier> = ids
            .iter()
            .zip(&answers)
            .filter(|(_, answer)| answer.is_none())
            .map(|(id, _)| id.clone())
            .collect();

        if !missing.is_empty() {
            let fetched = self.remote.lookup(&missing).await?;
            for result in &fetched {
                if !result.effective_score.is_finite() {
                    return Err(ClassificationError::InvalidResponse(format!(
                        "non-finite score for {}",
                        result.identifier
                    )));
                }
            }

            let stored_at = Instant::now();
            let mut fresh: HashMap<&Identifier, Option<ClassificationResult>> =
                HashMap::with_capacity(missing.len());
            for id in &missing {
                let answer = fetched
                    .iter()
                    .find(|result| &result.identifier == id)
                    .filter(|result| self.flagged(result))
                    .cloned();
                self.edge.insert(
                    id.clone(),
                    EdgeEntry {
                        answer: answer.clone(),
                        stored_at,
                    },
                );
                fresh.insert(id, answer);
            }
            let pruned = self.prune(stored_at);
            if pruned > 0 {
                debug!(target: "feedguard.classification", pruned, "edge cache pruned");
            }
            let unrequested = fetched
                .iter()
                .filter(|result| !missing.contains(&result.identifier))
                .count();
            if unrequested > 0 {
                warn!(target: "feedguard.classification", unrequested, "remote answered unrequested identifiers");
            }

            for (id, answer) in ids.iter().zip(answers.iter_mut()) {
                if answer.is_none() {
                    *answer = fresh.get(id).cloned();
                }
            }
        }

        debug!(
            target: "feedguard.classification",
            requested = ids.len(),
            remote = missing.len(),
            "classification resolved"
        );
        Ok(answers.into_iter().flatten().flatten().collect())
    }
}
