use std::collections::HashMap;
use std::time::{Duration, Instant};

use feedguard_core_types::{Identifier, NodeId};

use crate::config::CacheConfig;

/// Outcome of running the extraction chain on one element. Misses are cached
/// too so a failing extraction is not repeated within the TTL.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Extraction {
    Found(Identifier),
    Missing,
}

impl Extraction {
    pub fn identifier(&self) -> Option<&Identifier> {
        match self {
            Extraction::Found(id) => Some(id),
            Extraction::Missing => None,
        }
    }

    pub fn into_identifier(self) -> Option<Identifier> {
        match self {
            Extraction::Found(id) => Some(id),
            Extraction::Missing => None,
        }
    }
}

impl From<Option<Identifier>> for Extraction {
    fn from(value: Option<Identifier>) -> Self {
        value.map(Extraction::Found).unwrap_or(Extraction::Missing)
    }
}

#[derive(Clone, Debug)]
struct CacheEntry {
    extraction: Extraction,
    last_accessed: Instant,
}

/// Bounded recency cache keyed by synthetic node identity.
///
/// Keys never own the element, and the whole cache is cleared at the start
/// of every reconciliation pass because the host recycles elements.
#[derive(Debug)]
pub struct IdentifierCache {
    entries: HashMap<NodeId, CacheEntry>,
    capacity: usize,
    ttl: Duration,
}

impl IdentifierCache {
    pub fn new(config: &CacheConfig) -> Self {
        Self::with_limits(config.capacity, config.ttl())
    }

    pub fn with_limits(capacity: usize, ttl: Duration) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: HashMap::with_capacity(capacity),
            capacity,
            ttl,
        }
    }

    pub fn get(&mut self, node: NodeId) -> Option<Extraction> {
        self.get_at(node, Instant::now())
    }

    pub fn put(&mut self, node: NodeId, extraction: Extraction) {
        self.put_at(node, extraction, Instant::now());
    }

    /// Evicts the least recently accessed entry when the cache is full.
    pub fn evict_if_needed(&mut self) -> Option<NodeId> {
        if self.entries.len() < self.capacity {
            return None;
        }
        let oldest = self
            .entries
            .iter()
            .min_by_key(|(_, entry)| entry.last_accessed)
            .map(|(node, _)| *node)?;
        self.entries.remove(&oldest);
        Some(oldest)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub(crate) fn get_at(&mut self, node: NodeId, now: Instant) -> Option<Extraction> {
        let ttl = self.ttl;
        match self.entries.get_mut(&node) {
            Some(entry) if now.saturating_duration_since(entry.last_accessed) < ttl => {
                entry.last_accessed = now;
                Some(entry.extraction.clone())
            }
            Some(_) => {
                self.entries.remove(&node);
                None
            }
            None => None,
        }
    }

    pub(crate) fn put_at(&mut self, node: NodeId, extraction: Extraction, now: Instant) {
        if !self.entries.contains_key(&node) {
            self.evict_if_needed();
        }
        self.entries.insert(
            node,
            CacheEntry {
                extraction,
                last_accessed: now,
            },
        );
    }
}
