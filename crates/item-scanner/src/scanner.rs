use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;

use feedguard_core_types::{Identifier, NodeId};
use feedguard_document::DocumentTree;

use crate::cache::{Extraction, IdentifierCache};
use crate::config::CacheConfig;
use crate::events;
use crate::markup::MarkupTable;
use crate::metrics::{ScannerMetrics, ScannerMetricsSnapshot};
use crate::strategies::extract_identifier;

/// Identifier → element mapping produced by one scan.
///
/// Keys are unique. Re-inserting an identifier rebinds it to the newer
/// element while keeping its first-seen position in [`ItemMap::identifiers`].
#[derive(Clone, Debug, Default)]
pub struct ItemMap {
    order: Vec<Identifier>,
    nodes: HashMap<Identifier, NodeId>,
}

impl ItemMap {
    pub fn insert(&mut self, id: Identifier, node: NodeId) {
        if self.nodes.insert(id.clone(), node).is_none() {
            self.order.push(id);
        }
    }

    pub fn get(&self, id: &Identifier) -> Option<NodeId> {
        self.nodes.get(id).copied()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn identifiers(&self) -> impl Iterator<Item = &Identifier> + '_ {
        self.order.iter()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Identifier, NodeId)> + '_ {
        self.order
            .iter()
            .filter_map(|id| self.nodes.get(id).map(|node| (id, *node)))
    }
}

/// Finds items in the document and resolves their identifiers.
pub struct ItemScanner {
    doc: Arc<dyn DocumentTree>,
    markup: Arc<MarkupTable>,
    cache: Mutex<IdentifierCache>,
    metrics: ScannerMetrics,
}

impl ItemScanner {
    pub fn new(doc: Arc<dyn DocumentTree>, markup: Arc<MarkupTable>, config: &CacheConfig) -> Self {
        Self {
            doc,
            markup,
            cache: Mutex::new(IdentifierCache::new(config)),
            metrics: ScannerMetrics::default(),
        }
    }

    /// One combined query over every container variant; document order
    /// decides which element keeps a duplicated identifier (the later one).
    pub fn scan(&self) -> ItemMap {
        let started = Instant::now();
        let root = self.markup.content_root(self.doc.as_ref());
        let candidates = self.doc.query_all(root, &self.markup.scan_containers);

        let mut items = ItemMap::default();
        for node in &candidates {
            if let Some(id) = self.extract(*node) {
                items.insert(id, *node);
            }
        }
        events::emit_scan(&self.metrics, candidates.len(), items.len(), started.elapsed());
        items
    }

    /// Cache first, then the extraction chain. Misses are cached as well.
    pub fn extract(&self, node: NodeId) -> Option<Identifier> {
        let mut cache = self.cache.lock();
        if let Some(hit) = cache.get(node) {
            self.metrics.record_lookup(true);
            return hit.into_identifier();
        }
        self.metrics.record_lookup(false);

        let found = extract_identifier(self.doc.as_ref(), node, &self.markup);
        events::emit_extract(node, found.as_ref().map(|(strategy, _)| *strategy));
        let extraction = Extraction::from(found.map(|(_, id)| id));
        if extraction == Extraction::Missing {
            self.metrics.record_extraction_miss();
        }
        if let Some(evicted) = cache.evict_if_needed() {
            events::emit_eviction(&self.metrics, evicted);
        }
        cache.put(node, extraction.clone());
        extraction.into_identifier()
    }

    pub fn clear_cache(&self) {
        self.cache.lock().clear();
    }

    pub fn cache_len(&self) -> usize {
        self.cache.lock().len()
    }

    pub fn markup(&self) -> &Arc<MarkupTable> {
        &self.markup
    }

    pub fn metrics(&self) -> ScannerMetricsSnapshot {
        self.metrics.snapshot()
    }
}
