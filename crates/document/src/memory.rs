//! In-process document arena.
//!
//! Removing a node drops its whole subtree from the arena, so handles held
//! elsewhere go stale exactly like detached host elements do.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::broadcast;
use tracing::trace;

use feedguard_core_types::NodeId;
use feedguard_event_bus::{EventBus, InMemoryBus};

use crate::mutation::{MutationBatch, MutationRecord, MutationSource};
use crate::tree::DocumentTree;

const DEFAULT_BUS_CAPACITY: usize = 256;

/// Declarative element description used to build subtrees.
#[derive(Clone, Debug, Default)]
pub struct ElementSpec {
    tag: String,
    attributes: Vec<(String, String)>,
    classes: Vec<String>,
    children: Vec<ElementSpec>,
}

/// Shorthand for [`ElementSpec::new`].
pub fn el(tag: &str) -> ElementSpec {
    ElementSpec::new(tag)
}

impl ElementSpec {
    pub fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_ascii_lowercase(),
            ..Self::default()
        }
    }

    pub fn attr(mut self, name: &str, value: &str) -> Self {
        self.attributes
            .push((name.to_ascii_lowercase(), value.to_string()));
        self
    }

    pub fn class(mut self, class: &str) -> Self {
        self.classes.push(class.to_string());
        self
    }

    pub fn child(mut self, child: ElementSpec) -> Self {
        self.children.push(child);
        self
    }

    pub fn children<I>(mut self, children: I) -> Self
    where
        I: IntoIterator<Item = ElementSpec>,
    {
        self.children.extend(children);
        self
    }
}

#[derive(Debug, Default)]
struct NodeData {
    tag: String,
    attributes: BTreeMap<String, String>,
    classes: Vec<String>,
    styles: BTreeMap<String, String>,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

#[derive(Debug)]
struct Arena {
    nodes: HashMap<NodeId, NodeData>,
    next_id: u64,
    root: NodeId,
}

impl Arena {
    fn new() -> Self {
        let root = NodeId(0);
        let mut nodes = HashMap::new();
        nodes.insert(
            root,
            NodeData {
                tag: "html".into(),
                ..NodeData::default()
            },
        );
        Self {
            nodes,
            next_id: 1,
            root,
        }
    }

    fn alloc(&mut self, tag: &str) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        self.nodes.insert(
            id,
            NodeData {
                tag: tag.to_ascii_lowercase(),
                ..NodeData::default()
            },
        );
        id
    }

    fn build(&mut self, spec: &ElementSpec) -> NodeId {
        let id = self.alloc(&spec.tag);
        if let Some(node) = self.nodes.get_mut(&id) {
            for (name, value) in &spec.attributes {
                if name == "class" {
                    node.classes = split_classes(value);
                } else {
                    node.attributes.insert(name.clone(), value.clone());
                }
            }
            for class in &spec.classes {
                if !node.classes.contains(class) {
                    node.classes.push(class.clone());
                }
            }
        }
        for child_spec in &spec.children {
            let child = self.build(child_spec);
            self.link(id, child);
        }
        id
    }

    fn link(&mut self, parent: NodeId, child: NodeId) {
        if let Some(node) = self.nodes.get_mut(&child) {
            node.parent = Some(parent);
        }
        if let Some(node) = self.nodes.get_mut(&parent) {
            node.children.push(child);
        }
    }

    fn unlink(&mut self, child: NodeId) -> Option<NodeId> {
        let parent = self.nodes.get_mut(&child)?.parent.take()?;
        if let Some(node) = self.nodes.get_mut(&parent) {
            node.children.retain(|existing| *existing != child);
        }
        Some(parent)
    }

    fn is_ancestor_or_self(&self, candidate: NodeId, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(id) = current {
            if id == candidate {
                return true;
            }
            current = self.nodes.get(&id).and_then(|data| data.parent);
        }
        false
    }

    fn drop_subtree(&mut self, node: NodeId) {
        let mut stack = vec![node];
        while let Some(id) = stack.pop() {
            if let Some(data) = self.nodes.remove(&id) {
                stack.extend(data.children);
            }
        }
    }
}

fn split_classes(raw: &str) -> Vec<String> {
    let mut classes: Vec<String> = Vec::new();
    for class in raw.split_whitespace() {
        if !classes.iter().any(|existing| existing == class) {
            classes.push(class.to_string());
        }
    }
    classes
}

/// Arena-backed [`DocumentTree`] that publishes its own structural changes.
pub struct MemoryDocument {
    arena: RwLock<Arena>,
    bus: Arc<InMemoryBus<MutationBatch>>,
}

impl Default for MemoryDocument {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryDocument {
    pub fn new() -> Self {
        Self::with_bus_capacity(DEFAULT_BUS_CAPACITY)
    }

    pub fn with_bus_capacity(capacity: usize) -> Self {
        Self {
            arena: RwLock::new(Arena::new()),
            bus: InMemoryBus::new(capacity),
        }
    }

    /// Builds `spec` and attaches it under `parent` as one mutation batch.
    pub fn insert(&self, parent: NodeId, spec: ElementSpec) -> Option<NodeId> {
        let node = {
            let mut arena = self.arena.write();
            if !arena.nodes.contains_key(&parent) {
                return None;
            }
            let node = arena.build(&spec);
            arena.link(parent, node);
            node
        };
        self.publish(MutationRecord {
            target: parent,
            added: vec![node],
            removed: Vec::new(),
        });
        Some(node)
    }

    /// Number of live observation subscriptions.
    pub fn observer_count(&self) -> usize {
        self.bus.subscriber_count()
    }

    pub fn node_count(&self) -> usize {
        self.arena.read().nodes.len()
    }

    fn publish(&self, record: MutationRecord) {
        // No observers is the common case outside an active coalescer.
        if let Err(err) = self.bus.publish(MutationBatch::single(record)) {
            trace!(target: "feedguard.document", %err, "mutation batch had no observers");
        }
    }
}

impl DocumentTree for MemoryDocument {
    fn root(&self) -> NodeId {
        self.arena.read().root
    }

    fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.arena.read().nodes.get(&node)?.parent
    }

    fn children(&self, node: NodeId) -> Vec<NodeId> {
        self.arena
            .read()
            .nodes
            .get(&node)
            .map(|data| data.children.clone())
            .unwrap_or_default()
    }

    fn tag_name(&self, node: NodeId) -> Option<String> {
        self.arena.read().nodes.get(&node).map(|data| data.tag.clone())
    }

    fn attribute(&self, node: NodeId, name: &str) -> Option<String> {
        let arena = self.arena.read();
        let data = arena.nodes.get(&node)?;
        if name.eq_ignore_ascii_case("class") {
            if data.classes.is_empty() {
                return None;
            }
            return Some(data.classes.join(" "));
        }
        data.attributes.get(&name.to_ascii_lowercase()).cloned()
    }

    fn has_class(&self, node: NodeId, class: &str) -> bool {
        self.arena
            .read()
            .nodes
            .get(&node)
            .map(|data| data.classes.iter().any(|existing| existing == class))
            .unwrap_or(false)
    }

    fn is_attached(&self, node: NodeId) -> bool {
        let arena = self.arena.read();
        let root = arena.root;
        arena.nodes.contains_key(&node) && arena.is_ancestor_or_self(root, node)
    }

    fn set_attribute(&self, node: NodeId, name: &str, value: &str) -> bool {
        let mut arena = self.arena.write();
        let Some(data) = arena.nodes.get_mut(&node) else {
            return false;
        };
        if name.eq_ignore_ascii_case("class") {
            data.classes = split_classes(value);
        } else {
            data.attributes
                .insert(name.to_ascii_lowercase(), value.to_string());
        }
        true
    }

    fn remove_attribute(&self, node: NodeId, name: &str) -> bool {
        let mut arena = self.arena.write();
        let Some(data) = arena.nodes.get_mut(&node) else {
            return false;
        };
        if name.eq_ignore_ascii_case("class") {
            let had = !data.classes.is_empty();
            data.classes.clear();
            return had;
        }
        data.attributes.remove(&name.to_ascii_lowercase()).is_some()
    }

    fn add_class(&self, node: NodeId, class: &str) -> bool {
        let mut arena = self.arena.write();
        let Some(data) = arena.nodes.get_mut(&node) else {
            return false;
        };
        if data.classes.iter().any(|existing| existing == class) {
            return false;
        }
        data.classes.push(class.to_string());
        true
    }

    fn remove_class(&self, node: NodeId, class: &str) -> bool {
        let mut arena = self.arena.write();
        let Some(data) = arena.nodes.get_mut(&node) else {
            return false;
        };
        let before = data.classes.len();
        data.classes.retain(|existing| existing != class);
        data.classes.len() != before
    }

    fn style(&self, node: NodeId, property: &str) -> Option<String> {
        self.arena
            .read()
            .nodes
            .get(&node)?
            .styles
            .get(property)
            .cloned()
    }

    fn set_style(&self, node: NodeId, property: &str, value: &str) -> bool {
        let mut arena = self.arena.write();
        match arena.nodes.get_mut(&node) {
            Some(data) => {
                data.styles.insert(property.to_string(), value.to_string());
                true
            }
            None => false,
        }
    }

    fn create_element(&self, tag: &str) -> NodeId {
        self.arena.write().alloc(tag)
    }

    fn append_child(&self, parent: NodeId, child: NodeId) -> bool {
        let previous = {
            let mut arena = self.arena.write();
            if !arena.nodes.contains_key(&parent) || !arena.nodes.contains_key(&child) {
                return false;
            }
            if arena.is_ancestor_or_self(child, parent) {
                return false;
            }
            let previous = arena.unlink(child);
            arena.link(parent, child);
            previous
        };
        if let Some(old_parent) = previous {
            self.publish(MutationRecord {
                target: old_parent,
                added: Vec::new(),
                removed: vec![child],
            });
        }
        self.publish(MutationRecord {
            target: parent,
            added: vec![child],
            removed: Vec::new(),
        });
        true
    }

    fn remove(&self, node: NodeId) -> bool {
        let parent = {
            let mut arena = self.arena.write();
            if node == arena.root || !arena.nodes.contains_key(&node) {
                return false;
            }
            let parent = arena.unlink(node);
            arena.drop_subtree(node);
            parent
        };
        if let Some(parent) = parent {
            self.publish(MutationRecord {
                target: parent,
                added: Vec::new(),
                removed: vec![node],
            });
        }
        true
    }
}

impl MutationSource for MemoryDocument {
    fn subscribe(&self) -> broadcast::Receiver<MutationBatch> {
        self.bus.subscribe()
    }
}
