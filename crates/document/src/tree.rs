use feedguard_core_types::NodeId;

use crate::selector::SelectorList;

/// Port onto the host's live document.
///
/// Handles are opaque and may go stale at any time: every primitive must
/// return `None`/`false`/empty for unknown or detached nodes instead of
/// failing. Query helpers are provided on top of the primitives; hosts with a
/// native query engine may override them as long as document order is kept.
pub trait DocumentTree: Send + Sync {
    fn root(&self) -> NodeId;
    fn parent(&self, node: NodeId) -> Option<NodeId>;
    fn children(&self, node: NodeId) -> Vec<NodeId>;
    /// Lowercase tag name.
    fn tag_name(&self, node: NodeId) -> Option<String>;
    fn attribute(&self, node: NodeId, name: &str) -> Option<String>;
    fn has_class(&self, node: NodeId, class: &str) -> bool;
    fn is_attached(&self, node: NodeId) -> bool;

    fn set_attribute(&self, node: NodeId, name: &str, value: &str) -> bool;
    fn remove_attribute(&self, node: NodeId, name: &str) -> bool;
    /// Returns `true` only when the class was not present before.
    fn add_class(&self, node: NodeId, class: &str) -> bool;
    /// Returns `true` only when the class was present before.
    fn remove_class(&self, node: NodeId, class: &str) -> bool;
    fn style(&self, node: NodeId, property: &str) -> Option<String>;
    fn set_style(&self, node: NodeId, property: &str, value: &str) -> bool;

    /// Creates a detached element.
    fn create_element(&self, tag: &str) -> NodeId;
    fn append_child(&self, parent: NodeId, child: NodeId) -> bool;
    /// Detaches `node` (and its subtree) from the document.
    fn remove(&self, node: NodeId) -> bool;

    fn matches(&self, node: NodeId, selector: &SelectorList) -> bool {
        selector.matches(self, node)
    }

    /// Nearest ancestor-or-self matching `selector`.
    fn closest(&self, node: NodeId, selector: &SelectorList) -> Option<NodeId> {
        let mut current = Some(node);
        while let Some(candidate) = current {
            if self.matches(candidate, selector) {
                return Some(candidate);
            }
            current = self.parent(candidate);
        }
        None
    }

    /// First matching descendant of `scope` (excluding `scope`) in document order.
    fn query_first(&self, scope: NodeId, selector: &SelectorList) -> Option<NodeId> {
        let mut stack: Vec<NodeId> = self.children(scope).into_iter().rev().collect();
        while let Some(node) = stack.pop() {
            if self.matches(node, selector) {
                return Some(node);
            }
            stack.extend(self.children(node).into_iter().rev());
        }
        None
    }

    /// Every matching descendant of `scope` (excluding `scope`) in document order.
    fn query_all(&self, scope: NodeId, selector: &SelectorList) -> Vec<NodeId> {
        let mut found = Vec::new();
        let mut stack: Vec<NodeId> = self.children(scope).into_iter().rev().collect();
        while let Some(node) = stack.pop() {
            if self.matches(node, selector) {
                found.push(node);
            }
            stack.extend(self.children(node).into_iter().rev());
        }
        found
    }

    /// `node` itself when it matches, otherwise its first matching descendant.
    fn find_within(&self, node: NodeId, selector: &SelectorList) -> Option<NodeId> {
        if self.matches(node, selector) {
            Some(node)
        } else {
            self.query_first(node, selector)
        }
    }
}
