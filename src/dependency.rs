//! Dependency graph capture.
//!
//! Every successful build records a [`DependencyNode`]: the built key plus
//! the nodes of every lookup its builder performed, in completion order.
//! Lookups report themselves to the collector of the enclosing build through
//! the [`Context`](crate::Context), including lookups served from cache.

use std::any::TypeId;
use std::sync::Arc;

use parking_lot::Mutex;

#[cfg(feature = "graph-export")]
use serde::{Deserialize, Serialize};

use crate::key::Key;

/// A node of the recorded dependency tree.
///
/// With the `graph-export` feature the tree serializes as
/// `{"type": ..., "name": ..., "children": [...]}`, omitting an empty name
/// and an empty child list.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "graph-export", derive(Serialize, Deserialize))]
pub struct DependencyNode {
    /// Declared service type name
    #[cfg_attr(feature = "graph-export", serde(rename = "type"))]
    pub type_name: String,
    /// Service name; empty for the default instance
    #[cfg_attr(
        feature = "graph-export",
        serde(default, skip_serializing_if = "String::is_empty")
    )]
    pub name: String,
    /// Nodes of the services looked up while building this one
    #[cfg_attr(
        feature = "graph-export",
        serde(default, skip_serializing_if = "Vec::is_empty")
    )]
    pub children: Vec<Arc<DependencyNode>>,
    #[cfg_attr(feature = "graph-export", serde(skip))]
    type_id: Option<TypeId>,
}

impl DependencyNode {
    pub(crate) fn new(key: &Key, children: Vec<Arc<DependencyNode>>) -> Self {
        Self {
            type_name: key.type_name().to_string(),
            name: key.name().to_string(),
            children,
            type_id: Some(key.type_id()),
        }
    }

    /// The key display form of this node, `type` or `type(name)`.
    pub fn label(&self) -> String {
        if self.name.is_empty() {
            self.type_name.clone()
        } else {
            format!("{}({})", self.type_name, self.name)
        }
    }

    /// Returns true if this node was recorded for a service of type `T`.
    ///
    /// Always false for nodes that were deserialized.
    pub fn is<T: ?Sized + 'static>(&self) -> bool {
        self.type_id == Some(TypeId::of::<T>())
    }

    /// Returns true if this node was recorded for `key`.
    pub fn matches(&self, key: &Key) -> bool {
        self.type_id == Some(key.type_id()) && self.name == key.name()
    }

    /// Depth of the tree rooted here; a leaf has depth 1.
    pub fn depth(&self) -> usize {
        1 + self.children.iter().map(|c| c.depth()).max().unwrap_or(0)
    }

    /// Number of nodes in the tree rooted here, shared subtrees counted once per occurrence.
    pub fn node_count(&self) -> usize {
        self.iter().count()
    }

    /// Returns true if this node has no children.
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Pre-order traversal of the tree rooted here.
    pub fn iter(&self) -> impl Iterator<Item = &DependencyNode> {
        let mut stack = vec![self];
        std::iter::from_fn(move || {
            let node = stack.pop()?;
            stack.extend(node.children.iter().rev().map(|c| c.as_ref()));
            Some(node)
        })
    }
}

/// Accumulates the child nodes of one build.
///
/// Shared through the build's context, so concurrent nested lookups started
/// by the same builder append under a lock.
#[derive(Debug, Default)]
pub(crate) struct DependencyCollector {
    nodes: Mutex<Vec<Arc<DependencyNode>>>,
}

impl DependencyCollector {
    pub(crate) fn add(&self, node: Arc<DependencyNode>) {
        self.nodes.lock().push(node);
    }

    pub(crate) fn take(&self) -> Vec<Arc<DependencyNode>> {
        std::mem::take(&mut *self.nodes.lock())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(name: &str) -> Arc<DependencyNode> {
        Arc::new(DependencyNode::new(&Key::named::<u8>(name), Vec::new()))
    }

    #[test]
    fn test_traversal_is_pre_order() {
        let b = Arc::new(DependencyNode::new(
            &Key::named::<u8>("b"),
            vec![leaf("d"), leaf("e")],
        ));
        let root = DependencyNode::new(&Key::named::<u8>("a"), vec![b, leaf("c")]);

        let names: Vec<&str> = root.iter().map(|n| n.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "d", "e", "c"]);
        assert_eq!(root.depth(), 3);
        assert_eq!(root.node_count(), 5);
    }

    #[test]
    fn test_node_identity() {
        let node = leaf("x");
        assert!(node.is::<u8>());
        assert!(!node.is::<u16>());
        assert!(node.matches(&Key::named::<u8>("x")));
        assert!(!node.matches(&Key::named::<u8>("y")));
        assert_eq!(node.label(), "u8(x)");
    }

    #[test]
    fn test_collector_drains_in_order() {
        let collector = DependencyCollector::default();
        collector.add(leaf("1"));
        collector.add(leaf("2"));
        let names: Vec<String> = collector.take().iter().map(|n| n.name.clone()).collect();
        assert_eq!(names, vec!["1", "2"]);
        assert!(collector.take().is_empty());
    }
}
