//! Tree node storage

use crate::{NodeId, Property, PropertyKind, StringChunkRange, TextDirectionality};
use std::cell::Cell;

/// Namespace of the node types the factory knows how to build
pub const TREE_NODE_NAMESPACE: &str = crate::SDK_NAMESPACE;

/// Local name of the only node type the factory knows how to build
pub const TREE_NODE_LOCAL_NAME: &str = "TreeNode";

/// One node of a publication tree.
///
/// Nodes live in the [`Presentation`](crate::Presentation) arena and refer to
/// each other by [`NodeId`]. The child list is the owning edge; `parent` is a
/// back-reference that the mutation API keeps in sync. Structure can only be
/// changed through the presentation, which is what keeps the text cache
/// slots below exact.
#[derive(Debug)]
pub struct TreeNode {
    id: NodeId,
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
    pub(crate) properties: Vec<Property>,
    pub(crate) marked: bool,
    /// Direction of this node's own `dir` attribute or text, computed lazily
    pub(crate) direction: Cell<Option<TextDirectionality>>,
    /// Single-chunk range when the node contributes text of its own
    pub(crate) text_local: Option<StringChunkRange>,
    /// Span of the descendant chunks when the node only aggregates
    pub(crate) text_flattened: Option<StringChunkRange>,
}

impl TreeNode {
    pub(crate) fn new(id: NodeId) -> Self {
        Self {
            id,
            parent: None,
            children: Vec::new(),
            properties: Vec::new(),
            marked: false,
            direction: Cell::new(None),
            text_local: None,
            text_flattened: None,
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn child_count(&self) -> usize {
        self.children.len()
    }

    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }

    pub fn properties(&self) -> &[Property] {
        &self.properties
    }

    pub fn is_marked(&self) -> bool {
        self.marked
    }

    /// First property of type `T`
    pub fn property<T: PropertyKind>(&self) -> Option<&T> {
        self.properties.iter().find_map(T::from_property)
    }

    pub(crate) fn property_mut<T: PropertyKind>(&mut self) -> Option<&mut T> {
        self.properties.iter_mut().find_map(T::from_property_mut)
    }

    /// Whichever cached text range is set
    pub fn text_range(&self) -> Option<StringChunkRange> {
        self.text_local.or(self.text_flattened)
    }

    /// Own-text range, set only when the node contributes a chunk itself
    pub fn text_local(&self) -> Option<StringChunkRange> {
        self.text_local
    }

    /// Aggregated range, set only when the node has no chunk of its own
    pub fn text_flattened(&self) -> Option<StringChunkRange> {
        self.text_flattened
    }
}
