//! Error types for tree operations

use crate::{ChannelId, NodeId};
use thiserror::Error;

/// Precondition violations raised by the mutation API and its helpers.
///
/// Every variant is reported before any link is touched, so a failed call
/// leaves the presentation exactly as it was.
#[derive(Debug, Error)]
pub enum TreeError {
    #[error("Node not found: {0}")]
    NodeNotFound(NodeId),

    #[error("Node {0} is still attached to a parent")]
    NodeNotDetached(NodeId),

    #[error("Index {index} out of bounds for {len} children")]
    IndexOutOfBounds { index: usize, len: usize },

    #[error("Node {node} is not a child of {parent}")]
    NodeDoesNotExist { parent: NodeId, node: NodeId },

    #[error("Node {0} belongs to a different presentation")]
    NodeInDifferentPresentation(NodeId),

    #[error("Node {0} cannot be used as an argument on itself")]
    NodeIsSelf(NodeId),

    #[error("Node {0} is an ancestor of the target node")]
    NodeIsAncestor(NodeId),

    #[error("Node {0} is a descendant of the target node")]
    NodeIsDescendant(NodeId),

    #[error("Node {0} has no parent")]
    NodeHasNoParent(NodeId),

    #[error("Nodes {0} and {1} are not in the same tree")]
    NodesInDifferentTrees(NodeId, NodeId),

    #[error("Channel not found: {0}")]
    ChannelNotFound(ChannelId),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, TreeError>;
