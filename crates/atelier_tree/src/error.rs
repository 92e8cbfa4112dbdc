//! Error types for conversation trees.

use crate::node::NodeId;
use atelier_persistence::PersistenceError;

/// Errors returned by [`ChatTree`](crate::ChatTree) operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TreeError {
    /// The node does not exist in this tree, or is not reachable from its root.
    #[error("node not found: {0}")]
    NotFound(NodeId),

    /// The operation would break a tree invariant.
    #[error("invalid tree state: {0}")]
    InvalidState(String),
}

/// A structural invariant violated by a tree, as reported by
/// [`ChatTree::validate`](crate::ChatTree::validate).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Violation {
    /// The tree has nodes but no root.
    MissingRoot,
    /// The root id does not resolve to a node.
    DanglingRoot(NodeId),
    /// The root node has a parent.
    RootHasParent(NodeId),
    /// The current leaf does not resolve to a node.
    DanglingLeaf(NodeId),
    /// A current leaf is set on an empty tree.
    LeafWithoutRoot(NodeId),
    /// A node's parent does not exist.
    MissingParent {
        /// The child.
        node: NodeId,
        /// The missing parent.
        parent: NodeId,
    },
    /// A node's parent does not list it as a child.
    NotListedByParent {
        /// The child.
        node: NodeId,
        /// The parent.
        parent: NodeId,
    },
    /// A listed child does not exist.
    MissingChild {
        /// The parent.
        node: NodeId,
        /// The missing child.
        child: NodeId,
    },
    /// A listed child names a different parent.
    ChildParentMismatch {
        /// The parent listing the child.
        node: NodeId,
        /// The child.
        child: NodeId,
    },
    /// A child is listed more than once.
    DuplicateChild {
        /// The parent.
        node: NodeId,
        /// The repeated child.
        child: NodeId,
    },
    /// A node that is not the root has no parent.
    SecondRoot(NodeId),
    /// The node cannot be reached from the root (a cycle or a detached subtree).
    Unreachable(NodeId),
}

impl core::fmt::Display for Violation {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::MissingRoot => write!(f, "tree has nodes but no root"),
            Self::DanglingRoot(id) => write!(f, "root {id} does not exist"),
            Self::RootHasParent(id) => write!(f, "root {id} has a parent"),
            Self::DanglingLeaf(id) => write!(f, "current leaf {id} does not exist"),
            Self::LeafWithoutRoot(id) => write!(f, "current leaf {id} set on an empty tree"),
            Self::MissingParent { node, parent } => {
                write!(f, "node {node} points at missing parent {parent}")
            }
            Self::NotListedByParent { node, parent } => {
                write!(f, "node {node} is not a child of its parent {parent}")
            }
            Self::MissingChild { node, child } => {
                write!(f, "node {node} lists missing child {child}")
            }
            Self::ChildParentMismatch { node, child } => {
                write!(f, "node {node} lists child {child} which has another parent")
            }
            Self::DuplicateChild { node, child } => {
                write!(f, "node {node} lists child {child} twice")
            }
            Self::SecondRoot(id) => write!(f, "node {id} has no parent but is not the root"),
            Self::Unreachable(id) => write!(f, "node {id} is unreachable from the root"),
        }
    }
}

/// Errors returned by the [`Conversations`](crate::Conversations) manager.
#[derive(Debug, thiserror::Error)]
pub enum ConversationError {
    /// No conversation has this id.
    #[error("conversation not found: {0}")]
    NotFound(String),

    /// A tree operation failed.
    #[error(transparent)]
    Tree(#[from] TreeError),

    /// A persisted conversation failed validation.
    #[error("conversation {id} is corrupt: {}", .violations.iter().map(ToString::to_string).collect::<Vec<_>>().join("; "))]
    Corrupt {
        /// The conversation id.
        id: String,
        /// Every violated invariant.
        violations: Vec<Violation>,
    },

    /// Loading from the store failed.
    #[error("persistence error: {0}")]
    Persistence(#[from] PersistenceError),
}
