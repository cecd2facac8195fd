//! Error types for vize_cornice.

use thiserror::Error;

use crate::engine::DeclarationId;
use crate::registry::ScopeTypeId;
use crate::snapshot::NodeId;

/// Errors raised while building a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SnapshotError {
    /// No root was set
    #[error("snapshot has no root")]
    MissingRoot,

    /// A referenced node does not exist
    #[error("unknown node {0}")]
    UnknownNode(NodeId),

    /// An explicit id was used twice
    #[error("node {0} is already present")]
    DuplicateNode(NodeId),

    /// A node was attached to a second parent
    #[error("node {child} is already attached to {parent}")]
    AlreadyAttached { child: NodeId, parent: NodeId },

    /// Attaching would make a node its own ancestor
    #[error("attaching {child} under {parent} would create a cycle")]
    Cycle { parent: NodeId, child: NodeId },

    /// The root was attached under another node
    #[error("root {0} cannot have a parent")]
    RootAttached(NodeId),

    /// A node is not reachable from the root
    #[error("node {0} is not reachable from the root")]
    Unreachable(NodeId),
}

/// Errors raised while applying a commit. A failed commit leaves the
/// previously committed state untouched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommitError {
    /// A binding names a node missing from the snapshot
    #[error("declaration {declaration} is bound to unknown node {node}")]
    UnknownNode {
        declaration: DeclarationId,
        node: NodeId,
    },

    /// A binding names a node that is not a scope
    #[error("declaration {declaration} is bound to {node}, which is not a scope node")]
    NotAScope {
        declaration: DeclarationId,
        node: NodeId,
    },

    /// The scope node's type was registered with another engine
    #[error("scope type {scope_type} of node {node} is not registered with this engine")]
    UnregisteredScopeType {
        node: NodeId,
        scope_type: ScopeTypeId,
    },

    /// Two declarations claim the same node
    #[error("node {node} is bound by both {first} and {second}")]
    SharedAnchor {
        node: NodeId,
        first: DeclarationId,
        second: DeclarationId,
    },

    /// A declaration appears twice in one commit
    #[error("declaration {0} is bound more than once")]
    DuplicateBinding(DeclarationId),

    /// A declaration is both bound and unmounted in one commit
    #[error("declaration {0} is both bound and unmounted")]
    ConflictingUnmount(DeclarationId),
}
