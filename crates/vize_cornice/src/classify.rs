//! Node classification.

use crate::registry::ScopeTypeId;
use crate::snapshot::{Node, NodeKind};

/// What a node means to scope queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeClass {
    /// Content leaf, returned by content queries
    Host,
    /// Scope marker of the given declared type
    Scope(ScopeTypeId),
    /// Transparent container
    Plain,
}

impl NodeClass {
    #[inline]
    pub const fn is_host(self) -> bool {
        matches!(self, Self::Host)
    }

    #[inline]
    pub const fn is_scope(self) -> bool {
        matches!(self, Self::Scope(_))
    }

    /// Whether this is a scope of exactly `scope_type`.
    #[inline]
    pub fn is_scope_of(self, scope_type: ScopeTypeId) -> bool {
        self == Self::Scope(scope_type)
    }
}

/// Classify a node. The scope type is the key stamped at registration time,
/// compared by value.
#[inline]
pub fn classify(node: &Node) -> NodeClass {
    match node.kind() {
        NodeKind::Host(_) => NodeClass::Host,
        NodeKind::Scope(scope) => NodeClass::Scope(scope.scope_type()),
        NodeKind::Plain => NodeClass::Plain,
    }
}
