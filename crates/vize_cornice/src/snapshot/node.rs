//! Snapshot node definitions.

use std::fmt;

use compact_str::CompactString;
use serde_json::Value;
use smallvec::SmallVec;

use crate::registry::ScopeTypeId;

/// Property bag carried by host and scope nodes.
pub type Props = serde_json::Map<String, Value>;

/// Child id list (stack-allocated for typical fan-out).
pub type ChildIds = SmallVec<[NodeId; 4]>;

/// Unique identifier for snapshot nodes.
///
/// Ids are supplied by the reconciler. Whether an id survives from one commit
/// to the next is up to the reconciler's key stability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct NodeId(u32);

impl NodeId {
    /// Create a new node ID
    #[inline(always)]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Get the raw ID value
    #[inline(always)]
    pub const fn as_u32(self) -> u32 {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A node in a committed snapshot.
#[derive(Debug, Clone)]
pub struct Node {
    pub(crate) id: NodeId,
    pub(crate) kind: NodeKind,
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: ChildIds,
}

impl Node {
    pub(crate) fn new(id: NodeId, kind: NodeKind) -> Self {
        Self {
            id,
            kind,
            parent: None,
            children: SmallVec::new(),
        }
    }

    #[inline]
    pub fn id(&self) -> NodeId {
        self.id
    }

    #[inline]
    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    /// Parent node, `None` for the root.
    #[inline]
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Children in committed render order.
    #[inline]
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    /// Host content, if this is a host node.
    pub fn host(&self) -> Option<&HostContent> {
        match &self.kind {
            NodeKind::Host(content) => Some(content),
            _ => None,
        }
    }

    /// Scope content, if this is a scope node.
    pub fn scope(&self) -> Option<&ScopeContent> {
        match &self.kind {
            NodeKind::Scope(content) => Some(content),
            _ => None,
        }
    }
}

/// Node type variants.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    /// Content-bearing leaf (element, text instance, ...)
    Host(HostContent),
    /// Typed scope marker
    Scope(ScopeContent),
    /// Transparent container (component, fragment, ...)
    Plain,
}

impl NodeKind {
    /// Host node with the given content descriptor and no props.
    pub fn host(tag: impl Into<CompactString>) -> Self {
        Self::Host(HostContent::new(tag))
    }
}

/// Content for host nodes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HostContent {
    /// Content descriptor (element type)
    pub tag: CompactString,
    /// Host properties
    pub props: Props,
}

impl HostContent {
    /// Create new host content.
    pub fn new(tag: impl Into<CompactString>) -> Self {
        Self {
            tag: tag.into(),
            props: Props::new(),
        }
    }

    /// Set a property.
    pub fn with_prop(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.props.insert(key.into(), value.into());
        self
    }

    /// Get a property.
    pub fn prop(&self, key: &str) -> Option<&Value> {
        self.props.get(key)
    }
}

impl From<HostContent> for NodeKind {
    fn from(content: HostContent) -> Self {
        Self::Host(content)
    }
}

/// Content for scope nodes.
///
/// Only produced by [`ScopeType`](crate::ScopeType), which stamps the
/// registered type key onto the node.
#[derive(Debug, Clone, PartialEq)]
pub struct ScopeContent {
    pub(crate) scope_type: ScopeTypeId,
    pub(crate) name: CompactString,
    pub(crate) props: Props,
}

impl ScopeContent {
    /// Declared type of this scope.
    #[inline]
    pub fn scope_type(&self) -> ScopeTypeId {
        self.scope_type
    }

    /// Name the scope type was registered with.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Props of the scope declaration.
    pub fn props(&self) -> &Props {
        &self.props
    }

    /// Set a property.
    pub fn with_prop(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.props.insert(key.into(), value.into());
        self
    }
}

impl From<ScopeContent> for NodeKind {
    fn from(content: ScopeContent) -> Self {
        Self::Scope(content)
    }
}
