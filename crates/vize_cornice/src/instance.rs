//! Scope instance handles.
//!
//! A [`ScopeInstance`] is what application code holds on to. It stores no
//! node reference of its own: every query resolves the instance's anchor
//! through the engine's latest committed state, so the handle stays valid
//! (and equal to itself) while the reconciler rebuilds the tree underneath.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Weak};

use crate::classify::classify;
use crate::engine::{Committed, DeclarationId, Shared};
use crate::registry::ScopeType;
use crate::snapshot::{NodeId, Props, Snapshot};
use crate::traversal;

/// Identity of a scope instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct InstanceId(u64);

impl InstanceId {
    #[inline(always)]
    pub(crate) const fn new(id: u64) -> Self {
        Self(id)
    }

    #[inline(always)]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "scope:{}", self.0)
    }
}

/// Nested scope instances of the querying type.
///
/// `NoStructure` is a topology fact: no instance of this type exists anywhere
/// below. It is never represented as an empty `Nested`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScopeChildren {
    /// Nearest matches, closest first; never empty
    Nested(Vec<ScopeInstance>),
    /// No nested instance of the type exists
    NoStructure,
}

impl ScopeChildren {
    fn from_vec(instances: Vec<ScopeInstance>) -> Self {
        if instances.is_empty() {
            Self::NoStructure
        } else {
            Self::Nested(instances)
        }
    }

    #[inline]
    pub fn is_no_structure(&self) -> bool {
        matches!(self, Self::NoStructure)
    }

    /// Instances found, empty for `NoStructure`.
    pub fn as_slice(&self) -> &[ScopeInstance] {
        match self {
            Self::Nested(instances) => instances,
            Self::NoStructure => &[],
        }
    }

    pub fn len(&self) -> usize {
        self.as_slice().len()
    }

    pub fn is_empty(&self) -> bool {
        self.as_slice().is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ScopeInstance> {
        self.as_slice().iter()
    }

    /// `None` for `NoStructure`.
    pub fn into_option(self) -> Option<Vec<ScopeInstance>> {
        match self {
            Self::Nested(instances) => Some(instances),
            Self::NoStructure => None,
        }
    }
}

/// The committed state an instance currently resolves to.
struct Bound {
    state: Arc<Committed>,
    anchor: NodeId,
}

impl Bound {
    #[inline]
    fn snapshot(&self) -> &Snapshot {
        &self.state.snapshot
    }
}

/// Handle to one mounted scope declaration.
///
/// Handles compare equal when they refer to the same instance, no matter
/// which commit they were obtained in. Once the declaration is removed the
/// handle is destroyed for good and every query degrades to empty or
/// not-found results.
#[derive(Clone)]
pub struct ScopeInstance {
    id: InstanceId,
    declaration: DeclarationId,
    scope_type: ScopeType,
    shared: Weak<Shared>,
}

impl ScopeInstance {
    pub(crate) fn new(
        id: InstanceId,
        declaration: DeclarationId,
        scope_type: ScopeType,
        shared: Weak<Shared>,
    ) -> Self {
        Self {
            id,
            declaration,
            scope_type,
            shared,
        }
    }

    #[inline]
    pub fn id(&self) -> InstanceId {
        self.id
    }

    #[inline]
    pub fn declaration(&self) -> DeclarationId {
        self.declaration
    }

    #[inline]
    pub fn scope_type(&self) -> &ScopeType {
        &self.scope_type
    }

    fn bound(&self) -> Option<Bound> {
        let shared = self.shared.upgrade()?;
        let state = shared.current()?;
        let binding = state.declarations.get(&self.declaration)?;
        if binding.instance != self.id {
            // The site was re-declared; this handle belongs to the old instance
            return None;
        }
        let anchor = binding.anchor;
        Some(Bound { state, anchor })
    }

    /// Whether the declaration is still part of the committed tree.
    pub fn is_mounted(&self) -> bool {
        self.bound().is_some()
    }

    /// Node realizing this instance in the latest snapshot.
    pub fn anchor(&self) -> Option<NodeId> {
        self.bound().map(|bound| bound.anchor)
    }

    /// Current props of the scope declaration.
    pub fn props(&self) -> Option<Props> {
        let bound = self.bound()?;
        let scope = bound.snapshot().get(bound.anchor)?.scope()?;
        Some(scope.props().clone())
    }

    /// Host nodes below this scope accepted by the scope type's predicate, in
    /// document order.
    ///
    /// Nested scopes do not partition content: hosts inside a nested scope,
    /// even one of the same type, are reported here as well. Empty when
    /// nothing matches or the instance is destroyed.
    pub fn scoped_nodes(&self) -> Vec<NodeId> {
        let Some(bound) = self.bound() else {
            return Vec::new();
        };
        let nodes = traversal::collect_filtered(bound.snapshot(), bound.anchor, |tag, props| {
            self.scope_type.accepts(tag, props)
        });
        tracing::trace!("scoped_nodes {}: {} nodes", self.declaration, nodes.len());
        nodes
    }

    /// First host node [`scoped_nodes`](Self::scoped_nodes) would report.
    pub fn first_scoped_node(&self) -> Option<NodeId> {
        let bound = self.bound()?;
        traversal::find_first_filtered(bound.snapshot(), bound.anchor, |tag, props| {
            self.scope_type.accepts(tag, props)
        })
    }

    /// Like [`scoped_nodes`](Self::scoped_nodes) with an ad-hoc predicate.
    pub fn query_all_nodes<F>(&self, predicate: F) -> Vec<NodeId>
    where
        F: FnMut(&str, &Props) -> bool,
    {
        self.bound()
            .map(|bound| traversal::collect_filtered(bound.snapshot(), bound.anchor, predicate))
            .unwrap_or_default()
    }

    /// Like [`first_scoped_node`](Self::first_scoped_node) with an ad-hoc
    /// predicate.
    pub fn query_first_node<F>(&self, predicate: F) -> Option<NodeId>
    where
        F: FnMut(&str, &Props) -> bool,
    {
        let bound = self.bound()?;
        traversal::find_first_filtered(bound.snapshot(), bound.anchor, predicate)
    }

    /// [`query_all_nodes`](Self::query_all_nodes) with a fallible predicate.
    /// The predicate's first error is returned to the caller unchanged.
    pub fn try_query_all_nodes<F, E>(&self, predicate: F) -> Result<Vec<NodeId>, E>
    where
        F: FnMut(&str, &Props) -> Result<bool, E>,
    {
        match self.bound() {
            Some(bound) => traversal::try_collect_filtered(bound.snapshot(), bound.anchor, predicate),
            None => Ok(Vec::new()),
        }
    }

    /// [`query_first_node`](Self::query_first_node) with a fallible
    /// predicate.
    pub fn try_query_first_node<F, E>(&self, predicate: F) -> Result<Option<NodeId>, E>
    where
        F: FnMut(&str, &Props) -> Result<bool, E>,
    {
        match self.bound() {
            Some(bound) => {
                traversal::try_find_first_filtered(bound.snapshot(), bound.anchor, predicate)
            }
            None => Ok(None),
        }
    }

    /// Whether `node` is inside this scope's subtree.
    pub fn contains_node(&self, node: NodeId) -> bool {
        self.bound()
            .is_some_and(|bound| traversal::contains(bound.snapshot(), bound.anchor, node))
    }

    /// Nearest enclosing instance of the same scope type. Scopes of other
    /// types in between are skipped. `None` when there is none.
    pub fn parent(&self) -> Option<ScopeInstance> {
        let bound = self.bound()?;
        let scope_type = self.scope_type.id();
        let state = &bound.state;
        let node = traversal::nearest_ancestor_matching(bound.snapshot(), bound.anchor, |node| {
            classify(node).is_scope_of(scope_type) && state.is_anchor(node.id())
        })?;
        state.handle_at(node, &self.shared)
    }

    /// Nearest nested instances of the same scope type. Descent stops at the
    /// first match on each branch.
    pub fn children(&self) -> ScopeChildren {
        let Some(bound) = self.bound() else {
            return ScopeChildren::NoStructure;
        };
        let scope_type = self.scope_type.id();
        let state = &bound.state;
        let nodes = traversal::collect_nearest_matching(bound.snapshot(), bound.anchor, |node| {
            classify(node).is_scope_of(scope_type) && state.is_anchor(node.id())
        });
        tracing::trace!("children {}: {} nested", self.declaration, nodes.len());
        self.handles(state, nodes)
    }

    /// Outermost instances of the same scope type in the whole committed
    /// tree, which may include this one.
    pub fn children_from_root(&self) -> ScopeChildren {
        let Some(bound) = self.bound() else {
            return ScopeChildren::NoStructure;
        };
        let scope_type = self.scope_type.id();
        let state = &bound.state;
        let nodes = traversal::topmost_matching(bound.snapshot(), |node| {
            classify(node).is_scope_of(scope_type) && state.is_anchor(node.id())
        });
        self.handles(state, nodes)
    }

    fn handles(&self, state: &Committed, nodes: Vec<NodeId>) -> ScopeChildren {
        ScopeChildren::from_vec(
            nodes
                .into_iter()
                .filter_map(|node| state.handle_at(node, &self.shared))
                .collect(),
        )
    }
}

impl PartialEq for ScopeInstance {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && Weak::ptr_eq(&self.shared, &other.shared)
    }
}

impl Eq for ScopeInstance {}

impl Hash for ScopeInstance {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for ScopeInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopeInstance")
            .field("id", &self.id)
            .field("declaration", &self.declaration)
            .field("scope_type", &self.scope_type.name())
            .finish()
    }
}
