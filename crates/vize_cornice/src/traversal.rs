//! Subtree walkers and the scope query algorithms built on them.
//!
//! Every algorithm reads a single immutable [`Snapshot`] and never reports
//! the node it starts from.
//!
//! Boundary rules differ per query:
//! - Content collection crosses every nested scope, whatever its type.
//!   Nesting a scope does not partition the content of the outer one.
//! - Ancestor search skips scopes of other types and stops at the first
//!   match.
//! - Descendant search stops descending a branch at its first match, so each
//!   branch contributes at most one result.

use smallvec::SmallVec;

use crate::classify::classify;
use crate::registry::ScopeTypeId;
use crate::snapshot::{HostContent, Node, NodeId, NodeKind, Props, Snapshot};

/// Pre-order depth-first iterator over a subtree, left to right.
///
/// [`skip_subtree`](Self::skip_subtree) prunes the children of the node
/// yielded last.
pub struct Descendants<'a> {
    snapshot: &'a Snapshot,
    stack: SmallVec<[NodeId; 16]>,
    /// Last yielded node whose children are not pushed yet
    pending: Option<NodeId>,
}

impl<'a> Descendants<'a> {
    /// Strict descendants of `start`.
    pub fn new(snapshot: &'a Snapshot, start: NodeId) -> Self {
        Self {
            snapshot,
            stack: SmallVec::new(),
            pending: Some(start),
        }
    }

    /// `start` followed by its descendants.
    pub fn inclusive(snapshot: &'a Snapshot, start: NodeId) -> Self {
        let mut stack = SmallVec::new();
        stack.push(start);
        Self {
            snapshot,
            stack,
            pending: None,
        }
    }

    /// Do not descend into the node returned by the last `next` call.
    #[inline]
    pub fn skip_subtree(&mut self) {
        self.pending = None;
    }
}

impl<'a> Iterator for Descendants<'a> {
    type Item = &'a Node;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(id) = self.pending.take() {
            // Push children in reverse order so they're processed left-to-right
            self.stack
                .extend(self.snapshot.children(id).iter().rev().copied());
        }
        while let Some(id) = self.stack.pop() {
            if let Some(node) = self.snapshot.get(id) {
                self.pending = Some(id);
                return Some(node);
            }
        }
        None
    }
}

/// Strict ancestors of a node, nearest first.
pub struct Ancestors<'a> {
    snapshot: &'a Snapshot,
    next: Option<NodeId>,
}

impl<'a> Ancestors<'a> {
    pub fn new(snapshot: &'a Snapshot, start: NodeId) -> Self {
        Self {
            snapshot,
            next: snapshot.parent(start),
        }
    }
}

impl<'a> Iterator for Ancestors<'a> {
    type Item = &'a Node;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.snapshot.get(self.next?)?;
        self.next = node.parent();
        Some(node)
    }
}

#[inline]
fn host_of(node: &Node) -> Option<&HostContent> {
    match node.kind() {
        NodeKind::Host(host) => Some(host),
        _ => None,
    }
}

/// Host descendants of `anchor` accepted by `predicate`, in document order.
///
/// Nested scopes are crossed transparently. Empty when nothing matches.
pub fn collect_filtered<F>(snapshot: &Snapshot, anchor: NodeId, mut predicate: F) -> Vec<NodeId>
where
    F: FnMut(&str, &Props) -> bool,
{
    snapshot
        .descendants(anchor)
        .filter(|node| host_of(node).is_some_and(|host| predicate(host.tag.as_str(), &host.props)))
        .map(Node::id)
        .collect()
}

/// [`collect_filtered`] with a fallible predicate. The first error aborts
/// the walk and is returned as is.
pub fn try_collect_filtered<F, E>(
    snapshot: &Snapshot,
    anchor: NodeId,
    mut predicate: F,
) -> Result<Vec<NodeId>, E>
where
    F: FnMut(&str, &Props) -> Result<bool, E>,
{
    let mut found = Vec::new();
    for node in snapshot.descendants(anchor) {
        if let Some(host) = host_of(node) {
            if predicate(host.tag.as_str(), &host.props)? {
                found.push(node.id());
            }
        }
    }
    Ok(found)
}

/// First host descendant of `anchor` accepted by `predicate`.
pub fn find_first_filtered<F>(snapshot: &Snapshot, anchor: NodeId, mut predicate: F) -> Option<NodeId>
where
    F: FnMut(&str, &Props) -> bool,
{
    snapshot
        .descendants(anchor)
        .find(|node| host_of(node).is_some_and(|host| predicate(host.tag.as_str(), &host.props)))
        .map(Node::id)
}

/// [`find_first_filtered`] with a fallible predicate.
pub fn try_find_first_filtered<F, E>(
    snapshot: &Snapshot,
    anchor: NodeId,
    mut predicate: F,
) -> Result<Option<NodeId>, E>
where
    F: FnMut(&str, &Props) -> Result<bool, E>,
{
    for node in snapshot.descendants(anchor) {
        if let Some(host) = host_of(node) {
            if predicate(host.tag.as_str(), &host.props)? {
                return Ok(Some(node.id()));
            }
        }
    }
    Ok(None)
}

/// Nearest strict ancestor of `anchor` accepted by `stop`.
pub fn nearest_ancestor_matching<F>(snapshot: &Snapshot, anchor: NodeId, mut stop: F) -> Option<NodeId>
where
    F: FnMut(&Node) -> bool,
{
    snapshot.ancestors(anchor).find(|node| stop(node)).map(Node::id)
}

/// Nearest descendants of `anchor` accepted by `stop`, one per branch at
/// most, in traversal order. Descent stops at each match.
pub fn collect_nearest_matching<F>(snapshot: &Snapshot, anchor: NodeId, stop: F) -> Vec<NodeId>
where
    F: FnMut(&Node) -> bool,
{
    collect_nearest(Descendants::new(snapshot, anchor), stop)
}

fn collect_nearest<F>(mut walk: Descendants<'_>, mut stop: F) -> Vec<NodeId>
where
    F: FnMut(&Node) -> bool,
{
    let mut found = Vec::new();
    while let Some(node) = walk.next() {
        if stop(node) {
            found.push(node.id());
            walk.skip_subtree();
        }
    }
    found
}

/// Nearest enclosing scope of exactly `scope_type`. Scopes of other types
/// are skipped.
pub fn nearest_ancestor_of_type(
    snapshot: &Snapshot,
    anchor: NodeId,
    scope_type: ScopeTypeId,
) -> Option<NodeId> {
    nearest_ancestor_matching(snapshot, anchor, |node| classify(node).is_scope_of(scope_type))
}

/// Nearest nested scopes of exactly `scope_type`.
pub fn nearest_descendants_of_type(
    snapshot: &Snapshot,
    anchor: NodeId,
    scope_type: ScopeTypeId,
) -> Vec<NodeId> {
    collect_nearest_matching(snapshot, anchor, |node| classify(node).is_scope_of(scope_type))
}

/// Outermost nodes accepted by `stop`, searched from the snapshot root. The
/// root itself counts.
pub fn topmost_matching<F>(snapshot: &Snapshot, stop: F) -> Vec<NodeId>
where
    F: FnMut(&Node) -> bool,
{
    collect_nearest(Descendants::inclusive(snapshot, snapshot.root()), stop)
}

/// Whether `node` lies strictly inside the subtree of `anchor`.
pub fn contains(snapshot: &Snapshot, anchor: NodeId, node: NodeId) -> bool {
    snapshot.ancestors(node).any(|ancestor| ancestor.id() == anchor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{ScopeRegistry, ScopeType};
    use crate::snapshot::{HostContent, SnapshotBuilder};

    struct Fixture {
        snapshot: Snapshot,
        outer: NodeId,
        inner: NodeId,
        other: NodeId,
        nested: NodeId,
        hosts: Vec<NodeId>,
        focus: ScopeType,
    }

    /// ```text
    /// root
    /// └─ outer [Focus]
    ///    ├─ h0 <button>
    ///    ├─ other [Group]
    ///    │  └─ h1 <input>
    ///    └─ inner [Focus]
    ///       ├─ h2 <div>
    ///       └─ nested [Focus]
    ///          └─ h3 <button>
    /// ```
    fn fixture() -> Fixture {
        let mut registry = ScopeRegistry::new();
        let focus = registry.register("Focus", |_, _| true);
        let group = registry.register("Group", |_, _| true);

        let mut b = SnapshotBuilder::new();
        let root = b.insert_root(NodeKind::Plain);
        let outer = b.add_child(root, focus.content()).unwrap();
        let h0 = b.add_child(outer, NodeKind::host("button")).unwrap();
        let other = b.add_child(outer, group.content()).unwrap();
        let h1 = b
            .add_child(other, HostContent::new("input").with_prop("disabled", true))
            .unwrap();
        let inner = b.add_child(outer, focus.content()).unwrap();
        let h2 = b.add_child(inner, NodeKind::host("div")).unwrap();
        let nested = b.add_child(inner, focus.content()).unwrap();
        let h3 = b.add_child(nested, NodeKind::host("button")).unwrap();

        Fixture {
            snapshot: b.build().unwrap(),
            outer,
            inner,
            other,
            nested,
            hosts: vec![h0, h1, h2, h3],
            focus,
        }
    }

    #[test]
    fn test_descendants_exclude_start() {
        let f = fixture();
        let ids: Vec<_> = f.snapshot.descendants(f.nested).map(Node::id).collect();
        assert_eq!(ids, vec![f.hosts[3]]);
        assert_eq!(f.snapshot.descendants(NodeId::new(999)).count(), 0);
    }

    #[test]
    fn test_skip_subtree() {
        let f = fixture();
        let mut walk = f.snapshot.descendants(f.outer);
        let mut seen = Vec::new();
        while let Some(node) = walk.next() {
            seen.push(node.id());
            if node.id() == f.other || node.id() == f.inner {
                walk.skip_subtree();
            }
        }
        assert_eq!(seen, vec![f.hosts[0], f.other, f.inner]);
    }

    #[test]
    fn test_ancestors_nearest_first() {
        let f = fixture();
        let ids: Vec<_> = f.snapshot.ancestors(f.hosts[3]).map(Node::id).collect();
        assert_eq!(ids, vec![f.nested, f.inner, f.outer, f.snapshot.root()]);
        assert_eq!(f.snapshot.ancestors(f.snapshot.root()).count(), 0);
    }

    #[test]
    fn test_collect_crosses_nested_scopes() {
        let f = fixture();
        assert_eq!(collect_filtered(&f.snapshot, f.outer, |_, _| true), f.hosts);
        assert_eq!(
            collect_filtered(&f.snapshot, f.inner, |_, _| true),
            vec![f.hosts[2], f.hosts[3]]
        );
    }

    #[test]
    fn test_collect_filters_and_empty() {
        let f = fixture();
        assert_eq!(
            collect_filtered(&f.snapshot, f.outer, |tag, _| tag == "button"),
            vec![f.hosts[0], f.hosts[3]]
        );
        assert_eq!(
            collect_filtered(&f.snapshot, f.outer, |_, props| props.contains_key("disabled")),
            vec![f.hosts[1]]
        );
        assert!(collect_filtered(&f.snapshot, f.outer, |tag, _| tag == "video").is_empty());
    }

    #[test]
    fn test_try_collect_propagates_error() {
        let f = fixture();
        let mut calls = 0;
        let result: Result<Vec<NodeId>, String> =
            try_collect_filtered(&f.snapshot, f.outer, |tag, _| {
                calls += 1;
                if tag == "input" {
                    Err(format!("cannot judge <{}>", tag))
                } else {
                    Ok(true)
                }
            });
        assert_eq!(result, Err("cannot judge <input>".to_string()));
        // h0 then h1, nothing after the failure
        assert_eq!(calls, 2);

        let ok: Result<Vec<NodeId>, String> =
            try_collect_filtered(&f.snapshot, f.inner, |_, _| Ok(true));
        assert_eq!(ok, Ok(vec![f.hosts[2], f.hosts[3]]));
    }

    #[test]
    fn test_find_first() {
        let f = fixture();
        assert_eq!(
            find_first_filtered(&f.snapshot, f.outer, |tag, _| tag == "div"),
            Some(f.hosts[2])
        );
        assert_eq!(find_first_filtered(&f.snapshot, f.outer, |_, _| false), None);

        let first: Result<_, ()> =
            try_find_first_filtered(&f.snapshot, f.outer, |tag, _| Ok(tag == "input"));
        assert_eq!(first, Ok(Some(f.hosts[1])));
    }

    #[test]
    fn test_nearest_ancestor_of_type() {
        let f = fixture();
        let ty = f.focus.id();
        assert_eq!(nearest_ancestor_of_type(&f.snapshot, f.nested, ty), Some(f.inner));
        assert_eq!(nearest_ancestor_of_type(&f.snapshot, f.inner, ty), Some(f.outer));
        assert_eq!(nearest_ancestor_of_type(&f.snapshot, f.outer, ty), None);
        // Group scope in between is skipped
        assert_eq!(nearest_ancestor_of_type(&f.snapshot, f.hosts[1], ty), Some(f.outer));
    }

    #[test]
    fn test_nearest_descendants_stop_at_first_match() {
        let f = fixture();
        let ty = f.focus.id();
        assert_eq!(nearest_descendants_of_type(&f.snapshot, f.outer, ty), vec![f.inner]);
        assert_eq!(nearest_descendants_of_type(&f.snapshot, f.inner, ty), vec![f.nested]);
        assert!(nearest_descendants_of_type(&f.snapshot, f.nested, ty).is_empty());
    }

    #[test]
    fn test_topmost_matching() {
        let f = fixture();
        let ty = f.focus.id();
        assert_eq!(
            topmost_matching(&f.snapshot, |node| classify(node).is_scope_of(ty)),
            vec![f.outer]
        );
        assert_eq!(
            topmost_matching(&f.snapshot, |node| node.id() == f.snapshot.root()),
            vec![f.snapshot.root()]
        );
    }

    #[test]
    fn test_contains() {
        let f = fixture();
        assert!(contains(&f.snapshot, f.outer, f.hosts[3]));
        assert!(contains(&f.snapshot, f.inner, f.nested));
        assert!(!contains(&f.snapshot, f.inner, f.hosts[0]));
        assert!(!contains(&f.snapshot, f.inner, f.inner));
        assert!(!contains(&f.snapshot, f.inner, NodeId::new(999)));
    }
}
