//! Immutable snapshot arena and its builder.

use std::fmt;

use rustc_hash::FxHashMap;

use super::node::{Node, NodeId, NodeKind};
use crate::error::SnapshotError;
use crate::traversal::{Ancestors, Descendants};

/// One committed tree.
///
/// Nodes live in an arena keyed by [`NodeId`]; parent and child links are ids
/// resolved through the snapshot. A snapshot never changes after
/// [`SnapshotBuilder::build`], so any number of readers may walk it at once.
#[derive(Debug, Clone)]
pub struct Snapshot {
    nodes: FxHashMap<NodeId, Node>,
    root: NodeId,
}

impl Snapshot {
    /// Start building a snapshot.
    pub fn builder() -> SnapshotBuilder {
        SnapshotBuilder::new()
    }

    /// Root node ID.
    #[inline]
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Get a node by ID.
    #[inline]
    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    /// Whether the node is part of this snapshot.
    #[inline]
    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    /// Parent of a node.
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.get(id).and_then(Node::parent)
    }

    /// Children of a node in render order. Empty for unknown nodes.
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.get(id).map(Node::children).unwrap_or(&[])
    }

    /// Get node count.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Iterate over all nodes in arbitrary order.
    pub fn iter(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    /// Walk `start` and its subtree depth-first, pre-order.
    pub fn walk_preorder(&self, start: NodeId) -> Descendants<'_> {
        Descendants::inclusive(self, start)
    }

    /// Strict descendants of `start`, pre-order.
    pub fn descendants(&self, start: NodeId) -> Descendants<'_> {
        Descendants::new(self, start)
    }

    /// Strict ancestors of `start`, nearest first.
    pub fn ancestors(&self, start: NodeId) -> Ancestors<'_> {
        Ancestors::new(self, start)
    }
}

impl fmt::Display for Snapshot {
    /// Indented dump of the tree, one node per line.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut stack = vec![(self.root, 0usize)];
        while let Some((id, depth)) = stack.pop() {
            let Some(node) = self.get(id) else { continue };
            write!(f, "{:indent$}{}", "", id, indent = depth * 2)?;
            match node.kind() {
                NodeKind::Plain => write!(f, " (plain)")?,
                NodeKind::Host(host) => {
                    write!(f, " <{}>", host.tag)?;
                    for (key, value) in &host.props {
                        write!(f, " {}={}", key, value)?;
                    }
                }
                NodeKind::Scope(scope) => {
                    write!(f, " [{}]", scope.name())?;
                    for (key, value) in scope.props() {
                        write!(f, " {}={}", key, value)?;
                    }
                }
            }
            writeln!(f)?;
            for &child in node.children().iter().rev() {
                stack.push((child, depth + 1));
            }
        }
        Ok(())
    }
}

/// Incremental construction of a [`Snapshot`].
///
/// Tree invariants are enforced as nodes are attached: a node gets at most one
/// parent and can never become its own ancestor. [`build`](Self::build) then
/// checks the root and that nothing is left unattached.
#[derive(Debug, Default)]
pub struct SnapshotBuilder {
    nodes: FxHashMap<NodeId, Node>,
    root: Option<NodeId>,
    next_id: u32,
}

impl SnapshotBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate the next unused node ID.
    fn next_id(&mut self) -> NodeId {
        while self.nodes.contains_key(&NodeId::new(self.next_id)) {
            self.next_id += 1;
        }
        let id = NodeId::new(self.next_id);
        self.next_id += 1;
        id
    }

    /// Insert a detached node under a fresh ID.
    pub fn insert(&mut self, kind: impl Into<NodeKind>) -> NodeId {
        let id = self.next_id();
        self.nodes.insert(id, Node::new(id, kind.into()));
        id
    }

    /// Insert a detached node under a caller-chosen ID.
    ///
    /// Reconcilers use this to keep ids stable across commits.
    pub fn insert_with_id(
        &mut self,
        id: NodeId,
        kind: impl Into<NodeKind>,
    ) -> Result<NodeId, SnapshotError> {
        if self.nodes.contains_key(&id) {
            return Err(SnapshotError::DuplicateNode(id));
        }
        self.nodes.insert(id, Node::new(id, kind.into()));
        Ok(id)
    }

    /// Insert a node and make it the root.
    pub fn insert_root(&mut self, kind: impl Into<NodeKind>) -> NodeId {
        let id = self.insert(kind);
        self.root = Some(id);
        id
    }

    /// Set the root node.
    pub fn set_root(&mut self, id: NodeId) {
        self.root = Some(id);
    }

    /// Append `child` as the last child of `parent`.
    pub fn append(&mut self, parent: NodeId, child: NodeId) -> Result<(), SnapshotError> {
        if !self.nodes.contains_key(&parent) {
            return Err(SnapshotError::UnknownNode(parent));
        }
        let Some(node) = self.nodes.get(&child) else {
            return Err(SnapshotError::UnknownNode(child));
        };
        if let Some(existing) = node.parent {
            return Err(SnapshotError::AlreadyAttached {
                child,
                parent: existing,
            });
        }

        // `child` must not be `parent` or one of its ancestors
        let mut current = Some(parent);
        while let Some(id) = current {
            if id == child {
                return Err(SnapshotError::Cycle { parent, child });
            }
            current = self.nodes.get(&id).and_then(|n| n.parent);
        }

        if let Some(node) = self.nodes.get_mut(&child) {
            node.parent = Some(parent);
        }
        if let Some(node) = self.nodes.get_mut(&parent) {
            node.children.push(child);
        }
        Ok(())
    }

    /// Insert a node under a fresh ID and append it to `parent`.
    pub fn add_child(
        &mut self,
        parent: NodeId,
        kind: impl Into<NodeKind>,
    ) -> Result<NodeId, SnapshotError> {
        if !self.nodes.contains_key(&parent) {
            return Err(SnapshotError::UnknownNode(parent));
        }
        let id = self.insert(kind);
        self.append(parent, id)?;
        Ok(id)
    }

    /// Insert a node under a caller-chosen ID and append it to `parent`.
    pub fn add_child_with_id(
        &mut self,
        parent: NodeId,
        id: NodeId,
        kind: impl Into<NodeKind>,
    ) -> Result<NodeId, SnapshotError> {
        if !self.nodes.contains_key(&parent) {
            return Err(SnapshotError::UnknownNode(parent));
        }
        self.insert_with_id(id, kind)?;
        self.append(parent, id)?;
        Ok(id)
    }

    /// Get node count.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Finish the snapshot.
    pub fn build(self) -> Result<Snapshot, SnapshotError> {
        let root = self.root.ok_or(SnapshotError::MissingRoot)?;
        let Some(root_node) = self.nodes.get(&root) else {
            return Err(SnapshotError::UnknownNode(root));
        };
        if root_node.parent.is_some() {
            return Err(SnapshotError::RootAttached(root));
        }

        let snapshot = Snapshot {
            nodes: self.nodes,
            root,
        };

        let reachable = snapshot.walk_preorder(root).count();
        if reachable != snapshot.node_count() {
            // Report the lowest id so the error is deterministic
            let orphan = snapshot
                .iter()
                .filter(|node| node.id != root && node.parent.is_none())
                .map(Node::id)
                .min();
            if let Some(orphan) = orphan {
                return Err(SnapshotError::Unreachable(orphan));
            }
        }

        Ok(snapshot)
    }
}
