//! Commit binding.
//!
//! [`ScopeEngine`] owns the committed state: the latest snapshot plus the
//! table mapping each live declaration to its instance and anchor node. A
//! commit builds the next state from scratch and swaps it in under the write
//! lock, so readers see either the old state or the new one, never a mix.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use compact_str::CompactString;
use parking_lot::RwLock;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::classify::{classify, NodeClass};
use crate::error::CommitError;
use crate::instance::{InstanceId, ScopeInstance};
use crate::options::{EngineOptions, UnboundPolicy};
use crate::registry::{ScopeRegistry, ScopeType, ScopeTypeId};
use crate::snapshot::{NodeId, Props, Snapshot};

/// Identity of a declaration site, as tracked by the reconciler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct DeclarationId(u64);

impl DeclarationId {
    #[inline(always)]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    #[inline(always)]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl From<NodeId> for DeclarationId {
    /// For reconcilers whose node ids already follow key stability.
    fn from(node: NodeId) -> Self {
        Self(u64::from(node.as_u32()))
    }
}

impl fmt::Display for DeclarationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "decl:{}", self.0)
    }
}

/// One committed tree update handed over by the reconciler.
#[derive(Debug)]
pub struct Commit {
    snapshot: Snapshot,
    bindings: Vec<(DeclarationId, NodeId)>,
    unmounts: Vec<DeclarationId>,
}

impl Commit {
    /// Commit with no bindings yet.
    pub fn new(snapshot: Snapshot) -> Self {
        Self {
            snapshot,
            bindings: Vec::new(),
            unmounts: Vec::new(),
        }
    }

    /// Bind every scope node to the declaration sharing its id.
    pub fn from_snapshot(snapshot: Snapshot) -> Self {
        let bindings = snapshot
            .walk_preorder(snapshot.root())
            .filter(|node| classify(node).is_scope())
            .map(|node| (DeclarationId::from(node.id()), node.id()))
            .collect();
        Self {
            snapshot,
            bindings,
            unmounts: Vec::new(),
        }
    }

    /// Bind `declaration` to the scope node realizing it in this snapshot.
    pub fn bind(mut self, declaration: DeclarationId, node: NodeId) -> Self {
        self.bindings.push((declaration, node));
        self
    }

    /// Mark `declaration` as removed.
    pub fn unmount(mut self, declaration: DeclarationId) -> Self {
        self.unmounts.push(declaration);
        self
    }

    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    pub fn bindings(&self) -> &[(DeclarationId, NodeId)] {
        &self.bindings
    }
}

/// What a commit did to the live instances.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommitSummary {
    /// Instances created for new declarations
    pub created: usize,
    /// Instances kept, with their anchor moved to the new snapshot
    pub rebound: usize,
    /// Instances whose declaration is gone
    pub destroyed: usize,
}

#[derive(Debug, Clone)]
pub(crate) struct Binding {
    pub(crate) instance: InstanceId,
    pub(crate) anchor: NodeId,
    pub(crate) scope_type: ScopeType,
}

/// Snapshot plus the declaration tables valid for it.
#[derive(Debug)]
pub(crate) struct Committed {
    pub(crate) snapshot: Arc<Snapshot>,
    pub(crate) declarations: FxHashMap<DeclarationId, Binding>,
    /// Anchor node to the declaration bound to it
    pub(crate) owners: FxHashMap<NodeId, DeclarationId>,
}

impl Committed {
    /// Whether a live instance is anchored at `node`.
    #[inline]
    pub(crate) fn is_anchor(&self, node: NodeId) -> bool {
        self.owners.contains_key(&node)
    }

    /// Handle for the instance anchored at `node`.
    pub(crate) fn handle_at(&self, node: NodeId, shared: &Weak<Shared>) -> Option<ScopeInstance> {
        let declaration = *self.owners.get(&node)?;
        self.handle(declaration, shared)
    }

    pub(crate) fn handle(
        &self,
        declaration: DeclarationId,
        shared: &Weak<Shared>,
    ) -> Option<ScopeInstance> {
        let binding = self.declarations.get(&declaration)?;
        Some(ScopeInstance::new(
            binding.instance,
            declaration,
            binding.scope_type.clone(),
            Weak::clone(shared),
        ))
    }
}

#[derive(Debug)]
pub(crate) struct Shared {
    registry: RwLock<ScopeRegistry>,
    committed: RwLock<Option<Arc<Committed>>>,
    options: EngineOptions,
    next_instance: AtomicU64,
}

impl Shared {
    /// Latest committed state. The lock is held only for the clone.
    pub(crate) fn current(&self) -> Option<Arc<Committed>> {
        self.committed.read().clone()
    }
}

/// Scope registry plus the committed state scope instances query.
///
/// The reconciler is the single writer: it calls [`commit`](Self::commit)
/// once per tree update. Queries may run from any thread between commits.
#[derive(Debug)]
pub struct ScopeEngine {
    shared: Arc<Shared>,
}

impl ScopeEngine {
    /// Create an engine with default options.
    pub fn new() -> Self {
        Self::with_options(EngineOptions::default())
    }

    pub fn with_options(options: EngineOptions) -> Self {
        Self {
            shared: Arc::new(Shared {
                registry: RwLock::new(ScopeRegistry::new()),
                committed: RwLock::new(None),
                options,
                next_instance: AtomicU64::new(0),
            }),
        }
    }

    pub fn options(&self) -> &EngineOptions {
        &self.shared.options
    }

    /// Register a scope type; `predicate` decides which host content its
    /// instances report from [`ScopeInstance::scoped_nodes`].
    pub fn register_scope<F>(&self, name: impl Into<CompactString>, predicate: F) -> ScopeType
    where
        F: Fn(&str, &Props) -> bool + Send + Sync + 'static,
    {
        self.shared.registry.write().register(name, predicate)
    }

    /// Look up a registered scope type.
    pub fn scope_type(&self, id: ScopeTypeId) -> Option<ScopeType> {
        self.shared.registry.read().get(id).cloned()
    }

    /// Apply a commit. On error the previous state stays in place.
    pub fn commit(&self, commit: Commit) -> Result<CommitSummary, CommitError> {
        let registry = self.shared.registry.read();
        let mut slot = self.shared.committed.write();
        let (next, summary) = self.apply(slot.as_deref(), commit, &registry)?;

        tracing::debug!(
            "commit: {} nodes, {} created, {} rebound, {} destroyed",
            next.snapshot.node_count(),
            summary.created,
            summary.rebound,
            summary.destroyed
        );
        *slot = Some(Arc::new(next));
        Ok(summary)
    }

    fn apply(
        &self,
        previous: Option<&Committed>,
        commit: Commit,
        registry: &ScopeRegistry,
    ) -> Result<(Committed, CommitSummary), CommitError> {
        let Commit {
            snapshot,
            bindings,
            unmounts,
        } = commit;
        let options = &self.shared.options;
        let unmounted: FxHashSet<DeclarationId> = unmounts.into_iter().collect();

        let mut declarations: FxHashMap<DeclarationId, Binding> = FxHashMap::default();
        let mut owners: FxHashMap<NodeId, DeclarationId> = FxHashMap::default();
        let mut summary = CommitSummary::default();

        for (declaration, node) in bindings {
            if unmounted.contains(&declaration) {
                return Err(CommitError::ConflictingUnmount(declaration));
            }
            if declarations.contains_key(&declaration) {
                return Err(CommitError::DuplicateBinding(declaration));
            }
            if let Some(&first) = owners.get(&node) {
                return Err(CommitError::SharedAnchor {
                    node,
                    first,
                    second: declaration,
                });
            }

            let prior = previous.and_then(|state| state.declarations.get(&declaration));
            let binding = match prior {
                Some(prior) if !options.verify_bindings => {
                    summary.rebound += 1;
                    Binding {
                        anchor: node,
                        ..prior.clone()
                    }
                }
                _ => {
                    let scope_type = resolve_scope_type(&snapshot, registry, declaration, node)?;
                    match prior {
                        Some(prior) if prior.scope_type == scope_type => {
                            summary.rebound += 1;
                            Binding {
                                instance: prior.instance,
                                anchor: node,
                                scope_type,
                            }
                        }
                        _ => {
                            // A type change at the same site replaces the instance
                            if prior.is_some() {
                                summary.destroyed += 1;
                            }
                            summary.created += 1;
                            Binding {
                                instance: self.next_instance_id(),
                                anchor: node,
                                scope_type,
                            }
                        }
                    }
                }
            };
            owners.insert(node, declaration);
            declarations.insert(declaration, binding);
        }

        if let Some(previous) = previous {
            let retain = options.unbound_declarations == UnboundPolicy::Retain;
            for (declaration, prior) in &previous.declarations {
                if declarations.contains_key(declaration) {
                    continue;
                }
                if !retain || unmounted.contains(declaration) {
                    summary.destroyed += 1;
                    continue;
                }

                let still_there = !owners.contains_key(&prior.anchor)
                    && snapshot
                        .get(prior.anchor)
                        .is_some_and(|node| classify(node).is_scope_of(prior.scope_type.id()));
                if still_there {
                    owners.insert(prior.anchor, *declaration);
                    declarations.insert(*declaration, prior.clone());
                    summary.rebound += 1;
                } else {
                    tracing::warn!(
                        "{} lost its anchor {}, destroying instance",
                        declaration,
                        prior.anchor
                    );
                    summary.destroyed += 1;
                }
            }
        }

        let next = Committed {
            snapshot: Arc::new(snapshot),
            declarations,
            owners,
        };
        Ok((next, summary))
    }

    fn next_instance_id(&self) -> InstanceId {
        InstanceId::new(self.shared.next_instance.fetch_add(1, Ordering::Relaxed))
    }

    /// Latest committed snapshot.
    pub fn snapshot(&self) -> Option<Arc<Snapshot>> {
        self.shared
            .current()
            .map(|state| Arc::clone(&state.snapshot))
    }

    /// Handle for a live declaration.
    pub fn instance(&self, declaration: DeclarationId) -> Option<ScopeInstance> {
        self.shared
            .current()?
            .handle(declaration, &Arc::downgrade(&self.shared))
    }

    /// Handle for the live instance anchored at `node`.
    pub fn instance_at(&self, node: NodeId) -> Option<ScopeInstance> {
        self.shared
            .current()?
            .handle_at(node, &Arc::downgrade(&self.shared))
    }

    /// All live instances in document order.
    pub fn instances(&self) -> Vec<ScopeInstance> {
        let Some(state) = self.shared.current() else {
            return Vec::new();
        };
        let shared = Arc::downgrade(&self.shared);
        state
            .snapshot
            .walk_preorder(state.snapshot.root())
            .filter_map(|node| state.handle_at(node.id(), &shared))
            .collect()
    }

    /// Number of live instances.
    pub fn instance_count(&self) -> usize {
        self.shared
            .current()
            .map_or(0, |state| state.declarations.len())
    }
}

impl Default for ScopeEngine {
    fn default() -> Self {
        Self::new()
    }
}

fn resolve_scope_type(
    snapshot: &Snapshot,
    registry: &ScopeRegistry,
    declaration: DeclarationId,
    node: NodeId,
) -> Result<ScopeType, CommitError> {
    let Some(scope) = snapshot.get(node) else {
        return Err(CommitError::UnknownNode { declaration, node });
    };
    let NodeClass::Scope(scope_type) = classify(scope) else {
        return Err(CommitError::NotAScope { declaration, node });
    };
    registry
        .get(scope_type)
        .cloned()
        .ok_or(CommitError::UnregisteredScopeType { node, scope_type })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::{NodeKind, SnapshotBuilder};

    fn single_scope(scope_type: &ScopeType) -> (Snapshot, NodeId) {
        let mut b = SnapshotBuilder::new();
        let root = b.insert_root(NodeKind::Plain);
        let scope = b.add_child(root, scope_type.content()).unwrap();
        b.add_child(scope, NodeKind::host("div")).unwrap();
        (b.build().unwrap(), scope)
    }

    #[test]
    fn test_declaration_id() {
        let id = DeclarationId::from(NodeId::new(3));
        assert_eq!(id, DeclarationId::new(3));
        assert_eq!(id.as_u64(), 3);
        assert_eq!(id.to_string(), "decl:3");
    }

    #[test]
    fn test_from_snapshot_binds_scope_nodes() {
        let engine = ScopeEngine::new();
        let focus = engine.register_scope("Focus", |_, _| true);
        let (snapshot, scope) = single_scope(&focus);

        let commit = Commit::from_snapshot(snapshot);
        assert_eq!(commit.bindings(), &[(DeclarationId::from(scope), scope)]);
        assert_eq!(commit.snapshot().node_count(), 3);
    }

    #[test]
    fn test_commit_creates_then_rebinds() {
        let engine = ScopeEngine::new();
        let focus = engine.register_scope("Focus", |_, _| true);
        assert!(engine.snapshot().is_none());
        assert_eq!(engine.instance_count(), 0);

        let (snapshot, scope) = single_scope(&focus);
        let summary = engine.commit(Commit::from_snapshot(snapshot.clone())).unwrap();
        assert_eq!(
            summary,
            CommitSummary {
                created: 1,
                rebound: 0,
                destroyed: 0
            }
        );
        let first = engine.instance(DeclarationId::from(scope)).unwrap();

        let summary = engine.commit(Commit::from_snapshot(snapshot)).unwrap();
        assert_eq!(summary.rebound, 1);
        assert_eq!(summary.created, 0);
        assert_eq!(engine.instance(DeclarationId::from(scope)), Some(first.clone()));
        assert_eq!(engine.instance_at(scope), Some(first));
        assert_eq!(engine.instance_count(), 1);
    }

    #[test]
    fn test_commit_errors_leave_state_untouched() {
        let engine = ScopeEngine::new();
        let focus = engine.register_scope("Focus", |_, _| true);
        let (snapshot, scope) = single_scope(&focus);
        engine.commit(Commit::from_snapshot(snapshot.clone())).unwrap();
        let before = engine.snapshot().unwrap();

        let decl = DeclarationId::new(100);
        let root = snapshot.root();

        let err = engine
            .commit(Commit::new(snapshot.clone()).bind(decl, NodeId::new(77)))
            .unwrap_err();
        assert_eq!(
            err,
            CommitError::UnknownNode {
                declaration: decl,
                node: NodeId::new(77)
            }
        );

        let err = engine
            .commit(Commit::new(snapshot.clone()).bind(decl, root))
            .unwrap_err();
        assert_eq!(err, CommitError::NotAScope { declaration: decl, node: root });

        let err = engine
            .commit(
                Commit::new(snapshot.clone())
                    .bind(decl, scope)
                    .bind(DeclarationId::new(101), scope),
            )
            .unwrap_err();
        assert_eq!(
            err,
            CommitError::SharedAnchor {
                node: scope,
                first: decl,
                second: DeclarationId::new(101)
            }
        );

        let err = engine
            .commit(Commit::new(snapshot.clone()).bind(decl, scope).bind(decl, scope))
            .unwrap_err();
        assert_eq!(err, CommitError::DuplicateBinding(decl));

        let err = engine
            .commit(Commit::new(snapshot).bind(decl, scope).unmount(decl))
            .unwrap_err();
        assert_eq!(err, CommitError::ConflictingUnmount(decl));

        assert!(Arc::ptr_eq(&before, &engine.snapshot().unwrap()));
        assert!(engine.instance(DeclarationId::from(scope)).is_some());
        assert!(engine.instance(decl).is_none());
    }

    #[test]
    fn test_foreign_scope_type_rejected() {
        let engine = ScopeEngine::new();
        let elsewhere = ScopeEngine::new();
        let foreign = elsewhere.register_scope("Foreign", |_, _| true);
        let (snapshot, scope) = single_scope(&foreign);

        let err = engine.commit(Commit::from_snapshot(snapshot)).unwrap_err();
        assert_eq!(
            err,
            CommitError::UnregisteredScopeType {
                node: scope,
                scope_type: foreign.id()
            }
        );
        assert!(engine.snapshot().is_none());
    }

    #[test]
    fn test_type_change_replaces_instance() {
        let engine = ScopeEngine::new();
        let focus = engine.register_scope("Focus", |_, _| true);
        let group = engine.register_scope("Group", |_, _| true);
        let decl = DeclarationId::new(1);

        let (first, scope) = single_scope(&focus);
        engine.commit(Commit::new(first).bind(decl, scope)).unwrap();
        let before = engine.instance(decl).unwrap();

        let (second, scope) = single_scope(&group);
        let summary = engine.commit(Commit::new(second).bind(decl, scope)).unwrap();
        assert_eq!(summary.created, 1);
        assert_eq!(summary.destroyed, 1);

        let after = engine.instance(decl).unwrap();
        assert_ne!(before, after);
        assert_eq!(after.scope_type(), &group);
        assert!(!before.is_mounted());
    }

    #[test]
    fn test_unverified_rebind_skips_lookup() {
        let engine = ScopeEngine::with_options(EngineOptions {
            verify_bindings: false,
            ..EngineOptions::default()
        });
        let focus = engine.register_scope("Focus", |_, _| true);
        let decl = DeclarationId::new(1);
        let (snapshot, scope) = single_scope(&focus);
        engine.commit(Commit::new(snapshot.clone()).bind(decl, scope)).unwrap();

        // Trusted as-is: the root is not a scope node, but nothing checks
        let summary = engine
            .commit(Commit::new(snapshot.clone()).bind(decl, snapshot.root()))
            .unwrap();
        assert_eq!(summary.rebound, 1);
        assert_eq!(engine.instance_at(snapshot.root()).map(|i| i.declaration()), Some(decl));

        // New declarations are still checked
        let err = engine
            .commit(Commit::new(snapshot.clone()).bind(DeclarationId::new(2), NodeId::new(50)))
            .unwrap_err();
        assert!(matches!(err, CommitError::UnknownNode { .. }));
    }

    #[test]
    fn test_instances_in_document_order() {
        let engine = ScopeEngine::new();
        let focus = engine.register_scope("Focus", |_, _| true);

        let mut b = SnapshotBuilder::new();
        let root = b.insert_root(NodeKind::Plain);
        let first = b.add_child(root, focus.content()).unwrap();
        let inner = b.add_child(first, focus.content()).unwrap();
        let second = b.add_child(root, focus.content()).unwrap();
        engine.commit(Commit::from_snapshot(b.build().unwrap())).unwrap();

        let anchors: Vec<_> = engine
            .instances()
            .iter()
            .filter_map(ScopeInstance::anchor)
            .collect();
        assert_eq!(anchors, vec![first, inner, second]);
    }

    #[test]
    fn test_engine_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<ScopeEngine>();
        assert_send_sync::<ScopeInstance>();
    }
}
