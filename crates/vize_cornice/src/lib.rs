//! Cornice - Scope query engine for committed render trees.
//!
//! A scope frames a subtree of a continuously re-rendered component tree.
//! Application code registers a scope type, the reconciler places scope
//! nodes in its tree, and every mounted declaration becomes a
//! [`ScopeInstance`] that can be asked, at any time:
//!
//! - which host content it currently holds ([`ScopeInstance::scoped_nodes`]),
//! - which instance of its own type encloses it ([`ScopeInstance::parent`]),
//! - which instances of its own type are nested closest below it
//!   ([`ScopeInstance::children`]).
//!
//! Focus containment, gesture scoping and accessibility groupings are built on
//! these answers.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                  Reconciler (external)                   │
//! │          builds a Snapshot, binds declarations           │
//! └─────────────────────────────────────────────────────────┘
//!                           │ Commit
//!                           ▼
//! ┌─────────────────────────────────────────────────────────┐
//! │                      ScopeEngine                         │
//! │   registry · committed snapshot · declaration tables     │
//! └─────────────────────────────────────────────────────────┘
//!                           │
//!                           ▼
//! ┌───────────────┐ ┌───────────────┐ ┌───────────────┐
//! │ ScopeInstance │ │   Traversal   │ │   Classify    │
//! │   (handles)   │ │  (walkers,    │ │ (host, scope, │
//! │               │ │   queries)    │ │    plain)     │
//! └───────────────┘ └───────────────┘ └───────────────┘
//! ```
//!
//! # Example
//!
//! ```
//! use vize_cornice::{Commit, NodeKind, ScopeEngine, Snapshot};
//!
//! let engine = ScopeEngine::new();
//! let focus = engine.register_scope("FocusScope", |tag, _| tag == "button");
//!
//! let mut builder = Snapshot::builder();
//! let root = builder.insert_root(NodeKind::Plain);
//! let scope = builder.add_child(root, focus.content()).unwrap();
//! let ok = builder.add_child(scope, NodeKind::host("button")).unwrap();
//! builder.add_child(scope, NodeKind::host("span")).unwrap();
//!
//! engine.commit(Commit::from_snapshot(builder.build().unwrap())).unwrap();
//!
//! let instance = engine.instance_at(scope).unwrap();
//! assert_eq!(instance.scoped_nodes(), vec![ok]);
//! assert!(instance.parent().is_none());
//! assert!(instance.children().is_no_structure());
//! ```

pub mod classify;
pub mod engine;
pub mod error;
pub mod instance;
pub mod options;
pub mod registry;
pub mod snapshot;
pub mod traversal;

// Re-exports for convenience
pub use classify::{classify, NodeClass};
pub use engine::{Commit, CommitSummary, DeclarationId, ScopeEngine};
pub use error::{CommitError, SnapshotError};
pub use instance::{InstanceId, ScopeChildren, ScopeInstance};
pub use options::{EngineOptions, UnboundPolicy};
pub use registry::{ScopeRegistry, ScopeType, ScopeTypeId};
pub use snapshot::{
    HostContent, Node, NodeId, NodeKind, Props, ScopeContent, Snapshot, SnapshotBuilder,
};

/// Cornice version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
