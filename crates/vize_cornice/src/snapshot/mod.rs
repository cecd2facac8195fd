//! Committed tree snapshots.
//!
//! The reconciler hands over one [`Snapshot`] per commit:
//! - Node definitions (host, scope, plain)
//! - Arena storage with id-based parent/child links
//! - Builder enforcing the tree invariants

mod node;
mod tree;

pub use node::{ChildIds, HostContent, Node, NodeId, NodeKind, Props, ScopeContent};
pub use tree::{Snapshot, SnapshotBuilder};
