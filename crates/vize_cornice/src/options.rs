//! Engine options.

use serde::{Deserialize, Serialize};

/// Options for [`ScopeEngine`](crate::ScopeEngine).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineOptions {
    /// Check every binding against the snapshot on commit (default: true).
    ///
    /// When off, rebinding a live declaration trusts the reconciler and skips
    /// the node lookup. New declarations are always checked, since the node
    /// is where their declared type comes from.
    #[serde(default = "default_true")]
    pub verify_bindings: bool,

    /// What happens to live declarations a commit does not mention
    /// (default: Destroy)
    #[serde(default)]
    pub unbound_declarations: UnboundPolicy,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            verify_bindings: true,
            unbound_declarations: UnboundPolicy::default(),
        }
    }
}

impl EngineOptions {
    /// Parse options from JSON. Missing fields take their defaults.
    pub fn from_json(source: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(source)
    }
}

fn default_true() -> bool {
    true
}

/// Handling of declarations left out of a commit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnboundPolicy {
    /// Every commit lists all live declarations; anything missing is gone.
    #[default]
    Destroy,
    /// Keep the previous anchor if the same node id is still a scope of the
    /// same type in the new snapshot, otherwise destroy.
    Retain,
}
