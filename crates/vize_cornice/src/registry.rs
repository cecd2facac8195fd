//! Scope type registration.
//!
//! Every scope type gets a [`ScopeTypeId`] when it is registered. Nodes carry
//! that key, and traversals compare keys by value. The returned [`ScopeType`]
//! is the factory used at tree-authoring sites.

use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use compact_str::CompactString;
use rustc_hash::FxHashMap;

use crate::snapshot::{HostContent, NodeKind, Props, ScopeContent};

/// Process-wide so keys never collide across registries.
static NEXT_SCOPE_TYPE: AtomicU32 = AtomicU32::new(1);

/// Declared type of a scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct ScopeTypeId(u32);

impl ScopeTypeId {
    fn next() -> Self {
        Self(NEXT_SCOPE_TYPE.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value
    #[inline(always)]
    pub const fn as_u32(self) -> u32 {
        self.0
    }
}

impl fmt::Display for ScopeTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "scope-type:{}", self.0)
    }
}

/// Content predicate of a scope type: `(content descriptor, props) -> bool`.
pub type ScopePredicate = dyn Fn(&str, &Props) -> bool + Send + Sync;

struct ScopeTypeDef {
    id: ScopeTypeId,
    name: CompactString,
    predicate: Box<ScopePredicate>,
}

/// A registered scope type.
///
/// Cheap to clone; all clones share the same key and predicate.
#[derive(Clone)]
pub struct ScopeType {
    def: Arc<ScopeTypeDef>,
}

impl ScopeType {
    #[inline]
    pub fn id(&self) -> ScopeTypeId {
        self.def.id
    }

    pub fn name(&self) -> &str {
        &self.def.name
    }

    /// Run the registered predicate against host content.
    #[inline]
    pub fn matches(&self, host: &HostContent) -> bool {
        self.accepts(&host.tag, &host.props)
    }

    /// Run the registered predicate against a content descriptor and props.
    #[inline]
    pub fn accepts(&self, tag: &str, props: &Props) -> bool {
        (self.def.predicate)(tag, props)
    }

    /// Scope payload for a new declaration of this type.
    pub fn content(&self) -> ScopeContent {
        self.content_with_props(Props::new())
    }

    /// Scope payload carrying declaration props.
    pub fn content_with_props(&self, props: Props) -> ScopeContent {
        ScopeContent {
            scope_type: self.def.id,
            name: self.def.name.clone(),
            props,
        }
    }

    /// Same as [`content`](Self::content), as a node kind.
    pub fn node(&self) -> NodeKind {
        NodeKind::Scope(self.content())
    }
}

impl PartialEq for ScopeType {
    fn eq(&self, other: &Self) -> bool {
        self.def.id == other.def.id
    }
}

impl Eq for ScopeType {}

impl fmt::Debug for ScopeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopeType")
            .field("id", &self.def.id)
            .field("name", &self.def.name)
            .finish_non_exhaustive()
    }
}

/// Registered scope types by key.
#[derive(Debug, Default)]
pub struct ScopeRegistry {
    types: FxHashMap<ScopeTypeId, ScopeType>,
}

impl ScopeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new scope type. Registering the same name twice yields two
    /// distinct types.
    pub fn register<F>(&mut self, name: impl Into<CompactString>, predicate: F) -> ScopeType
    where
        F: Fn(&str, &Props) -> bool + Send + Sync + 'static,
    {
        let scope_type = ScopeType {
            def: Arc::new(ScopeTypeDef {
                id: ScopeTypeId::next(),
                name: name.into(),
                predicate: Box::new(predicate),
            }),
        };
        tracing::debug!(
            "registered scope type {} ({})",
            scope_type.name(),
            scope_type.id()
        );
        self.types.insert(scope_type.id(), scope_type.clone());
        scope_type
    }

    pub fn get(&self, id: ScopeTypeId) -> Option<&ScopeType> {
        self.types.get(&id)
    }

    pub fn contains(&self, id: ScopeTypeId) -> bool {
        self.types.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_assigns_distinct_keys() {
        let mut registry = ScopeRegistry::new();
        let a = registry.register("Scope", |_, _| true);
        let b = registry.register("Scope", |_, _| true);

        assert_ne!(a.id(), b.id());
        assert_ne!(a, b);
        assert_eq!(a, a.clone());
        assert_eq!(registry.len(), 2);
        assert!(registry.contains(a.id()));
        assert_eq!(registry.get(b.id()).map(ScopeType::name), Some("Scope"));
    }

    #[test]
    fn test_keys_unique_across_registries() {
        let mut first = ScopeRegistry::new();
        let mut second = ScopeRegistry::new();
        let a = first.register("A", |_, _| true);
        let b = second.register("A", |_, _| true);

        assert_ne!(a.id(), b.id());
        assert!(!second.contains(a.id()));
    }

    #[test]
    fn test_predicate() {
        let mut registry = ScopeRegistry::new();
        let tabbable = registry.register("Tabbable", |tag, props| {
            tag == "button" || props.contains_key("tabIndex")
        });

        assert!(tabbable.matches(&HostContent::new("button")));
        assert!(tabbable.matches(&HostContent::new("div").with_prop("tabIndex", 0)));
        assert!(!tabbable.matches(&HostContent::new("div")));
    }

    #[test]
    fn test_content_factory() {
        let mut registry = ScopeRegistry::new();
        let focus = registry.register("FocusScope", |_, _| true);

        let content = focus.content().with_prop("autoFocus", true);
        assert_eq!(content.scope_type(), focus.id());
        assert_eq!(content.name(), "FocusScope");
        assert_eq!(content.props().get("autoFocus"), Some(&serde_json::json!(true)));
        assert!(matches!(focus.node(), NodeKind::Scope(_)));
    }

    #[test]
    fn test_empty_registry() {
        let registry = ScopeRegistry::new();
        assert!(registry.is_empty());
    }
}
