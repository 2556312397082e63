//! The context object: a scoped mapping of bindings with delegated lookup.
//!
//! A [`Context`] is a snapshot of key/value bindings chained to the context
//! that was active when it was created. Reads check the local bindings first
//! and fall through to the parent chain; writes always land in the handle's
//! own bindings and never mutate an ancestor. Child overrides therefore
//! shadow, rather than replace, what the parent sees.
//!
//! Handles are cheap to clone and compare by pointer identity: the context
//! stack and the lifecycle tracker both hold plain clones of the same handle,
//! and a context with no remaining stack or tracker references is simply
//! dropped.

use crate::types::UnitId;
use parking_lot::RwLock;
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// A value stored in a context.
///
/// Values are arbitrary; callers downcast with [`Context::get_as`] or keep
/// the erased handle.
pub type Value = Arc<dyn Any + Send + Sync>;

struct ContextInner {
    /// Delegation parent; reads fall through to it when a key is absent here.
    parent: Option<Context>,
    /// The unit that was executing when this context was created.
    /// Diagnostics only; never consulted for propagation.
    origin: UnitId,
    bindings: RwLock<HashMap<String, Value>>,
}

/// A shared handle to one context.
///
/// Equality of handles is pointer identity, not structural equality: two
/// contexts with identical bindings are still distinct entries on a context
/// stack.
#[derive(Clone)]
pub struct Context {
    inner: Arc<ContextInner>,
}

impl Context {
    /// Creates a context delegating to `parent`, stamped with `origin`.
    #[must_use]
    pub(crate) fn new(parent: Option<Context>, origin: UnitId) -> Self {
        Self {
            inner: Arc::new(ContextInner {
                parent,
                origin,
                bindings: RwLock::new(HashMap::new()),
            }),
        }
    }

    /// Returns `true` if `self` and `other` are the same context object.
    #[must_use]
    pub fn same(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// The delegation parent, if any.
    #[must_use]
    pub fn parent(&self) -> Option<Context> {
        self.inner.parent.clone()
    }

    /// The unit that was executing when this context was created.
    ///
    /// [`UnitId::NONE`] when the context was created outside any tracked
    /// unit (e.g. from top-level code).
    #[must_use]
    pub fn origin(&self) -> UnitId {
        self.inner.origin
    }

    /// Delegated lookup: local bindings first, then the parent chain.
    ///
    /// Returns `None` when the key is unset along the whole chain. An absent
    /// key is an expected miss, never an error.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<Value> {
        if let Some(value) = self.inner.bindings.read().get(key) {
            return Some(Arc::clone(value));
        }
        self.inner.parent.as_ref().and_then(|parent| parent.get(key))
    }

    /// Delegated lookup, downcast to a concrete type.
    ///
    /// Returns `None` when the key is unset or the stored value is of a
    /// different type.
    #[must_use]
    pub fn get_as<T: Any + Send + Sync>(&self, key: &str) -> Option<Arc<T>> {
        self.get(key).and_then(|value| value.downcast::<T>().ok())
    }

    /// Writes a binding into this context's own (innermost) bindings.
    ///
    /// Never touches the parent chain: a key present in an ancestor is
    /// shadowed, not overwritten.
    pub fn set<V: Any + Send + Sync>(&self, key: impl Into<String>, value: V) {
        self.inner
            .bindings
            .write()
            .insert(key.into(), Arc::new(value));
    }

    /// Number of bindings stored locally (excluding the parent chain).
    #[must_use]
    pub fn local_len(&self) -> usize {
        self.inner.bindings.read().len()
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("origin", &self.inner.origin)
            .field("local_bindings", &self.inner.bindings.read().len())
            .field("has_parent", &self.inner.parent.is_some())
            .finish()
    }
}
