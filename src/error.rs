//! Error types and the fault-annotation wrapper.
//!
//! The taxonomy follows three tiers:
//!
//! - **Precondition faults** ([`StackError`], [`NamespaceError`],
//!   [`RegistryError`]): misuse of the enter/exit or registry contract. These
//!   are reported immediately and are not recoverable by retry; the call site
//!   is wrong.
//! - **Propagation misses**: a `get` with no active context, an unset key, or
//!   a lifecycle notification for an untracked unit. These are `None`/no-op
//!   outcomes in the respective APIs and never surface here.
//! - **User faults** ([`Propagated`]): errors returned by user callbacks. The
//!   propagation layer annotates them with the context that was active when
//!   they were raised and surfaces them otherwise unchanged.

use crate::context::Context;
use std::error::Error as StdError;
use std::fmt;

/// Violations of the context-stack enter/exit contract.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StackError {
    /// `exit` was called for a context that is neither active nor parked.
    #[error("context is not entered in namespace `{namespace}`; cannot exit")]
    NotEntered {
        /// Name of the namespace whose stack rejected the exit.
        namespace: String,
    },
    /// `exit` would remove the base entry that represents "no context".
    #[error("cannot remove the base entry of the context stack in namespace `{namespace}`")]
    BaseEntry {
        /// Name of the namespace whose stack rejected the exit.
        namespace: String,
    },
}

/// Misuse of the namespace binding API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum NamespaceError {
    /// `set` was called while no context is active.
    #[error("no context available; run() or bind() must establish one first")]
    NoContext,
}

/// Misuse of the namespace registry.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// `create_namespace` was called with an empty name.
    #[error("namespace must be given a non-empty name")]
    EmptyName,
    /// `create_namespace` was called with a name that is already registered.
    #[error("namespace `{0}` is already registered")]
    AlreadyExists(String),
    /// `destroy_namespace` was called for a name that is not registered.
    #[error("cannot destroy nonexistent namespace `{0}`")]
    NotFound(String),
}

/// A user fault annotated with the context that was active when it was
/// raised.
///
/// `run`/`bind` wrappers produce this so a handler far from the failure can
/// still recover which logical request failed, via
/// [`Namespace::from_error`](crate::namespace::Namespace::from_error) or
/// [`Propagated::context`]. Display and `source` delegate to the inner fault;
/// the annotation never transforms it.
#[derive(Debug, Clone)]
pub struct Propagated<E> {
    namespace: String,
    context: Context,
    source: E,
}

impl<E> Propagated<E> {
    pub(crate) fn new(namespace: impl Into<String>, context: Context, source: E) -> Self {
        Self {
            namespace: namespace.into(),
            context,
            source,
        }
    }

    /// The context that was active when the fault was raised.
    #[must_use]
    pub fn context(&self) -> &Context {
        &self.context
    }

    /// Name of the namespace that annotated the fault.
    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Borrows the original fault.
    #[must_use]
    pub fn get_ref(&self) -> &E {
        &self.source
    }

    /// Unwraps the original fault, discarding the annotation.
    #[must_use]
    pub fn into_inner(self) -> E {
        self.source
    }
}

impl<E: fmt::Display> fmt::Display for Propagated<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.source.fmt(f)
    }
}

impl<E: StdError + 'static> StdError for Propagated<E> {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        Some(&self.source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::UnitId;

    #[derive(Debug, thiserror::Error)]
    #[error("boom")]
    struct Boom;

    #[test]
    fn propagated_delegates_display_and_source() {
        let ctx = Context::new(None, UnitId::NONE);
        let err = Propagated::new("session", ctx.clone(), Boom);

        assert_eq!(err.to_string(), "boom");
        assert!(err.source().is_some());
        assert_eq!(err.namespace(), "session");
        assert!(err.context().same(&ctx));
        let _: Boom = err.into_inner();
    }
}
