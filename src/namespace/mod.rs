//! Namespaces: the public unit of context isolation.
//!
//! A [`Namespace`] owns one context stack and one lifecycle tracker and
//! exposes the run/bind/get/set surface. Handles are cheap clones over shared
//! state; everything a scheduler hook or a bound closure needs to carry is a
//! plain `Namespace` clone.
//!
//! # Enter/exit discipline
//!
//! Every enter must be matched by exactly one exit. The `run` and `bind`
//! entry points guarantee this with an RAII guard ([`ContextGuard`]) that
//! exits on drop, including during unwinding. The raw [`enter`]/[`exit`] pair
//! is public for embedders that manage pairing themselves; misuse is reported
//! as a [`StackError`] and must be fixed at the call site, not recovered
//! from.
//!
//! [`enter`]: Namespace::enter
//! [`exit`]: Namespace::exit

mod stack;
mod tracker;

use crate::context::{Context, Value};
use crate::emitter::Emitter;
use crate::error::{NamespaceError, Propagated, StackError};
use crate::future::{BoundFuture, RunFuture};
use crate::types::UnitId;
use parking_lot::{Mutex, MutexGuard};
use stack::ContextStack;
use std::any::Any;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tracker::LifecycleTracker;
use tracing::trace;

#[derive(Default)]
pub(crate) struct State {
    pub(crate) stack: ContextStack,
    pub(crate) tracker: LifecycleTracker,
    /// Units currently executing, innermost last. Feeds the origin stamp on
    /// created contexts; diagnostics only.
    pub(crate) executing: Vec<UnitId>,
    /// Diagnostic indent mirrored into trace events by the hook adapter.
    pub(crate) indent: usize,
}

struct Inner {
    name: String,
    state: Mutex<State>,
}

/// An isolated propagation domain.
///
/// Created through [`Registry::create_namespace`](crate::registry::Registry::create_namespace).
/// Two namespaces never observe each other's bindings, even under the same
/// key names.
#[derive(Clone)]
pub struct Namespace {
    inner: Arc<Inner>,
}

impl Namespace {
    /// Creates a standalone namespace outside any registry.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(Inner {
                name: name.into(),
                state: Mutex::new(State::default()),
            }),
        }
    }

    pub(crate) fn state(&self) -> MutexGuard<'_, State> {
        self.inner.state.lock()
    }

    /// The namespace's unique name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Returns `true` if `self` and `other` are handles to the same
    /// namespace.
    #[must_use]
    pub fn same(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// The currently active context, if any.
    #[must_use]
    pub fn active(&self) -> Option<Context> {
        self.state().stack.active().cloned()
    }

    /// Number of parked stack entries. Zero at rest; diagnostics only.
    #[must_use]
    pub fn stack_depth(&self) -> usize {
        self.state().stack.depth()
    }

    /// Number of scheduled-but-not-destroyed units with a recorded context.
    /// Returns to zero once all related units have been destroyed.
    #[must_use]
    pub fn tracked_units(&self) -> usize {
        self.state().tracker.len()
    }

    /// Creates a new context delegating to the current active context (or a
    /// root context when none is active), stamped with the unit currently
    /// executing.
    #[must_use]
    pub fn create_context(&self) -> Context {
        let state = self.state();
        let parent = state.stack.active().cloned();
        let origin = state.executing.last().copied().unwrap_or(UnitId::NONE);
        drop(state);
        Context::new(parent, origin)
    }

    /// Stores `value` under `key` in the active context.
    ///
    /// Writes always go to the innermost active context; a key present in an
    /// ancestor is shadowed, never overwritten.
    ///
    /// # Errors
    ///
    /// [`NamespaceError::NoContext`] when no context is active; `run` or
    /// `bind` must establish one first.
    pub fn set<V: Any + Send + Sync>(
        &self,
        key: impl Into<String>,
        value: V,
    ) -> Result<(), NamespaceError> {
        let Some(active) = self.active() else {
            return Err(NamespaceError::NoContext);
        };
        active.set(key, value);
        Ok(())
    }

    /// Delegated lookup in the active context's chain.
    ///
    /// Returns `None` when no context is active or the key is unset along
    /// the whole chain; both are expected misses, not errors.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<Value> {
        self.active().and_then(|context| context.get(key))
    }

    /// Delegated lookup, downcast to a concrete type.
    #[must_use]
    pub fn get_as<T: Any + Send + Sync>(&self, key: &str) -> Option<Arc<T>> {
        self.active().and_then(|context| context.get_as::<T>(key))
    }

    /// Makes `context` the active context, parking the current one.
    ///
    /// Prefer [`run`](Self::run)/[`bind`](Self::bind) or
    /// [`enter_guard`](Self::enter_guard); a manual `enter` must be paired
    /// with exactly one [`exit`](Self::exit).
    pub fn enter(&self, context: &Context) {
        let mut state = self.state();
        state.stack.enter(context.clone());
        trace!(
            namespace = %self.inner.name,
            depth = state.stack.depth(),
            "context enter"
        );
    }

    /// Removes `context` from the stack, restoring the previous active
    /// context when it is the current one. Out-of-order exits (delayed
    /// asynchronous completions) remove the matching parked entry without
    /// disturbing the active slot.
    ///
    /// # Errors
    ///
    /// [`StackError`] when `context` is not present anywhere in the stack or
    /// the exit would remove the base entry. Either indicates a broken
    /// enter/exit pairing at the call site.
    pub fn exit(&self, context: &Context) -> Result<(), StackError> {
        let mut state = self.state();
        let result = state.stack.exit(context, &self.inner.name);
        trace!(
            namespace = %self.inner.name,
            depth = state.stack.depth(),
            ok = result.is_ok(),
            "context exit"
        );
        result
    }

    /// Enters `context` and returns a guard that exits it on drop.
    ///
    /// The guard exits exactly once on all paths, including unwinding.
    #[must_use]
    pub fn enter_guard(&self, context: &Context) -> ContextGuard {
        self.enter(context);
        ContextGuard {
            namespace: self.clone(),
            context: context.clone(),
        }
    }

    /// Creates a context, runs `f` under it, and exits on all paths.
    ///
    /// Returns the created context so the caller can hand it to
    /// [`bind`](Self::bind) or inspect it afterwards.
    pub fn run<F: FnOnce(&Context)>(&self, f: F) -> Context {
        let context = self.create_context();
        let _entered = self.enter_guard(&context);
        f(&context);
        context
    }

    /// Like [`run`](Self::run), but propagates `f`'s return value instead of
    /// the context.
    pub fn run_and_return<T, F: FnOnce(&Context) -> T>(&self, f: F) -> T {
        let context = self.create_context();
        let _entered = self.enter_guard(&context);
        f(&context)
    }

    /// Fallible [`run`](Self::run): an `Err` from `f` is annotated with the
    /// context that was active when it was raised and surfaced otherwise
    /// unchanged.
    ///
    /// # Errors
    ///
    /// The annotated fault. Recover the context with
    /// [`from_error`](Self::from_error) or [`Propagated::context`].
    pub fn try_run<E, F>(&self, f: F) -> Result<Context, Propagated<E>>
    where
        F: FnOnce(&Context) -> Result<(), E>,
    {
        let context = self.create_context();
        let _entered = self.enter_guard(&context);
        match f(&context) {
            Ok(()) => Ok(context),
            Err(source) => Err(Propagated::new(&self.inner.name, context.clone(), source)),
        }
    }

    /// Fallible [`run_and_return`](Self::run_and_return) with fault
    /// annotation.
    ///
    /// # Errors
    ///
    /// The annotated fault, as in [`try_run`](Self::try_run).
    pub fn try_run_and_return<T, E, F>(&self, f: F) -> Result<T, Propagated<E>>
    where
        F: FnOnce(&Context) -> Result<T, E>,
    {
        let context = self.create_context();
        let _entered = self.enter_guard(&context);
        match f(&context) {
            Ok(value) => Ok(value),
            Err(source) => Err(Propagated::new(&self.inner.name, context.clone(), source)),
        }
    }

    /// Single-shot deferred computation: creates and enters a context, calls
    /// `f` (its synchronous prefix runs under the context), and returns a
    /// future that re-enters the context around every poll and annotates an
    /// `Err` settlement with it.
    pub fn run_future<F, Fut, T, E>(&self, f: F) -> RunFuture<Fut>
    where
        F: FnOnce(&Context) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let context = self.create_context();
        let future = {
            let _entered = self.enter_guard(&context);
            f(&context)
        };
        RunFuture::new(self.clone(), context, future)
    }

    /// Wraps `future` so every poll runs under the given context (or the
    /// context active at bind time, or a fresh one if none is active).
    ///
    /// This is the explicit spawn-wrapper propagation path: wrap deferred
    /// work at the point it is scheduled and the context travels with it.
    pub fn bind_future<F: Future>(&self, future: F, context: Option<Context>) -> BoundFuture<F> {
        let context = context
            .or_else(|| self.active())
            .unwrap_or_else(|| self.create_context());
        BoundFuture::new(self.clone(), context, future)
    }

    /// Produces a closure that enters the captured context around every
    /// invocation, however far in the future it is called.
    ///
    /// Captures `context` when given, else the context active at bind time,
    /// else a freshly created context. Exits exactly once per invocation,
    /// including during unwinding.
    pub fn bind<T, F>(&self, mut f: F, context: Option<Context>) -> impl FnMut() -> T
    where
        F: FnMut() -> T,
    {
        let namespace = self.clone();
        let context = context
            .or_else(|| self.active())
            .unwrap_or_else(|| self.create_context());
        move || {
            let _entered = namespace.enter_guard(&context);
            f()
        }
    }

    /// Fault-annotating [`bind`](Self::bind) for fallible closures.
    pub fn try_bind<T, E, F>(
        &self,
        mut f: F,
        context: Option<Context>,
    ) -> impl FnMut() -> Result<T, Propagated<E>>
    where
        F: FnMut() -> Result<T, E>,
    {
        let namespace = self.clone();
        let context = context
            .or_else(|| self.active())
            .unwrap_or_else(|| self.create_context());
        move || {
            let _entered = namespace.enter_guard(&context);
            f().map_err(|source| {
                Propagated::new(namespace.name(), context.clone(), source)
            })
        }
    }

    /// Registers this namespace on `emitter` so listeners attached from now
    /// on are tagged with the context active at attachment time.
    pub fn bind_emitter<E>(&self, emitter: &mut Emitter<E>) {
        emitter.bind_namespace(self);
    }

    /// Recovers the context a fault was raised under, if the fault was
    /// annotated by this namespace.
    #[must_use]
    pub fn from_error<E>(&self, error: &Propagated<E>) -> Option<Context> {
        (error.namespace() == self.inner.name).then(|| error.context().clone())
    }
}

impl fmt::Debug for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state();
        f.debug_struct("Namespace")
            .field("name", &self.inner.name)
            .field("active", &state.stack.active().is_some())
            .field("stack_depth", &state.stack.depth())
            .field("tracked_units", &state.tracker.len())
            .finish()
    }
}

/// RAII guard returned by [`Namespace::enter_guard`]; exits the context on
/// drop.
pub struct ContextGuard {
    namespace: Namespace,
    context: Context,
}

impl ContextGuard {
    /// The context this guard will exit.
    #[must_use]
    pub fn context(&self) -> &Context {
        &self.context
    }
}

impl Drop for ContextGuard {
    fn drop(&mut self) {
        if let Err(error) = self.namespace.exit(&self.context) {
            // A failed exit here means the pairing was broken elsewhere.
            // Raising during an unwind would abort, so only report it then.
            if std::thread::panicking() {
                tracing::error!(
                    namespace = %self.namespace.name(),
                    %error,
                    "context exit failed during unwind"
                );
            } else {
                panic!("context stack corrupted: {error}");
            }
        }
    }
}

impl fmt::Debug for ContextGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextGuard")
            .field("namespace", &self.namespace.name())
            .field("context", &self.context)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ns() -> Namespace {
        Namespace::new("test")
    }

    #[test]
    fn set_without_context_is_a_precondition_fault() {
        let ns = ns();
        assert_eq!(ns.set("key", 1u32), Err(NamespaceError::NoContext));
    }

    #[test]
    fn get_without_context_is_a_miss() {
        let ns = ns();
        assert!(ns.get("key").is_none());
    }

    #[test]
    fn run_establishes_and_restores_context() {
        let ns = ns();
        let context = ns.run(|ctx| {
            ns.set("key", 7u32).unwrap();
            assert_eq!(ns.get_as::<u32>("key").as_deref(), Some(&7));
            assert!(ns.active().is_some_and(|active| active.same(ctx)));
        });

        assert!(ns.active().is_none());
        assert_eq!(ns.stack_depth(), 0);
        assert_eq!(context.get_as::<u32>("key").as_deref(), Some(&7));
    }

    #[test]
    fn run_and_return_propagates_the_value() {
        let ns = ns();
        let value = ns.run_and_return(|_| {
            ns.set("n", 3u32).unwrap();
            ns.get_as::<u32>("n").as_deref().copied()
        });
        assert_eq!(value, Some(3));
    }

    #[test]
    fn nested_runs_delegate_to_outer_context() {
        let ns = ns();
        ns.run(|outer| {
            ns.set("a", 1u32).unwrap();
            ns.run(|inner| {
                assert!(inner.parent().is_some_and(|p| p.same(outer)));
                // Inherited read.
                assert_eq!(ns.get_as::<u32>("a").as_deref(), Some(&1));
                // Shadowing write.
                ns.set("a", 2u32).unwrap();
                assert_eq!(ns.get_as::<u32>("a").as_deref(), Some(&2));
            });
            // Outer value untouched after the inner context exits.
            assert_eq!(ns.get_as::<u32>("a").as_deref(), Some(&1));
        });
    }

    #[test]
    fn try_run_annotates_faults_with_the_context() {
        let ns = ns();
        let mut seen = None;
        let err = ns
            .try_run(|ctx| {
                seen = Some(ctx.clone());
                Err::<(), &str>("broken")
            })
            .unwrap_err();

        assert_eq!(*err.get_ref(), "broken");
        let recovered = ns.from_error(&err).expect("annotated by this namespace");
        assert!(recovered.same(&seen.unwrap()));
        assert!(ns.active().is_none());
    }

    #[test]
    fn from_error_rejects_other_namespaces() {
        let ns_a = Namespace::new("a");
        let ns_b = Namespace::new("b");
        let err = ns_a.try_run(|_| Err::<(), &str>("x")).unwrap_err();
        assert!(ns_b.from_error(&err).is_none());
    }

    #[test]
    fn bind_replays_the_captured_context() {
        let ns = ns();
        let mut bound = None;
        ns.run(|_| {
            ns.set("id", 42u32).unwrap();
            bound = Some(ns.bind(
                {
                    let ns = ns.clone();
                    move || ns.get_as::<u32>("id").as_deref().copied()
                },
                None,
            ));
        });

        // Invoked long after run() returned, under no ambient context.
        assert!(ns.active().is_none());
        let mut bound = bound.unwrap();
        assert_eq!(bound(), Some(42));
        assert_eq!(bound(), Some(42));
        assert!(ns.active().is_none());
        assert_eq!(ns.stack_depth(), 0);
    }

    #[test]
    fn bind_with_no_ambient_context_creates_one() {
        let ns = ns();
        let mut bound = ns.bind(
            {
                let ns = ns.clone();
                move || {
                    ns.set("k", 1u32).unwrap();
                    ns.get_as::<u32>("k").as_deref().copied()
                }
            },
            None,
        );
        assert_eq!(bound(), Some(1));
        assert!(ns.active().is_none());
    }

    #[test]
    fn try_bind_annotates_faults() {
        let ns = ns();
        let explicit = ns.run(|_| {});
        let mut bound = ns.try_bind(|| Err::<(), &str>("late"), Some(explicit.clone()));
        let err = bound().unwrap_err();
        assert!(ns.from_error(&err).is_some_and(|c| c.same(&explicit)));
    }

    #[test]
    fn guard_exits_during_unwind() {
        let ns = ns();
        let caught = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            ns.run(|_| panic!("listener blew up"));
        }));
        assert!(caught.is_err());
        assert!(ns.active().is_none());
        assert_eq!(ns.stack_depth(), 0);
    }

    #[test]
    fn manual_exit_of_unknown_context_reports_misuse() {
        let ns = ns();
        let context = ns.create_context();
        assert!(matches!(
            ns.exit(&context),
            Err(StackError::NotEntered { .. })
        ));
    }
}
