//! Event-emitter rebinding: a decorator emitter whose listeners replay the
//! context captured when they were attached.
//!
//! Long-lived emitters (a reused socket, a shared bus object) intentionally
//! outlive the context stack's natural nesting, so the tracker alone cannot
//! bridge them. The [`Emitter`] decorator closes the gap: once a namespace is
//! bound to it, every listener attached *afterwards* is tagged with the
//! context active in that namespace at attachment time — capture happens at
//! subscribe time, not at emit time. Emission enters each tag around the
//! listener call and exits immediately after, so the listener observes the
//! subscribe-time bindings and the ambient context is restored as soon as it
//! returns.
//!
//! This is an explicit adapter type rather than an interception layer over a
//! foreign emitter: components that need rebinding are constructed through
//! it.

use crate::context::Context;
use crate::namespace::{ContextGuard, Namespace};
use smallvec::SmallVec;
use std::fmt;

/// Identifier for a listener registered on an [`Emitter`], used to remove
/// it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

struct ListenerEntry<E> {
    id: ListenerId,
    /// Contexts captured at attachment time, one per bound namespace that
    /// had an active context. Binding order is preserved; emission enters in
    /// order and exits in reverse.
    tags: SmallVec<[(Namespace, Context); 1]>,
    callback: Box<dyn FnMut(&E) + Send>,
}

/// An event emitter whose listeners are rebound to their subscribe-time
/// contexts.
pub struct Emitter<E> {
    bound: Vec<Namespace>,
    listeners: Vec<ListenerEntry<E>>,
    next_id: u64,
}

impl<E> Emitter<E> {
    /// Creates an emitter with no bound namespaces and no listeners.
    #[must_use]
    pub fn new() -> Self {
        Self {
            bound: Vec::new(),
            listeners: Vec::new(),
            next_id: 0,
        }
    }

    /// Registers `namespace` on this emitter. Listeners attached from now on
    /// capture the namespace's active context; already-attached listeners
    /// are unaffected. Binding the same namespace twice is a no-op.
    pub(crate) fn bind_namespace(&mut self, namespace: &Namespace) {
        if !self.bound.iter().any(|bound| bound.same(namespace)) {
            self.bound.push(namespace.clone());
        }
    }

    /// Attaches a listener, tagging it with the context currently active in
    /// every bound namespace.
    ///
    /// A bound namespace with no active context contributes no tag: there is
    /// nothing to restore for it at emit time.
    pub fn on<F: FnMut(&E) + Send + 'static>(&mut self, callback: F) -> ListenerId {
        let tags = self
            .bound
            .iter()
            .filter_map(|namespace| {
                namespace
                    .active()
                    .map(|context| (namespace.clone(), context))
            })
            .collect();

        let id = ListenerId(self.next_id);
        self.next_id += 1;
        self.listeners.push(ListenerEntry {
            id,
            tags,
            callback: Box::new(callback),
        });
        id
    }

    /// Removes a previously attached listener. Returns `false` when the id
    /// is unknown (already removed, or from another emitter).
    pub fn off(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|entry| entry.id != id);
        self.listeners.len() != before
    }

    /// Invokes every listener with `event`, each under its captured
    /// contexts.
    ///
    /// Tags are entered in binding order and exited in reverse immediately
    /// after the listener returns; a panicking listener still has its
    /// contexts exited during unwind.
    pub fn emit(&mut self, event: &E) {
        for entry in &mut self.listeners {
            let guards: SmallVec<[ContextGuard; 1]> = entry
                .tags
                .iter()
                .map(|(namespace, context)| namespace.enter_guard(context))
                .collect();

            (entry.callback)(event);

            for guard in guards.into_iter().rev() {
                drop(guard);
            }
        }
    }

    /// Number of attached listeners.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }
}

impl<E> Default for Emitter<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> fmt::Debug for Emitter<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Emitter")
            .field("bound_namespaces", &self.bound.len())
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    #[test]
    fn listener_observes_subscribe_time_context() {
        let ns = Namespace::new("emitter");
        let mut emitter = Emitter::new();
        ns.bind_emitter(&mut emitter);

        let (tx, rx) = mpsc::channel();
        ns.run(|_| {
            ns.set("id", 42u32).unwrap();
            let ns = ns.clone();
            emitter.on(move |(): &()| {
                tx.send(ns.get_as::<u32>("id").as_deref().copied()).unwrap();
            });
        });

        // Emit later, under a different active context.
        ns.run(|_| {
            ns.set("id", 99u32).unwrap();
            emitter.emit(&());
            // Ambient context restored immediately after the listener.
            assert_eq!(ns.get_as::<u32>("id").as_deref(), Some(&99));
        });

        assert_eq!(rx.try_recv().unwrap(), Some(42));
        assert!(ns.active().is_none());
        assert_eq!(ns.stack_depth(), 0);
    }

    #[test]
    fn listener_attached_without_context_gets_no_tag() {
        let ns = Namespace::new("emitter");
        let mut emitter = Emitter::new();
        ns.bind_emitter(&mut emitter);

        let (tx, rx) = mpsc::channel();
        {
            let ns = ns.clone();
            emitter.on(move |(): &()| {
                tx.send(ns.get("id").is_some()).unwrap();
            });
        }

        emitter.emit(&());
        assert!(!rx.try_recv().unwrap());
    }

    #[test]
    fn listeners_bound_before_the_namespace_are_unaffected() {
        let ns = Namespace::new("emitter");
        let mut emitter = Emitter::new();

        let (tx, rx) = mpsc::channel();
        {
            let ns_probe = ns.clone();
            emitter.on(move |(): &()| {
                tx.send(ns_probe.active().is_some()).unwrap();
            });
        }

        ns.bind_emitter(&mut emitter);
        ns.run(|_| emitter.emit(&()));

        // Attached before the bind: no captured tag, but it still runs under
        // whatever is ambient (run's context here).
        assert!(rx.try_recv().unwrap());
    }

    #[test]
    fn composes_tags_across_namespaces() {
        let ns_a = Namespace::new("a");
        let ns_b = Namespace::new("b");
        let mut emitter = Emitter::new();
        ns_a.bind_emitter(&mut emitter);
        ns_b.bind_emitter(&mut emitter);

        let (tx, rx) = mpsc::channel();
        ns_a.run(|_| {
            ns_a.set("who", "a".to_owned()).unwrap();
            ns_b.run(|_| {
                ns_b.set("who", "b".to_owned()).unwrap();
                let (ns_a, ns_b, tx) = (ns_a.clone(), ns_b.clone(), tx);
                emitter.on(move |(): &()| {
                    let a = ns_a.get_as::<String>("who").map(|s| (*s).clone());
                    let b = ns_b.get_as::<String>("who").map(|s| (*s).clone());
                    tx.send((a, b)).unwrap();
                });
            });
        });

        emitter.emit(&());
        let (a, b) = rx.try_recv().unwrap();
        assert_eq!(a.as_deref(), Some("a"));
        assert_eq!(b.as_deref(), Some("b"));
        assert!(ns_a.active().is_none());
        assert!(ns_b.active().is_none());
    }

    #[test]
    fn off_removes_the_listener() {
        let ns = Namespace::new("emitter");
        let mut emitter = Emitter::new();
        ns.bind_emitter(&mut emitter);

        let (tx, _rx) = mpsc::channel();
        let id = emitter.on(move |(): &()| tx.send(()).unwrap());
        assert_eq!(emitter.listener_count(), 1);

        assert!(emitter.off(id));
        assert!(!emitter.off(id));
        assert_eq!(emitter.listener_count(), 0);
        emitter.emit(&());
    }

    #[test]
    fn rebinding_the_same_namespace_is_a_no_op() {
        let ns = Namespace::new("emitter");
        let mut emitter = Emitter::<()>::new();
        ns.bind_emitter(&mut emitter);
        ns.bind_emitter(&mut emitter);

        let count = ns.run_and_return(|_| {
            ns.set("k", 1u32).unwrap();
            emitter.on(|(): &()| {});
            1
        });
        assert_eq!(count, 1);
        // One tag, not two, despite the double bind.
        assert_eq!(emitter.listeners[0].tags.len(), 1);
    }
}
