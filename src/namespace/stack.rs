//! The per-namespace context stack.
//!
//! One `active` slot plus a parked stack of previously active contexts.
//! Enter pushes the current active slot (which may be empty) and installs the
//! new context; exit restores it. LIFO is the common case, but asynchronous
//! completions arrive in any order, so exit also supports removing a parked
//! entry out of order without disturbing the active slot.
//!
//! Invariant: at rest (no namespace code executing), `active` is empty and the
//! parked stack is empty. Every enter must be matched by exactly one exit.

use crate::context::Context;
use crate::error::StackError;
use smallvec::SmallVec;

/// Context stack for one namespace.
#[derive(Default)]
pub(crate) struct ContextStack {
    active: Option<Context>,
    /// Previously active slots, oldest first. The entry at index 0 is the
    /// base state that the final exit restores; it may never be removed by
    /// an out-of-order exit.
    parked: SmallVec<[Option<Context>; 4]>,
}

impl ContextStack {
    /// The currently active context, if any.
    pub(crate) fn active(&self) -> Option<&Context> {
        self.active.as_ref()
    }

    /// Number of parked entries.
    pub(crate) fn depth(&self) -> usize {
        self.parked.len()
    }

    /// Makes `context` the active context, parking the current one.
    pub(crate) fn enter(&mut self, context: Context) {
        let previous = self.active.replace(context);
        self.parked.push(previous);
    }

    /// Removes `context` from the stack, restoring the previous active slot
    /// when it is the current one.
    ///
    /// Fast path: `context` is active, so pop the parked stack back into the
    /// active slot. Slow path (out-of-order completion): remove the most
    /// recently parked occurrence of `context`, leaving the active slot
    /// untouched. The most recent occurrence matters when re-entrant `run`
    /// calls parked the same context more than once.
    pub(crate) fn exit(&mut self, context: &Context, namespace: &str) -> Result<(), StackError> {
        if self.active.as_ref().is_some_and(|active| active.same(context)) {
            let Some(previous) = self.parked.pop() else {
                // The parked stack carries what exit must restore; an empty
                // stack here means the pairing was already broken.
                return Err(StackError::BaseEntry {
                    namespace: namespace.to_owned(),
                });
            };
            self.active = previous;
            return Ok(());
        }

        let index = self
            .parked
            .iter()
            .rposition(|slot| slot.as_ref().is_some_and(|parked| parked.same(context)));
        match index {
            None => Err(StackError::NotEntered {
                namespace: namespace.to_owned(),
            }),
            Some(0) => Err(StackError::BaseEntry {
                namespace: namespace.to_owned(),
            }),
            Some(index) => {
                self.parked.remove(index);
                Ok(())
            }
        }
    }
}
