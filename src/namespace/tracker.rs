//! The lifecycle tracker: unit id → context recorded at schedule time.
//!
//! Entries are created when a unit is scheduled while a context is active (or
//! inherited from the unit's trigger), consulted when the scheduler is about
//! to execute the unit, and deleted exactly once when the unit is destroyed.
//! An absent key means "no context to restore" and is never an error.
//!
//! Alongside the context map the tracker records each unit's trigger edge, so
//! resolution can fall back to the context recorded for the unit that caused
//! this one to be scheduled. Some scheduler-internal units report no directly
//! active context even though they are causally downstream of one; the
//! trigger edge is what recovers them.

use crate::context::Context;
use crate::types::UnitId;
use std::collections::HashMap;

#[derive(Default)]
pub(crate) struct LifecycleTracker {
    contexts: HashMap<UnitId, Context>,
    triggers: HashMap<UnitId, UnitId>,
}

impl LifecycleTracker {
    /// Records the context captured for `unit` at schedule time.
    pub(crate) fn record(&mut self, unit: UnitId, context: Context) {
        self.contexts.insert(unit, context);
    }

    /// Records which unit caused `unit` to be scheduled.
    pub(crate) fn record_trigger(&mut self, unit: UnitId, trigger: UnitId) {
        if !trigger.is_none() {
            self.triggers.insert(unit, trigger);
        }
    }

    /// The context recorded directly for `unit`, without fallback.
    pub(crate) fn context_of(&self, unit: UnitId) -> Option<&Context> {
        self.contexts.get(&unit)
    }

    /// Resolves the context for `unit`: the directly recorded entry first,
    /// then the entry recorded for its trigger.
    pub(crate) fn resolve(&self, unit: UnitId) -> Option<&Context> {
        self.contexts.get(&unit).or_else(|| {
            self.triggers
                .get(&unit)
                .and_then(|trigger| self.contexts.get(trigger))
        })
    }

    /// Drops everything recorded for `unit`. Idempotent; the destroy
    /// notification is the final one for an id.
    pub(crate) fn forget(&mut self, unit: UnitId) {
        self.contexts.remove(&unit);
        self.triggers.remove(&unit);
    }

    /// Number of units with a recorded context.
    pub(crate) fn len(&self) -> usize {
        self.contexts.len()
    }
}
