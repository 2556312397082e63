//! Scheduler-hook adapter: consumes the host scheduler's lifecycle
//! notifications and drives the context stack from them.
//!
//! The hosting process's scheduler is an external facility. It issues an
//! opaque [`UnitId`] for every asynchronous unit of work and reports four
//! notifications per unit: creation (with the trigger that caused the unit to
//! be scheduled), pre-execution, post-execution, and destruction. The
//! facility guarantees creation precedes any execute pair for an id and
//! destruction is the final notification for it.
//!
//! [`Namespace`] implements [`LifecycleSubscriber`]:
//!
//! - **created**: if a context is active, record `unit → context`; otherwise
//!   inherit the context recorded for the unit's trigger, when there is one.
//!   Some scheduler-internal units (notifications originating outside normal
//!   call stacks, reported with the [`UnitId::NONE`] current unit) carry no
//!   directly active context even though they are causally downstream of one;
//!   the trigger edge recovers them.
//! - **enter**: resolve the unit's recorded context (unit first, then its
//!   trigger) and enter it; an unresolved unit executes without propagated
//!   state rather than failing.
//! - **exit**: mirror the same resolution and exit. Using the same fallback
//!   order on both sides keeps the enter/exit pair symmetric.
//! - **destroyed**: drop the unit's tracker entries, exactly once, so memory
//!   stays bounded by the number of in-flight units.
//!
//! A unit abandoned by the scheduler without a destroy notification leaks its
//! tracker entry until process exit; that is an accepted limitation of the
//! facility contract, not something this adapter papers over.

use crate::namespace::Namespace;
use crate::types::UnitId;
use tracing::trace;

/// Subscriber for the scheduler facility's per-unit lifecycle notifications.
///
/// Embedders forward their scheduler's notifications to every namespace (or
/// to a [`Registry`](crate::registry::Registry), which fans out to all
/// registered namespaces).
pub trait LifecycleSubscriber {
    /// A new asynchronous unit was scheduled. `kind` is the facility's
    /// resource-kind label (diagnostics only); `trigger` identifies the unit
    /// causally responsible for scheduling this one, or [`UnitId::NONE`].
    fn unit_created(&self, unit: UnitId, kind: &str, trigger: UnitId);

    /// The unit is about to execute.
    fn unit_enter(&self, unit: UnitId);

    /// The unit finished executing.
    fn unit_exit(&self, unit: UnitId);

    /// Final notification for the unit; its identifier will not be seen
    /// again.
    fn unit_destroyed(&self, unit: UnitId);
}

impl LifecycleSubscriber for Namespace {
    fn unit_created(&self, unit: UnitId, kind: &str, trigger: UnitId) {
        let mut state = self.state();
        state.tracker.record_trigger(unit, trigger);

        if let Some(active) = state.stack.active().cloned() {
            state.tracker.record(unit, active);
            trace!(
                namespace = %self.name(),
                %unit,
                kind,
                %trigger,
                indent = state.indent,
                "unit created under active context"
            );
        } else if let Some(inherited) = state.tracker.context_of(trigger).cloned() {
            state.tracker.record(unit, inherited);
            trace!(
                namespace = %self.name(),
                %unit,
                kind,
                %trigger,
                indent = state.indent,
                "unit created; context inherited from trigger"
            );
        }
    }

    fn unit_enter(&self, unit: UnitId) {
        let mut state = self.state();
        state.executing.push(unit);

        if let Some(context) = state.tracker.resolve(unit).cloned() {
            state.indent += 2;
            state.stack.enter(context);
            trace!(
                namespace = %self.name(),
                %unit,
                depth = state.stack.depth(),
                indent = state.indent,
                "unit enter"
            );
        }
    }

    fn unit_exit(&self, unit: UnitId) {
        let mut state = self.state();

        if let Some(context) = state.tracker.resolve(unit).cloned() {
            state.indent = state.indent.saturating_sub(2);
            if let Err(error) = state.stack.exit(&context, self.name()) {
                // The facility reported an execute pair the stack never saw;
                // its notification contract is broken.
                panic!("scheduler facility broke the enter/exit contract: {error}");
            }
            trace!(
                namespace = %self.name(),
                %unit,
                depth = state.stack.depth(),
                indent = state.indent,
                "unit exit"
            );
        }

        let popped = state.executing.pop();
        debug_assert_eq!(
            popped,
            Some(unit),
            "execute notifications must nest strictly"
        );
    }

    fn unit_destroyed(&self, unit: UnitId) {
        let mut state = self.state();
        state.tracker.forget(unit);
        trace!(
            namespace = %self.name(),
            %unit,
            tracked = state.tracker.len(),
            "unit destroyed"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit(n: u64) -> UnitId {
        UnitId::from_raw(n)
    }

    #[test]
    fn schedule_execute_destroy_round_trip() {
        let ns = Namespace::new("hooks");

        let context = ns.run(|_| {
            ns.set("key", 1u32).unwrap();
            ns.unit_created(unit(7), "timer", unit(1));
        });

        // Context captured at schedule time, restored at execute time.
        ns.unit_enter(unit(7));
        assert!(ns.active().is_some_and(|active| active.same(&context)));
        assert_eq!(ns.get_as::<u32>("key").as_deref(), Some(&1));
        ns.unit_exit(unit(7));

        assert!(ns.active().is_none());
        assert_eq!(ns.stack_depth(), 0);

        ns.unit_destroyed(unit(7));
        assert_eq!(ns.tracked_units(), 0);
    }

    #[test]
    fn untracked_unit_executes_without_context() {
        let ns = Namespace::new("hooks");
        ns.unit_enter(unit(9));
        assert!(ns.active().is_none());
        ns.unit_exit(unit(9));
        ns.unit_destroyed(unit(9));
        assert_eq!(ns.stack_depth(), 0);
    }

    #[test]
    fn creation_with_no_active_context_inherits_from_trigger() {
        let ns = Namespace::new("hooks");

        let context = ns.run(|_| {
            ns.unit_created(unit(3), "tcp", unit(1));
        });

        // A downstream unit created outside any tracked call stack: no
        // active context, synthetic current unit, but a live trigger entry.
        ns.unit_created(unit(4), "tick", unit(3));

        ns.unit_enter(unit(4));
        assert!(ns.active().is_some_and(|active| active.same(&context)));
        ns.unit_exit(unit(4));

        ns.unit_destroyed(unit(3));
        ns.unit_destroyed(unit(4));
        assert_eq!(ns.tracked_units(), 0);
    }

    #[test]
    fn enter_resolves_through_trigger_edge_when_direct_entry_is_absent() {
        let ns = Namespace::new("hooks");

        ns.run(|_| {
            ns.set("id", 5u32).unwrap();
            ns.unit_created(unit(2), "socket", unit(1));
        });

        // Unit 6 has only a trigger edge pointing at unit 2; resolution at
        // enter time must fall back through it.
        {
            let mut state = ns.state();
            state.tracker.record_trigger(unit(6), unit(2));
        }

        ns.unit_enter(unit(6));
        assert_eq!(ns.get_as::<u32>("id").as_deref(), Some(&5));
        ns.unit_exit(unit(6));
        assert!(ns.active().is_none());
    }

    #[test]
    fn origin_stamp_reflects_the_executing_unit() {
        let ns = Namespace::new("hooks");

        ns.run(|_| ns.unit_created(unit(11), "timer", unit(1)));

        ns.unit_enter(unit(11));
        let created = ns.create_context();
        assert_eq!(created.origin(), unit(11));
        ns.unit_exit(unit(11));

        let top_level = ns.create_context();
        assert!(top_level.origin().is_none());
        ns.unit_destroyed(unit(11));
    }

    #[test]
    fn destroy_is_idempotent_and_bounds_memory() {
        let ns = Namespace::new("hooks");
        ns.run(|_| {
            ns.unit_created(unit(21), "a", unit(1));
            ns.unit_created(unit(22), "b", unit(1));
        });
        assert_eq!(ns.tracked_units(), 2);

        ns.unit_destroyed(unit(21));
        ns.unit_destroyed(unit(21));
        assert_eq!(ns.tracked_units(), 1);
        ns.unit_destroyed(unit(22));
        assert_eq!(ns.tracked_units(), 0);
    }
}
