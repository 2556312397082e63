//! Tether: continuation-local context propagation for cooperative schedulers.
//!
//! # Overview
//!
//! Tether lets unrelated pieces of asynchronous code — callbacks,
//! continuations, event-listener invocations — transparently observe
//! key/value bindings established earlier in a causally related chain of
//! work, without threading that state through every function signature. It
//! is the engine behind request-scoped values (request ids, trace spans,
//! tenant identity) in processes that interleave many asynchronous
//! operations on a single execution thread.
//!
//! Propagation is strictly local to one running process's causal graph of
//! asynchronous work: tether is not a message bus, not a distributed tracing
//! protocol, and persists nothing across process boundaries.
//!
//! # Core Guarantees
//!
//! - **Balanced stacks**: every context enter is matched by exactly one
//!   exit, on all paths including unwinding; out-of-order asynchronous
//!   completions remove the right stack entry without disturbing the
//!   active context
//! - **Bounded tracking**: every unit recorded by the lifecycle tracker is
//!   forgotten exactly once when the scheduler destroys it
//! - **Shadowing, never mutation**: child contexts delegate reads to their
//!   parent and shadow on write; an ancestor's bindings are never modified
//!   through a child
//! - **Faults stay intact**: errors from user callbacks are annotated with
//!   the context active when they were raised and surfaced otherwise
//!   unchanged
//!
//! # Module Structure
//!
//! - [`types`]: Identifier types ([`UnitId`])
//! - [`context`]: The context object (delegated bindings)
//! - [`namespace`]: Namespaces, the context stack, and the run/bind surface
//! - [`lifecycle`]: The scheduler-hook subscriber seam
//! - [`future`]: Context-carrying future wrappers
//! - [`emitter`]: Event-emitter rebinding adapter
//! - [`registry`]: Name → namespace registry
//! - [`error`]: Error taxonomy and the fault-annotation wrapper
//! - [`test_utils`]: Deterministic mock scheduler and polling helpers
//!
//! # Quick Start
//!
//! ```
//! use tether::{LifecycleSubscriber, Registry, UnitId};
//!
//! let registry = Registry::new();
//! let ns = registry.create_namespace("request").unwrap();
//!
//! ns.run(|_| {
//!     ns.set("request_id", 7u64).unwrap();
//!
//!     // The scheduler facility reports a deferred unit being created...
//!     ns.unit_created(UnitId::from_raw(1), "timer", UnitId::NONE);
//! });
//!
//! // ...and later executes it: the context comes back.
//! ns.unit_enter(UnitId::from_raw(1));
//! assert_eq!(ns.get_as::<u64>("request_id").as_deref(), Some(&7));
//! ns.unit_exit(UnitId::from_raw(1));
//! ns.unit_destroyed(UnitId::from_raw(1));
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

pub mod context;
pub mod emitter;
pub mod error;
pub mod future;
pub mod lifecycle;
pub mod namespace;
pub mod registry;
pub mod test_utils;
pub mod types;

pub use context::{Context, Value};
pub use emitter::{Emitter, ListenerId};
pub use error::{NamespaceError, Propagated, RegistryError, StackError};
pub use future::{BoundFuture, RunFuture};
pub use lifecycle::LifecycleSubscriber;
pub use namespace::{ContextGuard, Namespace};
pub use registry::Registry;
pub use types::UnitId;
