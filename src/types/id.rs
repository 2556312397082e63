//! Identifier types for tracked asynchronous units.
//!
//! A [`UnitId`] names one schedulable piece of deferred work (a timer, a socket
//! callback, a deferred continuation) for the lifetime of the process. Ids are
//! minted by the host scheduler facility, not by this crate; they are opaque
//! here and only compared and hashed.

use core::fmt;

/// A process-scoped identifier for one asynchronous unit of work.
///
/// The hosting scheduler issues these monotonically and reports them through
/// the [`LifecycleSubscriber`](crate::lifecycle::LifecycleSubscriber)
/// notifications. The zero value is reserved: it is the synthetic
/// "no current unit" identifier some schedulers report for notifications that
/// originate outside any tracked call stack.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UnitId(u64);

impl UnitId {
    /// The synthetic "no current unit" identifier.
    pub const NONE: Self = Self(0);

    /// Wraps a raw identifier issued by the scheduler facility.
    #[must_use]
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw identifier value.
    #[must_use]
    pub const fn as_raw(self) -> u64 {
        self.0
    }

    /// Returns `true` if this is the synthetic "no current unit" identifier.
    #[must_use]
    pub const fn is_none(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Debug for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_none() {
            write!(f, "UnitId(none)")
        } else {
            write!(f, "UnitId({})", self.0)
        }
    }
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_none() {
            write!(f, "none")
        } else {
            write!(f, "{}", self.0)
        }
    }
}
