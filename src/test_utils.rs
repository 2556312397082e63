//! Test utilities: a deterministic mock scheduler facility and minimal
//! future-polling helpers.
//!
//! The [`MockScheduler`] stands in for the hosting process's scheduler: it
//! mints monotonically increasing [`UnitId`]s, attributes each scheduled
//! callback to the unit that scheduled it (the trigger), and delivers the
//! four lifecycle notifications to every subscriber in a fully deterministic
//! single-threaded order. Destruction is decoupled from execution
//! ([`flush_destroyed`](MockScheduler::flush_destroyed)) so tests can
//! exercise the window where a unit has run but its tracker entry is still
//! live — the window long-lived resources like sockets occupy in production.

use crate::lifecycle::LifecycleSubscriber;
use crate::types::UnitId;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::sync::Arc;
use std::task::{Context as TaskContext, Poll, Wake, Waker};

type Callback = Box<dyn FnOnce(&MockScheduler)>;

struct ScheduledUnit {
    id: UnitId,
    callback: Callback,
}

struct SchedulerInner {
    subscribers: Vec<Rc<dyn LifecycleSubscriber>>,
    queue: VecDeque<ScheduledUnit>,
    next_id: u64,
    executing: Vec<UnitId>,
    retired: Vec<UnitId>,
}

/// A deterministic single-threaded scheduler facility for tests.
///
/// Handles are cheap clones sharing one queue; callbacks receive a handle so
/// they can schedule further units (which are attributed to them as
/// trigger).
#[derive(Clone)]
pub struct MockScheduler {
    inner: Rc<RefCell<SchedulerInner>>,
}

impl MockScheduler {
    /// Creates an idle scheduler with no subscribers.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Rc::new(RefCell::new(SchedulerInner {
                subscribers: Vec::new(),
                queue: VecDeque::new(),
                next_id: 0,
                executing: Vec::new(),
                retired: Vec::new(),
            })),
        }
    }

    /// Subscribes to all future lifecycle notifications.
    pub fn subscribe(&self, subscriber: impl LifecycleSubscriber + 'static) {
        self.inner.borrow_mut().subscribers.push(Rc::new(subscriber));
    }

    /// The unit currently executing, or [`UnitId::NONE`] at top level.
    #[must_use]
    pub fn current_unit(&self) -> UnitId {
        self.inner
            .borrow()
            .executing
            .last()
            .copied()
            .unwrap_or(UnitId::NONE)
    }

    /// Schedules a deferred callback, attributed to the currently executing
    /// unit as its trigger. Emits the creation notification immediately, as
    /// a real facility does.
    pub fn schedule(&self, kind: &str, callback: impl FnOnce(&MockScheduler) + 'static) -> UnitId {
        let trigger = self.current_unit();
        self.schedule_with_trigger(kind, trigger, callback)
    }

    /// Schedules a deferred callback with an explicit trigger attribution.
    ///
    /// Lets tests model creations reported from outside any tracked call
    /// stack (the synthetic "no current unit" situation) that are still
    /// causally downstream of a tracked unit.
    pub fn schedule_with_trigger(
        &self,
        kind: &str,
        trigger: UnitId,
        callback: impl FnOnce(&MockScheduler) + 'static,
    ) -> UnitId {
        let (id, subscribers) = {
            let mut inner = self.inner.borrow_mut();
            inner.next_id += 1;
            let id = UnitId::from_raw(inner.next_id);
            inner.queue.push_back(ScheduledUnit {
                id,
                callback: Box::new(callback),
            });
            (id, inner.subscribers.clone())
        };
        for subscriber in &subscribers {
            subscriber.unit_created(id, kind, trigger);
        }
        id
    }

    /// Executes queued units (and any they schedule) until the queue is
    /// empty, delivering enter/exit notifications around each callback.
    /// Executed units are retired but not yet destroyed.
    pub fn run_until_idle(&self) {
        loop {
            let unit = self.inner.borrow_mut().queue.pop_front();
            let Some(unit) = unit else { break };

            let subscribers = {
                let mut inner = self.inner.borrow_mut();
                inner.executing.push(unit.id);
                inner.subscribers.clone()
            };
            for subscriber in &subscribers {
                subscriber.unit_enter(unit.id);
            }

            (unit.callback)(self);

            for subscriber in &subscribers {
                subscriber.unit_exit(unit.id);
            }
            let mut inner = self.inner.borrow_mut();
            inner.executing.pop();
            inner.retired.push(unit.id);
        }
    }

    /// Delivers the final destroy notification for every retired unit.
    pub fn flush_destroyed(&self) {
        let (retired, subscribers) = {
            let mut inner = self.inner.borrow_mut();
            let retired = std::mem::take(&mut inner.retired);
            (retired, inner.subscribers.clone())
        };
        for unit in retired {
            for subscriber in &subscribers {
                subscriber.unit_destroyed(unit);
            }
        }
    }

    /// [`run_until_idle`](Self::run_until_idle) followed by
    /// [`flush_destroyed`](Self::flush_destroyed).
    pub fn drain(&self) {
        self.run_until_idle();
        self.flush_destroyed();
    }

    /// Number of units scheduled but not yet executed.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.inner.borrow().queue.len()
    }
}

impl Default for MockScheduler {
    fn default() -> Self {
        Self::new()
    }
}

struct NoopWake;

impl Wake for NoopWake {
    fn wake(self: Arc<Self>) {}
}

/// A waker that does nothing; the test loops poll again regardless.
#[must_use]
pub fn noop_waker() -> Waker {
    Waker::from(Arc::new(NoopWake))
}

/// Polls `future` to completion on the current thread.
pub fn block_on<F: Future>(future: F) -> F::Output {
    let waker = noop_waker();
    let mut cx = TaskContext::from_waker(&waker);
    let mut future = std::pin::pin!(future);
    loop {
        if let Poll::Ready(value) = future.as_mut().poll(&mut cx) {
            return value;
        }
    }
}

/// A future that suspends exactly once before completing.
#[must_use]
pub fn yield_once() -> YieldOnce {
    YieldOnce { yielded: false }
}

/// Future returned by [`yield_once`].
#[derive(Debug)]
pub struct YieldOnce {
    yielded: bool,
}

impl Future for YieldOnce {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut TaskContext<'_>) -> Poll<()> {
        let this = self.get_mut();
        if this.yielded {
            Poll::Ready(())
        } else {
            this.yielded = true;
            cx.waker().wake_by_ref();
            Poll::Pending
        }
    }
}
