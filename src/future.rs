//! Context-carrying future wrappers.
//!
//! In a runtime without ambient scheduler hooks, propagation is pushed into
//! the point where deferred work is created: wrap the future when it is
//! scheduled and the context travels with it. Both wrappers re-enter their
//! captured context around every poll and exit it immediately after, so the
//! ambient context is undisturbed between polls and the body of the future
//! always observes the captured bindings.
//!
//! [`BoundFuture`] is the plain wrapper ([`Namespace::bind_future`]).
//! [`RunFuture`] is the single-shot `run`-shaped variant
//! ([`Namespace::run_future`]): its output is a `Result` and an `Err`
//! settlement is annotated with the captured context before it surfaces.

use crate::context::Context;
use crate::error::Propagated;
use crate::namespace::Namespace;
use pin_project::pin_project;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context as TaskContext, Poll};

/// A future that polls its inner future under a captured context.
#[pin_project]
pub struct BoundFuture<F> {
    #[pin]
    inner: F,
    namespace: Namespace,
    context: Context,
}

impl<F> BoundFuture<F> {
    pub(crate) fn new(namespace: Namespace, context: Context, inner: F) -> Self {
        Self {
            inner,
            namespace,
            context,
        }
    }

    /// The captured context the inner future runs under.
    #[must_use]
    pub fn context(&self) -> &Context {
        &self.context
    }
}

impl<F: Future> Future for BoundFuture<F> {
    type Output = F::Output;

    fn poll(self: Pin<&mut Self>, cx: &mut TaskContext<'_>) -> Poll<Self::Output> {
        let this = self.project();
        let _entered = this.namespace.enter_guard(this.context);
        this.inner.poll(cx)
    }
}

/// A single-shot deferred computation bridged across settlement.
///
/// Produced by [`Namespace::run_future`]; the context entered for the
/// synchronous prefix is re-entered around every poll, and a failed
/// settlement is annotated with it.
#[pin_project]
pub struct RunFuture<F> {
    #[pin]
    inner: F,
    namespace: Namespace,
    context: Context,
}

impl<F> RunFuture<F> {
    pub(crate) fn new(namespace: Namespace, context: Context, inner: F) -> Self {
        Self {
            inner,
            namespace,
            context,
        }
    }

    /// The context created for this computation.
    #[must_use]
    pub fn context(&self) -> &Context {
        &self.context
    }
}

impl<F, T, E> Future for RunFuture<F>
where
    F: Future<Output = Result<T, E>>,
{
    type Output = Result<T, Propagated<E>>;

    fn poll(self: Pin<&mut Self>, cx: &mut TaskContext<'_>) -> Poll<Self::Output> {
        let this = self.project();
        let _entered = this.namespace.enter_guard(this.context);
        match this.inner.poll(cx) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(Ok(value)) => Poll::Ready(Ok(value)),
            Poll::Ready(Err(source)) => Poll::Ready(Err(Propagated::new(
                this.namespace.name(),
                this.context.clone(),
                source,
            ))),
        }
    }
}
