//! Idempotent deferred calls.
//!
//! A [`DeferredEvent`] binds a callback to an event loop. Calling
//! [`schedule`](DeferredEvent::schedule) any number of times before the
//! callback runs results in a single invocation on the reactor thread.
//!
//! The `scheduled` flag is cleared on the reactor immediately before the
//! callback runs. A `schedule()` that races with a running callback therefore
//! always queues one more invocation instead of being absorbed.

use crate::event_loop::EventLoopHandle;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::trace;

/// A reusable one-shot call onto the reactor thread.
///
/// The queued closure only holds a weak reference: once the `DeferredEvent` is
/// dropped its callback never runs again.
pub struct DeferredEvent {
    inner: Arc<DeferredInner>,
}

struct DeferredInner {
    event_loop: EventLoopHandle,
    scheduled: AtomicBool,
    callback: Box<dyn Fn() + Send + Sync>,
}

impl DeferredEvent {
    pub fn new<F>(event_loop: EventLoopHandle, callback: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        Self {
            inner: Arc::new(DeferredInner {
                event_loop,
                scheduled: AtomicBool::new(false),
                callback: Box::new(callback),
            }),
        }
    }

    /// Event loop the callback runs on.
    pub fn event_loop(&self) -> &EventLoopHandle {
        &self.inner.event_loop
    }

    /// Requests one invocation of the callback. Callable from any thread.
    ///
    /// Has no additional effect while an invocation is already pending.
    /// Returns `false` if the event loop has shut down and the callback will
    /// not run.
    pub fn schedule(&self) -> bool {
        if self.inner.scheduled.swap(true, Ordering::AcqRel) {
            return true;
        }

        let weak = Arc::downgrade(&self.inner);
        let queued = self.inner.event_loop.schedule(move || {
            if let Some(inner) = weak.upgrade() {
                inner.run();
            }
        });

        if !queued {
            self.inner.scheduled.store(false, Ordering::Release);
            trace!(event_loop = %self.inner.event_loop.name(), "Deferred call not queued");
        }
        queued
    }

    /// Withdraws a pending invocation, if any.
    pub fn cancel(&self) {
        self.inner.scheduled.store(false, Ordering::Release);
    }

    /// Returns `true` while an invocation is queued but has not started.
    pub fn is_pending(&self) -> bool {
        self.inner.scheduled.load(Ordering::Acquire)
    }
}

impl DeferredInner {
    fn run(&self) {
        // cancelled, or already run by an earlier queue entry
        if !self.scheduled.swap(false, Ordering::AcqRel) {
            return;
        }

        (self.callback)();
    }
}

impl fmt::Debug for DeferredEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeferredEvent")
            .field("event_loop", &self.inner.event_loop.name())
            .field("pending", &self.is_pending())
            .finish()
    }
}
