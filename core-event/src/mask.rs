//! Event mask coalescing.
//!
//! A [`MaskMonitor`] collects "something changed" bits raised from any thread
//! and delivers their union to a handler on the reactor thread. However many
//! signals arrive before the handler runs, it runs once and sees all of them.
//!
//! The pending mask is a single `AtomicU32`. `signal` ORs into it and only the
//! caller that turns it from zero to non-zero schedules a call. The deferred
//! body swaps it back to zero in one atomic step before invoking the handler,
//! so a bit raised while the handler runs lands in the next invocation.
//!
//! # Examples
//!
//! ```rust
//! use core_event::{EventLoop, MaskMonitor};
//! use std::sync::atomic::{AtomicU32, Ordering};
//! use std::sync::Arc;
//!
//! let event_loop = EventLoop::start("io").unwrap();
//! let seen = Arc::new(AtomicU32::new(0));
//! let seen_clone = seen.clone();
//!
//! let monitor = MaskMonitor::new(event_loop.handle(), move |mask| {
//!     seen_clone.fetch_or(mask, Ordering::SeqCst);
//! });
//!
//! monitor.signal(0x1);
//! monitor.signal(0x2);
//! event_loop.handle().blocking_call(|| ());
//!
//! assert_eq!(seen.load(Ordering::SeqCst), 0x3);
//! ```

use crate::deferred::DeferredEvent;
use crate::event_loop::EventLoopHandle;
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

/// Turns concurrent mask signals into single handler invocations on the
/// reactor thread. This type is thread-safe.
pub struct MaskMonitor {
    inner: Arc<MaskInner>,
    deferred: DeferredEvent,
}

struct MaskInner {
    pending_mask: AtomicU32,
    handler: Box<dyn Fn(u32) + Send + Sync>,
}

impl MaskMonitor {
    pub fn new<F>(event_loop: EventLoopHandle, handler: F) -> Self
    where
        F: Fn(u32) + Send + Sync + 'static,
    {
        let inner = Arc::new(MaskInner {
            pending_mask: AtomicU32::new(0),
            handler: Box::new(handler),
        });

        let weak = Arc::downgrade(&inner);
        let deferred = DeferredEvent::new(event_loop, move || {
            if let Some(inner) = weak.upgrade() {
                inner.run_deferred();
            }
        });

        Self { inner, deferred }
    }

    /// ORs `bits` into the pending mask. Never blocks.
    pub fn signal(&self, bits: u32) {
        if self.inner.pending_mask.fetch_or(bits, Ordering::AcqRel) == 0 {
            self.deferred.schedule();
        }
    }

    /// Same as [`signal`](Self::signal).
    pub fn or_mask(&self, bits: u32) {
        self.signal(bits);
    }

    /// Bits raised since the handler last ran.
    pub fn pending(&self) -> u32 {
        self.inner.pending_mask.load(Ordering::Acquire)
    }

    /// Discards pending bits and withdraws the scheduled invocation.
    pub fn cancel(&self) {
        self.deferred.cancel();
        self.inner.pending_mask.store(0, Ordering::Release);
    }

    pub fn event_loop(&self) -> &EventLoopHandle {
        self.deferred.event_loop()
    }
}

impl MaskInner {
    fn run_deferred(&self) {
        let mask = self.pending_mask.swap(0, Ordering::AcqRel);
        if mask != 0 {
            (self.handler)(mask);
        }
    }
}

impl fmt::Debug for MaskMonitor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MaskMonitor")
            .field("pending", &format_args!("{:#x}", self.pending()))
            .finish()
    }
}
