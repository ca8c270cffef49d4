//! The reactor thread.
//!
//! An [`EventLoop`] owns one named OS thread running a Tokio current-thread
//! runtime. The thread executes queued callbacks in FIFO order and drives any
//! future spawned onto it. All cross-thread requests reach the reactor as
//! callbacks queued through an [`EventLoopHandle`]; nothing is ever executed
//! synchronously on behalf of another thread.
//!
//! # Examples
//!
//! ```rust
//! use core_event::EventLoop;
//!
//! let event_loop = EventLoop::start("io").unwrap();
//! let handle = event_loop.handle();
//!
//! let inside = handle.blocking_call({
//!     let handle = handle.clone();
//!     move || handle.is_inside()
//! });
//! assert_eq!(inside, Some(true));
//! assert!(!handle.is_inside());
//! ```

use crate::runtime::{self, Handle};
use parking_lot::Mutex;
use std::fmt;
use std::future::Future;
use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle, ThreadId};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle as TaskHandle;
use tracing::{debug, info, trace, warn};

type Callback = Box<dyn FnOnce() + Send + 'static>;

/// Owner of the reactor thread.
///
/// Dropping the loop shuts it down: callbacks already queued still run, then
/// the thread is joined and every future spawned onto it is cancelled.
pub struct EventLoop {
    handle: EventLoopHandle,
    thread: Option<JoinHandle<()>>,
}

/// Cheap, cloneable reference to a running [`EventLoop`].
#[derive(Clone)]
pub struct EventLoopHandle {
    shared: Arc<Shared>,
}

struct Shared {
    name: String,
    thread_id: ThreadId,
    runtime: Handle,
    sender: Mutex<Option<mpsc::UnboundedSender<Callback>>>,
}

impl EventLoop {
    /// Spawns the reactor thread.
    ///
    /// # Errors
    ///
    /// Returns an error if the runtime cannot be built or the OS refuses to
    /// spawn the thread.
    pub fn start(name: impl Into<String>) -> io::Result<Self> {
        let name = name.into();
        let runtime = runtime::build_reactor_runtime()?;
        let runtime_handle = runtime.handle().clone();
        let (sender, mut receiver) = mpsc::unbounded_channel::<Callback>();

        let thread_name = name.clone();
        let thread = thread::Builder::new()
            .name(name.clone())
            .spawn(move || {
                debug!(event_loop = %thread_name, "Event loop started");
                runtime.block_on(async move {
                    while let Some(callback) = receiver.recv().await {
                        callback();
                    }
                });
                debug!(event_loop = %thread_name, "Event loop finished");
            })?;

        let shared = Arc::new(Shared {
            name,
            thread_id: thread.thread().id(),
            runtime: runtime_handle,
            sender: Mutex::new(Some(sender)),
        });

        Ok(Self {
            handle: EventLoopHandle { shared },
            thread: Some(thread),
        })
    }

    /// Returns a handle that other components keep to reach this loop.
    pub fn handle(&self) -> EventLoopHandle {
        self.handle.clone()
    }

    /// Stops accepting callbacks and waits for the reactor thread to exit.
    ///
    /// # Panics
    ///
    /// Panics when called from the reactor thread itself.
    pub fn shutdown(&mut self) {
        let Some(thread) = self.thread.take() else {
            return;
        };

        assert!(
            !self.handle.is_inside(),
            "event loop '{}' cannot be shut down from its own thread",
            self.handle.name()
        );

        self.handle.shared.sender.lock().take();

        if thread.join().is_err() {
            warn!(event_loop = %self.handle.name(), "Event loop thread panicked");
        } else {
            info!(event_loop = %self.handle.name(), "Event loop stopped");
        }
    }
}

impl Drop for EventLoop {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl fmt::Debug for EventLoop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventLoop")
            .field("name", &self.handle.name())
            .field("running", &self.thread.is_some())
            .finish()
    }
}

impl EventLoopHandle {
    /// Name of the reactor thread.
    pub fn name(&self) -> &str {
        &self.shared.name
    }

    /// Returns `true` if the caller is running on the reactor thread.
    pub fn is_inside(&self) -> bool {
        thread::current().id() == self.shared.thread_id
    }

    /// Queues `callback` to run exactly once on the reactor thread.
    ///
    /// Safe to call from any thread, including the reactor itself. Returns
    /// `false` and drops the callback if the loop has already shut down.
    pub fn schedule<F>(&self, callback: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        let sender = self.shared.sender.lock();
        match sender.as_ref() {
            Some(sender) => sender.send(Box::new(callback)).is_ok(),
            None => {
                trace!(event_loop = %self.shared.name, "Dropping callback, loop is shut down");
                false
            }
        }
    }

    /// Runs a future on the reactor thread.
    ///
    /// This is the registration surface for I/O readiness: sockets, files and
    /// HTTP bodies awaited by the future are polled by the reactor.
    pub fn spawn<F>(&self, future: F) -> TaskHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        self.shared.runtime.spawn(future)
    }

    /// Runs `f` on the reactor thread and waits for its result.
    ///
    /// Runs `f` directly when already on the reactor thread. Returns `None`
    /// if the loop shut down before `f` could run.
    ///
    /// # Panics
    ///
    /// Panics if called from an async context on another thread, where a
    /// blocking wait is not allowed.
    pub fn blocking_call<F, R>(&self, f: F) -> Option<R>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        if self.is_inside() {
            return Some(f());
        }

        let (tx, rx) = oneshot::channel();
        if !self.schedule(move || {
            let _ = tx.send(f());
        }) {
            return None;
        }

        rx.blocking_recv().ok()
    }
}

impl fmt::Debug for EventLoopHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventLoopHandle")
            .field("name", &self.shared.name)
            .finish_non_exhaustive()
    }
}
