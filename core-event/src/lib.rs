//! Reactor layer for the music daemon core.
//!
//! The daemon runs exactly one event loop thread. That thread owns every
//! producer-side mutation of input streams and runs all deferred work. Any
//! other thread talks to it by queueing callbacks.
//!
//! # Architecture
//!
//! ```text
//!  worker threads                      reactor thread
//!  ──────────────                      ──────────────
//!  DeferredEvent::schedule() ──┐
//!  MaskMonitor::signal()     ──┼──▶ callback queue ──▶ callbacks (FIFO)
//!  EventLoopHandle::schedule()─┘                       spawned futures
//!                                                       (sockets, files, HTTP)
//! ```
//!
//! # Modules
//!
//! - `event_loop`: the reactor thread and its cloneable handle
//! - `deferred`: idempotent one-shot deferred calls
//! - `mask`: coalescing of "something changed" bit masks
//! - `runtime`: Tokio runtime construction for the reactor
//! - `sync`: blocking and async synchronisation primitives used across the workspace
//!
//! # Examples
//!
//! ```rust
//! use core_event::{EventLoop, MaskMonitor};
//!
//! let event_loop = EventLoop::start("io").unwrap();
//! let monitor = MaskMonitor::new(event_loop.handle(), |mask| {
//!     println!("changed: {:#x}", mask);
//! });
//!
//! monitor.signal(0x1);
//! monitor.signal(0x4);
//! ```

pub mod deferred;
pub mod event_loop;
pub mod mask;
pub mod runtime;
pub mod sync;

pub use deferred::DeferredEvent;
pub use event_loop::{EventLoop, EventLoopHandle};
pub use mask::MaskMonitor;
