//! Synchronization primitives.
//!
//! Two families are used across the workspace:
//!
//! - Blocking primitives (`parking_lot`) for state shared between the reactor
//!   thread and blocking consumer threads. Consumers wait on a [`Condvar`]; the
//!   reactor only ever takes the lock briefly and never waits.
//! - Async primitives (`tokio::sync`) for futures running on the reactor, such
//!   as producers parked until the consumer drains the buffer.
//!
//! # Examples
//!
//! ```rust
//! use core_event::sync::{Condvar, Mutex};
//! use std::sync::Arc;
//!
//! let pair = Arc::new((Mutex::new(false), Condvar::new()));
//! let pair2 = Arc::clone(&pair);
//!
//! std::thread::spawn(move || {
//!     let (lock, cond) = &*pair2;
//!     *lock.lock() = true;
//!     cond.notify_all();
//! });
//!
//! let (lock, cond) = &*pair;
//! let mut ready = lock.lock();
//! while !*ready {
//!     cond.wait(&mut ready);
//! }
//! ```

pub use parking_lot::{Condvar, Mutex, MutexGuard, RwLock};

pub use tokio::sync::{broadcast, mpsc, oneshot, Notify};
