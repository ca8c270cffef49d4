//! Runtime utilities for the reactor thread.
//!
//! The reactor drives a Tokio current-thread runtime so that sockets, files
//! and HTTP bodies registered from producers are polled on the same thread
//! that executes deferred callbacks. Downstream crates get the runtime types
//! from here instead of depending on Tokio's runtime module directly.

pub use tokio::runtime::{Builder, Handle, Runtime};

/// Builds the single-threaded runtime owned by an event loop.
pub fn build_reactor_runtime() -> std::io::Result<Runtime> {
    Builder::new_current_thread().enable_all().build()
}

