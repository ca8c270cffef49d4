//! Workspace facade crate.
//!
//! Re-exports the daemon core crates so a host binary can depend on
//! `musicd-workspace` and pick the pieces it needs through feature flags:
//!
//! - `runtime`: configuration, logging and idle events (`core-runtime`)
//! - `input`: buffered input streams and producers (`core-input`)
//! - `http`: HTTP producer for remote streams
//! - `symphonia`: `MediaSource` adapter for the symphonia decoders
//!
//! The reactor crate (`core-event`) is always available.

pub use core_event as event;

#[cfg(feature = "runtime")]
pub use core_runtime as runtime;

#[cfg(feature = "input")]
pub use core_input as input;
