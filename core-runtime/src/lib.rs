//! # Core Runtime Module
//!
//! Provides the runtime infrastructure shared by every daemon subsystem:
//! - Logging and tracing infrastructure
//! - Configuration management
//! - Coalesced idle notifications
//!
//! ## Overview
//!
//! This crate sits on top of `core-event`. It decides how the reactor thread
//! is named and sized, how diagnostics leave the process, and how state
//! changes are announced to clients waiting in `idle`.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use error::{Error, Result};
