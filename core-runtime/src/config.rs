//! # Core Configuration Module
//!
//! Provides configuration management for the daemon core.
//!
//! ## Overview
//!
//! The configuration system uses a builder pattern to construct a `CoreConfig`
//! holding the settings every subsystem needs at startup. Validation is
//! fail-fast: [`CoreConfigBuilder::build`] refuses inconsistent values instead
//! of letting a stream discover them at runtime.
//!
//! Input buffering settings are plain serde data so they can be loaded from a
//! JSON file; every field has a default.
//!
//! ## Usage
//!
//! ```
//! use core_runtime::config::CoreConfig;
//!
//! let config = CoreConfig::builder()
//!     .event_loop_name("io")
//!     .input_buffer_size(512 * 1024)
//!     .input_resume_at(384 * 1024)
//!     .build()
//!     .expect("valid configuration");
//!
//! assert_eq!(config.input.buffer_size, 512 * 1024);
//! ```
//!
//! ## Error Handling
//!
//! ```should_panic
//! use core_runtime::config::CoreConfig;
//!
//! // resume threshold must stay below the buffer size
//! let config = CoreConfig::builder()
//!     .input_buffer_size(1024)
//!     .input_resume_at(4096)
//!     .build()
//!     .expect("Should fail - resume_at exceeds buffer_size");
//! ```

use crate::error::{Error, Result};
use crate::logging::LoggingConfig;
use core_event::EventLoop;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Core configuration for the daemon.
///
/// Use [`CoreConfigBuilder`] to construct instances.
#[derive(Debug, Clone)]
pub struct CoreConfig {
    /// Name of the reactor thread
    pub event_loop_name: String,

    /// Buffering and transport settings for input streams
    pub input: InputSettings,

    /// Logging setup applied by [`crate::logging::init_logging`]
    pub logging: LoggingConfig,

}

/// Buffering settings shared by all buffered input streams.
///
/// `buffer_size` bounds the memory one stream may hold. Once the buffer is
/// full the producer pauses; it is resumed when a read drops occupancy below
/// `resume_at`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputSettings {
    /// Ring buffer capacity in bytes.
    ///
    /// Default: 512 KiB.
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,

    /// Occupancy (bytes) below which a paused producer is resumed.
    ///
    /// Default: 384 KiB.
    #[serde(default = "default_resume_at")]
    pub resume_at: usize,

    /// Largest single read a producer performs from its source.
    ///
    /// Default: 64 KiB.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Maximum time to wait for a remote server to answer.
    ///
    /// Default: 30 seconds.
    #[serde(default = "default_http_timeout")]
    pub http_timeout: Duration,

    /// `User-Agent` sent with remote requests.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for InputSettings {
    fn default() -> Self {
        Self {
            buffer_size: default_buffer_size(),
            resume_at: default_resume_at(),
            chunk_size: default_chunk_size(),
            http_timeout: default_http_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

impl InputSettings {
    /// Parses settings from a JSON document. Missing fields take defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let settings: Self = serde_json::from_str(json)
            .map_err(|e| Error::Config(format!("Invalid input settings: {}", e)))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Loads settings from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!(
                "Cannot read input settings from {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::from_json_str(&json)
    }

    /// Validate setting values.
    pub fn validate(&self) -> Result<()> {
        if self.buffer_size == 0 {
            return Err(Error::Config("buffer_size must be > 0".to_string()));
        }

        if self.resume_at == 0 {
            return Err(Error::Config(
                "resume_at must be > 0".to_string(),
            ));
        }

        if self.resume_at >= self.buffer_size {
            return Err(Error::Config(
                "resume_at must be smaller than buffer_size".to_string(),
            ));
        }

        if self.chunk_size == 0 {
            return Err(Error::Config("chunk_size must be > 0".to_string()));
        }

        if self.chunk_size > self.buffer_size {
            return Err(Error::Config(
                "chunk_size cannot exceed buffer_size".to_string(),
            ));
        }

        if self.http_timeout.is_zero() {
            return Err(Error::Config("http_timeout must be > 0".to_string()));
        }

        Ok(())
    }
}

// ============================================================================
// Default Functions (for serde)
// ============================================================================

fn default_buffer_size() -> usize {
    512 * 1024
}

fn default_resume_at() -> usize {
    384 * 1024
}

fn default_chunk_size() -> usize {
    64 * 1024
}

fn default_http_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_user_agent() -> String {
    format!("musicd/{}", env!("CARGO_PKG_VERSION"))
}

impl CoreConfig {
    /// Creates a new builder for constructing a `CoreConfig`.
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    /// Validates the configuration and returns an error if invalid.
    pub fn validate(&self) -> Result<()> {
        if self.event_loop_name.trim().is_empty() {
            return Err(Error::Config(
                "Event loop name cannot be empty".to_string(),
            ));
        }

        self.input.validate()
    }

    /// Starts the reactor thread described by this configuration.
    pub fn start_event_loop(&self) -> Result<EventLoop> {
        Ok(EventLoop::start(self.event_loop_name.clone())?)
    }
}

/// Builder for constructing [`CoreConfig`] instances.
#[derive(Default)]
pub struct CoreConfigBuilder {
    event_loop_name: Option<String>,
    input: Option<InputSettings>,
    buffer_size: Option<usize>,
    resume_at: Option<usize>,
    logging: Option<LoggingConfig>,
}

impl CoreConfigBuilder {
    /// Sets the reactor thread name.
    ///
    /// Default: `"io"`
    pub fn event_loop_name(mut self, name: impl Into<String>) -> Self {
        self.event_loop_name = Some(name.into());
        self
    }

    /// Replaces all input settings at once.
    ///
    /// Individual overrides such as [`input_buffer_size`](Self::input_buffer_size)
    /// still apply on top.
    pub fn input_settings(mut self, settings: InputSettings) -> Self {
        self.input = Some(settings);
        self
    }

    /// Sets the per-stream buffer capacity in bytes.
    pub fn input_buffer_size(mut self, size: usize) -> Self {
        self.buffer_size = Some(size);
        self
    }

    /// Sets the occupancy below which paused producers are resumed.
    pub fn input_resume_at(mut self, resume_at: usize) -> Self {
        self.resume_at = Some(resume_at);
        self
    }

    pub fn logging(mut self, logging: LoggingConfig) -> Self {
        self.logging = Some(logging);
        self
    }

    /// Builds the final `CoreConfig` instance.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if any value is out of range.
    pub fn build(self) -> Result<CoreConfig> {
        let input_is_default = self.input.is_none();
        let mut input = self.input.unwrap_or_default();
        if let Some(size) = self.buffer_size {
            input.buffer_size = size;
        }
        if let Some(resume_at) = self.resume_at {
            input.resume_at = resume_at;
        }
        // keep the default chunk size usable with small buffers
        if input_is_default && input.chunk_size > input.buffer_size {
            input.chunk_size = input.buffer_size;
        }

        let config = CoreConfig {
            event_loop_name: self.event_loop_name.unwrap_or_else(|| "io".to_string()),
            input,
            logging: self.logging.unwrap_or_default(),
        };

        config.validate()?;

        Ok(config)
    }
}
