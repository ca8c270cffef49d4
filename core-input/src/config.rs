//! # Buffer Configuration
//!
//! Per-stream buffering parameters, derived from the daemon-wide
//! [`InputSettings`].

use core_runtime::config::InputSettings;
use serde::{Deserialize, Serialize};

/// Sizing of one buffered stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BufferConfig {
    /// Ring buffer capacity in bytes.
    pub buffer_size: usize,

    /// A paused producer is resumed once occupancy drops below this.
    pub resume_at: usize,

    /// Largest single read a producer issues against its source.
    pub chunk_size: usize,
}

impl BufferConfig {
    /// # Panics
    ///
    /// Panics if `resume_at` is zero or not below `buffer_size`.
    pub fn new(buffer_size: usize, resume_at: usize) -> Self {
        let config = Self {
            buffer_size,
            resume_at,
            chunk_size: buffer_size.min(64 * 1024),
        };
        config.assert_valid();
        config
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self.assert_valid();
        self
    }

    pub(crate) fn assert_valid(&self) {
        assert!(self.buffer_size > 0, "buffer_size must be non-zero");
        assert!(self.resume_at > 0, "resume_at must be non-zero");
        assert!(
            self.resume_at < self.buffer_size,
            "resume_at ({}) must be below buffer_size ({})",
            self.resume_at,
            self.buffer_size
        );
        assert!(
            self.chunk_size > 0 && self.chunk_size <= self.buffer_size,
            "chunk_size ({}) must be in 1..={}",
            self.chunk_size,
            self.buffer_size
        );
    }
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self::from(&InputSettings::default())
    }
}

impl From<&InputSettings> for BufferConfig {
    fn from(settings: &InputSettings) -> Self {
        Self {
            buffer_size: settings.buffer_size,
            resume_at: settings.resume_at,
            chunk_size: settings.chunk_size,
        }
    }
}
