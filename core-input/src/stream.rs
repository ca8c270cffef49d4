//! # Input Stream Abstraction
//!
//! [`InputStream`] is the consumer-side view of a byte source: a decoder or
//! protocol handler reads from it on a worker thread while some producer
//! fills it in the background.
//!
//! ## Contract
//!
//! - A stream is identified by its URI.
//! - Attributes (`mime_type`, `size`, `is_seekable`) are known once the
//!   stream is ready. Before that, waiting is legal and reading blocks.
//! - `read` returning `Ok(0)` for a non-empty buffer means end of stream.
//! - One consumer thread per stream. Concurrent reads of the same stream are
//!   not supported.

use crate::error::{InputError, Result};
use crate::tag::Tag;
use std::io;

/// Snapshot of the attributes a consumer can rely on once a stream is ready.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamAttributes {
    pub ready: bool,
    pub mime_type: Option<String>,
    /// Total size in bytes, if the source reports one
    pub size: Option<u64>,
    pub seekable: bool,
    /// Bytes consumed so far, or the position after the last seek
    pub offset: u64,
}

impl StreamAttributes {
    /// Bytes left until the end, if the size is known.
    pub fn remaining(&self) -> Option<u64> {
        self.size.map(|size| size.saturating_sub(self.offset))
    }
}

/// A readable, possibly seekable, byte stream.
///
/// All methods take `&self`; implementations synchronise internally so a
/// stream can be shared as `Arc<dyn InputStream>` between the thread that
/// opened it and the thread that reads it.
pub trait InputStream: Send + Sync {
    fn uri(&self) -> &str;

    /// Reports a failure the producer recorded since the last call.
    ///
    /// A recorded failure is reported once unless it is fatal.
    fn check(&self) -> Result<()> {
        Ok(())
    }

    /// Refreshes attributes that change in the background.
    fn update(&self) {}

    fn is_ready(&self) -> bool;

    /// Blocks until the stream is ready or has failed.
    fn wait_ready(&self) -> Result<()>;

    fn mime_type(&self) -> Option<String>;

    fn size(&self) -> Option<u64>;

    fn offset(&self) -> u64;

    fn is_seekable(&self) -> bool;

    fn attributes(&self) -> StreamAttributes {
        StreamAttributes {
            ready: self.is_ready(),
            mime_type: self.mime_type(),
            size: self.size(),
            seekable: self.is_seekable(),
            offset: self.offset(),
        }
    }

    fn is_eof(&self) -> bool;

    /// Returns `true` if `read` would not block.
    fn is_available(&self) -> bool {
        true
    }

    /// Reads up to `buf.len()` bytes, blocking until at least one byte, end
    /// of stream or a failure is available.
    fn read(&self, buf: &mut [u8]) -> Result<usize>;

    fn seek(&self, offset: u64) -> Result<()>;

    /// Seeks `count` bytes forward.
    ///
    /// # Errors
    ///
    /// An [`io::ErrorKind::InvalidInput`] error if the target offset does
    /// not fit in a `u64`.
    fn skip(&self, count: u64) -> Result<()> {
        let target = self.offset().checked_add(count).ok_or_else(|| {
            InputError::from(io::Error::new(
                io::ErrorKind::InvalidInput,
                "skip past the largest representable offset",
            ))
        })?;
        self.seek(target)
    }

    fn rewind(&self) -> Result<()> {
        self.seek(0)
    }

    /// Takes the metadata attached since the last call, if any. Never blocks.
    fn read_tag(&self) -> Option<Tag> {
        None
    }

    /// Fills `buf` completely.
    ///
    /// # Errors
    ///
    /// [`InputError::UnexpectedEof`] if the stream ends first.
    fn read_full(&self, buf: &mut [u8]) -> Result<()> {
        let mut filled = 0;
        while filled < buf.len() {
            match self.read(&mut buf[filled..])? {
                0 => return Err(InputError::UnexpectedEof),
                n => filled += n,
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Seekable stream without data, recording the last seek target.
    struct Positioned {
        offset: Mutex<u64>,
    }

    impl InputStream for Positioned {
        fn uri(&self) -> &str {
            "test://positioned"
        }

        fn is_ready(&self) -> bool {
            true
        }

        fn wait_ready(&self) -> Result<()> {
            Ok(())
        }

        fn mime_type(&self) -> Option<String> {
            None
        }

        fn size(&self) -> Option<u64> {
            None
        }

        fn offset(&self) -> u64 {
            *self.offset.lock().unwrap()
        }

        fn is_seekable(&self) -> bool {
            true
        }

        fn is_eof(&self) -> bool {
            false
        }

        fn read(&self, _buf: &mut [u8]) -> Result<usize> {
            Ok(0)
        }

        fn seek(&self, offset: u64) -> Result<()> {
            *self.offset.lock().unwrap() = offset;
            Ok(())
        }
    }

    #[test]
    fn test_skip_moves_forward() {
        let stream = Positioned {
            offset: Mutex::new(100),
        };

        stream.skip(28).unwrap();
        assert_eq!(stream.offset(), 128);
    }

    #[test]
    fn test_skip_overflow_is_invalid_input() {
        let stream = Positioned {
            offset: Mutex::new(u64::MAX - 1),
        };

        match stream.skip(2) {
            Err(InputError::Io(err)) => assert_eq!(err.kind(), io::ErrorKind::InvalidInput),
            other => panic!("unexpected result: {:?}", other),
        }
        assert_eq!(stream.offset(), u64::MAX - 1);
    }
}
