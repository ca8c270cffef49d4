//! `std::io` adapter for input streams.
//!
//! Decoder libraries want `Read + Seek`. [`InputStreamReader`] wraps any
//! shared [`InputStream`] and logs stream failures before turning them into
//! `io::Error`, since decoders tend to swallow the error details.

use crate::stream::InputStream;
use std::fmt;
use std::io::{self, Read, Seek, SeekFrom};
use std::sync::Arc;
use tracing::error;

pub struct InputStreamReader {
    stream: Arc<dyn InputStream>,
}

impl InputStreamReader {
    pub fn new(stream: Arc<dyn InputStream>) -> Self {
        Self { stream }
    }

    pub fn stream(&self) -> &Arc<dyn InputStream> {
        &self.stream
    }

    pub fn into_inner(self) -> Arc<dyn InputStream> {
        self.stream
    }
}

impl Read for InputStreamReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.stream.read(buf).map_err(|err| {
            error!(uri = %self.stream.uri(), error = %err, "Input stream read failed");
            io::Error::from(err)
        })
    }
}

impl Seek for InputStreamReader {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let target = match pos {
            SeekFrom::Start(offset) => Some(offset),
            SeekFrom::Current(delta) => self.stream.offset().checked_add_signed(delta),
            SeekFrom::End(delta) => match self.stream.size() {
                Some(size) => size.checked_add_signed(delta),
                None => {
                    return Err(io::Error::new(
                        io::ErrorKind::Unsupported,
                        "stream size unknown",
                    ))
                }
            },
        };

        let Some(target) = target else {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "seek to a negative or overflowing position",
            ));
        };

        self.stream.seek(target).map_err(|err| {
            error!(uri = %self.stream.uri(), offset = target, error = %err, "Input stream seek failed");
            io::Error::from(err)
        })?;

        Ok(self.stream.offset())
    }

    fn stream_position(&mut self) -> io::Result<u64> {
        Ok(self.stream.offset())
    }
}

#[cfg(feature = "symphonia")]
impl symphonia::core::io::MediaSource for InputStreamReader {
    fn is_seekable(&self) -> bool {
        self.stream.is_seekable()
    }

    fn byte_len(&self) -> Option<u64> {
        self.stream.size()
    }
}

impl fmt::Debug for InputStreamReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InputStreamReader")
            .field("uri", &self.stream.uri())
            .field("offset", &self.stream.offset())
            .finish()
    }
}
