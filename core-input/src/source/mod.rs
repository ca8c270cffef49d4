//! # Stream Producers
//!
//! Concrete [`StreamProducer`]s that feed an [`AsyncInputStream`] from an
//! `AsyncRead` source.
//!
//! [`Pump`] holds the transport-independent logic: it runs as a task on the
//! reactor, copies bytes into the stream while there is room, pauses when
//! the buffer is full and reopens the source when the consumer seeks. A
//! [`SourceOpener`] supplies the transport: local files or HTTP.

mod file;
#[cfg(feature = "http")]
mod http;

pub use file::{open_file, FileOpener};
#[cfg(feature = "http")]
pub use http::{open_http, HttpOpener};

use crate::async_stream::{AsyncInputStream, StreamProducer, StreamWriter};
use crate::config::BufferConfig;
use crate::error::{InputError, Result};
use async_trait::async_trait;
use core_event::sync::Notify;
use core_event::EventLoopHandle;
use core_runtime::config::InputSettings;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::task::JoinHandle;
use tracing::{debug, trace};

/// A source positioned at the requested offset.
pub struct OpenedSource {
    pub reader: Box<dyn AsyncRead + Send + Unpin>,
    /// Total size of the resource, not the remaining length
    pub size: Option<u64>,
    pub seekable: bool,
    pub mime_type: Option<String>,
}

impl fmt::Debug for OpenedSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenedSource")
            .field("size", &self.size)
            .field("seekable", &self.seekable)
            .field("mime_type", &self.mime_type)
            .finish_non_exhaustive()
    }
}

/// Opens a transport at a byte offset.
///
/// Called on the reactor thread, from a task spawned by [`Pump`].
#[async_trait]
pub trait SourceOpener: Send + Sync + 'static {
    async fn open(&self, offset: u64) -> Result<OpenedSource>;
}

/// Generic producer pulling from a [`SourceOpener`].
pub struct Pump {
    opener: Arc<dyn SourceOpener>,
    chunk_size: usize,
    wake: Arc<Notify>,
    task: Option<JoinHandle<()>>,
}

impl Pump {
    pub fn new(opener: Arc<dyn SourceOpener>, chunk_size: usize) -> Self {
        assert!(chunk_size > 0, "chunk_size must be non-zero");
        Self {
            opener,
            chunk_size,
            wake: Arc::new(Notify::new()),
            task: None,
        }
    }

    fn start(&mut self, writer: &StreamWriter, offset: u64, seeking: bool) {
        if let Some(task) = self.task.take() {
            task.abort();
        }

        // a fresh Notify so permits meant for the old task are not inherited
        self.wake = Arc::new(Notify::new());

        let run = PumpTask {
            opener: self.opener.clone(),
            writer: writer.clone(),
            wake: self.wake.clone(),
            chunk_size: self.chunk_size,
        };
        self.task = Some(writer.event_loop().spawn(run.run(offset, seeking)));
    }
}

impl StreamProducer for Pump {
    fn resume(&mut self, writer: &StreamWriter) -> Result<()> {
        if self.task.is_none() {
            self.start(writer, 0, false);
        } else {
            self.wake.notify_one();
        }
        Ok(())
    }

    fn seek(&mut self, writer: &StreamWriter, offset: u64) -> Result<()> {
        self.start(writer, offset, true);
        Ok(())
    }
}

impl Drop for Pump {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl fmt::Debug for Pump {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pump")
            .field("chunk_size", &self.chunk_size)
            .field("running", &self.task.as_ref().map(|t| !t.is_finished()))
            .finish()
    }
}

struct PumpTask {
    opener: Arc<dyn SourceOpener>,
    writer: StreamWriter,
    wake: Arc<Notify>,
    chunk_size: usize,
}

impl PumpTask {
    async fn run(self, offset: u64, seeking: bool) {
        let writer = &self.writer;

        let source = match self.opener.open(offset).await {
            Ok(source) => source,
            Err(err) => {
                writer.postpone_error(err);
                writer.set_closed();
                return;
            }
        };

        debug!(offset, size = ?source.size, seekable = source.seekable, "Source opened");
        if let Some(mime_type) = source.mime_type {
            writer.set_mime_type(mime_type);
        }
        writer.set_size(source.size);
        writer.set_seekable(source.seekable);
        writer.set_ready();
        if seeking && writer.is_seek_pending() {
            writer.seek_done();
        }

        let mut reader = source.reader;
        let mut chunk = vec![0u8; self.chunk_size];
        loop {
            if !writer.is_alive() {
                trace!("Stream dropped, stopping pump");
                return;
            }

            let free = writer.free_space();
            if free == 0 {
                if writer.pause() {
                    self.wake.notified().await;
                }
                continue;
            }

            let want = free.min(chunk.len());
            let nbytes = match reader.read(&mut chunk[..want]).await {
                Ok(nbytes) => nbytes,
                Err(err) => {
                    writer.postpone_error(InputError::from(err));
                    writer.set_closed();
                    return;
                }
            };

            if nbytes == 0 {
                trace!("Source exhausted");
                writer.set_closed();
                return;
            }

            writer.append(&chunk[..nbytes]);
        }
    }
}

/// Opens `uri` with the producer that handles its scheme.
///
/// Plain paths and `file://` URIs are read from disk. `http://` and
/// `https://` need the `http` feature.
pub fn open_uri(
    event_loop: &EventLoopHandle,
    uri: &str,
    settings: &InputSettings,
) -> Result<AsyncInputStream> {
    let config = BufferConfig::from(settings);

    if let Some(path) = uri.strip_prefix("file://") {
        return Ok(open_file(event_loop, Path::new(path), config));
    }

    if uri.starts_with('/') {
        return Ok(open_file(event_loop, Path::new(uri), config));
    }

    if uri.starts_with("http://") || uri.starts_with("https://") {
        #[cfg(feature = "http")]
        return open_http(event_loop, uri, settings);

        #[cfg(not(feature = "http"))]
        return Err(InputError::Unsupported(uri.to_string()));
    }

    Err(InputError::Unsupported(uri.to_string()))
}
