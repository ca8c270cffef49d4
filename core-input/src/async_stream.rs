//! # Buffered Asynchronous Input Stream
//!
//! [`AsyncInputStream`] connects a producer living on the reactor thread to a
//! consumer blocking on a worker thread.
//!
//! ## Architecture
//!
//! ```text
//!   reactor thread                              worker thread
//! ┌────────────────┐  StreamWriter  ┌─────────────────────┐  read/seek  ┌──────────┐
//! │ StreamProducer ├───────────────>│ RingBuffer + State  │<────────────┤ consumer │
//! └───────▲────────┘   (append)     │ (Mutex + Condvar)   │  (blocks)   └──────────┘
//!         │                         └──────────┬──────────┘
//!         │     deferred resume / deferred seek│
//!         └────────────────────────────────────┘
//! ```
//!
//! - **Backpressure**: a producer that finds no free space calls
//!   [`StreamWriter::pause`]. Once a read drops occupancy below `resume_at`,
//!   one resume is deferred to the reactor, which calls
//!   [`StreamProducer::resume`].
//! - **Seeking**: a seek into buffered data just discards bytes. Any other
//!   seek moves through `None -> Scheduled -> Pending -> None`: the consumer
//!   schedules it and blocks, the reactor clears the buffer and calls
//!   [`StreamProducer::seek`], and the producer finishes with
//!   [`StreamWriter::seek_done`] or a postponed error.
//! - **Failures**: the reactor never returns an error to the consumer
//!   directly. It stores one in the postponed slot, and the next consumer
//!   call reports it once. [`StreamWriter::fail`] records a fatal error that
//!   is reported by every later call.
//!
//! The producer starts paused. Constructing the stream schedules the first
//! resume, which is where a producer opens its source.

use crate::config::BufferConfig;
use crate::error::{InputError, Result};
use crate::ring_buffer::RingBuffer;
use crate::stream::{InputStream, StreamAttributes};
use crate::tag::Tag;
use core_event::sync::{Condvar, Mutex};
use core_event::{DeferredEvent, EventLoopHandle};
use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Weak};
use tracing::{debug, error, trace, warn};

/// Progress of an out-of-buffer seek.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekState {
    /// No seek in flight
    None,
    /// Requested by the consumer, not yet picked up by the reactor
    Scheduled,
    /// Buffer cleared, producer is repositioning
    Pending,
}

/// The I/O-specific half of a buffered stream.
///
/// Hooks run on the reactor thread with no stream lock held. Errors they
/// return are postponed for the consumer; so are panics.
pub trait StreamProducer: Send {
    /// Buffer space became available again, or the stream was just created.
    fn resume(&mut self, writer: &StreamWriter) -> Result<()>;

    /// Reposition the source at `offset` and call
    /// [`StreamWriter::seek_done`] once data from there can be appended.
    /// This may happen later, from a task on the reactor.
    fn seek(&mut self, writer: &StreamWriter, offset: u64) -> Result<()>;
}

/// Bounded buffer between a reactor-side producer and a blocking consumer.
pub struct AsyncInputStream {
    shared: Arc<Shared>,
}

struct Shared {
    uri: String,
    event_loop: EventLoopHandle,
    resume_at: usize,
    state: Mutex<State>,
    cond: Condvar,
    producer: Mutex<Box<dyn StreamProducer>>,
    deferred_resume: DeferredEvent,
    deferred_seek: DeferredEvent,
}

struct State {
    attrs: StreamAttributes,
    buffer: RingBuffer,
    /// Cleared when the producer reports the end of its source
    open: bool,
    paused: bool,
    seek_state: SeekState,
    seek_offset: u64,
    postponed: Option<InputError>,
    fatal: Option<InputError>,
    tag: Option<Tag>,
}

impl State {
    fn check(&mut self) -> Result<()> {
        if let Some(err) = &self.fatal {
            return Err(err.clone());
        }
        match self.postponed.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn is_eof(&self) -> bool {
        matches!(self.attrs.size, Some(size) if self.attrs.offset >= size)
            || (!self.open && self.buffer.is_empty())
    }

    fn is_available(&self) -> bool {
        self.postponed.is_some() || self.fatal.is_some() || self.is_eof() || !self.buffer.is_empty()
    }

    fn wants_resume(&self, resume_at: usize) -> bool {
        self.paused && self.buffer.len() < resume_at
    }
}

impl AsyncInputStream {
    /// Creates the stream and schedules the producer's first resume.
    ///
    /// # Panics
    ///
    /// Panics if `config` is inconsistent (see [`BufferConfig::new`]).
    pub fn new(
        event_loop: EventLoopHandle,
        uri: impl Into<String>,
        config: BufferConfig,
        producer: Box<dyn StreamProducer>,
    ) -> Self {
        config.assert_valid();
        let uri = uri.into();

        let shared = Arc::new_cyclic(|weak: &Weak<Shared>| {
            let resume_target = weak.clone();
            let deferred_resume = DeferredEvent::new(event_loop.clone(), move || {
                if let Some(shared) = resume_target.upgrade() {
                    shared.run_resume();
                }
            });

            let seek_target = weak.clone();
            let deferred_seek = DeferredEvent::new(event_loop.clone(), move || {
                if let Some(shared) = seek_target.upgrade() {
                    shared.run_seek();
                }
            });

            Shared {
                uri,
                event_loop,
                resume_at: config.resume_at,
                state: Mutex::new(State {
                    attrs: StreamAttributes::default(),
                    buffer: RingBuffer::new(config.buffer_size),
                    open: true,
                    paused: true,
                    seek_state: SeekState::None,
                    seek_offset: 0,
                    postponed: None,
                    fatal: None,
                    tag: None,
                }),
                cond: Condvar::new(),
                producer: Mutex::new(producer),
                deferred_resume,
                deferred_seek,
            }
        });

        debug!(
            uri = %shared.uri,
            buffer_size = config.buffer_size,
            resume_at = config.resume_at,
            "Created buffered input stream"
        );
        shared.schedule_resume();

        Self { shared }
    }

    pub fn event_loop(&self) -> &EventLoopHandle {
        &self.shared.event_loop
    }

    /// Bytes currently buffered.
    pub fn buffered(&self) -> usize {
        self.shared.state.lock().buffer.len()
    }

    pub fn is_paused(&self) -> bool {
        self.shared.state.lock().paused
    }

    pub fn seek_state(&self) -> SeekState {
        self.shared.state.lock().seek_state
    }

    fn assert_outside(&self, operation: &str) {
        assert!(
            !self.shared.event_loop.is_inside(),
            "{} on '{}' called from the reactor thread",
            operation,
            self.shared.uri
        );
    }
}

impl InputStream for AsyncInputStream {
    fn uri(&self) -> &str {
        &self.shared.uri
    }

    fn check(&self) -> Result<()> {
        self.shared.state.lock().check()
    }

    fn is_ready(&self) -> bool {
        self.shared.state.lock().attrs.ready
    }

    fn wait_ready(&self) -> Result<()> {
        self.assert_outside("wait_ready");

        let mut state = self.shared.state.lock();
        loop {
            state.check()?;
            if state.attrs.ready {
                return Ok(());
            }
            if !state.open {
                return Err(InputError::Closed);
            }
            self.shared.cond.wait(&mut state);
        }
    }

    fn mime_type(&self) -> Option<String> {
        self.shared.state.lock().attrs.mime_type.clone()
    }

    fn size(&self) -> Option<u64> {
        self.shared.state.lock().attrs.size
    }

    fn offset(&self) -> u64 {
        self.shared.state.lock().attrs.offset
    }

    fn is_seekable(&self) -> bool {
        self.shared.state.lock().attrs.seekable
    }

    fn attributes(&self) -> StreamAttributes {
        self.shared.state.lock().attrs.clone()
    }

    fn is_eof(&self) -> bool {
        self.shared.state.lock().is_eof()
    }

    fn is_available(&self) -> bool {
        self.shared.state.lock().is_available()
    }

    fn read(&self, buf: &mut [u8]) -> Result<usize> {
        self.assert_outside("read");

        let shared = &self.shared;
        let mut state = shared.state.lock();
        if buf.is_empty() {
            return state.check().map(|_| 0);
        }

        loop {
            state.check()?;
            if !state.buffer.is_empty() || state.is_eof() {
                break;
            }
            shared.cond.wait(&mut state);
        }

        let nbytes = state.buffer.read(buf);
        state.attrs.offset += nbytes as u64;

        let resume = state.wants_resume(shared.resume_at);
        drop(state);

        if resume {
            shared.schedule_resume();
        }

        Ok(nbytes)
    }

    fn seek(&self, new_offset: u64) -> Result<()> {
        self.assert_outside("seek");

        let shared = &self.shared;
        let mut state = shared.state.lock();
        assert!(
            state.attrs.ready,
            "seek on '{}' before the stream is ready",
            shared.uri
        );
        assert_eq!(
            state.seek_state,
            SeekState::None,
            "seek on '{}' while another seek is in flight",
            shared.uri
        );

        state.check()?;

        if new_offset == state.attrs.offset {
            return Ok(());
        }

        if !state.attrs.seekable {
            return Err(InputError::NotSeekable);
        }

        // fast-forward inside the buffer
        if new_offset > state.attrs.offset {
            let distance = new_offset - state.attrs.offset;
            if distance <= state.buffer.len() as u64 {
                state.buffer.consume(distance as usize);
                state.attrs.offset = new_offset;
                trace!(uri = %shared.uri, offset = new_offset, "Seek satisfied from buffer");

                let resume = state.wants_resume(shared.resume_at);
                drop(state);
                if resume {
                    shared.schedule_resume();
                }
                return Ok(());
            }
        }

        state.seek_offset = new_offset;
        state.seek_state = SeekState::Scheduled;
        if !shared.deferred_seek.schedule() {
            state.seek_state = SeekState::None;
            return Err(InputError::Closed);
        }

        while state.seek_state != SeekState::None {
            shared.cond.wait(&mut state);
        }

        state.check()
    }

    fn read_tag(&self) -> Option<Tag> {
        self.shared.state.lock().tag.take()
    }
}

impl Shared {
    fn writer(self: &Arc<Self>) -> StreamWriter {
        StreamWriter {
            shared: Arc::downgrade(self),
            event_loop: self.event_loop.clone(),
        }
    }

    fn schedule_resume(&self) {
        if !self.deferred_resume.schedule() {
            warn!(uri = %self.uri, "Event loop is gone, stream cannot resume");
            let mut state = self.state.lock();
            if state.fatal.is_none() {
                state.fatal = Some(InputError::Closed);
            }
            self.cond.notify_all();
        }
    }

    fn run_resume(self: &Arc<Self>) {
        {
            let mut state = self.state.lock();
            if !state.paused {
                return;
            }
            state.paused = false;
        }

        trace!(uri = %self.uri, "Resuming producer");
        self.call_producer(|producer, writer| producer.resume(writer));
    }

    fn run_seek(self: &Arc<Self>) {
        let (offset, was_paused) = {
            let mut state = self.state.lock();
            if state.seek_state != SeekState::Scheduled {
                return;
            }
            state.seek_state = SeekState::Pending;
            state.buffer.clear();
            (state.seek_offset, std::mem::take(&mut state.paused))
        };

        debug!(uri = %self.uri, offset, "Seeking producer");
        self.call_producer(|producer, writer| {
            if was_paused {
                producer.resume(writer)?;
            }
            producer.seek(writer, offset)
        });
    }

    fn call_producer<F>(self: &Arc<Self>, hook: F)
    where
        F: FnOnce(&mut dyn StreamProducer, &StreamWriter) -> Result<()>,
    {
        let writer = self.writer();
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            let mut producer = self.producer.lock();
            hook(&mut **producer, &writer)
        }));

        match outcome {
            Ok(Ok(())) => {}
            Ok(Err(err)) => writer.postpone_error(err),
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                error!(uri = %self.uri, panic = %message, "Stream producer panicked");
                writer.postpone_error(InputError::Internal(message));
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "producer panicked".to_string()
    }
}

impl Drop for AsyncInputStream {
    fn drop(&mut self) {
        self.shared.deferred_resume.cancel();
        self.shared.deferred_seek.cancel();
        trace!(uri = %self.shared.uri, "Dropping buffered input stream");
    }
}

impl fmt::Debug for AsyncInputStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.shared.state.lock();
        f.debug_struct("AsyncInputStream")
            .field("uri", &self.shared.uri)
            .field("attributes", &state.attrs)
            .field("buffered", &state.buffer.len())
            .field("paused", &state.paused)
            .field("seek_state", &state.seek_state)
            .finish()
    }
}

/// Producer-side handle to an [`AsyncInputStream`].
///
/// Every method must be called on the reactor thread. The writer does not
/// keep the stream alive: once the stream is dropped all calls are no-ops
/// and [`is_alive`](Self::is_alive) returns `false`.
#[derive(Clone)]
pub struct StreamWriter {
    shared: Weak<Shared>,
    event_loop: EventLoopHandle,
}

impl StreamWriter {
    fn with_state<R>(&self, f: impl FnOnce(&mut State, &Shared) -> R) -> Option<R> {
        assert!(
            self.event_loop.is_inside(),
            "StreamWriter used outside the reactor thread"
        );
        let shared = self.shared.upgrade()?;
        let mut state = shared.state.lock();
        Some(f(&mut *state, &*shared))
    }

    /// Returns `false` once the consumer has dropped the stream.
    pub fn is_alive(&self) -> bool {
        self.shared.strong_count() > 0
    }

    pub fn event_loop(&self) -> &EventLoopHandle {
        &self.event_loop
    }

    pub fn set_mime_type(&self, mime_type: impl Into<String>) {
        let mime_type = mime_type.into();
        self.with_state(|state, _| state.attrs.mime_type = Some(mime_type));
    }

    pub fn set_size(&self, size: Option<u64>) {
        self.with_state(|state, _| state.attrs.size = size);
    }

    pub fn set_seekable(&self, seekable: bool) {
        self.with_state(|state, _| state.attrs.seekable = seekable);
    }

    /// Publishes the attributes set so far and wakes waiters.
    pub fn set_ready(&self) {
        self.with_state(|state, shared| {
            if !state.attrs.ready {
                state.attrs.ready = true;
                shared.cond.notify_all();
            }
        });
    }

    /// Copies as much of `data` as fits. Returns the number of bytes taken,
    /// zero when the buffer is full.
    ///
    /// Marks the stream ready if it was not already.
    pub fn append(&self, data: &[u8]) -> usize {
        self.with_state(|state, shared| {
            let nbytes = state.buffer.write(data);
            state.attrs.ready = true;
            shared.cond.notify_all();
            nbytes
        })
        .unwrap_or(0)
    }

    /// Lets `fill` write directly into the largest contiguous free region
    /// and publishes the byte count it returns.
    ///
    /// `fill` runs under the stream lock and must not call back into the
    /// writer.
    pub fn commit_write<F>(&self, fill: F) -> usize
    where
        F: FnOnce(&mut [u8]) -> usize,
    {
        self.with_state(|state, shared| {
            let region = state.buffer.write_region();
            let available = region.len();
            let nbytes = fill(region);
            assert!(
                nbytes <= available,
                "committed {} bytes into a {} byte region",
                nbytes,
                available
            );
            state.buffer.commit(nbytes);
            state.attrs.ready = true;
            shared.cond.notify_all();
            nbytes
        })
        .unwrap_or(0)
    }

    pub fn free_space(&self) -> usize {
        self.with_state(|state, _| state.buffer.free_space())
            .unwrap_or(0)
    }

    /// Records that the producer stopped because the buffer is full.
    ///
    /// The occupancy is checked under the same lock: if the consumer has
    /// already drained the buffer below `resume_at`, no read would ever
    /// schedule a resume, so the stream stays unpaused and `false` is
    /// returned. The producer must keep writing in that case.
    pub fn pause(&self) -> bool {
        self.with_state(|state, shared| {
            if state.buffer.len() < shared.resume_at {
                trace!(uri = %shared.uri, "Buffer drained before pause, not pausing");
                return false;
            }
            state.paused = true;
            true
        })
        .unwrap_or(false)
    }

    pub fn is_paused(&self) -> bool {
        self.with_state(|state, _| state.paused).unwrap_or(true)
    }

    pub fn set_tag(&self, tag: Tag) {
        self.with_state(|state, _| state.tag = Some(tag));
    }

    /// The source has no more data.
    ///
    /// Ignored while a seek is pending: the producer is expected to drop its
    /// old connection before reopening at the new offset.
    pub fn set_closed(&self) {
        self.with_state(|state, shared| {
            if state.seek_state == SeekState::Pending {
                trace!(uri = %shared.uri, "Ignoring close during seek");
                return;
            }
            state.open = false;
            shared.cond.notify_all();
        });
    }

    pub fn is_seek_pending(&self) -> bool {
        self.with_state(|state, _| state.seek_state == SeekState::Pending)
            .unwrap_or(false)
    }

    /// Completes a pending seek: the stream is open again and positioned at
    /// the requested offset.
    ///
    /// # Panics
    ///
    /// Panics if no seek is pending.
    pub fn seek_done(&self) {
        self.with_state(|state, shared| {
            assert_eq!(
                state.seek_state,
                SeekState::Pending,
                "seek_done on '{}' without a pending seek",
                shared.uri
            );
            state.open = true;
            state.attrs.offset = state.seek_offset;
            state.seek_state = SeekState::None;
            debug!(uri = %shared.uri, offset = state.seek_offset, "Seek complete");
            shared.cond.notify_all();
        });
    }

    /// Hands `err` to the next consumer call and ends any seek in flight.
    ///
    /// The slot holds one error. While an earlier error is still
    /// undelivered, `err` is logged at `warn` and discarded: the first
    /// failure is the cause, later ones are usually its consequences. Use
    /// [`fail`](Self::fail) for a failure every later call must see.
    pub fn postpone_error(&self, err: InputError) {
        self.with_state(|state, shared| {
            state.seek_state = SeekState::None;
            match &state.postponed {
                Some(existing) => warn!(
                    uri = %shared.uri,
                    error = %err,
                    pending = %existing,
                    "Dropping error, an earlier one is still undelivered"
                ),
                None => {
                    debug!(uri = %shared.uri, error = %err, "Postponing stream error");
                    state.postponed = Some(err);
                }
            }
            shared.cond.notify_all();
        });
    }

    /// Fails the stream for good: every later consumer call returns `err`.
    pub fn fail(&self, err: InputError) {
        self.with_state(|state, shared| {
            warn!(uri = %shared.uri, error = %err, "Input stream failed");
            state.seek_state = SeekState::None;
            state.open = false;
            if state.fatal.is_none() {
                state.fatal = Some(err);
            }
            shared.cond.notify_all();
        });
    }
}

impl fmt::Debug for StreamWriter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamWriter")
            .field("alive", &self.is_alive())
            .finish()
    }
}
