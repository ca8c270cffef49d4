//! Shared fixtures: a real event loop plus a producer that records every hook
//! call, so tests can drive the producer side by hand.

#![allow(dead_code)]

use core_event::{EventLoop, EventLoopHandle};
use core_input::{AsyncInputStream, BufferConfig, InputError, Result, StreamProducer, StreamWriter};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Resume,
    Seek(u64),
}

#[derive(Default)]
pub struct Recorder {
    pub calls: Mutex<Vec<Call>>,
    pub writer: Mutex<Option<StreamWriter>>,
    /// Returned by the next seek hook
    pub seek_error: Mutex<Option<InputError>>,
    /// Complete seeks from inside the hook
    pub complete_seeks: AtomicBool,
    pub panic_on_seek: AtomicBool,
}

impl Recorder {
    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    pub fn seeks(&self) -> Vec<u64> {
        self.calls
            .lock()
            .iter()
            .filter_map(|call| match call {
                Call::Seek(offset) => Some(*offset),
                Call::Resume => None,
            })
            .collect()
    }

    pub fn resumes(&self) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|call| **call == Call::Resume)
            .count()
    }
}

pub struct RecordingProducer {
    log: Arc<Recorder>,
}

impl StreamProducer for RecordingProducer {
    fn resume(&mut self, writer: &StreamWriter) -> Result<()> {
        self.log.calls.lock().push(Call::Resume);
        self.log
            .writer
            .lock()
            .get_or_insert_with(|| writer.clone());
        Ok(())
    }

    fn seek(&mut self, writer: &StreamWriter, offset: u64) -> Result<()> {
        self.log.calls.lock().push(Call::Seek(offset));
        if self.log.panic_on_seek.load(Ordering::SeqCst) {
            panic!("seek exploded");
        }
        if let Some(err) = self.log.seek_error.lock().take() {
            return Err(err);
        }
        if self.log.complete_seeks.load(Ordering::SeqCst) {
            writer.seek_done();
        }
        Ok(())
    }
}

pub struct Fixture {
    pub event_loop: EventLoop,
    pub handle: EventLoopHandle,
    pub stream: Arc<AsyncInputStream>,
    pub writer: StreamWriter,
    pub log: Arc<Recorder>,
}

impl Fixture {
    pub fn new(buffer_size: usize, resume_at: usize) -> Self {
        let event_loop = EventLoop::start("input-test").unwrap();
        let handle = event_loop.handle();
        let log = Arc::new(Recorder::default());

        let stream = Arc::new(AsyncInputStream::new(
            handle.clone(),
            "test://stream",
            BufferConfig::new(buffer_size, resume_at),
            Box::new(RecordingProducer { log: log.clone() }),
        ));

        flush(&handle);
        let writer = log
            .writer
            .lock()
            .clone()
            .expect("initial resume captured the writer");

        Self {
            event_loop,
            handle,
            stream,
            writer,
            log,
        }
    }

    /// Runs `f` against the writer on the reactor thread and waits for it.
    pub fn produce<R, F>(&self, f: F) -> R
    where
        F: FnOnce(&StreamWriter) -> R + Send + 'static,
        R: Send + 'static,
    {
        let writer = self.writer.clone();
        self.handle
            .blocking_call(move || f(&writer))
            .expect("event loop alive")
    }

    /// Marks the stream ready and seekable and buffers `data`.
    pub fn ready_with(&self, data: &[u8]) {
        let data = data.to_vec();
        let expected = data.len();
        let accepted = self.produce(move |w| {
            w.set_seekable(true);
            w.set_ready();
            w.append(&data)
        });
        assert_eq!(accepted, expected, "buffer too small for fixture data");
    }

    pub fn flush(&self) {
        flush(&self.handle);
    }

    pub fn hold(&self) -> mpsc::Sender<()> {
        hold(&self.handle)
    }
}

pub fn flush(handle: &EventLoopHandle) {
    handle.blocking_call(|| ()).expect("event loop alive");
}

/// Blocks the reactor until the returned sender is used or dropped.
pub fn hold(handle: &EventLoopHandle) -> mpsc::Sender<()> {
    let (tx, rx) = mpsc::channel::<()>();
    handle.schedule(move || {
        let _ = rx.recv();
    });
    tx
}

pub fn wait_for(mut condition: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(Instant::now() < deadline, "condition not reached in time");
        thread::sleep(Duration::from_millis(1));
    }
}

pub fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}
