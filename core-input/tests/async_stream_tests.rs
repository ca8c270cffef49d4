//! Behaviour of the buffered stream with a hand-driven producer.

mod common;

use common::{pattern, wait_for, Call, Fixture};
use core_input::{InputError, InputStream, SeekState, Tag, TagType};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::Ordering;
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

#[test]
fn test_creation_schedules_one_resume() {
    let fixture = Fixture::new(64, 32);

    assert_eq!(fixture.log.calls(), vec![Call::Resume]);
    assert!(!fixture.stream.is_ready());
    assert!(!fixture.stream.is_paused());
    assert!(!fixture.stream.is_available());
    assert_eq!(fixture.stream.seek_state(), SeekState::None);
}

#[test]
fn test_bytes_arrive_in_append_order() {
    let fixture = Fixture::new(64, 32);
    let data = Arc::new(pattern(10_000));

    let feeder = {
        let writer = fixture.writer.clone();
        let handle = fixture.handle.clone();
        let data = data.clone();
        thread::spawn(move || {
            let mut position = 0;
            while position < data.len() {
                let writer = writer.clone();
                let data = data.clone();
                let accepted = handle
                    .blocking_call(move || writer.append(&data[position..]))
                    .unwrap();
                if accepted == 0 {
                    thread::sleep(Duration::from_micros(200));
                }
                position += accepted;
            }
            let writer = writer.clone();
            handle.blocking_call(move || writer.set_closed()).unwrap();
        })
    };

    let mut received = Vec::new();
    let mut chunk = [0u8; 7];
    loop {
        let nbytes = fixture.stream.read(&mut chunk).unwrap();
        if nbytes == 0 {
            break;
        }
        received.extend_from_slice(&chunk[..nbytes]);
    }
    feeder.join().unwrap();

    assert_eq!(received, *data);
    assert_eq!(fixture.stream.offset(), 10_000);
    assert!(fixture.stream.is_eof());
}

#[test]
fn test_read_blocks_until_data_is_appended() {
    let fixture = Fixture::new(64, 32);
    let (tx, rx) = mpsc::channel();

    let stream = fixture.stream.clone();
    let reader = thread::spawn(move || {
        let mut buf = [0u8; 16];
        let nbytes = stream.read(&mut buf).unwrap();
        tx.send(buf[..nbytes].to_vec()).unwrap();
    });

    assert!(rx.recv_timeout(Duration::from_millis(50)).is_err());

    fixture.produce(|w| w.append(b"abc"));
    let received = rx.recv_timeout(Duration::from_secs(5)).unwrap();
    reader.join().unwrap();

    assert_eq!(received, b"abc");
    assert!(fixture.stream.is_ready());
}

#[test]
fn test_empty_read_returns_zero() {
    let fixture = Fixture::new(64, 32);
    let mut buf = [0u8; 0];
    assert_eq!(fixture.stream.read(&mut buf).unwrap(), 0);
}

#[test]
fn test_closed_stream_drains_then_reports_eof() {
    let fixture = Fixture::new(64, 32);
    fixture.produce(|w| {
        w.append(b"hello");
        w.set_closed();
    });

    assert!(!fixture.stream.is_eof());
    let mut buf = [0u8; 16];
    assert_eq!(fixture.stream.read(&mut buf).unwrap(), 5);
    assert_eq!(&buf[..5], b"hello");

    assert!(fixture.stream.is_eof());
    assert!(fixture.stream.is_available());
    assert_eq!(fixture.stream.read(&mut buf).unwrap(), 0);
}

#[test]
fn test_known_size_ends_stream_while_open() {
    let fixture = Fixture::new(64, 32);
    fixture.produce(|w| {
        w.set_size(Some(4));
        w.append(b"abcd");
    });

    let mut buf = [0u8; 8];
    assert_eq!(fixture.stream.read(&mut buf).unwrap(), 4);
    assert!(fixture.stream.is_eof());
    assert_eq!(fixture.stream.read(&mut buf).unwrap(), 0);
    assert_eq!(fixture.stream.attributes().remaining(), Some(0));
}

#[test]
fn test_wait_ready_returns_published_attributes() {
    let fixture = Fixture::new(64, 32);

    let stream = fixture.stream.clone();
    let waiter = thread::spawn(move || {
        stream.wait_ready().unwrap();
        (stream.mime_type(), stream.size(), stream.is_seekable())
    });

    fixture.produce(|w| {
        w.set_mime_type("audio/flac");
        w.set_size(Some(1234));
        w.set_seekable(true);
        w.set_ready();
    });

    let (mime_type, size, seekable) = waiter.join().unwrap();
    assert_eq!(mime_type.as_deref(), Some("audio/flac"));
    assert_eq!(size, Some(1234));
    assert!(seekable);
}

#[test]
fn test_wait_ready_fails_when_closed_before_ready() {
    let fixture = Fixture::new(64, 32);
    fixture.produce(|w| w.set_closed());

    assert!(matches!(fixture.stream.wait_ready(), Err(InputError::Closed)));
}

#[test]
fn test_one_resume_per_threshold_crossing() {
    let fixture = Fixture::new(16, 8);

    let (accepted, overflow) = fixture.produce(|w| {
        let accepted = w.append(&[1u8; 16]);
        let overflow = w.append(&[2u8; 4]);
        w.pause();
        (accepted, overflow)
    });
    assert_eq!((accepted, overflow), (16, 0));
    assert!(fixture.stream.is_paused());

    // above the threshold: nothing scheduled
    let mut buf = [0u8; 4];
    fixture.stream.read(&mut buf).unwrap();
    fixture.flush();
    assert_eq!(fixture.log.resumes(), 1);

    // crossing twice while the reactor is busy still yields one resume
    let gate = fixture.hold();
    let mut buf = [0u8; 5];
    fixture.stream.read(&mut buf).unwrap();
    let mut buf = [0u8; 1];
    fixture.stream.read(&mut buf).unwrap();
    drop(gate);
    fixture.flush();

    assert_eq!(fixture.log.resumes(), 2);
    assert!(!fixture.stream.is_paused());

    // not paused any more: further reads schedule nothing
    let mut buf = [0u8; 6];
    fixture.stream.read(&mut buf).unwrap();
    fixture.flush();
    assert_eq!(fixture.log.resumes(), 2);
    assert_eq!(fixture.stream.buffered(), 0);
}

#[test]
fn test_pause_refused_once_consumer_drained_buffer() {
    let fixture = Fixture::new(16, 8);
    assert_eq!(fixture.produce(|w| w.append(&[7u8; 16])), 16);

    // the consumer empties the buffer between the producer's fullness
    // check and its pause: no read is left to schedule a resume
    let mut buf = [0u8; 16];
    fixture.stream.read_full(&mut buf).unwrap();

    assert!(!fixture.produce(|w| w.pause()));
    assert!(!fixture.stream.is_paused());

    // refilled past the threshold, pausing works again
    assert_eq!(fixture.produce(|w| w.append(&[8u8; 16])), 16);
    assert!(fixture.produce(|w| w.pause()));
    assert!(fixture.stream.is_paused());
}

#[test]
fn test_fast_forward_within_buffer_skips_producer() {
    let fixture = Fixture::new(256, 128);
    fixture.ready_with(&pattern(200));

    let mut buf = [0u8; 100];
    fixture.stream.read_full(&mut buf).unwrap();
    assert_eq!(fixture.stream.offset(), 100);

    fixture.stream.seek(150).unwrap();
    assert_eq!(fixture.stream.offset(), 150);
    assert_eq!(fixture.stream.buffered(), 50);

    let mut byte = [0u8; 1];
    fixture.stream.read(&mut byte).unwrap();
    assert_eq!(byte[0], pattern(200)[150]);

    fixture.flush();
    assert!(fixture.log.seeks().is_empty());
}

#[test]
fn test_seek_to_current_offset_is_a_no_op() {
    let fixture = Fixture::new(64, 32);
    fixture.ready_with(b"0123456789");

    fixture.stream.seek(0).unwrap();
    fixture.flush();

    assert!(fixture.log.seeks().is_empty());
    assert_eq!(fixture.stream.buffered(), 10);
}

#[test]
fn test_seek_outside_buffer_clears_and_repositions() {
    let fixture = Fixture::new(64, 32);
    fixture.ready_with(b"0123456789");

    let stream = fixture.stream.clone();
    let seeker = thread::spawn(move || stream.seek(1000));

    wait_for(|| fixture.log.seeks() == vec![1000]);
    assert_eq!(fixture.stream.seek_state(), SeekState::Pending);
    assert_eq!(fixture.stream.buffered(), 0);

    fixture.produce(|w| {
        assert!(w.is_seek_pending());
        w.seek_done();
        w.append(b"xyz");
    });

    seeker.join().unwrap().unwrap();
    assert_eq!(fixture.stream.offset(), 1000);
    assert_eq!(fixture.stream.seek_state(), SeekState::None);

    let mut buf = [0u8; 8];
    let nbytes = fixture.stream.read(&mut buf).unwrap();
    assert_eq!(&buf[..nbytes], b"xyz");
    assert_eq!(fixture.stream.offset(), 1003);
}

#[test]
fn test_backward_seek_goes_through_producer() {
    let fixture = Fixture::new(64, 32);
    fixture.log.complete_seeks.store(true, Ordering::SeqCst);
    fixture.ready_with(b"0123456789");

    let mut buf = [0u8; 6];
    fixture.stream.read_full(&mut buf).unwrap();

    fixture.stream.seek(2).unwrap();
    assert_eq!(fixture.log.seeks(), vec![2]);
    assert_eq!(fixture.stream.offset(), 2);
    assert_eq!(fixture.stream.buffered(), 0);
}

#[test]
fn test_seek_on_paused_producer_resumes_first() {
    let fixture = Fixture::new(16, 8);
    fixture.log.complete_seeks.store(true, Ordering::SeqCst);
    fixture.ready_with(&[0u8; 16]);
    assert!(fixture.produce(|w| w.pause()));

    fixture.stream.seek(500).unwrap();

    assert_eq!(
        fixture.log.calls(),
        vec![Call::Resume, Call::Resume, Call::Seek(500)]
    );
    assert!(!fixture.stream.is_paused());
}

#[test]
fn test_seek_on_unseekable_stream_fails() {
    let fixture = Fixture::new(64, 32);
    fixture.produce(|w| {
        w.set_ready();
        w.append(b"abc");
    });

    assert!(matches!(fixture.stream.seek(100), Err(InputError::NotSeekable)));
    fixture.flush();
    assert!(fixture.log.seeks().is_empty());
}

#[test]
fn test_seek_before_ready_panics() {
    let fixture = Fixture::new(64, 32);
    let stream = fixture.stream.clone();

    let outcome = catch_unwind(AssertUnwindSafe(|| stream.seek(10)));
    assert!(outcome.is_err());
}

#[test]
fn test_seek_while_seek_in_flight_panics() {
    let fixture = Fixture::new(64, 32);
    fixture.ready_with(b"abc");

    let stream = fixture.stream.clone();
    let first = thread::spawn(move || stream.seek(1000));
    wait_for(|| fixture.stream.seek_state() == SeekState::Pending);

    let stream = fixture.stream.clone();
    let second = catch_unwind(AssertUnwindSafe(|| stream.seek(5)));
    assert!(second.is_err());

    fixture.produce(|w| w.seek_done());
    first.join().unwrap().unwrap();
    assert_eq!(fixture.stream.offset(), 1000);
}

#[test]
fn test_read_on_reactor_thread_panics() {
    let fixture = Fixture::new(64, 32);
    let stream = fixture.stream.clone();

    let panicked = fixture
        .handle
        .blocking_call(move || {
            catch_unwind(AssertUnwindSafe(|| {
                let mut buf = [0u8; 4];
                stream.read(&mut buf)
            }))
            .is_err()
        })
        .unwrap();

    assert!(panicked);
}

#[test]
fn test_failed_seek_reports_error_to_seeker() {
    let fixture = Fixture::new(64, 32);
    fixture.ready_with(b"abc");
    *fixture.log.seek_error.lock() = Some(InputError::Http {
        status: 416,
        uri: "test://stream".to_string(),
    });

    let err = fixture.stream.seek(1000).unwrap_err();
    assert!(matches!(err, InputError::Http { status: 416, .. }));
    assert_eq!(fixture.stream.seek_state(), SeekState::None);

    // reported once
    fixture.stream.check().unwrap();
}

#[test]
fn test_panicking_producer_becomes_internal_error() {
    let fixture = Fixture::new(64, 32);
    fixture.ready_with(b"abc");
    fixture.log.panic_on_seek.store(true, Ordering::SeqCst);

    let err = fixture.stream.seek(1000).unwrap_err();
    match err {
        InputError::Internal(message) => assert!(message.contains("seek exploded")),
        other => panic!("unexpected error: {:?}", other),
    }

    // the reactor survived
    fixture.flush();
}

#[test]
fn test_postponed_error_is_reported_once() {
    let fixture = Fixture::new(64, 32);
    fixture.produce(|w| {
        w.set_ready();
        w.postpone_error(InputError::Source("first".to_string()));
        w.postpone_error(InputError::Source("second".to_string()));
    });

    let mut buf = [0u8; 8];
    match fixture.stream.read(&mut buf) {
        Err(InputError::Source(message)) => assert_eq!(message, "first"),
        other => panic!("unexpected result: {:?}", other),
    }

    fixture.produce(|w| w.append(b"ok"));
    assert_eq!(fixture.stream.read(&mut buf).unwrap(), 2);
}

#[test]
fn test_postponed_error_wakes_blocked_reader() {
    let fixture = Fixture::new(64, 32);

    let stream = fixture.stream.clone();
    let reader = thread::spawn(move || {
        let mut buf = [0u8; 8];
        stream.read(&mut buf)
    });

    thread::sleep(Duration::from_millis(20));
    fixture.produce(|w| w.postpone_error(InputError::Source("connection reset".to_string())));

    assert!(matches!(reader.join().unwrap(), Err(InputError::Source(_))));
}

#[test]
fn test_fatal_error_is_sticky() {
    let fixture = Fixture::new(64, 32);
    fixture.produce(|w| {
        w.append(b"abc");
        w.fail(InputError::Source("gone".to_string()));
    });

    let mut buf = [0u8; 8];
    assert!(matches!(fixture.stream.read(&mut buf), Err(InputError::Source(_))));
    assert!(matches!(fixture.stream.read(&mut buf), Err(InputError::Source(_))));
    assert!(fixture.stream.check().is_err());
    assert!(fixture.stream.is_available());
}

#[test]
fn test_close_during_pending_seek_is_ignored() {
    let fixture = Fixture::new(64, 32);
    fixture.ready_with(b"abc");

    let stream = fixture.stream.clone();
    let seeker = thread::spawn(move || stream.seek(1000));
    wait_for(|| fixture.stream.seek_state() == SeekState::Pending);

    // the old connection ending must not end the stream
    fixture.produce(|w| w.set_closed());
    assert!(!fixture.stream.is_eof());
    assert!(!fixture.stream.is_available());

    fixture.produce(|w| w.seek_done());
    seeker.join().unwrap().unwrap();
    assert!(!fixture.stream.is_eof());
    fixture.produce(|w| w.append(b"new"));
    let mut buf = [0u8; 8];
    assert_eq!(fixture.stream.read(&mut buf).unwrap(), 3);
}

#[test]
fn test_dropped_stream_never_calls_producer() {
    let fixture = Fixture::new(16, 8);
    fixture.produce(|w| {
        w.append(&[0u8; 16]);
        w.pause();
    });

    let gate = fixture.hold();
    let mut buf = [0u8; 12];
    fixture.stream.read_full(&mut buf).unwrap();

    let Fixture {
        event_loop,
        handle,
        stream,
        writer,
        log,
    } = fixture;
    drop(stream);
    drop(gate);
    common::flush(&handle);

    assert_eq!(log.calls(), vec![Call::Resume]);
    assert!(!writer.is_alive());
    let writer_after = writer.clone();
    let accepted = handle
        .blocking_call(move || writer_after.append(b"late"))
        .unwrap();
    assert_eq!(accepted, 0);
    drop(event_loop);
}

#[test]
fn test_tag_is_consumed_once() {
    let fixture = Fixture::new(64, 32);
    fixture.produce(|w| w.set_tag(Tag::new().with(TagType::Title, "Intro")));

    let tag = fixture.stream.read_tag().unwrap();
    assert_eq!(tag.get(TagType::Title), Some("Intro"));
    assert!(fixture.stream.read_tag().is_none());
}

#[test]
fn test_commit_write_fills_buffer_in_place() {
    let fixture = Fixture::new(8, 4);
    let written = fixture.produce(|w| {
        w.commit_write(|region| {
            region[..3].copy_from_slice(b"xyz");
            3
        })
    });
    assert_eq!(written, 3);

    let mut buf = [0u8; 8];
    let nbytes = fixture.stream.read(&mut buf).unwrap();
    assert_eq!(&buf[..nbytes], b"xyz");
}
