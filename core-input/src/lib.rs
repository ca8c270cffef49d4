//! # Input Stream Module
//!
//! Byte streams feeding the decoders.
//!
//! ## Overview
//!
//! This module handles:
//! - The [`InputStream`] abstraction consumed by decoder threads
//! - [`AsyncInputStream`]: bounded buffering between a reactor-side producer
//!   and a blocking consumer, with backpressure and seeking
//! - [`ProxyInputStream`]: a stream handed out before its source is known
//! - Producers for local files and (feature `http`) HTTP resources
//! - A `std::io::Read + Seek` adapter for decoder libraries
//!
//! ## Usage
//!
//! ```rust,no_run
//! use core_event::EventLoop;
//! use core_input::{open_uri, InputStream};
//! use core_runtime::config::InputSettings;
//!
//! let event_loop = EventLoop::start("io").unwrap();
//! let stream = open_uri(&event_loop.handle(), "/music/song.flac", &InputSettings::default()).unwrap();
//!
//! stream.wait_ready().unwrap();
//! let mut header = [0u8; 4];
//! stream.read_full(&mut header).unwrap();
//! ```

pub mod async_stream;
pub mod config;
pub mod error;
pub mod proxy;
pub mod reader;
pub mod ring_buffer;
pub mod source;
pub mod stream;
pub mod tag;

pub use async_stream::{AsyncInputStream, SeekState, StreamProducer, StreamWriter};
pub use config::BufferConfig;
pub use error::{InputError, Result};
pub use proxy::ProxyInputStream;
pub use reader::InputStreamReader;
pub use source::{open_file, open_uri, FileOpener, OpenedSource, Pump, SourceOpener};
#[cfg(feature = "http")]
pub use source::{open_http, HttpOpener};
pub use stream::{InputStream, StreamAttributes};
pub use tag::{Tag, TagType};
