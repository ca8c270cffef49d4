//! # Proxy Input Stream
//!
//! [`ProxyInputStream`] hands a consumer a stream before the stream that will
//! actually deliver the data exists, e.g. while a playlist entry or redirect
//! is still being resolved. Once the real stream is known it is attached with
//! [`bind`](ProxyInputStream::bind) and every call is forwarded.
//!
//! ## Locking
//!
//! The proxy has its own lock and condition variable, used only to wait for
//! the binding and to keep a copy of the inner stream's attributes. Blocking
//! calls clone the inner `Arc`, release the proxy lock and then call into the
//! inner stream, so a consumer blocked in `read` never holds the proxy lock.
//! Lock order is always proxy, then inner.
//!
//! ## Usage
//!
//! ```rust,ignore
//! let proxy = Arc::new(ProxyInputStream::new("http://example.com/playlist.m3u"));
//! decoder.start(proxy.clone());          // may block in read()
//!
//! let real = open_uri(&handle, &resolved_uri, &settings)?;
//! proxy.bind(Arc::new(real));            // wakes the decoder
//! ```

use crate::error::Result;
use crate::stream::{InputStream, StreamAttributes};
use crate::tag::Tag;
use core_event::sync::{Condvar, Mutex};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

pub struct ProxyInputStream {
    uri: String,
    state: Mutex<ProxyState>,
    bound: Condvar,
}

struct ProxyState {
    input: Option<Arc<dyn InputStream>>,
    attrs: StreamAttributes,
}

impl ProxyState {
    /// Takes over the inner stream's attributes once it is ready. Size, MIME
    /// type and seekability are copied once; the offset on every call.
    fn copy_attributes(&mut self) {
        let Some(input) = &self.input else {
            return;
        };

        let inner = input.attributes();
        if !inner.ready {
            return;
        }

        if !self.attrs.ready {
            self.attrs.mime_type = inner.mime_type;
            self.attrs.size = inner.size;
            self.attrs.seekable = inner.seekable;
            self.attrs.ready = true;
        }
        self.attrs.offset = inner.offset;
    }
}

impl ProxyInputStream {
    /// Creates an unbound proxy.
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            state: Mutex::new(ProxyState {
                input: None,
                attrs: StreamAttributes::default(),
            }),
            bound: Condvar::new(),
        }
    }

    /// Creates a proxy already bound to `input`, taking over its URI.
    pub fn with_input(input: Arc<dyn InputStream>) -> Self {
        let proxy = Self::new(input.uri());
        proxy.bind(input);
        proxy
    }

    /// Attaches the real stream and wakes threads waiting for it.
    ///
    /// # Panics
    ///
    /// Panics if the proxy is already bound.
    pub fn bind(&self, input: Arc<dyn InputStream>) {
        let mut state = self.state.lock();
        assert!(
            state.input.is_none(),
            "proxy '{}' is already bound",
            self.uri
        );

        debug!(uri = %self.uri, input = %input.uri(), "Binding proxy input stream");
        state.input = Some(input);
        state.copy_attributes();
        self.bound.notify_all();
    }

    pub fn is_bound(&self) -> bool {
        self.state.lock().input.is_some()
    }

    /// The attached stream, if any.
    pub fn input(&self) -> Option<Arc<dyn InputStream>> {
        self.state.lock().input.clone()
    }

    fn wait_input(&self) -> Arc<dyn InputStream> {
        let mut state = self.state.lock();
        loop {
            if let Some(input) = &state.input {
                return input.clone();
            }
            self.bound.wait(&mut state);
        }
    }

    fn sync_attributes(&self) {
        self.state.lock().copy_attributes();
    }
}

impl InputStream for ProxyInputStream {
    fn uri(&self) -> &str {
        &self.uri
    }

    fn check(&self) -> Result<()> {
        match self.input() {
            Some(input) => input.check(),
            None => Ok(()),
        }
    }

    fn update(&self) {
        if let Some(input) = self.input() {
            input.update();
            self.sync_attributes();
        }
    }

    fn is_ready(&self) -> bool {
        self.state.lock().attrs.ready
    }

    fn wait_ready(&self) -> Result<()> {
        let input = self.wait_input();
        let result = input.wait_ready();
        self.sync_attributes();
        result
    }

    fn mime_type(&self) -> Option<String> {
        self.state.lock().attrs.mime_type.clone()
    }

    fn size(&self) -> Option<u64> {
        self.state.lock().attrs.size
    }

    fn offset(&self) -> u64 {
        self.state.lock().attrs.offset
    }

    fn is_seekable(&self) -> bool {
        self.state.lock().attrs.seekable
    }

    fn attributes(&self) -> StreamAttributes {
        self.state.lock().attrs.clone()
    }

    fn is_eof(&self) -> bool {
        self.input().map_or(false, |input| input.is_eof())
    }

    fn is_available(&self) -> bool {
        self.input().map_or(false, |input| input.is_available())
    }

    fn read(&self, buf: &mut [u8]) -> Result<usize> {
        let input = self.wait_input();
        let result = input.read(buf);
        self.sync_attributes();
        result
    }

    fn seek(&self, offset: u64) -> Result<()> {
        let input = self.wait_input();
        let result = input.seek(offset);
        self.sync_attributes();
        result
    }

    fn read_tag(&self) -> Option<Tag> {
        self.input().and_then(|input| input.read_tag())
    }
}

impl fmt::Debug for ProxyInputStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("ProxyInputStream")
            .field("uri", &self.uri)
            .field("bound", &state.input.is_some())
            .field("attributes", &state.attrs)
            .finish()
    }
}
