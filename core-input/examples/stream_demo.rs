//! Buffered stream demonstration
//!
//! Opens a file or URL through a proxy, reads it to the end through the
//! `std::io` adapter and reports what arrived.
//!
//! Run with:
//! ```bash
//! cargo run -p core-input --example stream_demo -- /path/to/song.flac
//!
//! # Remote sources need the http feature
//! cargo run -p core-input --features http --example stream_demo -- https://example.com/a.mp3
//! ```

use anyhow::{bail, Context};
use core_event::EventLoop;
use core_input::{open_uri, InputStream, InputStreamReader, ProxyInputStream};
use core_runtime::config::InputSettings;
use core_runtime::logging::{init_logging, redact_uri, LogFormat, LoggingConfig};
use std::env;
use std::io::{Read, Seek, SeekFrom};
use std::sync::Arc;
use std::thread;
use std::time::Instant;
use tracing::info;

fn main() -> anyhow::Result<()> {
    let Some(uri) = env::args().nth(1) else {
        bail!("usage: stream_demo <path or URL>");
    };

    init_logging(LoggingConfig::default().with_format(LogFormat::Compact))?;

    let event_loop = EventLoop::start("io").context("starting the event loop")?;
    let settings = InputSettings::default();

    // the consumer gets its stream before the source is opened
    let proxy = Arc::new(ProxyInputStream::new(uri.clone()));
    let consumer = {
        let proxy = proxy.clone();
        thread::spawn(move || -> anyhow::Result<(u64, u32)> {
            proxy.wait_ready()?;
            let mut reader = InputStreamReader::new(proxy);
            let mut total = 0u64;
            let mut checksum = 0u32;
            let mut chunk = [0u8; 8192];
            loop {
                let nbytes = reader.read(&mut chunk)?;
                if nbytes == 0 {
                    break;
                }
                total += nbytes as u64;
                checksum = chunk[..nbytes]
                    .iter()
                    .fold(checksum, |sum, byte| sum.rotate_left(5) ^ u32::from(*byte));
            }

            if reader.stream().is_seekable() && total > 0 {
                reader.seek(SeekFrom::Start(0))?;
                info!(offset = reader.stream_position()?, "Rewound");
            }
            Ok((total, checksum))
        })
    };

    let started = Instant::now();
    let stream = open_uri(&event_loop.handle(), &uri, &settings)
        .with_context(|| format!("opening {}", redact_uri(&uri)))?;
    proxy.bind(Arc::new(stream));

    let (total, checksum) = match consumer.join() {
        Ok(result) => result?,
        Err(_) => bail!("consumer thread panicked"),
    };

    info!(
        uri = %redact_uri(&uri),
        bytes = total,
        checksum = format_args!("{:08x}", checksum),
        mime_type = ?proxy.mime_type(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Stream read to the end"
    );
    Ok(())
}
