//! HTTP producer.
//!
//! Seeks are implemented with `Range` requests. A server that answers a
//! ranged request with `200 OK` cannot seek and the seek fails.

use super::{OpenedSource, Pump, SourceOpener};
use crate::async_stream::AsyncInputStream;
use crate::config::BufferConfig;
use crate::error::{InputError, Result};
use async_trait::async_trait;
use core_event::EventLoopHandle;
use core_runtime::config::InputSettings;
use core_runtime::logging::redact_uri;
use futures::TryStreamExt;
use reqwest::header::{ACCEPT_RANGES, CONTENT_RANGE, CONTENT_TYPE, RANGE};
use reqwest::{Client, StatusCode};
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::io::StreamReader;
use tracing::debug;

pub struct HttpOpener {
    client: Client,
    uri: String,
    timeout: Duration,
}

impl HttpOpener {
    pub fn new(uri: impl Into<String>, settings: &InputSettings) -> Result<Self> {
        let client = Client::builder()
            .user_agent(settings.user_agent.clone())
            .connect_timeout(settings.http_timeout)
            .build()
            .map_err(|e| InputError::Source(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            uri: uri.into(),
            timeout: settings.http_timeout,
        })
    }
}

#[async_trait]
impl SourceOpener for HttpOpener {
    async fn open(&self, offset: u64) -> Result<OpenedSource> {
        debug!(uri = %redact_uri(&self.uri), offset, "HTTP request");

        let mut request = self.client.get(&self.uri);
        if offset > 0 {
            request = request.header(RANGE, format!("bytes={}-", offset));
        }

        let response = tokio::time::timeout(self.timeout, request.send())
            .await
            .map_err(|_| InputError::from(io::Error::new(io::ErrorKind::TimedOut, "HTTP request timed out")))?
            .map_err(|e| InputError::Source(format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(InputError::Http {
                status: status.as_u16(),
                uri: redact_uri(&self.uri),
            });
        }

        let partial = status == StatusCode::PARTIAL_CONTENT;
        if offset > 0 && !partial {
            return Err(InputError::NotSeekable);
        }

        let headers = response.headers();
        let total_from_range = headers
            .get(CONTENT_RANGE)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_content_range_total);
        let size = total_from_range.or_else(|| response.content_length().map(|len| offset + len));
        let seekable = partial
            || headers
                .get(ACCEPT_RANGES)
                .and_then(|v| v.to_str().ok())
                .map_or(false, |v| v.eq_ignore_ascii_case("bytes"));
        let mime_type = headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);

        let body = response
            .bytes_stream()
            .map_err(io::Error::other);

        Ok(OpenedSource {
            reader: Box::new(StreamReader::new(Box::pin(body))),
            size,
            seekable,
            mime_type,
        })
    }
}

/// `Content-Range: bytes 100-199/1000` -> `Some(1000)`
fn parse_content_range_total(value: &str) -> Option<u64> {
    let (_, total) = value.rsplit_once('/')?;
    total.trim().parse().ok()
}

/// Opens an `http://` or `https://` URI as a buffered stream.
pub fn open_http(
    event_loop: &EventLoopHandle,
    uri: &str,
    settings: &InputSettings,
) -> Result<AsyncInputStream> {
    let config = BufferConfig::from(settings);
    let opener = Arc::new(HttpOpener::new(uri, settings)?);

    Ok(AsyncInputStream::new(
        event_loop.clone(),
        uri,
        config,
        Box::new(Pump::new(opener, config.chunk_size)),
    ))
}
