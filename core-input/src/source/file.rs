//! Local file producer.

use super::{OpenedSource, Pump, SourceOpener};
use crate::async_stream::AsyncInputStream;
use crate::config::BufferConfig;
use crate::error::Result;
use async_trait::async_trait;
use core_event::EventLoopHandle;
use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs::File;
use tokio::io::AsyncSeekExt;

#[derive(Debug, Clone)]
pub struct FileOpener {
    path: PathBuf,
}

impl FileOpener {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl SourceOpener for FileOpener {
    async fn open(&self, offset: u64) -> Result<OpenedSource> {
        let mut file = File::open(&self.path).await?;
        let size = file.metadata().await?.len();
        if offset > 0 {
            file.seek(SeekFrom::Start(offset)).await?;
        }

        Ok(OpenedSource {
            reader: Box::new(file),
            size: Some(size),
            seekable: true,
            mime_type: None,
        })
    }
}

/// Opens a local file as a buffered stream.
///
/// Errors (missing file, permissions) surface from the first consumer call.
pub fn open_file(event_loop: &EventLoopHandle, path: &Path, config: BufferConfig) -> AsyncInputStream {
    let opener = Arc::new(FileOpener::new(path));
    AsyncInputStream::new(
        event_loop.clone(),
        path.display().to_string(),
        config,
        Box::new(Pump::new(opener, config.chunk_size)),
    )
}
