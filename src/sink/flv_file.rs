//! FLV file sink for `file://` destinations

use std::path::{Path, PathBuf};

use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};

use crate::error::{Error, Result};
use crate::media::{FlvMuxer, MediaFrame};

use super::MediaSink;

/// Records the stream into a local `.flv` file
pub struct FlvFileSink {
    path: PathBuf,
    writer: BufWriter<File>,
    muxer: FlvMuxer,
    closed: bool,
}

impl FlvFileSink {
    /// Create (or truncate) the file at `path`
    pub async fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::create(&path).await?;
        tracing::debug!(path = %path.display(), "FLV file opened");

        Ok(Self {
            path,
            writer: BufWriter::new(file),
            muxer: FlvMuxer::new(),
            closed: false,
        })
    }

    /// Open the file named by a `file://` URL
    pub async fn from_url(url: &str) -> Result<Self> {
        let path = url
            .strip_prefix("file://")
            .filter(|p| !p.is_empty())
            .ok_or_else(|| Error::InvalidUrl(url.to_string()))?;
        Self::create(path).await
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl MediaSink for FlvFileSink {
    async fn write_frame(&mut self, frame: &MediaFrame, timestamp: u32) -> Result<()> {
        if self.closed {
            return Err(Error::NotConnected);
        }
        let bytes = self.muxer.encode(frame, timestamp);
        self.writer.write_all(&bytes).await?;
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        if let Some(header) = self.muxer.finish() {
            self.writer.write_all(&header).await?;
        }
        self.writer.flush().await?;
        tracing::debug!(path = %self.path.display(), "FLV file closed");
        Ok(())
    }
}
