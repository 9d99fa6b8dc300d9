//! Scheme-routing sink connector

use crate::error::{Error, Result};
use crate::media::MediaFrame;
use crate::rtmp::{PublishConfig, RtmpPublisher};

use super::flv_file::FlvFileSink;
use super::{MediaSink, SinkConnector};

/// Sink opened by [`DefaultConnector`]
pub enum DestinationSink {
    Rtmp(RtmpPublisher),
    File(FlvFileSink),
}

impl MediaSink for DestinationSink {
    async fn write_frame(&mut self, frame: &MediaFrame, timestamp: u32) -> Result<()> {
        match self {
            DestinationSink::Rtmp(sink) => sink.write_frame(frame, timestamp).await,
            DestinationSink::File(sink) => sink.write_frame(frame, timestamp).await,
        }
    }

    async fn close(&mut self) -> Result<()> {
        match self {
            DestinationSink::Rtmp(sink) => sink.close().await,
            DestinationSink::File(sink) => sink.close().await,
        }
    }
}

/// Connector that picks the sink from the URL scheme
#[derive(Debug, Clone, Default)]
pub struct DefaultConnector {
    publish: PublishConfig,
}

impl DefaultConnector {
    pub fn new(publish: PublishConfig) -> Self {
        Self { publish }
    }

    pub fn publish_config(&self) -> &PublishConfig {
        &self.publish
    }
}

impl SinkConnector for DefaultConnector {
    type Sink = DestinationSink;

    async fn connect(&self, url: &str) -> Result<DestinationSink> {
        let (scheme, _) = url
            .split_once("://")
            .ok_or_else(|| Error::InvalidUrl(url.to_string()))?;

        match scheme {
            "rtmp" => Ok(DestinationSink::Rtmp(
                RtmpPublisher::connect(url, &self.publish).await?,
            )),
            "file" => Ok(DestinationSink::File(FlvFileSink::from_url(url).await?)),
            other => Err(Error::UnsupportedScheme(other.to_string())),
        }
    }
}
