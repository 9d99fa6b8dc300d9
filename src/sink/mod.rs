//! Forwarding sinks
//!
//! A sink is the outbound half of a forwarding worker: it owns the
//! connection to one destination and accepts frames in order. The worker
//! drives it from a single task, so implementations need `Send` but not
//! `Sync`.
//!
//! [`DefaultConnector`] routes on the URL scheme:
//!
//! | scheme    | sink                   |
//! |-----------|------------------------|
//! | `rtmp://` | [`RtmpPublisher`]      |
//! | `file://` | [`FlvFileSink`]        |
//!
//! [`RtmpPublisher`]: crate::rtmp::RtmpPublisher

pub mod connector;
pub mod flv_file;

use std::future::Future;

use crate::error::Result;
use crate::media::MediaFrame;

pub use connector::{DefaultConnector, DestinationSink};
pub use flv_file::FlvFileSink;

/// Outbound connection to one destination
pub trait MediaSink: Send + 'static {
    /// Push one frame; `timestamp` is already rebased for this destination
    fn write_frame(
        &mut self,
        frame: &MediaFrame,
        timestamp: u32,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Flush buffered data and release the connection
    fn close(&mut self) -> impl Future<Output = Result<()>> + Send;
}

/// Opens sinks for destination URLs
pub trait SinkConnector: Send + Sync + 'static {
    type Sink: MediaSink;

    /// Establish the outbound connection for `url`
    fn connect(&self, url: &str) -> impl Future<Output = Result<Self::Sink>> + Send;
}
