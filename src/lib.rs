//! Fan one live WebRTC session out to many RTMP destinations
//!
//! The peer connection hands the session its media tracks and a control
//! data channel. Frames from every track are delivered to one forwarding
//! worker per destination; destinations are added, removed, started and
//! stopped at runtime with JSON commands on the data channel.
//!
//! ```text
//!   MediaTrack ─┐                        ┌─► ForwardingWorker ─► rtmp://a/...
//!   MediaTrack ─┼─► SessionController ───┼─► ForwardingWorker ─► rtmp://b/...
//!               │     (fan_out)          └─► ForwardingWorker ─► file:///x.flv
//!   ControlChannel ─► CommandHandler ─┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use rtmp_fanout::{run_session, DefaultConnector, SessionConfig, SessionController};
//! use rtmp_fanout::session::{ConnectionEvent, ControlChannel};
//!
//! # async fn example(events: tokio::sync::mpsc::Receiver<ConnectionEvent>, control: ControlChannel) {
//! let controller = SessionController::new(DefaultConnector::default(), SessionConfig::default());
//! run_session(controller, events, control).await;
//! # }
//! ```

pub mod amf;
pub mod control;
pub mod destination;
pub mod error;
pub mod media;
pub mod rtmp;
pub mod session;
pub mod sink;
pub mod stats;
pub mod worker;

#[cfg(test)]
pub(crate) mod test_util;

pub use control::{Command, CommandHandler, Response};
pub use destination::{DestinationSet, DestinationState, DestinationStatus};
pub use error::{Error, ProtocolError, Result, SessionError};
pub use media::{FrameKind, MediaFrame};
pub use rtmp::{PublishConfig, RtmpPublisher};
pub use session::{run_session, Lifecycle, SessionConfig, SessionController, SessionStatus};
pub use sink::{DefaultConnector, FlvFileSink, MediaSink, SinkConnector};
pub use worker::{ForwardingWorker, WorkerConfig};
