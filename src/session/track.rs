//! Tracks and the peer connection contract
//!
//! The peer connection itself (signaling, ICE, depayloading) lives outside
//! this crate. It hands the session media tracks as channels of
//! FLV-ready frames and carries control messages as JSON text.

use serde::Serialize;
use tokio::sync::mpsc;

use crate::media::MediaFrame;

/// Kind of media track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackKind {
    Audio,
    Video,
}

/// Identity of a subscribed track
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrackInfo {
    pub id: String,
    pub kind: TrackKind,
}

/// Incoming media track
///
/// The frame sequence ends when the sending side is dropped.
#[derive(Debug)]
pub struct MediaTrack {
    pub id: String,
    pub kind: TrackKind,
    pub frames: mpsc::Receiver<MediaFrame>,
}

impl MediaTrack {
    /// Create a track and the sender that feeds it
    pub fn channel(
        id: impl Into<String>,
        kind: TrackKind,
        capacity: usize,
    ) -> (mpsc::Sender<MediaFrame>, Self) {
        let (tx, frames) = mpsc::channel(capacity.max(1));
        let track = Self {
            id: id.into(),
            kind,
            frames,
        };
        (tx, track)
    }
}

/// Events emitted by the peer connection
#[derive(Debug)]
pub enum ConnectionEvent {
    /// A remote track was negotiated
    TrackAdded(MediaTrack),
    /// The connection failed or was closed; forces shutdown
    Closed,
}

/// Session side of the control data channel
#[derive(Debug)]
pub struct ControlChannel {
    pub incoming: mpsc::Receiver<String>,
    pub outgoing: mpsc::Sender<String>,
}

/// Remote side of a [`ControlChannel`]
#[derive(Debug)]
pub struct ControlPeer {
    pub commands: mpsc::Sender<String>,
    pub responses: mpsc::Receiver<String>,
}

impl ControlChannel {
    /// Create a connected channel pair
    pub fn pair(capacity: usize) -> (Self, ControlPeer) {
        let (commands, incoming) = mpsc::channel(capacity.max(1));
        let (outgoing, responses) = mpsc::channel(capacity.max(1));
        (
            Self { incoming, outgoing },
            ControlPeer {
                commands,
                responses,
            },
        )
    }
}
