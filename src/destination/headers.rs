//! Decoder configuration cache for late-started workers
//!
//! A destination that starts while media is already flowing joins in the
//! middle of the stream. Replaying the latest sequence headers and metadata
//! lets it decode from the next keyframe. Media frames are never replayed.

use crate::media::{FrameKind, MediaFrame};

/// Latest decoder configuration seen on the session
#[derive(Debug, Clone, Default)]
pub struct SequenceHeaders {
    pub metadata: Option<MediaFrame>,
    pub video: Option<MediaFrame>,
    pub audio: Option<MediaFrame>,
}

impl SequenceHeaders {
    /// Cache `frame` if it carries decoder configuration
    pub fn observe(&mut self, frame: &MediaFrame) {
        match frame.kind {
            FrameKind::Metadata => self.metadata = Some(frame.clone()),
            FrameKind::Video if frame.is_header => self.video = Some(frame.clone()),
            FrameKind::Audio if frame.is_header => self.audio = Some(frame.clone()),
            _ => {}
        }
    }

    /// Frames to queue ahead of live media: metadata, then video, then audio
    pub fn priming(&self) -> Vec<MediaFrame> {
        [&self.metadata, &self.video, &self.audio]
            .into_iter()
            .flatten()
            .cloned()
            .collect()
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}
