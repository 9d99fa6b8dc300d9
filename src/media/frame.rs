//! Media frames carried from tracks to forwarding workers
//!
//! A frame is designed to be cheap to clone: every active destination gets
//! its own clone, but the inner `Bytes` payload is only reference-counted.

use bytes::Bytes;

use super::flv;

/// Type of media frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    /// Video access unit (FLV video tag body)
    Video,
    /// Audio frame (FLV audio tag body)
    Audio,
    /// Stream metadata (`onMetaData` script body)
    Metadata,
}

/// One encoded media unit
#[derive(Debug, Clone)]
pub struct MediaFrame {
    /// Type of frame
    pub kind: FrameKind,
    /// Presentation timestamp in milliseconds
    pub timestamp: u32,
    /// FLV tag body (zero-copy via reference counting)
    pub data: Bytes,
    /// Whether this is a keyframe (video only)
    pub is_keyframe: bool,
    /// Whether this is a decoder configuration record
    pub is_header: bool,
}

impl MediaFrame {
    /// Create a video frame
    pub fn video(timestamp: u32, data: Bytes, is_keyframe: bool, is_header: bool) -> Self {
        Self {
            kind: FrameKind::Video,
            timestamp,
            data,
            is_keyframe,
            is_header,
        }
    }

    /// Create an audio frame
    pub fn audio(timestamp: u32, data: Bytes, is_header: bool) -> Self {
        Self {
            kind: FrameKind::Audio,
            timestamp,
            data,
            is_keyframe: false,
            is_header,
        }
    }

    /// Create a metadata frame
    pub fn metadata(data: Bytes) -> Self {
        Self {
            kind: FrameKind::Metadata,
            timestamp: 0,
            data,
            is_keyframe: false,
            is_header: false,
        }
    }

    /// Build a video frame, reading the flags from the FLV body
    pub fn from_video_body(timestamp: u32, data: Bytes) -> Self {
        let is_keyframe = flv::is_video_keyframe(&data);
        let is_header = flv::is_avc_sequence_header(&data);
        Self::video(timestamp, data, is_keyframe, is_header)
    }

    /// Build an audio frame, reading the flags from the FLV body
    pub fn from_audio_body(timestamp: u32, data: Bytes) -> Self {
        let is_header = flv::is_aac_sequence_header(&data);
        Self::audio(timestamp, data, is_header)
    }

    /// Payload size in bytes
    pub fn size(&self) -> usize {
        self.data.len()
    }
}
