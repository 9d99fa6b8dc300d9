//! FLV muxing
//!
//! RTMP audio/video message bodies are FLV tag bodies, so the same payload
//! can be written to a socket (chunked) or to a `.flv` file (tagged).
//!
//! File layout produced by [`FlvMuxer`]:
//! ```text
//! +============+==================+==============+==================+
//! | FLV Header | PrevTagSize0 (0) | Tag 1        | PrevTagSize1 ... |
//! | (9 bytes)  | (4 bytes)        | (11+N bytes) | (4 bytes)        |
//! +============+==================+==============+==================+
//! ```
//!
//! Tag header:
//! ```text
//! +--------+-------------+-----------+-------------+
//! | Type(1)| DataSize(3) | TS(3+1)   | StreamID(3) | Data(N)
//! +--------+-------------+-----------+-------------+
//! ```

use bytes::{BufMut, Bytes, BytesMut};

use super::frame::{FrameKind, MediaFrame};

/// FLV tag type codes
pub const TAG_AUDIO: u8 = 8;
pub const TAG_VIDEO: u8 = 9;
pub const TAG_SCRIPT: u8 = 18;

const FLV_SIGNATURE: [u8; 3] = *b"FLV";
const FLV_VERSION: u8 = 0x01;
/// Type flags: bit 0 = video, bit 2 = audio
const FLV_TYPE_FLAGS_AV: u8 = 0x05;
const FLV_HEADER_SIZE: u32 = 9;
const TAG_HEADER_SIZE: usize = 11;

/// AVC codec id in the low nibble of the first video byte
const CODEC_AVC: u8 = 7;
/// AAC sound format in the high nibble of the first audio byte
const FORMAT_AAC: u8 = 10;

/// Whether a video tag body starts a keyframe (frame type 1 or 4)
pub fn is_video_keyframe(data: &[u8]) -> bool {
    matches!(data.first().map(|b| b >> 4), Some(1) | Some(4))
}

/// Whether a video tag body is an AVC decoder configuration record
pub fn is_avc_sequence_header(data: &[u8]) -> bool {
    data.len() >= 2 && data[0] & 0x0F == CODEC_AVC && data[1] == 0
}

/// Whether an audio tag body is an AAC AudioSpecificConfig
pub fn is_aac_sequence_header(data: &[u8]) -> bool {
    data.len() >= 2 && data[0] >> 4 == FORMAT_AAC && data[1] == 0
}

/// FLV tag type code for a frame kind
pub fn tag_type(kind: FrameKind) -> u8 {
    match kind {
        FrameKind::Audio => TAG_AUDIO,
        FrameKind::Video => TAG_VIDEO,
        FrameKind::Metadata => TAG_SCRIPT,
    }
}

/// Incremental FLV encoder
///
/// Emits the file header on the first call and tracks the previous tag
/// size trailer across calls.
#[derive(Debug, Default)]
pub struct FlvMuxer {
    header_written: bool,
}

impl FlvMuxer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Encode one frame, prefixed with the file header if not yet written
    pub fn encode(&mut self, frame: &MediaFrame, timestamp: u32) -> Bytes {
        let mut buf = BytesMut::with_capacity(
            FLV_HEADER_SIZE as usize + 4 + TAG_HEADER_SIZE + frame.data.len() + 4,
        );

        if !self.header_written {
            write_header(&mut buf);
            self.header_written = true;
        }

        write_tag(&mut buf, tag_type(frame.kind), timestamp, &frame.data);
        buf.freeze()
    }

    /// Header bytes for a file that received no frames
    pub fn finish(&mut self) -> Option<Bytes> {
        if self.header_written {
            return None;
        }
        let mut buf = BytesMut::with_capacity(FLV_HEADER_SIZE as usize + 4);
        write_header(&mut buf);
        self.header_written = true;
        Some(buf.freeze())
    }
}

fn write_header(buf: &mut BytesMut) {
    buf.put_slice(&FLV_SIGNATURE);
    buf.put_u8(FLV_VERSION);
    buf.put_u8(FLV_TYPE_FLAGS_AV);
    buf.put_u32(FLV_HEADER_SIZE);
    // PreviousTagSize0
    buf.put_u32(0);
}

fn write_tag(buf: &mut BytesMut, tag_type: u8, timestamp: u32, data: &[u8]) {
    let data_size = data.len() as u32;

    buf.put_u8(tag_type);
    put_u24(buf, data_size);
    // Lower 24 bits, then the extension byte
    put_u24(buf, timestamp & 0x00FF_FFFF);
    buf.put_u8((timestamp >> 24) as u8);
    // Stream ID, always 0
    put_u24(buf, 0);
    buf.put_slice(data);
    buf.put_u32(TAG_HEADER_SIZE as u32 + data_size);
}

pub(crate) fn put_u24(buf: &mut BytesMut, value: u32) {
    buf.put_u8((value >> 16) as u8);
    buf.put_u8((value >> 8) as u8);
    buf.put_u8(value as u8);
}
