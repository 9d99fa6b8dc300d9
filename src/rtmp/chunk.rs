//! RTMP chunk stream framing
//!
//! Chunk layout:
//! ```text
//! +--------------+----------------+--------------------+--------------+
//! | Basic Header | Message Header | Extended Timestamp | Chunk Data   |
//! | (1-3 bytes)  | (0/3/7/11)     | (0 or 4 bytes)     | (<= size)    |
//! +--------------+----------------+--------------------+--------------+
//! ```
//!
//! The encoder always opens a message with a type-0 header and continues
//! with type-3 chunks. The decoder accepts all four header types.

use std::collections::HashMap;

use bytes::{Buf, BufMut, BytesMut};

use super::message::RtmpMessage;
use super::{DEFAULT_CHUNK_SIZE, MAX_CHUNK_SIZE};
use crate::error::{Error, Result};
use crate::media::flv::put_u24;

const EXTENDED_TIMESTAMP: u32 = 0x00FF_FFFF;

/// Largest message the decoder will reassemble
const MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024;

/// Splits outgoing messages into chunks
#[derive(Debug)]
pub struct ChunkEncoder {
    chunk_size: usize,
}

impl ChunkEncoder {
    pub fn new() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE as usize,
        }
    }

    /// Change the outgoing chunk size (after sending Set Chunk Size)
    pub fn set_chunk_size(&mut self, size: u32) {
        self.chunk_size = size.clamp(1, MAX_CHUNK_SIZE) as usize;
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Append the chunked form of `msg` to `out`
    pub fn encode(&self, msg: &RtmpMessage, out: &mut BytesMut) {
        let csid = msg.chunk_stream_id();
        let extended = msg.timestamp >= EXTENDED_TIMESTAMP;
        let ts_field = if extended { EXTENDED_TIMESTAMP } else { msg.timestamp };
        let chunk_count = msg.payload.len().div_ceil(self.chunk_size).max(1);
        out.reserve(msg.payload.len() + 18 + chunk_count * 8);

        put_basic_header(out, 0, csid);
        put_u24(out, ts_field);
        put_u24(out, msg.payload.len() as u32);
        out.put_u8(msg.type_id);
        out.put_u32_le(msg.stream_id);
        if extended {
            out.put_u32(msg.timestamp);
        }

        for (i, chunk) in msg.payload.chunks(self.chunk_size).enumerate() {
            if i > 0 {
                put_basic_header(out, 3, csid);
                if extended {
                    out.put_u32(msg.timestamp);
                }
            }
            out.put_slice(chunk);
        }
    }
}

impl Default for ChunkEncoder {
    fn default() -> Self {
        Self::new()
    }
}

fn put_basic_header(out: &mut BytesMut, fmt: u8, csid: u32) {
    match csid {
        2..=63 => out.put_u8((fmt << 6) | csid as u8),
        64..=319 => {
            out.put_u8(fmt << 6);
            out.put_u8((csid - 64) as u8);
        }
        _ => {
            out.put_u8((fmt << 6) | 1);
            out.put_u16_le((csid - 64) as u16);
        }
    }
}

/// Per chunk stream reassembly state
#[derive(Debug, Default)]
struct ChunkStreamState {
    timestamp: u32,
    delta: u32,
    length: usize,
    type_id: u8,
    stream_id: u32,
    extended: bool,
    partial: BytesMut,
}

/// Reassembles incoming chunks into messages
#[derive(Debug)]
pub struct ChunkDecoder {
    chunk_size: usize,
    streams: HashMap<u32, ChunkStreamState>,
}

impl ChunkDecoder {
    pub fn new() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE as usize,
            streams: HashMap::new(),
        }
    }

    /// Apply a Set Chunk Size received from the peer
    pub fn set_chunk_size(&mut self, size: u32) {
        self.chunk_size = size.clamp(1, MAX_CHUNK_SIZE) as usize;
    }

    /// Pull the next complete message out of `buf`
    ///
    /// Returns `Ok(None)` when more bytes are needed. Consumed chunks are
    /// removed from `buf`; an incomplete chunk is left untouched.
    pub fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<RtmpMessage>> {
        loop {
            match self.decode_chunk(buf)? {
                Step::NeedMore => return Ok(None),
                Step::Partial => continue,
                Step::Complete(msg) => return Ok(Some(msg)),
            }
        }
    }

    fn decode_chunk(&mut self, buf: &mut BytesMut) -> Result<Step> {
        let Some(&first) = buf.first() else {
            return Ok(Step::NeedMore);
        };
        let fmt = first >> 6;
        let (csid, mut pos) = match first & 0x3F {
            0 => match buf.get(1) {
                Some(&b) => (64 + u32::from(b), 2),
                None => return Ok(Step::NeedMore),
            },
            1 => match (buf.get(1), buf.get(2)) {
                (Some(&lo), Some(&hi)) => (64 + u32::from(lo) + u32::from(hi) * 256, 3),
                _ => return Ok(Step::NeedMore),
            },
            n => (u32::from(n), 1),
        };

        let header_len = [11, 7, 3, 0][fmt as usize];
        if buf.len() < pos + header_len {
            return Ok(Step::NeedMore);
        }

        let state = self.streams.entry(csid).or_default();
        let starting = state.partial.is_empty();
        let mut field = 0;
        let mut length = state.length;
        let mut type_id = state.type_id;
        let mut stream_id = state.stream_id;

        if fmt <= 2 {
            field = read_u24(&buf[pos..]);
        }
        if fmt <= 1 {
            length = read_u24(&buf[pos + 3..]) as usize;
            type_id = buf[pos + 6];
        }
        if fmt == 0 {
            let b = &buf[pos + 7..pos + 11];
            stream_id = u32::from_le_bytes([b[0], b[1], b[2], b[3]]);
        }
        if fmt == 3 && state.length == 0 {
            return Err(Error::rtmp("chunk", format!("type-3 chunk on fresh stream {csid}")));
        }
        pos += header_len;

        let extended = if fmt == 3 { state.extended } else { field == EXTENDED_TIMESTAMP };
        if extended {
            if buf.len() < pos + 4 {
                return Ok(Step::NeedMore);
            }
            let b = &buf[pos..pos + 4];
            if fmt < 3 {
                field = u32::from_be_bytes([b[0], b[1], b[2], b[3]]);
            }
            pos += 4;
        }

        if length > MAX_MESSAGE_SIZE {
            return Err(Error::rtmp("chunk", format!("message of {length} bytes too large")));
        }

        if !starting && length < state.partial.len() {
            return Err(Error::rtmp(
                "chunk",
                format!("length changed mid-message on chunk stream {csid}"),
            ));
        }

        let already = if starting { 0 } else { state.partial.len() };
        let take = (length - already).min(self.chunk_size);
        if buf.len() < pos + take {
            return Ok(Step::NeedMore);
        }

        // Whole chunk is buffered: commit header state
        match fmt {
            0 => {
                state.timestamp = field;
                state.delta = 0;
            }
            1 | 2 => {
                state.delta = field;
                state.timestamp = state.timestamp.wrapping_add(field);
            }
            _ if starting => {
                state.timestamp = state.timestamp.wrapping_add(state.delta);
            }
            _ => {}
        }
        state.length = length;
        state.type_id = type_id;
        state.stream_id = stream_id;
        state.extended = extended;

        buf.advance(pos);
        let data = buf.split_to(take);
        state.partial.extend_from_slice(&data);

        if state.partial.len() < state.length {
            return Ok(Step::Partial);
        }

        let payload = state.partial.split().freeze();
        Ok(Step::Complete(RtmpMessage {
            type_id: state.type_id,
            stream_id: state.stream_id,
            timestamp: state.timestamp,
            payload,
        }))
    }
}

impl Default for ChunkDecoder {
    fn default() -> Self {
        Self::new()
    }
}

enum Step {
    NeedMore,
    Partial,
    Complete(RtmpMessage),
}

fn read_u24(b: &[u8]) -> u32 {
    (u32::from(b[0]) << 16) | (u32::from(b[1]) << 8) | u32::from(b[2])
}
