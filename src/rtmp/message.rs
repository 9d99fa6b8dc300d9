//! RTMP messages exchanged by the publisher
//!
//! Protocol control messages travel on chunk stream 2 / message stream 0,
//! commands on chunk stream 3, media on their own chunk streams.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::amf::{amf0, AmfValue};
use crate::error::{AmfError, Result};
use crate::media::{FrameKind, MediaFrame};

pub const MSG_SET_CHUNK_SIZE: u8 = 1;
pub const MSG_ABORT: u8 = 2;
pub const MSG_ACKNOWLEDGEMENT: u8 = 3;
pub const MSG_USER_CONTROL: u8 = 4;
pub const MSG_WINDOW_ACK_SIZE: u8 = 5;
pub const MSG_SET_PEER_BANDWIDTH: u8 = 6;
pub const MSG_AUDIO: u8 = 8;
pub const MSG_VIDEO: u8 = 9;
pub const MSG_DATA_AMF0: u8 = 18;
pub const MSG_COMMAND_AMF0: u8 = 20;

pub const CSID_PROTOCOL_CONTROL: u32 = 2;
pub const CSID_COMMAND: u32 = 3;
pub const CSID_AUDIO: u32 = 4;
pub const CSID_DATA: u32 = 5;
pub const CSID_VIDEO: u32 = 6;

const USER_CONTROL_PING_REQUEST: u16 = 6;
const USER_CONTROL_PING_RESPONSE: u16 = 7;

/// A complete (de-chunked) RTMP message
#[derive(Debug, Clone, PartialEq)]
pub struct RtmpMessage {
    pub type_id: u8,
    pub stream_id: u32,
    pub timestamp: u32,
    pub payload: Bytes,
}

/// A decoded AMF0 command (`_result`, `_error`, `onStatus`, ...)
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    pub name: String,
    pub transaction_id: f64,
    /// Command object followed by any extra arguments
    pub args: Vec<AmfValue>,
}

impl Command {
    /// The `info` object of `onStatus` / `_error`, usually the last argument
    pub fn info(&self) -> Option<&AmfValue> {
        self.args.iter().rev().find(|v| matches!(v, AmfValue::Object(_)))
    }

    /// `code` of the info object, e.g. `NetStream.Publish.Start`
    pub fn status_code(&self) -> Option<&str> {
        self.info().and_then(|i| i.get_string("code"))
    }

    /// Human readable reason for an `_error` or failed `onStatus`
    pub fn description(&self) -> String {
        let info = self.info();
        info.and_then(|i| i.get_string("description"))
            .or_else(|| info.and_then(|i| i.get_string("code")))
            .unwrap_or("no description")
            .to_string()
    }

    /// Whether an `onStatus` carries `level: error`
    pub fn is_error_status(&self) -> bool {
        self.info().and_then(|i| i.get_string("level")) == Some("error")
    }
}

impl RtmpMessage {
    fn control(type_id: u8, payload: Bytes) -> Self {
        Self {
            type_id,
            stream_id: 0,
            timestamp: 0,
            payload,
        }
    }

    pub fn set_chunk_size(size: u32) -> Self {
        let mut buf = BytesMut::with_capacity(4);
        buf.put_u32(size & 0x7FFF_FFFF);
        Self::control(MSG_SET_CHUNK_SIZE, buf.freeze())
    }

    pub fn window_ack_size(size: u32) -> Self {
        let mut buf = BytesMut::with_capacity(4);
        buf.put_u32(size);
        Self::control(MSG_WINDOW_ACK_SIZE, buf.freeze())
    }

    pub fn acknowledgement(sequence: u32) -> Self {
        let mut buf = BytesMut::with_capacity(4);
        buf.put_u32(sequence);
        Self::control(MSG_ACKNOWLEDGEMENT, buf.freeze())
    }

    pub fn ping_response(timestamp: u32) -> Self {
        let mut buf = BytesMut::with_capacity(6);
        buf.put_u16(USER_CONTROL_PING_RESPONSE);
        buf.put_u32(timestamp);
        Self::control(MSG_USER_CONTROL, buf.freeze())
    }

    /// Build an AMF0 command message
    pub fn command(values: &[AmfValue], stream_id: u32) -> Self {
        Self {
            type_id: MSG_COMMAND_AMF0,
            stream_id,
            timestamp: 0,
            payload: amf0::encode_all(values),
        }
    }

    /// Wrap a media frame for the published stream
    ///
    /// Metadata gets the `@setDataFrame` prefix servers expect from
    /// publishers.
    pub fn media(frame: &MediaFrame, stream_id: u32, timestamp: u32) -> Self {
        let (type_id, payload) = match frame.kind {
            FrameKind::Audio => (MSG_AUDIO, frame.data.clone()),
            FrameKind::Video => (MSG_VIDEO, frame.data.clone()),
            FrameKind::Metadata => {
                let prefix = amf0::encode_all(&[AmfValue::from("@setDataFrame")]);
                let mut buf = BytesMut::with_capacity(prefix.len() + frame.data.len());
                buf.put_slice(&prefix);
                buf.put_slice(&frame.data);
                (MSG_DATA_AMF0, buf.freeze())
            }
        };
        Self {
            type_id,
            stream_id,
            timestamp,
            payload,
        }
    }

    /// Chunk stream a message should be sent on
    pub fn chunk_stream_id(&self) -> u32 {
        match self.type_id {
            MSG_SET_CHUNK_SIZE..=MSG_SET_PEER_BANDWIDTH => CSID_PROTOCOL_CONTROL,
            MSG_AUDIO => CSID_AUDIO,
            MSG_VIDEO => CSID_VIDEO,
            MSG_DATA_AMF0 => CSID_DATA,
            _ => CSID_COMMAND,
        }
    }

    /// Read the leading big-endian u32 of a control message
    pub fn control_value(&self) -> Option<u32> {
        let mut payload = self.payload.clone();
        (payload.remaining() >= 4).then(|| payload.get_u32())
    }

    /// Timestamp of a User Control ping request, if this is one
    pub fn ping_request(&self) -> Option<u32> {
        if self.type_id != MSG_USER_CONTROL || self.payload.len() < 6 {
            return None;
        }
        let mut payload = self.payload.clone();
        (payload.get_u16() == USER_CONTROL_PING_REQUEST).then(|| payload.get_u32())
    }

    /// Decode an AMF0 command message
    pub fn to_command(&self) -> Result<Option<Command>> {
        if self.type_id != MSG_COMMAND_AMF0 {
            return Ok(None);
        }

        let mut values = amf0::decode_all(self.payload.clone())?.into_iter();
        let name = match values.next() {
            Some(AmfValue::String(name)) => name,
            _ => return Err(AmfError::UnexpectedEof.into()),
        };
        let transaction_id = values.next().and_then(|v| v.as_number()).unwrap_or(0.0);

        Ok(Some(Command {
            name,
            transaction_id,
            args: values.collect(),
        }))
    }
}
