//! AMF0 encoder and decoder
//!
//! Type markers handled:
//! ```text
//! 0x00 - Number        0x06 - Undefined
//! 0x01 - Boolean       0x08 - ECMA Array
//! 0x02 - String        0x09 - Object End
//! 0x03 - Object        0x0A - Strict Array
//! 0x05 - Null          0x0B - Date (decoded as Number)
//!                      0x0C - Long String
//! ```

use bytes::{Buf, BufMut, Bytes, BytesMut};

use super::value::AmfValue;
use crate::error::AmfError;

const MARKER_NUMBER: u8 = 0x00;
const MARKER_BOOLEAN: u8 = 0x01;
const MARKER_STRING: u8 = 0x02;
const MARKER_OBJECT: u8 = 0x03;
const MARKER_NULL: u8 = 0x05;
const MARKER_UNDEFINED: u8 = 0x06;
const MARKER_ECMA_ARRAY: u8 = 0x08;
const MARKER_OBJECT_END: u8 = 0x09;
const MARKER_STRICT_ARRAY: u8 = 0x0A;
const MARKER_DATE: u8 = 0x0B;
const MARKER_LONG_STRING: u8 = 0x0C;

/// Maximum nesting depth for objects/arrays
const MAX_NESTING_DEPTH: usize = 32;

/// Encode a sequence of values into one command payload
pub fn encode_all(values: &[AmfValue]) -> Bytes {
    let mut buf = BytesMut::with_capacity(256);
    for value in values {
        encode_value(&mut buf, value);
    }
    buf.freeze()
}

fn encode_value(buf: &mut BytesMut, value: &AmfValue) {
    match value {
        AmfValue::Null => buf.put_u8(MARKER_NULL),
        AmfValue::Undefined => buf.put_u8(MARKER_UNDEFINED),
        AmfValue::Boolean(b) => {
            buf.put_u8(MARKER_BOOLEAN);
            buf.put_u8(u8::from(*b));
        }
        AmfValue::Number(n) => {
            buf.put_u8(MARKER_NUMBER);
            buf.put_f64(*n);
        }
        AmfValue::String(s) => {
            if s.len() > 0xFFFF {
                buf.put_u8(MARKER_LONG_STRING);
                buf.put_u32(s.len() as u32);
            } else {
                buf.put_u8(MARKER_STRING);
                buf.put_u16(s.len() as u16);
            }
            buf.put_slice(s.as_bytes());
        }
        AmfValue::Object(props) => {
            buf.put_u8(MARKER_OBJECT);
            encode_properties(buf, props);
        }
        AmfValue::EcmaArray(props) => {
            buf.put_u8(MARKER_ECMA_ARRAY);
            buf.put_u32(props.len() as u32);
            encode_properties(buf, props);
        }
        AmfValue::Array(elements) => {
            buf.put_u8(MARKER_STRICT_ARRAY);
            buf.put_u32(elements.len() as u32);
            for elem in elements {
                encode_value(buf, elem);
            }
        }
    }
}

fn encode_properties(buf: &mut BytesMut, props: &[(String, AmfValue)]) {
    for (key, val) in props {
        let len = key.len().min(0xFFFF);
        buf.put_u16(len as u16);
        buf.put_slice(&key.as_bytes()[..len]);
        encode_value(buf, val);
    }
    buf.put_u16(0);
    buf.put_u8(MARKER_OBJECT_END);
}

/// Decode every value in a command payload
pub fn decode_all(mut buf: Bytes) -> Result<Vec<AmfValue>, AmfError> {
    let mut values = Vec::new();
    while buf.has_remaining() {
        values.push(decode_value(&mut buf, 0)?);
    }
    Ok(values)
}

fn decode_value(buf: &mut Bytes, depth: usize) -> Result<AmfValue, AmfError> {
    if depth > MAX_NESTING_DEPTH {
        return Err(AmfError::NestingTooDeep);
    }
    if !buf.has_remaining() {
        return Err(AmfError::UnexpectedEof);
    }

    match buf.get_u8() {
        MARKER_NUMBER => {
            ensure(buf, 8)?;
            Ok(AmfValue::Number(buf.get_f64()))
        }
        MARKER_BOOLEAN => {
            ensure(buf, 1)?;
            Ok(AmfValue::Boolean(buf.get_u8() != 0))
        }
        MARKER_STRING => Ok(AmfValue::String(read_utf8(buf)?)),
        MARKER_LONG_STRING => {
            ensure(buf, 4)?;
            let len = buf.get_u32() as usize;
            Ok(AmfValue::String(read_bytes_utf8(buf, len)?))
        }
        MARKER_OBJECT => Ok(AmfValue::Object(decode_properties(buf, depth)?)),
        MARKER_ECMA_ARRAY => {
            // Count hint, not always accurate
            ensure(buf, 4)?;
            let _count = buf.get_u32();
            Ok(AmfValue::EcmaArray(decode_properties(buf, depth)?))
        }
        MARKER_STRICT_ARRAY => {
            ensure(buf, 4)?;
            let count = buf.get_u32() as usize;
            let mut elements = Vec::with_capacity(count.min(64));
            for _ in 0..count {
                elements.push(decode_value(buf, depth + 1)?);
            }
            Ok(AmfValue::Array(elements))
        }
        MARKER_DATE => {
            ensure(buf, 10)?;
            let millis = buf.get_f64();
            let _timezone = buf.get_i16();
            Ok(AmfValue::Number(millis))
        }
        MARKER_NULL => Ok(AmfValue::Null),
        MARKER_UNDEFINED => Ok(AmfValue::Undefined),
        other => Err(AmfError::UnknownMarker(other)),
    }
}

fn decode_properties(buf: &mut Bytes, depth: usize) -> Result<Vec<(String, AmfValue)>, AmfError> {
    let mut props = Vec::new();
    loop {
        let key = read_utf8(buf)?;
        if key.is_empty() {
            // Some servers omit the end marker on the last object
            if !buf.has_remaining() {
                break;
            }
            if buf.get_u8() != MARKER_OBJECT_END {
                return Err(AmfError::InvalidObjectEnd);
            }
            break;
        }
        let value = decode_value(buf, depth + 1)?;
        props.push((key, value));
    }
    Ok(props)
}

fn ensure(buf: &Bytes, n: usize) -> Result<(), AmfError> {
    if buf.remaining() < n {
        Err(AmfError::UnexpectedEof)
    } else {
        Ok(())
    }
}

fn read_utf8(buf: &mut Bytes) -> Result<String, AmfError> {
    ensure(buf, 2)?;
    let len = buf.get_u16() as usize;
    read_bytes_utf8(buf, len)
}

fn read_bytes_utf8(buf: &mut Bytes, len: usize) -> Result<String, AmfError> {
    ensure(buf, len)?;
    let bytes = buf.copy_to_bytes(len);
    String::from_utf8(bytes.to_vec()).map_err(|_| AmfError::InvalidUtf8)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_string() {
        let encoded = encode_all(&[AmfValue::from("connect")]);
        assert_eq!(encoded[0], MARKER_STRING);
        assert_eq!(&encoded[1..3], &[0x00, 0x07]);
        assert_eq!(&encoded[3..], b"connect");
    }

    #[test]
    fn test_encode_object_keeps_order() {
        let obj = AmfValue::object([("app", AmfValue::from("live")), ("type", AmfValue::from("nonprivate"))]);
        let encoded = encode_all(&[obj]);

        assert_eq!(encoded[0], MARKER_OBJECT);
        assert_eq!(&encoded[1..3], &[0x00, 0x03]);
        assert_eq!(&encoded[3..6], b"app");
        // Object end: empty key + 0x09
        assert_eq!(&encoded[encoded.len() - 3..], &[0x00, 0x00, MARKER_OBJECT_END]);
    }

    #[test]
    fn test_decode_result_command() {
        let payload = encode_all(&[
            AmfValue::from("_result"),
            AmfValue::Number(2.0),
            AmfValue::Null,
            AmfValue::Number(1.0),
        ]);

        let values = decode_all(payload).unwrap();
        assert_eq!(values.len(), 4);
        assert_eq!(values[0].as_str(), Some("_result"));
        assert_eq!(values[1].as_number(), Some(2.0));
        assert_eq!(values[2], AmfValue::Null);
        assert_eq!(values[3].as_number(), Some(1.0));
    }

    #[test]
    fn test_decode_nested_status_object() {
        let info = AmfValue::object([
            ("level", AmfValue::from("status")),
            ("code", AmfValue::from("NetStream.Publish.Start")),
            ("data", AmfValue::EcmaArray(vec![("version".into(), AmfValue::from("3,5,1"))])),
            ("flags", AmfValue::Array(vec![AmfValue::Boolean(true), AmfValue::Undefined])),
        ]);
        let payload = encode_all(&[AmfValue::from("onStatus"), AmfValue::Number(0.0), AmfValue::Null, info.clone()]);

        let values = decode_all(payload).unwrap();
        assert_eq!(values[3], info);
        assert_eq!(values[3].get_string("code"), Some("NetStream.Publish.Start"));
    }

    #[test]
    fn test_decode_truncated() {
        assert_eq!(
            decode_all(Bytes::from_static(&[MARKER_NUMBER, 0x00, 0x01])),
            Err(AmfError::UnexpectedEof)
        );
        assert_eq!(
            decode_all(Bytes::from_static(&[MARKER_STRING, 0x00, 0x05, b'a'])),
            Err(AmfError::UnexpectedEof)
        );
    }

    #[test]
    fn test_decode_unknown_marker() {
        assert_eq!(
            decode_all(Bytes::from_static(&[0x11])),
            Err(AmfError::UnknownMarker(0x11))
        );
    }

    #[test]
    fn test_object_without_end_marker() {
        // key "a" -> null, then empty key with no trailing 0x09
        let data = Bytes::from_static(&[MARKER_OBJECT, 0x00, 0x01, b'a', MARKER_NULL, 0x00, 0x00]);
        let values = decode_all(data).unwrap();
        assert_eq!(values[0], AmfValue::Object(vec![("a".into(), AmfValue::Null)]));
    }

    #[test]
    fn test_nesting_limit() {
        let mut data = vec![MARKER_STRICT_ARRAY, 0, 0, 0, 1].repeat(MAX_NESTING_DEPTH + 2);
        data.push(MARKER_NULL);
        assert_eq!(decode_all(Bytes::from(data)), Err(AmfError::NestingTooDeep));
    }
}
