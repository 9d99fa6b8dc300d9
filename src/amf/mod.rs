//! AMF0 support for RTMP command messages
//!
//! Only the subset an RTMP publisher needs: encoding `connect`,
//! `createStream`, `publish` and `@setDataFrame` payloads, and decoding the
//! `_result` / `_error` / `onStatus` replies the server sends back.

pub mod amf0;
pub mod value;

pub use value::AmfValue;
