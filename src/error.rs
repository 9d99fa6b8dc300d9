//! Error types
//!
//! Errors are split by the boundary they cross:
//! - [`Error`]: sink and transport failures inside a forwarding worker
//! - [`SessionError`]: controller operations rejected by session state
//! - [`ProtocolError`]: control messages that could not be decoded

use std::time::Duration;

use thiserror::Error;

/// Result alias for sink and transport operations
pub type Result<T> = std::result::Result<T, Error>;

/// Transport-level error raised while pushing to a destination
#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("handshake failed: {0}")]
    Handshake(#[from] HandshakeError),

    #[error("AMF error: {0}")]
    Amf(#[from] AmfError),

    /// The remote server refused a command (connect, createStream, publish)
    #[error("server rejected {command}: {reason}")]
    Rtmp { command: String, reason: String },

    #[error("invalid destination url: {0}")]
    InvalidUrl(String),

    #[error("unsupported destination scheme: {0}")]
    UnsupportedScheme(String),

    #[error("connect timed out after {0:?}")]
    ConnectTimeout(Duration),

    #[error("sink is not connected")]
    NotConnected,
}

impl Error {
    pub(crate) fn rtmp(command: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::Rtmp {
            command: command.into(),
            reason: reason.into(),
        }
    }
}

/// RTMP handshake errors
#[derive(Debug, Clone, Error)]
pub enum HandshakeError {
    #[error("unsupported RTMP version {0}")]
    InvalidVersion(u8),

    #[error("connection closed during handshake")]
    UnexpectedEof,
}

/// AMF0 codec errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AmfError {
    #[error("unexpected end of AMF data")]
    UnexpectedEof,

    #[error("unknown AMF0 marker 0x{0:02x}")]
    UnknownMarker(u8),

    #[error("invalid UTF-8 in AMF string")]
    InvalidUtf8,

    #[error("AMF nesting too deep")]
    NestingTooDeep,

    #[error("missing AMF object end marker")]
    InvalidObjectEnd,
}

/// Session controller errors surfaced to the control channel
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// `start` was requested before any media track arrived
    #[error("no media tracks are available to record")]
    NoMedia,

    /// The session has reached its terminal state
    #[error("session is closed")]
    Closed,
}

/// Control message decode errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("malformed command: {0}")]
    Malformed(String),

    #[error("unknown action: {0}")]
    UnknownAction(String),

    #[error("action {action} requires field '{field}'")]
    MissingField {
        action: &'static str,
        field: &'static str,
    },
}
