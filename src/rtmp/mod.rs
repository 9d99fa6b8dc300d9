//! RTMP push client
//!
//! Just enough of RTMP to publish one stream to an ingest server such as
//! YouTube, Twitch or a local nginx-rtmp relay. Server-side RTMP, AMF3 and
//! the HMAC handshake are not needed for pushing and are not implemented.

pub mod chunk;
pub mod config;
pub mod handshake;
pub mod message;
pub mod publisher;
pub mod url;

pub use config::PublishConfig;
pub use publisher::RtmpPublisher;
pub use url::RtmpUrl;

/// RTMP protocol version sent in C0
pub const RTMP_VERSION: u8 = 3;

/// Size of C1/C2/S1/S2
pub const HANDSHAKE_SIZE: usize = 1536;

/// Chunk size both peers start with
pub const DEFAULT_CHUNK_SIZE: u32 = 128;

/// Largest chunk size we announce or accept (message length is 24 bits)
pub const MAX_CHUNK_SIZE: u32 = 0x00FF_FFFF;

/// Default RTMP port
pub const DEFAULT_PORT: u16 = 1935;
