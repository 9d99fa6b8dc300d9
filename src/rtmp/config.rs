//! RTMP publisher configuration

use std::time::Duration;

use super::MAX_CHUNK_SIZE;

/// Options for pushing to an RTMP ingest
#[derive(Debug, Clone)]
pub struct PublishConfig {
    /// Outgoing chunk size announced after the handshake
    pub chunk_size: u32,

    /// `flashVer` sent in the connect command
    pub flash_ver: String,

    /// How long to wait for each command reply during setup
    pub read_timeout: Duration,

    /// Enable TCP_NODELAY (disable Nagle's algorithm)
    pub tcp_nodelay: bool,
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            chunk_size: 4096,
            flash_ver: "FMLE/3.0 (compatible; rtmp-fanout)".to_string(),
            read_timeout: Duration::from_secs(10),
            tcp_nodelay: true, // Important for low latency
        }
    }
}

impl PublishConfig {
    /// Set the outgoing chunk size
    pub fn chunk_size(mut self, size: u32) -> Self {
        self.chunk_size = size.clamp(128, MAX_CHUNK_SIZE);
        self
    }

    /// Set the flash version string
    pub fn flash_ver(mut self, flash_ver: impl Into<String>) -> Self {
        self.flash_ver = flash_ver.into();
        self
    }

    /// Set the command reply timeout
    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Toggle TCP_NODELAY
    pub fn tcp_nodelay(mut self, enabled: bool) -> Self {
        self.tcp_nodelay = enabled;
        self
    }
}
