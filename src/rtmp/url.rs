//! RTMP destination URL parsing

use crate::error::{Error, Result};

use super::DEFAULT_PORT;

/// Parsed `rtmp://host[:port]/app[/...]/stream` URL
///
/// Everything between the host and the last path segment is the
/// application name, the last segment (query included) is the stream key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RtmpUrl {
    pub host: String,
    pub port: u16,
    pub app: String,
    pub stream_key: String,
}

impl RtmpUrl {
    pub fn parse(url: &str) -> Result<Self> {
        let rest = url
            .strip_prefix("rtmp://")
            .ok_or_else(|| Error::InvalidUrl(url.to_string()))?;

        let (authority, path) = rest
            .split_once('/')
            .ok_or_else(|| Error::InvalidUrl(url.to_string()))?;

        let (host, port) = match authority.rsplit_once(':') {
            Some((host, port)) => {
                let port = port
                    .parse::<u16>()
                    .map_err(|_| Error::InvalidUrl(url.to_string()))?;
                (host, port)
            }
            None => (authority, DEFAULT_PORT),
        };

        let (app, stream_key) = path
            .trim_end_matches('/')
            .rsplit_once('/')
            .ok_or_else(|| Error::InvalidUrl(url.to_string()))?;

        if host.is_empty() || app.is_empty() || stream_key.is_empty() {
            return Err(Error::InvalidUrl(url.to_string()));
        }

        Ok(Self {
            host: host.to_string(),
            port,
            app: app.to_string(),
            stream_key: stream_key.to_string(),
        })
    }

    /// `host:port` for the TCP connect
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// `tcUrl` sent in the connect command
    pub fn tc_url(&self) -> String {
        if self.port == DEFAULT_PORT {
            format!("rtmp://{}/{}", self.host, self.app)
        } else {
            format!("rtmp://{}:{}/{}", self.host, self.port, self.app)
        }
    }
}
