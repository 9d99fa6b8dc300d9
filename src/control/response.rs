//! Control responses

use serde::Serialize;

use crate::destination::DestinationStatus;
use crate::session::SessionStatus;

/// Outcome of a command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseStatus {
    Ok,
    Error,
}

/// Response to one control message
///
/// Only the fields relevant to the action are serialized.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Response {
    pub status: ResponseStatus,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub urls: Option<Vec<String>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub recording: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub tracks: Option<usize>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub active_recorders: Option<usize>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub destinations: Option<Vec<DestinationStatus>>,
}

impl Response {
    pub fn ok(action: &str) -> Self {
        Self {
            status: ResponseStatus::Ok,
            action: Some(action.to_string()),
            ..Self::empty()
        }
    }

    /// Error response; `action` is `None` when the message could not be read
    pub fn error(action: Option<&str>, message: impl Into<String>) -> Self {
        Self {
            status: ResponseStatus::Error,
            action: action.map(str::to_string),
            message: Some(message.into()),
            ..Self::empty()
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn with_urls(mut self, urls: Vec<String>) -> Self {
        self.urls = Some(urls);
        self
    }

    pub fn with_status(mut self, status: SessionStatus) -> Self {
        self.recording = Some(status.recording);
        self.urls = Some(status.urls);
        self.tracks = Some(status.tracks);
        self.active_recorders = Some(status.active_recorders);
        self.destinations = Some(status.destinations);
        self
    }

    pub fn is_ok(&self) -> bool {
        self.status == ResponseStatus::Ok
    }

    /// Serialize for the data channel
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    fn empty() -> Self {
        Self {
            status: ResponseStatus::Ok,
            action: None,
            message: None,
            url: None,
            urls: None,
            recording: None,
            tracks: None,
            active_recorders: None,
            destinations: None,
        }
    }
}
