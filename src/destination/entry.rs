//! Destination entry and state types

use std::sync::Arc;

use serde::Serialize;

use crate::stats::WorkerCounters;
use crate::worker::ForwardingWorker;

/// State of a destination
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DestinationState {
    /// Registered but not pushing
    Inactive,
    /// Worker running
    Active,
    /// Worker terminated with an error
    Failed,
}

impl DestinationState {
    pub fn as_str(&self) -> &'static str {
        match self {
            DestinationState::Inactive => "inactive",
            DestinationState::Active => "active",
            DestinationState::Failed => "failed",
        }
    }
}

impl std::fmt::Display for DestinationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Point-in-time view of one destination
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DestinationStatus {
    pub url: String,
    pub state: DestinationState,
    pub frames_sent: u64,
    pub frames_dropped: u64,
    pub bytes_sent: u64,
    /// Average payload bitrate since the worker started (bits/sec)
    pub bitrate: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Entry owned by the set's critical section
pub(super) struct DestinationEntry {
    pub url: String,
    pub state: DestinationState,

    /// Present exactly when `state` is `Active`
    pub worker: Option<ForwardingWorker>,

    /// Counters of the most recent worker, kept after it stops
    pub counters: Option<Arc<WorkerCounters>>,

    /// Cause of the last failure
    pub error: Option<String>,
}

impl DestinationEntry {
    pub fn new(url: &str) -> Self {
        Self {
            url: url.to_string(),
            state: DestinationState::Inactive,
            worker: None,
            counters: None,
            error: None,
        }
    }

    /// Install a freshly started worker
    pub fn activate(&mut self, worker: ForwardingWorker) {
        self.counters = Some(worker.counters());
        self.worker = Some(worker);
        self.state = DestinationState::Active;
        self.error = None;
    }

    pub fn fail(&mut self, error: String) {
        self.state = DestinationState::Failed;
        self.error = Some(error);
    }

    /// Whether `activate_all` should (re)start this destination
    pub fn wants_worker(&self) -> bool {
        self.worker.is_none()
    }
}

/// Read-only projection published to the snapshot
#[derive(Debug, Clone)]
pub(super) struct EntryView {
    pub url: String,
    pub state: DestinationState,
    pub counters: Option<Arc<WorkerCounters>>,
    pub error: Option<String>,
}

impl EntryView {
    pub fn status(&self) -> DestinationStatus {
        let stats = self
            .counters
            .as_ref()
            .map(|c| c.snapshot())
            .unwrap_or_default();

        DestinationStatus {
            url: self.url.clone(),
            state: self.state,
            frames_sent: stats.frames_sent,
            frames_dropped: stats.frames_dropped,
            bytes_sent: stats.bytes_sent,
            bitrate: stats.bitrate(),
            error: self.error.clone(),
        }
    }
}

impl From<&DestinationEntry> for EntryView {
    fn from(entry: &DestinationEntry) -> Self {
        Self {
            url: entry.url.clone(),
            state: entry.state,
            counters: entry.counters.clone(),
            error: entry.error.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_serializes_lowercase() {
        let json = serde_json::to_string(&DestinationState::Failed).unwrap();
        assert_eq!(json, "\"failed\"");
        assert_eq!(DestinationState::Active.to_string(), "active");
    }

    #[test]
    fn test_status_omits_missing_error() {
        let view = EntryView::from(&DestinationEntry::new("rtmp://a/live/1"));
        let json = serde_json::to_value(view.status()).unwrap();

        assert_eq!(json["state"], "inactive");
        assert_eq!(json["frames_sent"], 0);
        assert_eq!(json["bytes_sent"], 0);
        assert_eq!(json["bitrate"], 0);
        assert!(json.get("error").is_none());
    }

    #[test]
    fn test_fail_records_cause() {
        let mut entry = DestinationEntry::new("rtmp://a/live/1");
        entry.fail("connection refused".into());

        let status = EntryView::from(&entry).status();
        assert_eq!(status.state, DestinationState::Failed);
        assert_eq!(status.error.as_deref(), Some("connection refused"));
        assert!(entry.wants_worker());
    }
}
