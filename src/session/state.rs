//! Session lifecycle state machine
//!
//! ```text
//!   idle ──first track──► ready ──start──► recording
//!                           ▲                  │
//!                           └──────stop────────┘
//!   any ──last track ends / forced shutdown──► closed (terminal)
//! ```

use serde::Serialize;

use super::track::TrackInfo;

/// Session lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Lifecycle {
    /// No tracks yet
    Idle,
    /// Tracks present, not recording
    Ready,
    /// Fanning frames out to active destinations
    Recording,
    /// Terminal
    Closed,
}

impl Lifecycle {
    pub fn as_str(&self) -> &'static str {
        match self {
            Lifecycle::Idle => "idle",
            Lifecycle::Ready => "ready",
            Lifecycle::Recording => "recording",
            Lifecycle::Closed => "closed",
        }
    }

    pub fn is_recording(&self) -> bool {
        *self == Lifecycle::Recording
    }

    pub fn is_closed(&self) -> bool {
        *self == Lifecycle::Closed
    }
}

impl std::fmt::Display for Lifecycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle and subscribed tracks
#[derive(Debug, Clone)]
pub struct SessionState {
    pub lifecycle: Lifecycle,
    pub tracks: Vec<TrackInfo>,
}

impl SessionState {
    pub fn new() -> Self {
        Self {
            lifecycle: Lifecycle::Idle,
            tracks: Vec::new(),
        }
    }

    /// Subscribe a track; returns `false` for a duplicate id or a closed session
    pub fn add_track(&mut self, track: TrackInfo) -> bool {
        if self.lifecycle.is_closed() || self.tracks.iter().any(|t| t.id == track.id) {
            return false;
        }
        self.tracks.push(track);
        if self.lifecycle == Lifecycle::Idle {
            self.lifecycle = Lifecycle::Ready;
        }
        true
    }

    /// Unsubscribe a track; returns `true` if that left no tracks
    pub fn remove_track(&mut self, id: &str) -> bool {
        let before = self.tracks.len();
        self.tracks.retain(|t| t.id != id);
        before != self.tracks.len() && self.tracks.is_empty()
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}
