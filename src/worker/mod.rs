//! Forwarding workers
//!
//! One worker owns one destination. It is a supervised task with an
//! explicit handle:
//!
//! ```text
//!   fan-out ──try_send──► [bounded queue] ──► worker task ──► MediaSink ──► destination
//!                                                 ▲
//!   stop() ── cancel ──────────────────────────────┘  (drain, close, join; abort after timeout)
//! ```
//!
//! `push` never waits: when a destination falls behind its queue fills and
//! new frames are dropped for that destination only.

pub mod forwarder;

use std::time::Duration;

pub use forwarder::{ForwardingWorker, WorkerFailure};

/// Worker tuning shared by every destination of a session
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Frames buffered per destination before new ones are dropped
    pub frame_buffer: usize,

    /// Bound on establishing the outbound connection
    pub connect_timeout: Duration,

    /// Bound on graceful teardown before the task is aborted
    pub stop_timeout: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            frame_buffer: 512,
            connect_timeout: Duration::from_secs(10),
            stop_timeout: Duration::from_secs(5),
        }
    }
}
