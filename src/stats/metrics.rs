//! Statistics for forwarding workers

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Lock-free counters updated by a worker and read by status queries
#[derive(Debug)]
pub struct WorkerCounters {
    started_at: Instant,
    frames_sent: AtomicU64,
    bytes_sent: AtomicU64,
    frames_dropped: AtomicU64,
}

impl WorkerCounters {
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
            frames_sent: AtomicU64::new(0),
            bytes_sent: AtomicU64::new(0),
            frames_dropped: AtomicU64::new(0),
        }
    }

    /// Record a frame written to the sink
    pub fn record_sent(&self, bytes: usize) {
        self.frames_sent.fetch_add(1, Ordering::Relaxed);
        self.bytes_sent.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    /// Record a frame dropped because the worker queue was full
    pub fn record_dropped(&self) -> u64 {
        self.frames_dropped.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Point-in-time copy of the counters
    pub fn snapshot(&self) -> WorkerStats {
        WorkerStats {
            frames_sent: self.frames_sent.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            frames_dropped: self.frames_dropped.load(Ordering::Relaxed),
            duration: self.started_at.elapsed(),
        }
    }
}

impl Default for WorkerCounters {
    fn default() -> Self {
        Self::new()
    }
}

/// Worker statistics snapshot
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkerStats {
    /// Frames written to the destination
    pub frames_sent: u64,
    /// Payload bytes written to the destination
    pub bytes_sent: u64,
    /// Frames dropped because the destination fell behind
    pub frames_dropped: u64,
    /// Time since the worker started
    pub duration: Duration,
}

impl WorkerStats {
    /// Average outgoing payload bitrate (bits/sec)
    pub fn bitrate(&self) -> u64 {
        let secs = self.duration.as_secs();
        if secs > 0 {
            (self.bytes_sent * 8) / secs
        } else {
            0
        }
    }
}
