//! Session configuration

use std::time::Duration;

use crate::worker::WorkerConfig;

/// Session configuration options
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Frames queued per destination before new frames are dropped
    pub frame_buffer: usize,

    /// Destinations that cannot connect within this time are marked failed
    pub connect_timeout: Duration,

    /// Bounded wait for a worker to flush and close before it is aborted
    pub stop_timeout: Duration,

    /// Capacity of the control channel queues
    pub control_buffer: usize,

    /// Prime late-started destinations with cached sequence headers
    pub replay_sequence_headers: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        let worker = WorkerConfig::default();
        Self {
            frame_buffer: worker.frame_buffer,
            connect_timeout: worker.connect_timeout,
            stop_timeout: worker.stop_timeout,
            control_buffer: 32,
            replay_sequence_headers: true,
        }
    }
}

impl SessionConfig {
    /// Set the per-destination frame queue capacity
    pub fn frame_buffer(mut self, frames: usize) -> Self {
        self.frame_buffer = frames.max(1);
        self
    }

    /// Set the destination connect timeout
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the worker stop timeout
    pub fn stop_timeout(mut self, timeout: Duration) -> Self {
        self.stop_timeout = timeout;
        self
    }

    /// Set the control channel capacity
    pub fn control_buffer(mut self, messages: usize) -> Self {
        self.control_buffer = messages.max(1);
        self
    }

    /// Disable sequence header replay
    pub fn disable_header_replay(mut self) -> Self {
        self.replay_sequence_headers = false;
        self
    }

    /// Worker settings derived from this config
    pub fn worker_config(&self) -> WorkerConfig {
        WorkerConfig {
            frame_buffer: self.frame_buffer,
            connect_timeout: self.connect_timeout,
            stop_timeout: self.stop_timeout,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SessionConfig::default();

        assert_eq!(config.frame_buffer, 512);
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
        assert_eq!(config.stop_timeout, Duration::from_secs(5));
        assert_eq!(config.control_buffer, 32);
        assert!(config.replay_sequence_headers);
    }

    #[test]
    fn test_builder_frame_buffer_minimum() {
        let config = SessionConfig::default().frame_buffer(0);

        assert_eq!(config.frame_buffer, 1);
    }

    #[test]
    fn test_worker_config() {
        let config = SessionConfig::default()
            .connect_timeout(Duration::from_secs(3))
            .stop_timeout(Duration::from_millis(500))
            .frame_buffer(64);
        let worker = config.worker_config();

        assert_eq!(worker.frame_buffer, 64);
        assert_eq!(worker.connect_timeout, Duration::from_secs(3));
        assert_eq!(worker.stop_timeout, Duration::from_millis(500));
    }

    #[test]
    fn test_builder_disable_header_replay() {
        let config = SessionConfig::default().disable_header_replay();

        assert!(!config.replay_sequence_headers);
    }
}
