//! In-memory sinks for exercising workers and sessions without a network

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;

use crate::error::{Error, Result};
use crate::media::MediaFrame;
use crate::sink::{MediaSink, SinkConnector};

pub(crate) fn video(timestamp: u32) -> MediaFrame {
    MediaFrame::video(timestamp, Bytes::from_static(&[0x27, 0x01, 0x00]), false, false)
}

#[derive(Debug, Default)]
struct Destination {
    frames: Vec<MediaFrame>,
    connects: usize,
    closes: usize,
    dropped: bool,
}

#[derive(Debug, Default)]
struct State {
    destinations: HashMap<String, Destination>,
    refuse: HashSet<String>,
    hang: HashSet<String>,
    stall: HashSet<String>,
    fail_after: HashMap<String, usize>,
}

/// Connector whose sinks record frames in memory
#[derive(Debug, Clone, Default)]
pub(crate) struct MockConnector {
    state: Arc<Mutex<State>>,
}

impl MockConnector {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Refuse connections to `url`
    pub(crate) fn fail_connect(&self, url: &str) {
        self.state.lock().refuse.insert(url.to_string());
    }

    /// Never finish connecting to `url`
    pub(crate) fn hang_connect(&self, url: &str) {
        self.state.lock().hang.insert(url.to_string());
    }

    /// Block forever on every write to `url`
    pub(crate) fn stall(&self, url: &str) {
        self.state.lock().stall.insert(url.to_string());
    }

    /// Fail writes to `url` once `n` frames have been written
    pub(crate) fn fail_after(&self, url: &str, n: usize) {
        self.state.lock().fail_after.insert(url.to_string(), n);
    }

    /// Let `url` connect again after `fail_connect`
    pub(crate) fn heal(&self, url: &str) {
        let mut state = self.state.lock();
        state.refuse.remove(url);
        state.fail_after.remove(url);
    }

    pub(crate) fn frames(&self, url: &str) -> Vec<MediaFrame> {
        self.with(url, |d| d.frames.clone())
    }

    pub(crate) fn timestamps(&self, url: &str) -> Vec<u32> {
        self.with(url, |d| d.frames.iter().map(|f| f.timestamp).collect())
    }

    pub(crate) fn connects(&self, url: &str) -> usize {
        self.with(url, |d| d.connects)
    }

    pub(crate) fn close_count(&self, url: &str) -> usize {
        self.with(url, |d| d.closes)
    }

    pub(crate) fn is_closed(&self, url: &str) -> bool {
        self.close_count(url) > 0
    }

    pub(crate) fn is_dropped(&self, url: &str) -> bool {
        self.with(url, |d| d.dropped)
    }

    fn with<T>(&self, url: &str, f: impl FnOnce(&Destination) -> T) -> T {
        let state = self.state.lock();
        match state.destinations.get(url) {
            Some(d) => f(d),
            None => f(&Destination::default()),
        }
    }
}

impl SinkConnector for MockConnector {
    type Sink = MockSink;

    async fn connect(&self, url: &str) -> Result<MockSink> {
        let (refused, hang, stall) = {
            let state = self.state.lock();
            (
                state.refuse.contains(url),
                state.hang.contains(url),
                state.stall.contains(url),
            )
        };

        if hang {
            std::future::pending::<()>().await;
        }
        if refused {
            return Err(Error::Io(std::io::ErrorKind::ConnectionRefused.into()));
        }

        let mut state = self.state.lock();
        let destination = state.destinations.entry(url.to_string()).or_default();
        destination.connects += 1;
        destination.dropped = false;

        Ok(MockSink {
            url: url.to_string(),
            state: Arc::clone(&self.state),
            written: 0,
            stall,
        })
    }
}

/// Sink produced by [`MockConnector`]
#[derive(Debug)]
pub(crate) struct MockSink {
    url: String,
    state: Arc<Mutex<State>>,
    written: usize,
    stall: bool,
}

impl MediaSink for MockSink {
    async fn write_frame(&mut self, frame: &MediaFrame, timestamp: u32) -> Result<()> {
        if self.stall {
            std::future::pending::<()>().await;
        }

        let mut state = self.state.lock();
        if let Some(&limit) = state.fail_after.get(&self.url) {
            if self.written >= limit {
                return Err(Error::Io(std::io::ErrorKind::BrokenPipe.into()));
            }
        }

        let mut recorded = frame.clone();
        recorded.timestamp = timestamp;
        if let Some(destination) = state.destinations.get_mut(&self.url) {
            destination.frames.push(recorded);
        }
        self.written += 1;
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        if let Some(destination) = self.state.lock().destinations.get_mut(&self.url) {
            destination.closes += 1;
        }
        Ok(())
    }
}

impl Drop for MockSink {
    fn drop(&mut self) {
        if let Some(destination) = self.state.lock().destinations.get_mut(&self.url) {
            destination.dropped = true;
        }
    }
}
