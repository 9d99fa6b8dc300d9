//! Destination set implementation

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures::future::join_all;
use parking_lot::RwLock;
use tokio::sync::{mpsc, Mutex};

use super::entry::{DestinationEntry, DestinationState, DestinationStatus, EntryView};
use super::headers::SequenceHeaders;
use crate::error::Result;
use crate::media::{FrameKind, MediaFrame};
use crate::sink::SinkConnector;
use crate::worker::forwarder::FrameTap;
use crate::worker::{ForwardingWorker, WorkerConfig, WorkerFailure};

/// Immutable view read by fan-out and status queries
#[derive(Default)]
struct Snapshot {
    entries: Vec<EntryView>,
    taps: Vec<FrameTap>,
}

/// Set of destinations keyed by URL, in insertion order
///
/// Mutating operations (`add`, `remove`, `activate_all`, `deactivate_all`,
/// `mark_failed`) are mutually exclusive. Reads (`list`, `statuses`,
/// `fan_out`) never wait for them.
pub struct DestinationSet<C: SinkConnector> {
    connector: C,
    config: WorkerConfig,
    replay_headers: bool,

    /// Authoritative entries; at most one worker per URL
    entries: Mutex<Vec<DestinationEntry>>,

    /// Republished after every mutation
    snapshot: RwLock<Arc<Snapshot>>,

    headers: RwLock<SequenceHeaders>,
    failures: mpsc::UnboundedSender<WorkerFailure>,
    next_worker_id: AtomicU64,
}

impl<C: SinkConnector> DestinationSet<C> {
    /// Create an empty set
    ///
    /// Workers that fail on their own report through the returned receiver;
    /// feed those reports back into [`mark_failed`](Self::mark_failed).
    pub fn new(
        connector: C,
        config: WorkerConfig,
        replay_headers: bool,
    ) -> (Self, mpsc::UnboundedReceiver<WorkerFailure>) {
        let (failures, failure_rx) = mpsc::unbounded_channel();

        let set = Self {
            connector,
            config,
            replay_headers,
            entries: Mutex::new(Vec::new()),
            snapshot: RwLock::new(Arc::new(Snapshot::default())),
            headers: RwLock::new(SequenceHeaders::default()),
            failures,
            next_worker_id: AtomicU64::new(1),
        };

        (set, failure_rx)
    }

    /// Register `url`, starting a worker right away if `activate` is set
    ///
    /// Adding a URL that is already registered changes nothing and returns
    /// its current state.
    pub async fn add(&self, url: &str, activate: bool) -> DestinationState {
        let mut entries = self.entries.lock().await;

        if let Some(existing) = entries.iter().find(|e| e.url == url) {
            tracing::debug!(url = %url, state = %existing.state, "Destination already registered");
            return existing.state;
        }

        let mut entry = DestinationEntry::new(url);
        if activate {
            let result = self.spawn(url).await;
            apply_start(&mut entry, result);
        }

        let state = entry.state;
        entries.push(entry);
        self.publish(&entries);

        tracing::info!(url = %url, state = %state, destinations = entries.len(), "Destination added");
        state
    }

    /// Unregister `url`, stopping its worker before returning
    ///
    /// Returns `false` if the URL was not registered. Once this returns no
    /// further frames reach the destination.
    pub async fn remove(&self, url: &str) -> bool {
        let mut entries = self.entries.lock().await;

        let Some(index) = entries.iter().position(|e| e.url == url) else {
            tracing::debug!(url = %url, "Remove of unknown destination ignored");
            return false;
        };

        let mut entry = entries.remove(index);
        self.publish(&entries);

        if let Some(mut worker) = entry.worker.take() {
            worker.stop().await;
        }

        tracing::info!(url = %url, destinations = entries.len(), "Destination removed");
        true
    }

    /// Start a worker for every destination that has none
    ///
    /// Connections are attempted concurrently; a destination that fails to
    /// connect is marked failed without affecting the others. Returns the
    /// number of active destinations afterwards.
    pub async fn activate_all(&self) -> usize {
        let mut entries = self.entries.lock().await;

        let pending: Vec<(usize, String)> = entries
            .iter()
            .enumerate()
            .filter(|(_, e)| e.wants_worker())
            .map(|(i, e)| (i, e.url.clone()))
            .collect();

        let results = join_all(pending.iter().map(|(_, url)| self.spawn(url))).await;

        for ((index, _), result) in pending.into_iter().zip(results) {
            apply_start(&mut entries[index], result);
        }
        self.publish(&entries);

        let active = count_active(&entries);
        tracing::debug!(active = active, total = entries.len(), "Destinations activated");
        active
    }

    /// Stop every running worker, returning its destination to inactive
    ///
    /// Failed destinations keep their state and error.
    pub async fn deactivate_all(&self) {
        let mut entries = self.entries.lock().await;

        let mut workers: Vec<ForwardingWorker> = entries
            .iter_mut()
            .filter_map(|entry| {
                let worker = entry.worker.take()?;
                entry.state = DestinationState::Inactive;
                Some(worker)
            })
            .collect();

        // Taps leave the snapshot before the workers drain
        self.publish(&entries);

        join_all(workers.iter_mut().map(|w| w.stop())).await;

        if !workers.is_empty() {
            tracing::debug!(stopped = workers.len(), "Destinations deactivated");
        }
    }

    /// Record a worker's own failure
    ///
    /// Reports from a worker that has since been stopped or replaced are
    /// ignored.
    pub async fn mark_failed(&self, failure: WorkerFailure) {
        let mut entries = self.entries.lock().await;

        let Some(entry) = entries.iter_mut().find(|e| {
            e.worker
                .as_ref()
                .is_some_and(|w| w.id() == failure.worker_id)
        }) else {
            tracing::debug!(url = %failure.url, worker_id = failure.worker_id, "Stale worker failure ignored");
            return;
        };

        let worker = entry.worker.take();
        entry.fail(failure.error.clone());
        self.publish(&entries);

        tracing::warn!(url = %failure.url, error = %failure.error, "Destination failed");

        if let Some(mut worker) = worker {
            worker.stop().await;
        }
    }

    /// Deliver `frame` to every active worker without waiting
    pub fn fan_out(&self, frame: &MediaFrame) {
        if self.replay_headers && (frame.is_header || frame.kind == FrameKind::Metadata) {
            self.headers.write().observe(frame);
        }

        let snapshot = self.snapshot.read().clone();
        for tap in &snapshot.taps {
            tap.push(frame.clone());
        }
    }

    /// Registered URLs in insertion order
    pub fn list(&self) -> Vec<String> {
        self.snapshot
            .read()
            .entries
            .iter()
            .map(|e| e.url.clone())
            .collect()
    }

    pub fn statuses(&self) -> Vec<DestinationStatus> {
        self.snapshot.read().entries.iter().map(|e| e.status()).collect()
    }

    pub fn state(&self, url: &str) -> Option<DestinationState> {
        self.snapshot
            .read()
            .entries
            .iter()
            .find(|e| e.url == url)
            .map(|e| e.state)
    }

    pub fn len(&self) -> usize {
        self.snapshot.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn active_count(&self) -> usize {
        self.snapshot.read().taps.len()
    }

    async fn spawn(&self, url: &str) -> Result<ForwardingWorker> {
        let id = self.next_worker_id.fetch_add(1, Ordering::Relaxed);
        let priming = if self.replay_headers {
            self.headers.read().priming()
        } else {
            Vec::new()
        };

        ForwardingWorker::start(
            id,
            url,
            &self.connector,
            &self.config,
            priming,
            self.failures.clone(),
        )
        .await
    }

    fn publish(&self, entries: &[DestinationEntry]) {
        let snapshot = Snapshot {
            entries: entries.iter().map(EntryView::from).collect(),
            taps: entries
                .iter()
                .filter_map(|e| e.worker.as_ref().map(|w| w.sender()))
                .collect(),
        };
        *self.snapshot.write() = Arc::new(snapshot);
    }
}

fn apply_start(entry: &mut DestinationEntry, result: Result<ForwardingWorker>) {
    match result {
        Ok(worker) => entry.activate(worker),
        Err(e) => {
            tracing::warn!(url = %entry.url, error = %e, "Failed to start forwarding worker");
            entry.fail(e.to_string());
        }
    }
}

fn count_active(entries: &[DestinationEntry]) -> usize {
    entries
        .iter()
        .filter(|e| e.state == DestinationState::Active)
        .count()
}
