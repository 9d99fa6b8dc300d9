//! Session controller
//!
//! Owns the session lifecycle and drives the destination set from three
//! sources: control commands, track events, and worker failures. Every
//! transition runs under one async lock, so an explicit `stop` racing with
//! the last track ending tears down exactly once.

use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use serde::Serialize;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;

use super::config::SessionConfig;
use super::state::{Lifecycle, SessionState};
use super::track::{TrackInfo, TrackKind};
use crate::destination::{DestinationSet, DestinationState, DestinationStatus};
use crate::error::SessionError;
use crate::media::MediaFrame;
use crate::sink::SinkConnector;
use crate::worker::WorkerFailure;

/// Point-in-time session status
#[derive(Debug, Clone, Serialize)]
pub struct SessionStatus {
    pub recording: bool,
    pub lifecycle: Lifecycle,
    /// Registered destinations, in insertion order
    pub urls: Vec<String>,
    /// Number of subscribed tracks
    pub tracks: usize,
    /// Destinations with a running worker
    pub active_recorders: usize,
    pub destinations: Vec<DestinationStatus>,
}

/// Controller for one streaming session
///
/// # Example
///
/// ```
/// use rtmp_fanout::session::TrackKind;
/// use rtmp_fanout::{DefaultConnector, SessionConfig, SessionController};
///
/// # tokio_test::block_on(async {
/// let session = SessionController::new(DefaultConnector::default(), SessionConfig::default());
/// session.add_url("rtmp://localhost/live/key").await.unwrap();
/// session.track_added("video0", TrackKind::Video).await;
///
/// let status = session.status();
/// assert!(!status.recording);
/// assert_eq!(status.urls, vec!["rtmp://localhost/live/key"]);
/// # });
/// ```
pub struct SessionController<C: SinkConnector> {
    config: SessionConfig,
    destinations: Arc<DestinationSet<C>>,

    /// Serializes every lifecycle transition
    state: Mutex<SessionState>,

    /// Copy of `state` for non-blocking status reads
    published: RwLock<SessionState>,

    closed: CancellationToken,
}

impl<C: SinkConnector> SessionController<C> {
    /// Create a controller
    ///
    /// Must be called within a tokio runtime: a supervisor task is spawned
    /// to route worker failures back into the destination set.
    pub fn new(connector: C, config: SessionConfig) -> Arc<Self> {
        let (destinations, failures) = DestinationSet::new(
            connector,
            config.worker_config(),
            config.replay_sequence_headers,
        );
        let destinations = Arc::new(destinations);
        let closed = CancellationToken::new();

        tokio::spawn(supervise(
            Arc::downgrade(&destinations),
            failures,
            closed.clone(),
        ));

        Arc::new(Self {
            config,
            destinations,
            state: Mutex::new(SessionState::new()),
            published: RwLock::new(SessionState::new()),
            closed,
        })
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.published.read().lifecycle
    }

    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }

    /// Resolves once the session has closed and released its workers
    pub async fn wait_closed(&self) {
        self.closed.cancelled().await
    }

    /// Start recording to every registered destination
    ///
    /// A no-op if already recording. Destinations that fail to connect are
    /// marked failed; the session still records to the rest.
    pub async fn start(&self) -> Result<(), SessionError> {
        let mut state = self.state.lock().await;

        match state.lifecycle {
            Lifecycle::Closed => return Err(SessionError::Closed),
            Lifecycle::Recording => return Ok(()),
            Lifecycle::Idle | Lifecycle::Ready => {}
        }
        if state.tracks.is_empty() {
            return Err(SessionError::NoMedia);
        }

        let active = self.destinations.activate_all().await;
        state.lifecycle = Lifecycle::Recording;
        self.publish(&state);

        tracing::info!(
            active = active,
            destinations = self.destinations.len(),
            "Recording started"
        );
        Ok(())
    }

    /// Stop recording; tracks stay subscribed and `start` may be called again
    pub async fn stop(&self) -> Result<(), SessionError> {
        let mut state = self.state.lock().await;

        match state.lifecycle {
            Lifecycle::Closed => Err(SessionError::Closed),
            Lifecycle::Recording => {
                self.destinations.deactivate_all().await;
                state.lifecycle = Lifecycle::Ready;
                self.publish(&state);
                tracing::info!("Recording stopped");
                Ok(())
            }
            Lifecycle::Idle | Lifecycle::Ready => Ok(()),
        }
    }

    /// Register a destination; it starts immediately if recording
    pub async fn add_url(&self, url: &str) -> Result<DestinationState, SessionError> {
        let state = self.state.lock().await;
        if state.lifecycle.is_closed() {
            return Err(SessionError::Closed);
        }

        Ok(self
            .destinations
            .add(url, state.lifecycle.is_recording())
            .await)
    }

    /// Unregister a destination, stopping its worker first
    ///
    /// Returns whether the URL was registered.
    pub async fn remove_url(&self, url: &str) -> Result<bool, SessionError> {
        let state = self.state.lock().await;
        if state.lifecycle.is_closed() {
            return Err(SessionError::Closed);
        }

        Ok(self.destinations.remove(url).await)
    }

    /// Snapshot of the session; never waits on a worker or a transition
    pub fn status(&self) -> SessionStatus {
        let (lifecycle, tracks) = {
            let published = self.published.read();
            (published.lifecycle, published.tracks.len())
        };

        SessionStatus {
            recording: lifecycle.is_recording(),
            lifecycle,
            urls: self.destinations.list(),
            tracks,
            active_recorders: self.destinations.active_count(),
            destinations: self.destinations.statuses(),
        }
    }

    pub fn list_urls(&self) -> Vec<String> {
        self.destinations.list()
    }

    pub fn tracks(&self) -> Vec<TrackInfo> {
        self.published.read().tracks.clone()
    }

    /// Subscribe a newly arrived track
    ///
    /// Returns `false` if the session is closed or the id is already
    /// subscribed; the caller should not read that track.
    pub async fn track_added(&self, id: &str, kind: TrackKind) -> bool {
        let mut state = self.state.lock().await;

        let added = state.add_track(TrackInfo {
            id: id.to_string(),
            kind,
        });
        if added {
            self.publish(&state);
            tracing::info!(track = %id, kind = ?kind, lifecycle = %state.lifecycle, "Track added");
        } else {
            tracing::debug!(track = %id, lifecycle = %state.lifecycle, "Track ignored");
        }
        added
    }

    /// Unsubscribe a track; the session closes when none remain
    pub async fn track_ended(&self, id: &str) {
        let mut state = self.state.lock().await;

        let was_last = state.remove_track(id);
        self.publish(&state);
        tracing::info!(track = %id, remaining = state.tracks.len(), "Track ended");

        if was_last {
            self.shutdown(&mut state, "all tracks ended").await;
        }
    }

    /// Force the session closed
    ///
    /// Idempotent. Stops every worker and waits for them before returning.
    pub async fn close(&self) {
        let mut state = self.state.lock().await;
        self.shutdown(&mut state, "closed").await;
    }

    /// Fan one frame out to every active destination
    pub fn on_frame(&self, frame: &MediaFrame) {
        self.destinations.fan_out(frame);
    }

    async fn shutdown(&self, state: &mut SessionState, reason: &str) {
        if state.lifecycle.is_closed() {
            return;
        }

        let was_recording = state.lifecycle.is_recording();
        state.lifecycle = Lifecycle::Closed;
        self.publish(state);

        self.destinations.deactivate_all().await;
        self.closed.cancel();

        tracing::info!(
            reason = reason,
            was_recording = was_recording,
            destinations = self.destinations.len(),
            "Session closed"
        );
    }

    fn publish(&self, state: &SessionState) {
        *self.published.write() = state.clone();
    }
}

impl<C: SinkConnector> Drop for SessionController<C> {
    fn drop(&mut self) {
        self.closed.cancel();
    }
}

/// Route worker failures into the destination set until the session closes
async fn supervise<C: SinkConnector>(
    destinations: Weak<DestinationSet<C>>,
    mut failures: mpsc::UnboundedReceiver<WorkerFailure>,
    closed: CancellationToken,
) {
    loop {
        let failure = tokio::select! {
            _ = closed.cancelled() => break,
            failure = failures.recv() => match failure {
                Some(failure) => failure,
                None => break,
            },
        };

        let Some(destinations) = destinations.upgrade() else {
            break;
        };
        destinations.mark_failed(failure).await;
    }
}
