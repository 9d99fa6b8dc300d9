//! Session driver
//!
//! Wires a peer connection to a controller: one reader task per track fans
//! frames out, connection events feed the lifecycle, and the command
//! handler serves the control channel.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinSet;

use super::controller::SessionController;
use super::track::{ConnectionEvent, ControlChannel, MediaTrack};
use crate::control::CommandHandler;
use crate::sink::SinkConnector;

/// Drive one session until it closes
///
/// Returns once every track has ended or the connection reported
/// [`ConnectionEvent::Closed`], and all workers have been stopped. If the
/// event stream ends before any track arrived the session is closed, since
/// it can never start. The control channel closing on its own does not end
/// the session.
///
/// The command handler outlives this call: it keeps answering (with a
/// closed-session error) until the peer drops its side of the channel.
pub async fn run_session<C: SinkConnector>(
    controller: Arc<SessionController<C>>,
    mut events: mpsc::Receiver<ConnectionEvent>,
    control: ControlChannel,
) {
    let handler = CommandHandler::new(Arc::clone(&controller));
    tokio::spawn(handler.run(control));

    let mut readers = JoinSet::new();
    let mut events_open = true;

    loop {
        tokio::select! {
            _ = controller.wait_closed() => break,
            event = events.recv(), if events_open => match event {
                Some(ConnectionEvent::TrackAdded(track)) => {
                    if controller.track_added(&track.id, track.kind).await {
                        readers.spawn(read_track(Arc::clone(&controller), track));
                    }
                }
                Some(ConnectionEvent::Closed) => {
                    tracing::info!("Peer connection closed");
                    controller.close().await;
                    break;
                }
                None if controller.tracks().is_empty() => {
                    tracing::info!("Connection event stream ended without tracks");
                    controller.close().await;
                    break;
                }
                None => {
                    tracing::debug!("Connection event stream ended, waiting for tracks");
                    events_open = false;
                }
            },
        }
    }

    // Closing already stopped the workers; what remains are idle readers
    readers.shutdown().await;
}

async fn read_track<C: SinkConnector>(controller: Arc<SessionController<C>>, mut track: MediaTrack) {
    let mut frames = 0u64;
    while let Some(frame) = track.frames.recv().await {
        controller.on_frame(&frame);
        frames += 1;
    }

    tracing::debug!(track = %track.id, frames = frames, "Track reached end of stream");
    controller.track_ended(&track.id).await;
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::Value;

    use super::*;
    use crate::session::{SessionConfig, TrackKind};
    use crate::test_util::{video, MockConnector};

    struct Harness {
        events: mpsc::Sender<ConnectionEvent>,
        commands: mpsc::Sender<String>,
        responses: mpsc::Receiver<String>,
        session: tokio::task::JoinHandle<()>,
        controller: Arc<SessionController<MockConnector>>,
    }

    impl Harness {
        fn start(connector: &MockConnector) -> Self {
            let controller = SessionController::new(
                connector.clone(),
                SessionConfig::default().stop_timeout(Duration::from_millis(200)),
            );
            let (events, event_rx) = mpsc::channel(8);
            let (control, peer) = ControlChannel::pair(8);
            let session = tokio::spawn(run_session(Arc::clone(&controller), event_rx, control));

            Self {
                events,
                commands: peer.commands,
                responses: peer.responses,
                session,
                controller,
            }
        }

        async fn command(&mut self, json: &str) -> Value {
            self.commands.send(json.to_string()).await.unwrap();
            let text = tokio::time::timeout(Duration::from_secs(1), self.responses.recv())
                .await
                .unwrap()
                .unwrap();
            serde_json::from_str(&text).unwrap()
        }

        async fn add_track(&self, id: &str, kind: TrackKind) -> mpsc::Sender<crate::media::MediaFrame> {
            let expected = self.controller.tracks().len() + 1;
            let (tx, track) = MediaTrack::channel(id, kind, 16);
            self.events.send(ConnectionEvent::TrackAdded(track)).await.unwrap();

            tokio::time::timeout(Duration::from_secs(1), async {
                while self.controller.tracks().len() < expected {
                    tokio::time::sleep(Duration::from_millis(5)).await;
                }
            })
            .await
            .unwrap();
            tx
        }
    }

    #[tokio::test]
    async fn test_full_session() {
        let connector = MockConnector::new();
        let mut harness = Harness::start(&connector);

        let video_tx = harness.add_track("v0", TrackKind::Video).await;

        harness.command(r#"{"action":"add_url","url":"rtmp://a/1"}"#).await;
        harness.command(r#"{"action":"add_url","url":"rtmp://b/2"}"#).await;
        let response = harness.command(r#"{"action":"start"}"#).await;
        assert_eq!(response["status"], "ok");
        assert_eq!(response["urls"], serde_json::json!(["rtmp://a/1", "rtmp://b/2"]));

        let status = harness.command(r#"{"action":"status"}"#).await;
        assert_eq!(status["recording"], true);
        assert_eq!(status["active_recorders"], 2);
        assert_eq!(status["tracks"], 1);

        for ts in [0, 40, 80] {
            video_tx.send(video(ts)).await.unwrap();
        }

        // End of the only track closes the session
        drop(video_tx);
        tokio::time::timeout(Duration::from_secs(1), &mut harness.session)
            .await
            .unwrap()
            .unwrap();

        assert!(harness.controller.is_closed());
        assert!(!harness.controller.status().recording);
        assert_eq!(connector.timestamps("rtmp://a/1"), vec![0, 40, 80]);
        assert_eq!(connector.timestamps("rtmp://b/2"), vec![0, 40, 80]);
        assert!(connector.is_closed("rtmp://b/2"));
    }

    #[tokio::test]
    async fn test_connection_closed_forces_shutdown() {
        let connector = MockConnector::new();
        let mut harness = Harness::start(&connector);
        let _video_tx = harness.add_track("v0", TrackKind::Video).await;

        harness.command(r#"{"action":"add_url","url":"rtmp://a/1"}"#).await;
        harness.command(r#"{"action":"start"}"#).await;

        harness.events.send(ConnectionEvent::Closed).await.unwrap();
        tokio::time::timeout(Duration::from_secs(1), &mut harness.session)
            .await
            .unwrap()
            .unwrap();

        assert!(connector.is_closed("rtmp://a/1"));
        assert!(harness.controller.is_closed());
    }

    #[tokio::test]
    async fn test_commands_after_close_get_error() {
        let connector = MockConnector::new();
        let mut harness = Harness::start(&connector);
        let video_tx = harness.add_track("v0", TrackKind::Video).await;

        drop(video_tx);
        tokio::time::timeout(Duration::from_secs(1), &mut harness.session)
            .await
            .unwrap()
            .unwrap();

        for text in [r#"{"action":"status"}"#, r#"{"action":"list_urls"}"#] {
            let response = harness.command(text).await;
            assert_eq!(response["status"], "error");
            assert_eq!(response["message"], "session is closed");
        }
    }

    #[tokio::test]
    async fn test_events_end_without_tracks_closes() {
        let connector = MockConnector::new();
        let mut harness = Harness::start(&connector);

        drop(harness.events);
        tokio::time::timeout(Duration::from_secs(1), &mut harness.session)
            .await
            .unwrap()
            .unwrap();
        assert!(harness.controller.is_closed());

        harness
            .commands
            .send(r#"{"action":"start"}"#.to_string())
            .await
            .unwrap();
        let text = tokio::time::timeout(Duration::from_secs(1), harness.responses.recv())
            .await
            .unwrap()
            .unwrap();
        let response: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(response["status"], "error");
        assert_eq!(response["message"], "session is closed");
    }

    #[tokio::test]
    async fn test_events_end_with_tracks_keeps_session() {
        let connector = MockConnector::new();
        let harness = Harness::start(&connector);
        let video_tx = harness.add_track("v0", TrackKind::Video).await;

        drop(harness.events);
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!harness.session.is_finished());
        assert!(!harness.controller.is_closed());

        drop(video_tx);
        tokio::time::timeout(Duration::from_secs(1), harness.session)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_control_channel_close_keeps_session() {
        let connector = MockConnector::new();
        let harness = Harness::start(&connector);
        let video_tx = harness.add_track("v0", TrackKind::Video).await;

        drop(harness.commands);
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!harness.session.is_finished());

        drop(video_tx);
        tokio::time::timeout(Duration::from_secs(1), harness.session)
            .await
            .unwrap()
            .unwrap();
    }
}
