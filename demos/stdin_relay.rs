//! Drive a fan-out session from the terminal
//!
//! Run with: cargo run --example stdin_relay [SECONDS]
//!
//! Two synthetic tracks (video at 25 fps, audio at ~47 fps) stand in for a
//! WebRTC peer and run for SECONDS (default 60). Control commands are read
//! from stdin, one JSON object per line, and responses are printed to
//! stdout.
//!
//! Try:
//!   {"action":"add_url","url":"file:///tmp/out.flv"}
//!   {"action":"add_url","url":"rtmp://localhost/live/test_key"}
//!   {"action":"start"}
//!   {"action":"status"}
//!   {"action":"remove_url","url":"file:///tmp/out.flv"}
//!   {"action":"stop"}
//!
//! The payloads are not decodable media; point it at a local relay (for
//! example nginx-rtmp on localhost) rather than a
//! real platform. Set `RUST_LOG=rtmp_fanout=debug` for worker detail.

use std::time::Duration;

use bytes::{BufMut, Bytes, BytesMut};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use rtmp_fanout::session::{ConnectionEvent, ControlChannel, ControlPeer, MediaTrack, TrackKind};
use rtmp_fanout::{run_session, DefaultConnector, MediaFrame, SessionConfig, SessionController};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("rtmp_fanout=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let seconds: u64 = std::env::args()
        .nth(1)
        .and_then(|s| s.parse().ok())
        .unwrap_or(60);

    let config = SessionConfig::default();
    let controller = SessionController::new(DefaultConnector::default(), config.clone());

    let (event_tx, event_rx) = mpsc::channel(4);
    let (control, peer) = ControlChannel::pair(config.control_buffer);
    let ControlPeer {
        commands,
        mut responses,
    } = peer;

    let (video_tx, video_track) = MediaTrack::channel("video0", TrackKind::Video, 64);
    let (audio_tx, audio_track) = MediaTrack::channel("audio0", TrackKind::Audio, 64);
    let _ = event_tx.send(ConnectionEvent::TrackAdded(video_track)).await;
    let _ = event_tx.send(ConnectionEvent::TrackAdded(audio_track)).await;

    let session = tokio::spawn(run_session(controller, event_rx, control));

    tokio::spawn(synthetic_video(video_tx, seconds));
    tokio::spawn(synthetic_audio(audio_tx, seconds));

    // stdin -> control channel
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            if commands.send(line.to_string()).await.is_err() {
                break;
            }
        }
    });

    // control channel -> stdout
    let printer = tokio::spawn(async move {
        while let Some(response) = responses.recv().await {
            println!("{}", response);
        }
    });

    println!("Streaming synthetic tracks for {}s; type JSON commands", seconds);
    let _ = session.await;
    printer.abort();
    println!("Session closed");
}

async fn synthetic_video(tx: mpsc::Sender<MediaFrame>, seconds: u64) {
    // AVC sequence header: keyframe + AVC, packet type 0, minimal record
    let header = Bytes::from_static(&[
        0x17, 0x00, 0x00, 0x00, 0x00, 0x01, 0x42, 0xC0, 0x1F, 0xFF, 0xE1, 0x00, 0x00, 0x01, 0x00,
        0x00,
    ]);
    if tx.send(MediaFrame::from_video_body(0, header)).await.is_err() {
        return;
    }

    let mut ticker = tokio::time::interval(Duration::from_millis(40));
    for n in 0..seconds * 25 {
        ticker.tick().await;
        let keyframe = n % 50 == 0;
        let mut body = BytesMut::with_capacity(1024);
        body.put_u8(if keyframe { 0x17 } else { 0x27 });
        body.put_u8(0x01);
        body.put_slice(&[0, 0, 0]);
        body.put_bytes(0xAB, if keyframe { 4096 } else { 800 });

        let frame = MediaFrame::from_video_body((n * 40) as u32, body.freeze());
        if tx.send(frame).await.is_err() {
            return;
        }
    }
}

async fn synthetic_audio(tx: mpsc::Sender<MediaFrame>, seconds: u64) {
    // AAC LC, 48 kHz, stereo
    let header = Bytes::from_static(&[0xAF, 0x00, 0x11, 0x90]);
    if tx.send(MediaFrame::from_audio_body(0, header)).await.is_err() {
        return;
    }

    let mut ticker = tokio::time::interval(Duration::from_micros(21_333));
    for n in 0..seconds * 47 {
        ticker.tick().await;
        let mut body = BytesMut::with_capacity(200);
        body.put_slice(&[0xAF, 0x01]);
        body.put_bytes(0xCD, 180);

        let frame = MediaFrame::from_audio_body((n * 21) as u32, body.freeze());
        if tx.send(frame).await.is_err() {
            return;
        }
    }
}
