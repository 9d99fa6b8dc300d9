//! Streaming session
//!
//! A session owns the tracks of one peer connection and the set of
//! destinations they are fanned out to. See [`SessionController`] for the
//! operations and [`run_session`] for driving one from a connection.

pub mod config;
pub mod controller;
pub mod runner;
pub mod state;
pub mod track;

pub use config::SessionConfig;
pub use controller::{SessionController, SessionStatus};
pub use runner::run_session;
pub use state::{Lifecycle, SessionState};
pub use track::{ConnectionEvent, ControlChannel, ControlPeer, MediaTrack, TrackInfo, TrackKind};
