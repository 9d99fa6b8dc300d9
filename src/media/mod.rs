//! Media frames and FLV helpers
//!
//! This module provides:
//! - The [`MediaFrame`] unit fanned out to every destination
//! - FLV tag classification and muxing shared by the RTMP and file sinks

pub mod flv;
pub mod frame;

pub use flv::FlvMuxer;
pub use frame::{FrameKind, MediaFrame};
