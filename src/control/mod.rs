//! Control protocol
//!
//! One JSON object per data channel message, `{"action": ..., ...}`. Every
//! message gets exactly one response; a bad message is answered with an
//! error and never closes the channel.

pub mod command;
pub mod handler;
pub mod response;

pub use command::Command;
pub use handler::CommandHandler;
pub use response::{Response, ResponseStatus};
