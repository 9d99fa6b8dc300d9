//! Destination set
//!
//! The authoritative mapping of destination URL to forwarding worker. All
//! mutations go through one async critical section; the fan-out path and
//! status queries read an immutable snapshot that is republished after each
//! mutation, so neither ever waits on a worker.

pub mod entry;
pub mod headers;
pub mod set;

pub use entry::{DestinationState, DestinationStatus};
pub use headers::SequenceHeaders;
pub use set::DestinationSet;
