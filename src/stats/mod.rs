//! Per-destination statistics

pub mod metrics;

pub use metrics::{WorkerCounters, WorkerStats};
