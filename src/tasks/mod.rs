//! Background tasks module
//!
//! Pollers and watchers that run beside the timer and feed it events.

pub mod heartbeat;
pub mod storage_watch;

// Re-export main items
pub use heartbeat::{Heartbeat, HeartbeatMode};
pub use storage_watch::storage_watch_task;
