//! Stay Hydrated - a suspend-safe reminder timer
//!
//! Tracks one repeating work/break (or hydration) timer for a host that may
//! unload the process whenever it is idle. All live state can be rebuilt from
//! the key-value store on the next event, and a heartbeat poll detects expiry
//! while a phase is running.

pub mod api;
pub mod config;
pub mod error;
pub mod services;
pub mod state;
pub mod tasks;
pub mod utils;

// Re-export commonly used types
pub use config::{Config, TimerConfig};
pub use error::{Result, TimerError};
pub use state::{AppState, Phase, SaveKind, Settings, Status, TimerEvent, TimerMachine, TimerSnapshot};
pub use api::create_router;
pub use utils::signals::shutdown_signal;
