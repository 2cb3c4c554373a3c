//! State management module
//!
//! The timer record, its settings cache and the machine that owns both.

pub mod machine;
pub mod settings;
pub mod timer_state;
pub mod app_state;

// Re-export main types
pub use machine::{TimerMachine, TimerSnapshot};
pub use settings::{SettingChange, SettingKey, Settings};
pub use timer_state::{Effect, Phase, SaveKind, Status, TimerEvent, TimerState};
pub use app_state::AppState;
