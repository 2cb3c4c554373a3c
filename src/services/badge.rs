//! Toolbar badge capability and the badge text policy

use std::{sync::Mutex, time::Duration};

use async_trait::async_trait;
use serde::Serialize;
use tracing::info;

use crate::{error::Result, state::Phase};

pub const PAUSED_TEXT: &str = "-";
pub const ASLEEP_TEXT: &str = "OFF";
pub const UNDER_A_MINUTE_TEXT: &str = "<1";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum BadgeColor {
    Active,
    Break,
    LongBreak,
    Paused,
    Asleep,
}

impl BadgeColor {
    pub fn for_phase(phase: Phase) -> Self {
        match phase {
            Phase::Active => BadgeColor::Active,
            Phase::Break => BadgeColor::Break,
            Phase::LongBreak => BadgeColor::LongBreak,
        }
    }

    pub fn hex(&self) -> &'static str {
        match self {
            BadgeColor::Active => "#2E7D32",
            BadgeColor::Break => "#1565C0",
            BadgeColor::LongBreak => "#6A1B9A",
            BadgeColor::Paused => "#757575",
            BadgeColor::Asleep => "#C62828",
        }
    }
}

/// Badge text for a running phase: whole minutes left, rounded up, or
/// `"<1"` inside the final minute.
pub fn remaining_text(remaining: Duration) -> String {
    let millis = remaining.as_millis();
    if millis <= 60_000 {
        UNDER_A_MINUTE_TEXT.to_string()
    } else {
        millis.div_ceil(60_000).to_string()
    }
}

#[async_trait]
pub trait Badge: Send + Sync {
    async fn set_text(&self, text: &str) -> Result<()>;

    async fn set_background_color(&self, color: BadgeColor) -> Result<()>;
}

/// Host badge: logs every update and remembers the last one for status reads
#[derive(Debug, Default)]
pub struct LogBadge {
    current: Mutex<(String, Option<BadgeColor>)>,
}

impl LogBadge {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(&self) -> String {
        self.current
            .lock()
            .map(|current| current.0.clone())
            .unwrap_or_default()
    }

    pub fn color(&self) -> Option<BadgeColor> {
        self.current.lock().ok().and_then(|current| current.1)
    }
}

#[async_trait]
impl Badge for LogBadge {
    async fn set_text(&self, text: &str) -> Result<()> {
        info!(badge = text, "Badge text updated");
        if let Ok(mut current) = self.current.lock() {
            current.0 = text.to_string();
        }
        Ok(())
    }

    async fn set_background_color(&self, color: BadgeColor) -> Result<()> {
        info!(color = color.hex(), "Badge color updated");
        if let Ok(mut current) = self.current.lock() {
            current.1 = Some(color);
        }
        Ok(())
    }
}
