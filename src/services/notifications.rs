//! Reminder notification capability

use std::{collections::BTreeSet, fmt, sync::Mutex};

use async_trait::async_trait;
use serde::Serialize;
use tracing::info;

use crate::{error::Result, state::Phase};

const ICON_URL: &str = "stay_hydrated.png";

/// The reminders the timer can raise. Each one offers to start a phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum NotificationKind {
    GoActive,
    GoBreak,
    GoLongBreak,
}

impl NotificationKind {
    /// Reminder raised when the phase that follows is `next`
    pub fn announcing(next: Phase) -> Self {
        match next {
            Phase::Active => NotificationKind::GoActive,
            Phase::Break => NotificationKind::GoBreak,
            Phase::LongBreak => NotificationKind::GoLongBreak,
        }
    }

    pub fn id(&self) -> &'static str {
        match self {
            NotificationKind::GoActive => "start-active",
            NotificationKind::GoBreak => "start-break",
            NotificationKind::GoLongBreak => "start-long-break",
        }
    }

    pub fn from_id(id: &str) -> Option<Self> {
        [
            NotificationKind::GoActive,
            NotificationKind::GoBreak,
            NotificationKind::GoLongBreak,
        ]
        .into_iter()
        .find(|kind| kind.id() == id)
    }

    pub fn payload(&self) -> Notification {
        let (title, message, button) = match self {
            NotificationKind::GoActive => (
                "Time to Hydrate",
                "Everyday I'm Guzzlin'!",
                "Keep it Flowing.",
            ),
            NotificationKind::GoBreak => (
                "Time for a Break",
                "Stand up, stretch, refill the glass.",
                "Take five.",
            ),
            NotificationKind::GoLongBreak => (
                "Time for a Long Break",
                "You earned it. Step away for a while.",
                "Take the long one.",
            ),
        };
        Notification {
            title: title.to_string(),
            message: message.to_string(),
            button_title: button.to_string(),
            icon_url: ICON_URL.to_string(),
            priority: 0,
        }
    }
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub title: String,
    pub message: String,
    pub button_title: String,
    pub icon_url: String,
    pub priority: i32,
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn create(&self, kind: NotificationKind, notification: Notification) -> Result<()>;

    async fn clear(&self, kind: NotificationKind) -> Result<()>;
}

/// Host notifier: logs and tracks which reminders are on screen
#[derive(Debug, Default)]
pub struct LogNotifier {
    shown: Mutex<BTreeSet<NotificationKind>>,
}

impl LogNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shown(&self) -> Vec<NotificationKind> {
        self.shown
            .lock()
            .map(|shown| shown.iter().copied().collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl Notifier for LogNotifier {
    async fn create(&self, kind: NotificationKind, notification: Notification) -> Result<()> {
        info!(
            id = kind.id(),
            title = %notification.title,
            button = %notification.button_title,
            "Notification shown: {}",
            notification.message
        );
        if let Ok(mut shown) = self.shown.lock() {
            shown.insert(kind);
        }
        Ok(())
    }

    async fn clear(&self, kind: NotificationKind) -> Result<()> {
        info!(id = kind.id(), "Notification cleared");
        if let Ok(mut shown) = self.shown.lock() {
            shown.remove(&kind);
        }
        Ok(())
    }
}
