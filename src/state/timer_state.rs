//! Timer state record and its transition function
//!
//! ```text
//!             click / notification           heartbeat, now >= deadline
//!  Asleep ─────────────────────────► Running ───────────────────────────► Asleep
//!                                     │   ▲
//!                               click │   │ click
//!                                     ▼   │
//!                                     Paused
//! ```
//!
//! [`TimerState::apply`] is pure: it mutates the record and returns the
//! [`Effect`]s the owner must carry out (badge, notifications, polls,
//! persistence). Nothing here touches I/O or the clock directly.

use std::{fmt, time::Duration};

use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::settings::{SettingChange, Settings, MAX_DURATION_SECS};
use crate::services::{
    badge::{remaining_text, BadgeColor, ASLEEP_TEXT, PAUSED_TEXT},
    notifications::NotificationKind,
};

/// A timed phase of the work/break cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Phase {
    Active,
    Break,
    LongBreak,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Active => "active",
            Phase::Break => "break",
            Phase::LongBreak => "longBreak",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "active" => Some(Phase::Active),
            "break" => Some(Phase::Break),
            "longBreak" => Some(Phase::LongBreak),
            _ => None,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// No running timer: first boot, or a phase completed and the next one
    /// has not been started.
    Asleep,
    Running(Phase),
    Paused,
}

impl Status {
    pub fn label(&self) -> &'static str {
        match self {
            Status::Asleep => "asleep",
            Status::Running(phase) => phase.as_str(),
            Status::Paused => "paused",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Inbound events, already translated from host callbacks
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimerEvent {
    IconActivated,
    HeartbeatElapsed,
    NotificationActionTriggered(NotificationKind),
    SettingsChanged(Vec<SettingChange>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveKind {
    /// Persist remaining time and drop in-memory status so the process may be unloaded
    Pause,
    /// Persist the finished phase and cycle count; in-memory state stays warm
    Completion,
}

/// Side effects requested by a transition, executed in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    SetBadge { text: String, color: BadgeColor },
    CreateNotification(NotificationKind),
    ClearNotification(NotificationKind),
    StartHeartbeat,
    ScheduleFinalHeartbeat(Duration),
    /// Persist a snapshot; also stops whichever poll is outstanding
    Save(SaveKind),
    MergeSettings(Vec<SettingChange>),
    InvalidateSettings,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TimerState {
    /// `None` until loaded from storage, and again after a pause is persisted
    pub status: Option<Status>,
    pub last_status: Option<Phase>,
    pub next_deadline: Option<Instant>,
    pub current_cycle: u32,
    pub pending_notification: Option<NotificationKind>,
}

impl TimerState {
    pub fn new() -> Self {
        Self::default()
    }

    /// State rebuilt from a pause snapshot
    pub fn restore_paused(last_status: Phase, remaining: Duration, current_cycle: u32, now: Instant) -> Self {
        Self {
            status: Some(Status::Paused),
            last_status: Some(last_status),
            next_deadline: Some(deadline_after(now, remaining)),
            current_cycle,
            pending_notification: None,
        }
    }

    /// State rebuilt with no pause snapshot present
    pub fn restore_asleep(last_status: Option<Phase>, current_cycle: u32) -> Self {
        Self {
            status: Some(Status::Asleep),
            last_status,
            next_deadline: None,
            current_cycle,
            pending_notification: None,
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.status.is_some()
    }

    pub fn running_phase(&self) -> Option<Phase> {
        match self.status {
            Some(Status::Running(phase)) => Some(phase),
            _ => None,
        }
    }

    /// Time left until the deadline, zero once it has passed
    pub fn remaining(&self, now: Instant) -> Option<Duration> {
        self.next_deadline
            .map(|deadline| deadline.saturating_duration_since(now))
    }

    /// The phase a start from Asleep leads into
    pub fn next_phase(&self, settings: &Settings) -> Phase {
        match self.last_status {
            Some(Phase::Active) if settings.is_long_break(self.current_cycle) => Phase::LongBreak,
            Some(Phase::Active) => Phase::Break,
            Some(Phase::Break | Phase::LongBreak) | None => Phase::Active,
        }
    }

    /// Forget in-memory status after the pause snapshot has been written
    pub fn clear_after_pause(&mut self) {
        self.status = None;
        self.last_status = None;
        self.next_deadline = None;
    }

    pub fn apply(
        &mut self,
        event: &TimerEvent,
        now: Instant,
        settings: &Settings,
        heartbeat_interval: Duration,
    ) -> Vec<Effect> {
        if let TimerEvent::SettingsChanged(changes) = event {
            return match self.status {
                Some(Status::Running(_)) => vec![Effect::MergeSettings(changes.clone())],
                _ => vec![Effect::InvalidateSettings],
            };
        }

        let Some(status) = self.status else {
            warn!("Ignoring {:?}: no status loaded", event);
            return Vec::new();
        };

        match (status, event) {
            (Status::Asleep, TimerEvent::IconActivated) => {
                self.start_next(now, settings, heartbeat_interval, None)
            }
            (Status::Asleep, TimerEvent::NotificationActionTriggered(kind)) => {
                self.start_next(now, settings, heartbeat_interval, Some(*kind))
            }
            (Status::Running(phase), TimerEvent::IconActivated) => {
                info!("Pausing {} phase", phase);
                self.last_status = Some(phase);
                self.status = Some(Status::Paused);
                vec![
                    Effect::SetBadge {
                        text: PAUSED_TEXT.to_string(),
                        color: BadgeColor::Paused,
                    },
                    Effect::Save(SaveKind::Pause),
                ]
            }
            (Status::Paused, TimerEvent::IconActivated) => self.resume(now, settings, heartbeat_interval),
            (Status::Running(phase), TimerEvent::HeartbeatElapsed) => {
                self.on_heartbeat(phase, now, settings, heartbeat_interval)
            }
            (Status::Asleep | Status::Paused, TimerEvent::HeartbeatElapsed) => {
                warn!("Heartbeat fired while {}; a poll outlived its phase", status);
                Vec::new()
            }
            (Status::Running(_) | Status::Paused, TimerEvent::NotificationActionTriggered(kind)) => {
                debug!("Notification {} clicked while {}, nothing to start", kind, status);
                if self.pending_notification == Some(*kind) {
                    self.pending_notification = None;
                }
                vec![Effect::ClearNotification(*kind)]
            }
            // Settings changes returned early above
            (_, TimerEvent::SettingsChanged(_)) => Vec::new(),
        }
    }

    fn start_next(
        &mut self,
        now: Instant,
        settings: &Settings,
        heartbeat_interval: Duration,
        clicked: Option<NotificationKind>,
    ) -> Vec<Effect> {
        let next = self.next_phase(settings);
        let duration = settings.duration_of(next);
        info!(
            "Starting {} phase for {}s (cycle {})",
            next,
            duration.as_secs(),
            self.current_cycle
        );

        // The reminder raised at completion may have been lost with an unloaded
        // process; its id is derivable from the phase it announced.
        let pending = self
            .pending_notification
            .take()
            .or_else(|| self.last_status.map(|_| NotificationKind::announcing(next)));
        let mut stale: Vec<NotificationKind> = pending.into_iter().collect();
        if let Some(kind) = clicked.filter(|kind| !stale.contains(kind)) {
            stale.push(kind);
        }

        self.status = Some(Status::Running(next));
        self.last_status = None;
        self.next_deadline = Some(deadline_after(now, duration));

        let mut effects = vec![Effect::SetBadge {
            text: remaining_text(duration),
            color: BadgeColor::for_phase(next),
        }];
        effects.extend(stale.into_iter().map(Effect::ClearNotification));
        effects.push(poll_for(duration, heartbeat_interval));
        effects
    }

    fn resume(&mut self, now: Instant, settings: &Settings, heartbeat_interval: Duration) -> Vec<Effect> {
        let phase = self.last_status.take().unwrap_or(Phase::Active);
        let deadline = *self
            .next_deadline
            .get_or_insert_with(|| deadline_after(now, settings.duration_of(phase)));
        let remaining = deadline.saturating_duration_since(now);
        info!("Resuming {} phase with {}ms left", phase, remaining.as_millis());

        self.status = Some(Status::Running(phase));
        vec![
            Effect::SetBadge {
                text: remaining_text(remaining),
                color: BadgeColor::for_phase(phase),
            },
            poll_for(remaining, heartbeat_interval),
        ]
    }

    fn on_heartbeat(
        &mut self,
        phase: Phase,
        now: Instant,
        settings: &Settings,
        heartbeat_interval: Duration,
    ) -> Vec<Effect> {
        let remaining = self.remaining(now).unwrap_or(Duration::ZERO);
        if remaining.is_zero() {
            return self.complete(phase, settings);
        }
        if remaining < heartbeat_interval {
            debug!("{}ms left, switching to final heartbeat", remaining.as_millis());
            return vec![Effect::ScheduleFinalHeartbeat(remaining)];
        }
        vec![Effect::SetBadge {
            text: remaining_text(remaining),
            color: BadgeColor::for_phase(phase),
        }]
    }

    fn complete(&mut self, phase: Phase, settings: &Settings) -> Vec<Effect> {
        match phase {
            Phase::Active => self.current_cycle += 1,
            Phase::LongBreak => self.current_cycle = 0,
            Phase::Break => {}
        }
        self.status = Some(Status::Asleep);
        self.last_status = Some(phase);
        self.next_deadline = None;

        let kind = NotificationKind::announcing(self.next_phase(settings));
        self.pending_notification = Some(kind);
        info!("{} phase complete (cycle {}), raising {}", phase, self.current_cycle, kind);

        vec![
            Effect::SetBadge {
                text: ASLEEP_TEXT.to_string(),
                color: BadgeColor::Asleep,
            },
            Effect::CreateNotification(kind),
            Effect::Save(SaveKind::Completion),
        ]
    }
}

/// Deadline `duration` from `now`, capped when the clock cannot represent it
fn deadline_after(now: Instant, duration: Duration) -> Instant {
    now.checked_add(duration).unwrap_or_else(|| {
        warn!("{}s does not fit the clock, capping at {}s", duration.as_secs(), MAX_DURATION_SECS);
        now + Duration::from_secs(MAX_DURATION_SECS)
    })
}

/// Repeating poll, or straight to the final one when the phase is shorter than an interval
fn poll_for(remaining: Duration, heartbeat_interval: Duration) -> Effect {
    if remaining < heartbeat_interval {
        Effect::ScheduleFinalHeartbeat(remaining)
    } else {
        Effect::StartHeartbeat
    }
}
