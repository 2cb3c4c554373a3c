//! The timer state machine: single owner of [`TimerState`]
//!
//! Every entry point locks one async mutex for its whole duration. That lock
//! is the in-flight marker for load and save: a caller arriving while another
//! holds it waits, then re-checks state fresh. Because the guard is dropped on
//! every exit path, a failed storage call cannot wedge later callers.

use std::{collections::HashMap, sync::Arc, time::Duration};

use serde::Serialize;
use serde_json::Value;
use tokio::{
    sync::{mpsc, Mutex},
    time::Instant,
};
use tracing::{debug, error, info, warn};

use super::{
    settings::{SettingKey, Settings},
    Effect, Phase, SaveKind, TimerEvent, TimerState,
};
use crate::{
    config::TimerConfig,
    error::Result,
    services::{
        badge::Badge,
        notifications::{NotificationKind, Notifier},
        storage::{KeyValueStore, StorageArea},
    },
    tasks::heartbeat::{Heartbeat, HeartbeatMode},
};

pub const REMAINING_MILLIS_KEY: &str = "remainingMillis";
pub const LAST_STATUS_KEY: &str = "lastStatus";
pub const CURRENT_CYCLE_KEY: &str = "currentCycle";

const SNAPSHOT_KEYS: [&str; 3] = [REMAINING_MILLIS_KEY, LAST_STATUS_KEY, CURRENT_CYCLE_KEY];

struct Inner {
    timer: TimerState,
    /// `None` until read, and again after a change notification while idle
    settings: Option<Settings>,
    heartbeat: Heartbeat,
}

/// Read-only view of the machine for status reporting
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerSnapshot {
    pub status: Option<&'static str>,
    pub last_status: Option<Phase>,
    pub remaining_ms: Option<u64>,
    pub current_cycle: u32,
    pub pending_notification: Option<NotificationKind>,
    pub heartbeat: HeartbeatMode,
    pub settings: Option<Settings>,
}

pub struct TimerMachine {
    inner: Mutex<Inner>,
    store: Arc<dyn KeyValueStore>,
    badge: Arc<dyn Badge>,
    notifier: Arc<dyn Notifier>,
    config: TimerConfig,
    events: mpsc::UnboundedSender<TimerEvent>,
}

impl TimerMachine {
    /// Build a machine with empty state. The returned receiver carries events
    /// from heartbeat polls and other queued sources; hand it to [`run`](Self::run).
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        badge: Arc<dyn Badge>,
        notifier: Arc<dyn Notifier>,
        config: TimerConfig,
    ) -> (Arc<Self>, mpsc::UnboundedReceiver<TimerEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        let heartbeat = Heartbeat::new(config.heartbeat_interval, Arc::clone(&store), events.clone());
        let machine = Arc::new(Self {
            inner: Mutex::new(Inner {
                timer: TimerState::new(),
                settings: None,
                heartbeat,
            }),
            store,
            badge,
            notifier,
            config,
            events,
        });
        (machine, rx)
    }

    /// Sender for queuing events into [`run`](Self::run)
    pub fn sender(&self) -> mpsc::UnboundedSender<TimerEvent> {
        self.events.clone()
    }

    /// Consume queued events in arrival order until every sender is gone
    pub async fn run(self: Arc<Self>, mut rx: mpsc::UnboundedReceiver<TimerEvent>) {
        info!("Timer event loop started");
        while let Some(event) = rx.recv().await {
            if let Err(e) = self.handle(event).await {
                error!("Failed to handle timer event: {}", e);
            }
        }
        info!("Timer event loop stopped");
    }

    /// Process one event: load if the event can start or resume a phase,
    /// apply the transition, then carry out its effects.
    pub async fn handle(&self, event: TimerEvent) -> Result<()> {
        let mut inner = self.inner.lock().await;
        debug!("Handling {:?} while {:?}", event, inner.timer.status);

        if matches!(
            event,
            TimerEvent::IconActivated | TimerEvent::NotificationActionTriggered(_)
        ) {
            self.load_locked(&mut inner).await?;
        }

        let settings = inner.settings.unwrap_or_default();
        let now = Instant::now();
        let effects = inner
            .timer
            .apply(&event, now, &settings, self.config.heartbeat_interval);

        for effect in effects {
            self.execute(&mut inner, effect).await?;
        }
        Ok(())
    }

    /// Rebuild in-memory state from storage unless it is already warm
    pub async fn load(&self) -> Result<()> {
        let mut inner = self.inner.lock().await;
        self.load_locked(&mut inner).await
    }

    /// Persist a snapshot and stop the heartbeat
    pub async fn save(&self, kind: SaveKind) -> Result<()> {
        let mut inner = self.inner.lock().await;
        self.save_locked(&mut inner, kind).await
    }

    pub async fn snapshot(&self) -> TimerSnapshot {
        let inner = self.inner.lock().await;
        let timer = &inner.timer;
        TimerSnapshot {
            status: timer.status.map(|status| status.label()),
            last_status: timer.last_status,
            remaining_ms: timer
                .remaining(Instant::now())
                .map(|remaining| remaining.as_millis() as u64),
            current_cycle: timer.current_cycle,
            pending_notification: timer.pending_notification,
            heartbeat: inner.heartbeat.mode(),
            settings: inner.settings,
        }
    }

    async fn load_locked(&self, inner: &mut Inner) -> Result<()> {
        let needs_settings = inner.settings.is_none();
        let needs_state = !inner.timer.is_loaded();
        if !needs_settings && !needs_state {
            debug!("State already loaded");
            return Ok(());
        }

        if needs_settings {
            let keys = SettingKey::ALL.map(|key| key.as_str());
            let values = self.store.get(StorageArea::Sync, &keys).await?;
            let settings = Settings::from_values(&values);
            debug!("Loaded settings: {:?}", settings);
            inner.settings = Some(settings);
        }

        if needs_state {
            let values = self.store.get(StorageArea::Local, &SNAPSHOT_KEYS).await?;
            let restored = restore_from(&values, Instant::now());
            if !values.is_empty() {
                self.store.remove(StorageArea::Local, &SNAPSHOT_KEYS).await?;
            }
            info!(
                "Restored {} (last {:?}, cycle {})",
                restored.status.map(|s| s.label()).unwrap_or("unknown"),
                restored.last_status,
                restored.current_cycle
            );
            let pending = inner.timer.pending_notification;
            inner.timer = TimerState {
                pending_notification: pending,
                ..restored
            };
        }
        Ok(())
    }

    async fn save_locked(&self, inner: &mut Inner, kind: SaveKind) -> Result<()> {
        if !inner.timer.is_loaded() {
            warn!("Attempted to save status when no status was loaded");
            return Ok(());
        }

        let timer = &inner.timer;
        let mut items = HashMap::from([(
            CURRENT_CYCLE_KEY.to_string(),
            Value::from(timer.current_cycle),
        )]);
        if let Some(last) = timer.last_status {
            items.insert(LAST_STATUS_KEY.to_string(), Value::from(last.as_str()));
        }
        if kind == SaveKind::Pause {
            let remaining = timer.remaining(Instant::now()).unwrap_or_default();
            info!("Storing time left: {}ms", remaining.as_millis());
            items.insert(
                REMAINING_MILLIS_KEY.to_string(),
                Value::from(remaining.as_millis() as u64),
            );
        }

        inner.heartbeat.stop();
        self.store.set(StorageArea::Local, items).await?;

        match kind {
            SaveKind::Pause => inner.timer.clear_after_pause(),
            SaveKind::Completion => {
                self.store
                    .remove(StorageArea::Local, &[REMAINING_MILLIS_KEY])
                    .await?;
            }
        }
        Ok(())
    }

    async fn execute(&self, inner: &mut Inner, effect: Effect) -> Result<()> {
        match effect {
            Effect::SetBadge { text, color } => {
                if let Err(e) = self.badge.set_text(&text).await {
                    warn!("Failed to set badge text: {}", e);
                }
                if let Err(e) = self.badge.set_background_color(color).await {
                    warn!("Failed to set badge color: {}", e);
                }
            }
            Effect::CreateNotification(kind) => {
                if let Err(e) = self.notifier.create(kind, kind.payload()).await {
                    warn!("Failed to create notification {}: {}", kind, e);
                }
            }
            Effect::ClearNotification(kind) => {
                if let Err(e) = self.notifier.clear(kind).await {
                    warn!("Failed to clear notification {}: {}", kind, e);
                }
            }
            Effect::StartHeartbeat => inner.heartbeat.start(),
            Effect::ScheduleFinalHeartbeat(delay) => inner.heartbeat.schedule_final(delay),
            Effect::Save(kind) => self.save_locked(inner, kind).await?,
            Effect::MergeSettings(changes) => {
                if let Some(settings) = inner.settings.as_mut() {
                    for change in changes {
                        debug!("Applying {} = {:?}", change.key, change.value);
                        settings.apply(change);
                    }
                }
            }
            Effect::InvalidateSettings => {
                debug!("Settings changed while idle, will re-read on next load");
                inner.settings = None;
            }
        }
        Ok(())
    }
}

/// Decode a snapshot read from the local area. A stored remaining time means
/// the timer was paused; anything else restores to asleep.
fn restore_from(values: &HashMap<String, Value>, now: Instant) -> TimerState {
    let current_cycle = values
        .get(CURRENT_CYCLE_KEY)
        .and_then(Value::as_u64)
        .map(|cycle| u32::try_from(cycle).unwrap_or(u32::MAX))
        .unwrap_or(0);
    let last_status = values.get(LAST_STATUS_KEY).and_then(|value| {
        let phase = value.as_str().and_then(Phase::from_name);
        if phase.is_none() {
            warn!("Ignoring unknown stored last status: {}", value);
        }
        phase
    });
    let remaining = values.get(REMAINING_MILLIS_KEY).and_then(|value| {
        value
            .as_u64()
            .or_else(|| value.as_i64().map(|ms| ms.max(0) as u64))
    });

    match remaining {
        Some(ms) => TimerState::restore_paused(
            last_status.unwrap_or(Phase::Active),
            Duration::from_millis(ms),
            current_cycle,
            now,
        ),
        None => TimerState::restore_asleep(last_status, current_cycle),
    }
}
