//! Host application state shared by the HTTP handlers

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
    time::Instant,
};
use chrono::{DateTime, Utc};
use tracing::info;

use super::{TimerEvent, TimerMachine};
use crate::{
    config::TimerConfig,
    error::Result,
    services::{
        storage::{KeyValueStore, StorageArea},
        LogBadge, LogNotifier,
    },
};

/// Everything the host surface needs: the timer plus the capabilities it was
/// built with, so status reads can report what the user would see.
pub struct AppState {
    pub machine: Arc<TimerMachine>,
    pub store: Arc<dyn KeyValueStore>,
    pub badge: Arc<LogBadge>,
    pub notifier: Arc<LogNotifier>,
    /// Server metadata
    pub start_time: Instant,
    pub port: u16,
    pub host: String,
    /// Last action tracking
    pub last_action: Mutex<Option<String>>,
    pub last_action_time: Mutex<Option<DateTime<Utc>>>,
}

impl AppState {
    /// Wire a timer to the given store with logging badge and notifier.
    /// Returns the receiver the caller must hand to [`TimerMachine::run`].
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        config: TimerConfig,
        port: u16,
        host: String,
    ) -> (Self, tokio::sync::mpsc::UnboundedReceiver<TimerEvent>) {
        let badge = Arc::new(LogBadge::new());
        let notifier = Arc::new(LogNotifier::new());
        let (machine, events) = TimerMachine::new(
            Arc::clone(&store),
            badge.clone(),
            notifier.clone(),
            config,
        );

        let state = Self {
            machine,
            store,
            badge,
            notifier,
            start_time: Instant::now(),
            port,
            host,
            last_action: Mutex::new(None),
            last_action_time: Mutex::new(None),
        };
        (state, events)
    }

    /// Deliver a host callback to the timer and remember it as the last action
    pub async fn dispatch(&self, action: &str, event: TimerEvent) -> Result<()> {
        info!("Dispatching {}", action);
        self.record_action(action);
        self.machine.handle(event).await
    }

    /// Write settings to the sync area, as the settings page would. The change
    /// stream turns this into a `SettingsChanged` event.
    pub async fn write_settings(&self, values: HashMap<String, serde_json::Value>) -> Result<()> {
        self.record_action("settings");
        self.store.set(StorageArea::Sync, values).await
    }

    fn record_action(&self, action: &str) {
        if let Ok(mut last_action) = self.last_action.lock() {
            *last_action = Some(action.to_string());
        }
        if let Ok(mut last_time) = self.last_action_time.lock() {
            *last_time = Some(Utc::now());
        }
    }

    /// Calculate server uptime as a formatted string
    pub fn get_uptime(&self) -> String {
        let duration = self.start_time.elapsed();
        let hours = duration.as_secs() / 3600;
        let minutes = (duration.as_secs() % 3600) / 60;
        let seconds = duration.as_secs() % 60;

        if hours > 0 {
            format!("{}h {}m {}s", hours, minutes, seconds)
        } else if minutes > 0 {
            format!("{}m {}s", minutes, seconds)
        } else {
            format!("{}s", seconds)
        }
    }

    /// Get last action information
    pub fn get_last_action(&self) -> (Option<String>, Option<DateTime<Utc>>) {
        let last_action = self.last_action.lock().ok().and_then(|a| a.clone());
        let last_action_time = self.last_action_time.lock().ok().and_then(|t| *t);
        (last_action, last_action_time)
    }
}
