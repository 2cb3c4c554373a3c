//! Heartbeat poll resource
//!
//! Owns the single outstanding poll of a running phase: either a repeating
//! poll on the configured interval, or one final poll timed to land on the
//! deadline. Starting one replaces the other. Polls never touch timer state;
//! they write the liveness marker and then deliver
//! [`TimerEvent::HeartbeatElapsed`] through the machine's event channel.

use std::{collections::HashMap, sync::Arc, time::Duration};

use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use tokio::{
    sync::mpsc,
    task::JoinHandle,
    time::{interval_at, sleep, Instant, MissedTickBehavior},
};
use tracing::{debug, warn};

use crate::{
    services::storage::{KeyValueStore, StorageArea},
    state::TimerEvent,
};

pub const LAST_HEARTBEAT_KEY: &str = "lastHeartbeatTimestamp";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum HeartbeatMode {
    Stopped,
    Repeating,
    Final,
}

pub struct Heartbeat {
    interval: Duration,
    store: Arc<dyn KeyValueStore>,
    events: mpsc::UnboundedSender<TimerEvent>,
    task: Option<(HeartbeatMode, JoinHandle<()>)>,
}

impl Heartbeat {
    pub fn new(
        interval: Duration,
        store: Arc<dyn KeyValueStore>,
        events: mpsc::UnboundedSender<TimerEvent>,
    ) -> Self {
        Self {
            interval,
            store,
            events,
            task: None,
        }
    }

    /// Which poll is outstanding. A final poll that already fired counts as stopped.
    pub fn mode(&self) -> HeartbeatMode {
        match &self.task {
            Some((mode, handle)) if !handle.is_finished() => *mode,
            _ => HeartbeatMode::Stopped,
        }
    }

    /// Start the repeating poll, replacing any outstanding one
    pub fn start(&mut self) {
        self.stop();
        debug!("Heartbeat started every {}s", self.interval.as_secs());

        let period = self.interval;
        let store = Arc::clone(&self.store);
        let events = self.events.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if !beat(store.as_ref(), &events).await {
                    break;
                }
            }
        });
        self.task = Some((HeartbeatMode::Repeating, handle));
    }

    /// Replace the outstanding poll with a single one after `delay`
    pub fn schedule_final(&mut self, delay: Duration) {
        self.stop();
        debug!("Final heartbeat in {}ms", delay.as_millis());

        let store = Arc::clone(&self.store);
        let events = self.events.clone();
        let handle = tokio::spawn(async move {
            sleep(delay).await;
            beat(store.as_ref(), &events).await;
        });
        self.task = Some((HeartbeatMode::Final, handle));
    }

    /// Cancel the outstanding poll, if any. Does not undo any transition.
    pub fn stop(&mut self) {
        if let Some((mode, handle)) = self.task.take() {
            if !handle.is_finished() {
                debug!("Heartbeat stopped ({:?})", mode);
            }
            handle.abort();
        }
    }
}

impl Drop for Heartbeat {
    fn drop(&mut self) {
        self.stop();
    }
}

/// One poll. Returns false once nobody is listening for events.
async fn beat(store: &dyn KeyValueStore, events: &mpsc::UnboundedSender<TimerEvent>) -> bool {
    let marker = HashMap::from([(
        LAST_HEARTBEAT_KEY.to_string(),
        Value::from(Utc::now().timestamp_millis()),
    )]);
    if let Err(e) = store.set(StorageArea::Local, marker).await {
        warn!("Failed to write heartbeat marker: {}", e);
    }

    if events.send(TimerEvent::HeartbeatElapsed).is_err() {
        debug!("Event channel closed, heartbeat exiting");
        return false;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::storage::MemoryStore;
    use tokio::time;

    // Paused clock: tokio auto-advances to the next timer whenever the test
    // awaits the event channel.

    fn heartbeat(secs: u64) -> (Heartbeat, mpsc::UnboundedReceiver<TimerEvent>, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let (tx, rx) = mpsc::unbounded_channel();
        (Heartbeat::new(Duration::from_secs(secs), store.clone(), tx), rx, store)
    }

    #[tokio::test(start_paused = true)]
    async fn repeating_poll_fires_each_interval() {
        let (mut hb, mut rx, store) = heartbeat(20);
        let start = Instant::now();
        hb.start();
        assert_eq!(hb.mode(), HeartbeatMode::Repeating);

        assert_eq!(rx.recv().await, Some(TimerEvent::HeartbeatElapsed));
        assert_eq!(start.elapsed(), Duration::from_secs(20));
        assert_eq!(rx.recv().await, Some(TimerEvent::HeartbeatElapsed));
        assert_eq!(start.elapsed(), Duration::from_secs(40));

        assert!(store.dump(StorageArea::Local).contains_key(LAST_HEARTBEAT_KEY));
    }

    #[tokio::test(start_paused = true)]
    async fn final_poll_replaces_repeating_and_fires_once() {
        let (mut hb, mut rx, _store) = heartbeat(20);
        let start = Instant::now();
        hb.start();
        hb.schedule_final(Duration::from_secs(7));
        assert_eq!(hb.mode(), HeartbeatMode::Final);

        assert_eq!(rx.recv().await, Some(TimerEvent::HeartbeatElapsed));
        assert_eq!(start.elapsed(), Duration::from_secs(7));

        time::advance(Duration::from_secs(60)).await;
        assert!(rx.try_recv().is_err());
        assert_eq!(hb.mode(), HeartbeatMode::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_cancels_pending_poll() {
        let (mut hb, mut rx, _store) = heartbeat(20);
        hb.start();
        hb.stop();
        assert_eq!(hb.mode(), HeartbeatMode::Stopped);

        time::advance(Duration::from_secs(120)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn repeating_poll_exits_when_channel_closes() {
        let (mut hb, rx, _store) = heartbeat(1);
        hb.start();
        drop(rx);

        time::advance(Duration::from_secs(2)).await;
        for _ in 0..5 {
            tokio::task::yield_now().await;
        }
        assert_eq!(hb.mode(), HeartbeatMode::Stopped);
    }
}
