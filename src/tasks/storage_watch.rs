//! Settings change background task

use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

use crate::{
    services::storage::{StorageArea, StorageChange},
    state::{
        settings::{decode_seconds, SettingChange, SettingKey},
        TimerEvent,
    },
};

/// Settings changes carried by one store notification. Non-settings keys and
/// local-area writes (snapshots, heartbeat marker) are filtered out.
pub fn settings_changes(change: &StorageChange) -> Vec<SettingChange> {
    if change.area != StorageArea::Sync {
        return Vec::new();
    }
    let mut changes: Vec<SettingChange> = change
        .changes
        .iter()
        .filter_map(|(name, value)| {
            let key = SettingKey::from_name(name)?;
            Some(SettingChange {
                key,
                value: value.as_ref().and_then(|value| decode_seconds(key, value)),
            })
        })
        .collect();
    changes.sort_by_key(|change| change.key.as_str());
    changes
}

/// Background task that forwards settings edits to the timer as `SettingsChanged`
pub async fn storage_watch_task(
    mut changes: broadcast::Receiver<StorageChange>,
    events: mpsc::UnboundedSender<TimerEvent>,
) {
    info!("Starting settings watch task");

    loop {
        match changes.recv().await {
            Ok(change) => {
                let settings = settings_changes(&change);
                if settings.is_empty() {
                    continue;
                }
                debug!("Settings changed: {:?}", settings);
                if events.send(TimerEvent::SettingsChanged(settings)).is_err() {
                    info!("Timer event channel closed, stopping settings watch");
                    break;
                }
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!("Settings watch lagged, {} notifications dropped", skipped);
            }
            Err(broadcast::error::RecvError::Closed) => {
                info!("Store change stream closed");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::storage::{KeyValueStore, MemoryStore};
    use serde_json::json;
    use std::collections::HashMap;

    #[test]
    fn local_writes_are_not_settings() {
        let change = StorageChange {
            area: StorageArea::Local,
            changes: HashMap::from([("activeDuration".to_string(), Some(json!(60)))]),
        };
        assert!(settings_changes(&change).is_empty());
    }

    #[test]
    fn sync_changes_decode_and_drop_unknown_keys() {
        let change = StorageChange {
            area: StorageArea::Sync,
            changes: HashMap::from([
                ("activeDuration".to_string(), Some(json!(60))),
                ("cyclePeriod".to_string(), None),
                ("theme".to_string(), Some(json!("dark"))),
            ]),
        };
        assert_eq!(
            settings_changes(&change),
            vec![
                SettingChange {
                    key: SettingKey::ActiveDuration,
                    value: Some(60)
                },
                SettingChange {
                    key: SettingKey::CyclePeriod,
                    value: None
                },
            ]
        );
    }

    #[tokio::test]
    async fn forwards_settings_writes_as_events() {
        let store = MemoryStore::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let watcher = tokio::spawn(storage_watch_task(store.subscribe(), tx));

        store
            .set(StorageArea::Local, HashMap::from([("lastHeartbeatTimestamp".to_string(), json!(1))]))
            .await
            .unwrap();
        store
            .set(StorageArea::Sync, HashMap::from([("breakDuration".to_string(), json!(45))]))
            .await
            .unwrap();

        assert_eq!(
            rx.recv().await,
            Some(TimerEvent::SettingsChanged(vec![SettingChange {
                key: SettingKey::BreakDuration,
                value: Some(45)
            }]))
        );

        drop(store);
        watcher.await.unwrap();
    }

    #[tokio::test]
    async fn closed_event_channel_stops_the_watcher() {
        let store = MemoryStore::new();
        let (tx, rx) = mpsc::unbounded_channel();
        let watcher = tokio::spawn(storage_watch_task(store.subscribe(), tx));
        drop(rx);

        store
            .set(StorageArea::Sync, HashMap::from([("cyclePeriod".to_string(), json!(3))]))
            .await
            .unwrap();

        // Returns on the failed send while the store is still alive
        watcher.await.unwrap();
        assert_eq!(store.dump(StorageArea::Sync)["cyclePeriod"], json!(3));
    }
}
