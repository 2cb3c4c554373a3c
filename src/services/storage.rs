//! Asynchronous key-value store capability and its backends

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex,
    },
};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::{broadcast, Mutex as AsyncMutex};
use tracing::{debug, info, warn};

use crate::error::{Result, TimerError};

/// Storage namespace. Settings live in `Sync`, timer snapshots in `Local`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageArea {
    Local,
    Sync,
}

/// Change notification: new value per key, `None` when the key was removed
#[derive(Debug, Clone, PartialEq)]
pub struct StorageChange {
    pub area: StorageArea,
    pub changes: HashMap<String, Option<Value>>,
}

#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Fetch the given keys; absent keys are simply missing from the result
    async fn get(&self, area: StorageArea, keys: &[&str]) -> Result<HashMap<String, Value>>;

    async fn set(&self, area: StorageArea, items: HashMap<String, Value>) -> Result<()>;

    async fn remove(&self, area: StorageArea, keys: &[&str]) -> Result<()>;

    /// Subscribe to change notifications for every area
    fn subscribe(&self) -> broadcast::Receiver<StorageChange>;
}

type Areas = HashMap<StorageArea, HashMap<String, Value>>;

/// In-process store. Also the cache layer under [`FileStore`].
#[derive(Debug)]
pub struct MemoryStore {
    areas: Mutex<Areas>,
    change_tx: broadcast::Sender<StorageChange>,
    reads: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_areas(HashMap::new())
    }

    fn with_areas(areas: Areas) -> Self {
        let (change_tx, _) = broadcast::channel(64);
        Self {
            areas: Mutex::new(areas),
            change_tx,
            reads: AtomicUsize::new(0),
        }
    }

    /// Number of `get` calls served so far
    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    /// Synchronous read of everything in one area
    pub fn dump(&self, area: StorageArea) -> HashMap<String, Value> {
        self.lock_areas()
            .map(|areas| areas.get(&area).cloned().unwrap_or_default())
            .unwrap_or_default()
    }

    fn lock_areas(&self) -> Result<std::sync::MutexGuard<'_, Areas>> {
        self.areas
            .lock()
            .map_err(|e| TimerError::Storage(format!("Failed to lock store: {}", e)))
    }

    fn snapshot(&self) -> Result<Areas> {
        Ok(self.lock_areas()?.clone())
    }

    fn notify(&self, area: StorageArea, changes: HashMap<String, Option<Value>>) {
        if changes.is_empty() {
            return;
        }
        // No subscribers is fine; nobody is watching settings yet.
        let _ = self.change_tx.send(StorageChange { area, changes });
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, area: StorageArea, keys: &[&str]) -> Result<HashMap<String, Value>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        let areas = self.lock_areas()?;
        let Some(items) = areas.get(&area) else {
            return Ok(HashMap::new());
        };
        Ok(keys
            .iter()
            .filter_map(|key| items.get(*key).map(|value| (key.to_string(), value.clone())))
            .collect())
    }

    async fn set(&self, area: StorageArea, items: HashMap<String, Value>) -> Result<()> {
        let mut changes = HashMap::new();
        {
            let mut areas = self.lock_areas()?;
            let stored = areas.entry(area).or_default();
            for (key, value) in items {
                if stored.get(&key) != Some(&value) {
                    changes.insert(key.clone(), Some(value.clone()));
                }
                stored.insert(key, value);
            }
        }
        self.notify(area, changes);
        Ok(())
    }

    async fn remove(&self, area: StorageArea, keys: &[&str]) -> Result<()> {
        let mut changes = HashMap::new();
        {
            let mut areas = self.lock_areas()?;
            if let Some(stored) = areas.get_mut(&area) {
                for key in keys {
                    if stored.remove(*key).is_some() {
                        changes.insert(key.to_string(), None);
                    }
                }
            }
        }
        self.notify(area, changes);
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<StorageChange> {
        self.change_tx.subscribe()
    }
}

/// JSON-file backed store used by the host binary. Every write flushes the
/// whole document so a killed process loses at most the in-flight write.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    cache: MemoryStore,
    /// Held from snapshot to write, so the last write on disk is the newest
    flush_lock: AsyncMutex<()>,
}

impl FileStore {
    /// Open the store, loading existing content if the file exists
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let areas: Areas = match tokio::fs::read_to_string(&path).await {
            Ok(contents) if contents.trim().is_empty() => HashMap::new(),
            Ok(contents) => serde_json::from_str(&contents)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("No store at {}, starting empty", path.display());
                HashMap::new()
            }
            Err(e) => return Err(e.into()),
        };
        debug!("Opened store at {} with {} areas", path.display(), areas.len());
        Ok(Self {
            path,
            cache: MemoryStore::with_areas(areas),
            flush_lock: AsyncMutex::new(()),
        })
    }

    async fn flush(&self) -> Result<()> {
        let _guard = self.flush_lock.lock().await;
        let serialized = serde_json::to_string_pretty(&self.cache.snapshot()?)?;
        tokio::fs::write(&self.path, serialized).await.map_err(|e| {
            warn!("Failed to write store {}: {}", self.path.display(), e);
            TimerError::from(e)
        })
    }
}

#[async_trait]
impl KeyValueStore for FileStore {
    async fn get(&self, area: StorageArea, keys: &[&str]) -> Result<HashMap<String, Value>> {
        self.cache.get(area, keys).await
    }

    async fn set(&self, area: StorageArea, items: HashMap<String, Value>) -> Result<()> {
        self.cache.set(area, items).await?;
        self.flush().await
    }

    async fn remove(&self, area: StorageArea, keys: &[&str]) -> Result<()> {
        self.cache.remove(area, keys).await?;
        self.flush().await
    }

    fn subscribe(&self) -> broadcast::Receiver<StorageChange> {
        self.cache.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn get_returns_only_present_keys() {
        let store = MemoryStore::new();
        store
            .set(StorageArea::Local, HashMap::from([("a".to_string(), json!(1))]))
            .await
            .unwrap();

        let values = store.get(StorageArea::Local, &["a", "b"]).await.unwrap();
        assert_eq!(values.len(), 1);
        assert_eq!(values["a"], json!(1));
        assert!(store.get(StorageArea::Sync, &["a"]).await.unwrap().is_empty());
        assert_eq!(store.read_count(), 2);
    }

    #[tokio::test]
    async fn changes_are_broadcast_per_area() {
        let store = MemoryStore::new();
        let mut rx = store.subscribe();

        store
            .set(StorageArea::Sync, HashMap::from([("breakDuration".to_string(), json!(30))]))
            .await
            .unwrap();
        let change = rx.recv().await.unwrap();
        assert_eq!(change.area, StorageArea::Sync);
        assert_eq!(change.changes["breakDuration"], Some(json!(30)));

        store.remove(StorageArea::Sync, &["breakDuration"]).await.unwrap();
        let change = rx.recv().await.unwrap();
        assert_eq!(change.changes["breakDuration"], None);
    }

    #[tokio::test]
    async fn unchanged_write_is_silent() {
        let store = MemoryStore::new();
        let items = HashMap::from([("k".to_string(), json!("v"))]);
        store.set(StorageArea::Local, items.clone()).await.unwrap();

        let mut rx = store.subscribe();
        store.set(StorageArea::Local, items).await.unwrap();
        store.remove(StorageArea::Local, &["missing"]).await.unwrap();
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn file_store_persists_across_reopen() {
        let path = std::env::temp_dir().join(format!("stay-hydrated-{}.json", std::process::id()));
        let _ = tokio::fs::remove_file(&path).await;

        {
            let store = FileStore::open(&path).await.unwrap();
            store
                .set(StorageArea::Local, HashMap::from([("remainingMillis".to_string(), json!(4200))]))
                .await
                .unwrap();
        }

        let reopened = FileStore::open(&path).await.unwrap();
        let values = reopened.get(StorageArea::Local, &["remainingMillis"]).await.unwrap();
        assert_eq!(values["remainingMillis"], json!(4200));

        tokio::fs::remove_file(&path).await.unwrap();
    }

    #[tokio::test]
    async fn concurrent_file_writes_keep_every_key() {
        let path = std::env::temp_dir().join(format!("stay-hydrated-race-{}.json", std::process::id()));
        let _ = tokio::fs::remove_file(&path).await;

        {
            let store = FileStore::open(&path).await.unwrap();
            let writes = (0..16).map(|i| {
                store.set(
                    StorageArea::Local,
                    HashMap::from([(format!("key{}", i), json!(i))]),
                )
            });
            for result in futures::future::join_all(writes).await {
                result.unwrap();
            }
        }

        let reopened = FileStore::open(&path).await.unwrap();
        assert_eq!(reopened.cache.dump(StorageArea::Local).len(), 16);

        tokio::fs::remove_file(&path).await.unwrap();
    }
}
