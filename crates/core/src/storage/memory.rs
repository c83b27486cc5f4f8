use async_trait::async_trait;
use log::{debug, warn};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use uuid::Uuid;

use super::format;
use super::traits::{PortfolioStore, SnapshotListener, Subscription};
use crate::errors::CoreError;
use crate::models::coin::Coin;
use crate::models::record::{record_key, PortfolioRecord, RecordPatch};

struct Listener {
    id: Uuid,
    user_id: String,
    callback: SnapshotListener,
}

#[derive(Default)]
struct Inner {
    records: BTreeMap<String, PortfolioRecord>,
    listeners: Vec<Listener>,
}

impl Inner {
    fn snapshot(&self, user_id: &str) -> Vec<Coin> {
        self.records
            .values()
            .filter(|r| r.user_id == user_id)
            .map(|r| r.coin.clone())
            .collect()
    }

    /// Keys are `"{user}_{coin}"`, so ids containing `_` can collide across
    /// users. A key already held by another user is off limits.
    fn check_owner(&self, key: &str, user_id: &str) -> Result<(), CoreError> {
        match self.records.get(key) {
            Some(record) if record.user_id != user_id => {
                warn!("store write to {key} rejected: record belongs to another user");
                Err(CoreError::PermissionDenied(user_id.to_string()))
            }
            _ => Ok(()),
        }
    }

    fn notify(&self, user_id: &str) {
        let mut listeners = self.listeners.iter().filter(|l| l.user_id == user_id).peekable();
        if listeners.peek().is_none() {
            return;
        }
        let snapshot = self.snapshot(user_id);
        for listener in listeners {
            (listener.callback)(Ok(snapshot.clone()));
        }
    }
}

/// In-process portfolio store.
///
/// One mutex guards both the records and the listeners, and listeners are
/// invoked while it is held. That is what makes `Subscription::cancel` final:
/// it needs the same lock, so no delivery can be in flight once it returns.
/// Listeners therefore must not call back into the store.
///
/// Snapshots list a user's coins in record-key order.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Build a store pre-populated with records (no listeners).
    pub fn from_records(records: Vec<PortfolioRecord>) -> Self {
        let store = Self::new();
        {
            let mut inner = store.lock();
            for record in records {
                inner.records.insert(record.key(), record);
            }
        }
        store
    }

    /// Full persisted record for a user's coin, timestamps included.
    pub fn record(&self, user_id: &str, coin_id: &str) -> Option<PortfolioRecord> {
        self.lock().records.get(&record_key(user_id, coin_id)).cloned()
    }

    /// All records, in key order.
    pub fn records(&self) -> Vec<PortfolioRecord> {
        self.lock().records.values().cloned().collect()
    }

    /// Number of live subscriptions for a user.
    pub fn subscriber_count(&self, user_id: &str) -> usize {
        self.lock()
            .listeners
            .iter()
            .filter(|l| l.user_id == user_id)
            .count()
    }

    /// Serialize every record into a versioned snapshot.
    pub fn to_bytes(&self) -> Result<Vec<u8>, CoreError> {
        format::write_snapshot(&self.records())
    }

    /// Restore a store from snapshot bytes produced by `to_bytes`.
    pub fn from_bytes(data: &[u8]) -> Result<Self, CoreError> {
        Ok(Self::from_records(format::read_snapshot(data)?))
    }

    /// Save a snapshot to disk (native only).
    #[cfg(not(target_arch = "wasm32"))]
    pub fn save_to_file(&self, path: &str) -> Result<(), CoreError> {
        let bytes = self.to_bytes()?;
        std::fs::write(path, bytes)?;
        Ok(())
    }

    /// Load a snapshot from disk (native only).
    #[cfg(not(target_arch = "wasm32"))]
    pub fn load_from_file(path: &str) -> Result<Self, CoreError> {
        let bytes = std::fs::read(path)?;
        Self::from_bytes(&bytes)
    }
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.lock();
        f.debug_struct("MemoryStore")
            .field("records", &inner.records.len())
            .field("listeners", &inner.listeners.len())
            .finish()
    }
}

fn unregister(inner: &Weak<Mutex<Inner>>, id: Uuid) {
    if let Some(inner) = inner.upgrade() {
        let mut inner = inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.listeners.retain(|l| l.id != id);
    }
}

#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
impl PortfolioStore for MemoryStore {
    async fn upsert(&self, patch: RecordPatch) -> Result<(), CoreError> {
        let key = patch.key();
        let user_id = patch.user_id.clone();
        let mut inner = self.lock();
        inner.check_owner(&key, &user_id)?;
        let existing = inner.records.remove(&key);
        let created = existing.is_none();
        inner.records.insert(key.clone(), patch.merge_into(existing));
        debug!("store upsert {key} (created: {created})");
        inner.notify(&user_id);
        Ok(())
    }

    async fn remove(&self, user_id: &str, coin_id: &str) -> Result<(), CoreError> {
        let key = record_key(user_id, coin_id);
        let mut inner = self.lock();
        inner.check_owner(&key, user_id)?;
        if inner.records.remove(&key).is_some() {
            debug!("store remove {key}");
            inner.notify(user_id);
        }
        Ok(())
    }

    async fn list_for_user(&self, user_id: &str) -> Result<Vec<Coin>, CoreError> {
        Ok(self.lock().snapshot(user_id))
    }

    async fn exists_for_user(&self, user_id: &str, coin_id: &str) -> Result<bool, CoreError> {
        let key = record_key(user_id, coin_id);
        Ok(self
            .lock()
            .records
            .get(&key)
            .is_some_and(|r| r.user_id == user_id))
    }

    async fn subscribe(
        &self,
        user_id: &str,
        listener: SnapshotListener,
    ) -> Result<Subscription, CoreError> {
        let id = Uuid::new_v4();
        {
            let mut inner = self.lock();
            listener(Ok(inner.snapshot(user_id)));
            inner.listeners.push(Listener {
                id,
                user_id: user_id.to_string(),
                callback: listener,
            });
        }
        debug!("store subscription {id} opened for {user_id}");
        let weak = Arc::downgrade(&self.inner);
        Ok(Subscription::with_id(id, user_id, move || unregister(&weak, id)))
    }
}
