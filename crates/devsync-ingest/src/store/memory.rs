//! In-process device-data store for tests and dry runs

use async_trait::async_trait;
use devsync_common::types::Entry;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;

use super::DeviceDataStore;
use crate::error::{StoreError, StoreResult};

#[derive(Debug, Default)]
pub struct MemoryDeviceDataStore {
    entries: RwLock<BTreeMap<String, Entry>>,
    closed: AtomicBool,
}

impl MemoryDeviceDataStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an entry directly, bypassing identity checks
    pub async fn insert(&self, key: impl Into<String>, entry: Entry) {
        self.entries.write().await.insert(key.into(), entry);
    }

    /// Entries owned by `group_id`, ordered by storage key
    pub async fn entries_for(&self, group_id: &str) -> Vec<Entry> {
        self.entries
            .read()
            .await
            .values()
            .filter(|entry| entry.group_id.as_deref() == Some(group_id))
            .cloned()
            .collect()
    }

    pub async fn keys(&self) -> Vec<String> {
        self.entries.read().await.keys().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    fn ensure_open(&self) -> StoreResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(StoreError::Closed("store is closed".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl DeviceDataStore for MemoryDeviceDataStore {
    async fn remove_group(&self, group_id: &str) -> StoreResult<u64> {
        self.ensure_open()?;

        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| entry.group_id.as_deref() != Some(group_id));

        Ok((before - entries.len()) as u64)
    }

    async fn save(&self, entry: Entry) -> StoreResult<Entry> {
        self.ensure_open()?;

        let key = entry
            .storage_id
            .clone()
            .ok_or_else(|| StoreError::MissingKey(entry.kind.clone()))?;
        self.entries.write().await.insert(key, entry.clone());

        Ok(entry)
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}
