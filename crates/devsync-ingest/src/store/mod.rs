//! Device-data storage
//!
//! Entries are upserted by their storage key (`_id`), so re-ingesting the
//! same record for the same group replaces it instead of duplicating it.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use devsync_common::types::Entry;

use crate::error::StoreResult;

pub use memory::MemoryDeviceDataStore;
pub use postgres::PgDeviceDataStore;

/// Persistent store for normalized device entries
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DeviceDataStore: Send + Sync {
    /// Delete every entry owned by `group_id`, returning how many were removed.
    async fn remove_group(&self, group_id: &str) -> StoreResult<u64>;

    /// Insert or replace `entry` under its `_id` and return what was stored.
    async fn save(&self, entry: Entry) -> StoreResult<Entry>;

    /// Release connections; further calls fail with `StoreError::Closed`.
    async fn close(&self);
}
