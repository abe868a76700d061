//! Persistence sink: identity assignment followed by an upsert

use devsync_common::identity::assign_identity;
use devsync_common::types::Entry;
use std::sync::Arc;

use crate::error::PersistError;
use crate::store::DeviceDataStore;

#[derive(Clone)]
pub struct PersistenceSink {
    store: Arc<dyn DeviceDataStore>,
}

impl PersistenceSink {
    pub fn new(store: Arc<dyn DeviceDataStore>) -> Self {
        Self { store }
    }

    /// Assign `id`/`_id` (unless already present) and save the entry.
    pub async fn persist(&self, mut entry: Entry) -> Result<Entry, PersistError> {
        assign_identity(&mut entry)?;
        Ok(self.store.save(entry).await?)
    }
}
