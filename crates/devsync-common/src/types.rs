//! Common types used across devsync

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{CommonError, Result};

/// Timestamp layout for `deviceTime` (ISO local time, second precision).
pub const DEVICE_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// A normalized device record ready for storage.
///
/// Vendor decoders fill `type`, `value` and usually `deviceTime`. Markup sets
/// `groupId`; identity assignment sets `id` and `_id`. Vendor-specific columns
/// travel in `fields` and are stored alongside the known attributes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entry {
    /// Storage key, bound to the owning group
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub storage_id: Option<String>,

    /// Content identity, independent of ownership
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Reading or event kind: 'smbg', 'cbg', 'bolus', ...
    #[serde(rename = "type")]
    pub kind: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_time: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_id: Option<String>,

    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Entry {
    pub fn new(kind: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            storage_id: None,
            id: None,
            kind: kind.into(),
            value: Some(value.into()),
            device_time: None,
            group_id: None,
            fields: Map::new(),
        }
    }

    pub fn with_device_time(mut self, device_time: impl Into<String>) -> Self {
        self.device_time = Some(device_time.into());
        self
    }

    pub fn with_group_id(mut self, group_id: impl Into<String>) -> Self {
        self.group_id = Some(group_id.into());
        self
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// Serialize into the stored document shape (`_id`, `type`, `deviceTime`, ...).
    pub fn to_document(&self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }
}

/// Metadata attached to a sync task by the scheduling system
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskMeta {
    /// Owner of the data being re-ingested
    pub group_id: String,

    /// Archive references (local paths or URLs), in processing order
    #[serde(default)]
    pub archives: Vec<String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One ingestion run: a group and the archives to (re)ingest for it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub meta: TaskMeta,
}

impl Task {
    pub fn new(id: impl Into<String>, group_id: impl Into<String>, archives: Vec<String>) -> Self {
        Self {
            id: id.into(),
            meta: TaskMeta {
                group_id: group_id.into(),
                archives,
                extra: Map::new(),
            },
        }
    }

    /// Build a task from its id and the raw `meta` document stored by the scheduler.
    pub fn from_meta(id: impl Into<String>, meta: Value) -> Result<Self> {
        let id = id.into();
        let meta: TaskMeta = serde_json::from_value(meta)
            .map_err(|e| CommonError::InvalidTask(format!("task {}: {}", id, e)))?;

        if meta.group_id.is_empty() {
            return Err(CommonError::InvalidTask(format!("task {} has an empty groupId", id)));
        }

        Ok(Self { id, meta })
    }

    pub fn group_id(&self) -> &str {
        &self.meta.group_id
    }

    pub fn archives(&self) -> &[String] {
        &self.meta.archives
    }
}
