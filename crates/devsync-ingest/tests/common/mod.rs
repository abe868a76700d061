//! Shared fixtures for ingest integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use chrono::NaiveDate;
use devsync_common::types::{Entry, Task};
use devsync_ingest::config::FetchConfig;
use devsync_ingest::error::{DecodeError, TaskError};
use devsync_ingest::fetch::{ArchiveFetcher, ByteStream};
use devsync_ingest::markup::Clock;
use devsync_ingest::pipeline::ArchivePipeline;
use devsync_ingest::sink::PersistenceSink;
use devsync_ingest::store::{DeviceDataStore, MemoryDeviceDataStore};
use devsync_ingest::tasks::TaskSource;
use devsync_ingest::vendor::{DecoderRegistry, EntryStream, VendorDecoder};
use devsync_ingest::TaskSync;
use futures::stream::{self, StreamExt};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("devsync_ingest=debug")
        .with_test_writer()
        .try_init();
}

/// Tasks held in memory, keyed by id
#[derive(Default)]
pub struct StaticTaskSource {
    tasks: Mutex<HashMap<String, Task>>,
}

impl StaticTaskSource {
    pub fn with_task(task: Task) -> Self {
        let source = Self::default();
        source.insert(task);
        source
    }

    pub fn insert(&self, task: Task) {
        self.tasks.lock().unwrap().insert(task.id.clone(), task);
    }
}

#[async_trait]
impl TaskSource for StaticTaskSource {
    async fn get(&self, task_id: &str) -> Result<Task, TaskError> {
        self.tasks
            .lock()
            .unwrap()
            .get(task_id)
            .cloned()
            .ok_or_else(|| TaskError::NotFound(task_id.to_string()))
    }
}

/// Yields its entries, then fails
pub struct FailingDecoder {
    pub before_failure: Vec<Entry>,
}

impl VendorDecoder for FailingDecoder {
    fn decode(&self, _bytes: ByteStream) -> EntryStream {
        let items = self
            .before_failure
            .clone()
            .into_iter()
            .map(Ok)
            .chain(std::iter::once(Err(DecodeError::MissingHeader("Timestamp".to_string()))));
        stream::iter(items).boxed()
    }
}

/// Yields its entries unchanged
pub struct FixedDecoder(pub Vec<Entry>);

impl VendorDecoder for FixedDecoder {
    fn decode(&self, _bytes: ByteStream) -> EntryStream {
        stream::iter(self.0.clone().into_iter().map(Ok)).boxed()
    }
}

pub fn fixed_clock() -> Clock {
    Arc::new(|| {
        NaiveDate::from_ymd_opt(2014, 3, 1)
            .and_then(|d| d.and_hms_opt(8, 5, 0))
            .unwrap()
    })
}

pub fn write_archive(dir: &Path, name: &str, body: &[u8]) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, body).unwrap();
    path
}

/// Dexcom export with `rows` five-minute readings starting at 08:00
pub fn dexcom_export(rows: usize) -> Vec<u8> {
    let mut body = String::from("PatientInfoField\tPatientInfoValue\tGlucoseDisplayTime\tGlucoseValue\n");
    for i in 0..rows {
        body.push_str(&format!("\t\t2014-03-01 {:02}:{:02}:00\t{}\n", 8 + i / 12, (i % 12) * 5, 100 + i));
    }
    body.into_bytes()
}

/// CareLink export whose first data row is not valid UTF-8
pub fn broken_carelink_export() -> Vec<u8> {
    let mut body = b"Index,Timestamp,Raw-Type,Raw-Values\n1,".to_vec();
    body.extend_from_slice(b"\xff\xfe3/1/14 08:00:00,CalBGForPH,AMOUNT=120\n");
    body.extend_from_slice(b"2,3/1/14 08:05:00,CalBGForPH,AMOUNT=130\n");
    body
}

pub struct Harness {
    pub store: Arc<MemoryDeviceDataStore>,
    pub tasks: Arc<StaticTaskSource>,
}

impl Harness {
    pub fn new() -> Self {
        Self {
            store: Arc::new(MemoryDeviceDataStore::new()),
            tasks: Arc::new(StaticTaskSource::default()),
        }
    }

    pub fn sync(&self, registry: DecoderRegistry) -> TaskSync {
        let store: Arc<dyn DeviceDataStore> = self.store.clone();
        let fetcher = ArchiveFetcher::new(&FetchConfig::default()).unwrap();
        let pipeline = ArchivePipeline::new(fetcher, PersistenceSink::new(Arc::clone(&store)), 4);

        TaskSync::new(self.tasks.clone(), store, registry, pipeline).with_clock(fixed_clock())
    }
}
