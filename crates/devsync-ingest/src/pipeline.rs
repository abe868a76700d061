//! Per-archive pipeline
//!
//! fetch → decode → markup runs on its own task and hands entries to the
//! persisting side over a bounded channel. Entries are persisted one at a time
//! in decode order. A decode failure ends the archive but keeps whatever was
//! already stored. A failed save, including a timed-out one, is counted against
//! its entry; only a closed store aborts.

use devsync_common::types::Entry;
use futures::StreamExt;
use tokio::sync::mpsc;
use tracing::{debug, instrument, warn};

use crate::error::{DecodeError, PersistError, StoreError};
use crate::fetch::ArchiveFetcher;
use crate::report::ArchiveResult;
use crate::sink::PersistenceSink;
use crate::vendor::ArchiveParser;

#[derive(Clone)]
pub struct ArchivePipeline {
    fetcher: ArchiveFetcher,
    sink: PersistenceSink,
    buffer: usize,
}

impl ArchivePipeline {
    pub fn new(fetcher: ArchiveFetcher, sink: PersistenceSink, buffer: usize) -> Self {
        Self {
            fetcher,
            sink,
            buffer: buffer.max(1),
        }
    }

    #[instrument(skip(self, parser), fields(vendor = %parser.tag()))]
    pub async fn run(&self, reference: &str, parser: ArchiveParser) -> Result<ArchiveResult, StoreError> {
        let mut result = ArchiveResult::new(reference, parser.tag());
        let (tx, mut rx) = mpsc::channel::<Entry>(self.buffer);
        let bytes = self.fetcher.fetch(reference);

        let producer = tokio::spawn(async move {
            let mut entries = parser.parse(bytes);
            while let Some(entry) = entries.next().await {
                if tx.send(entry?).await.is_err() {
                    break;
                }
            }
            Ok::<_, DecodeError>(())
        });

        while let Some(entry) = rx.recv().await {
            match self.sink.persist(entry).await {
                Ok(stored) => result.stored.extend(stored.storage_id),
                Err(PersistError::Store(err)) if err.is_closed() => {
                    producer.abort();
                    return Err(err);
                },
                Err(err) => {
                    warn!(error = %err, "Failed to persist entry");
                    result.failed += 1;
                },
            }
        }

        match producer.await {
            Ok(Ok(())) => debug!(persisted = result.persisted(), "Archive drained"),
            Ok(Err(err)) => {
                warn!(error = %err, persisted = result.persisted(), "Archive decode failed");
                result.error = Some(err.to_string());
            },
            Err(err) => {
                warn!(error = %err, "Decoder task failed");
                result.error = Some(format!("decoder task failed: {}", err));
            },
        }

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FetchConfig;
    use crate::markup::EntryMarkup;
    use crate::store::{DeviceDataStore, MemoryDeviceDataStore, MockDeviceDataStore};
    use crate::vendor::{DecoderRegistry, VendorTag};
    use std::io::Write;
    use std::sync::Arc;

    fn dexcom_file(body: &[u8]) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix("_dexcom").tempfile().unwrap();
        file.write_all(body).unwrap();
        file
    }

    fn pipeline(store: Arc<dyn DeviceDataStore>) -> ArchivePipeline {
        let fetcher = ArchiveFetcher::new(&FetchConfig::default()).unwrap();
        ArchivePipeline::new(fetcher, PersistenceSink::new(store), 2)
    }

    fn parser(reference: &str) -> ArchiveParser {
        DecoderRegistry::with_defaults()
            .route(reference, &EntryMarkup::new("g1"))
            .unwrap()
    }

    #[tokio::test]
    async fn test_entries_persisted_in_order() {
        let file = dexcom_file(
            b"GlucoseDisplayTime\tGlucoseValue\n\
              2014-03-01 08:00:00\t120\n\
              2014-03-01 08:05:00\t125\n\
              2014-03-01 08:10:00\t130\n\
              2014-03-01 08:15:00\t135\n",
        );
        let reference = file.path().to_str().unwrap();
        let store = Arc::new(MemoryDeviceDataStore::new());

        let result = pipeline(store.clone()).run(reference, parser(reference)).await.unwrap();

        assert_eq!(result.persisted(), 4);
        assert_eq!(result.vendor, VendorTag::Dexcom.to_string());
        assert!(result.error.is_none());

        let stored = store.entries_for("g1").await;
        let mut expected = result.stored.clone();
        expected.sort();
        let mut keys: Vec<_> = stored.iter().filter_map(|e| e.storage_id.clone()).collect();
        keys.sort();
        assert_eq!(keys, expected);
    }

    #[tokio::test]
    async fn test_decode_error_keeps_partial_results() {
        let file = dexcom_file(
            b"GlucoseDisplayTime\tGlucoseValue\n\
              2014-03-01 08:00:00\t120\n\
              2014-03-01 08:05:00\t\xff\n",
        );
        let reference = file.path().to_str().unwrap();
        let store = Arc::new(MemoryDeviceDataStore::new());

        let result = pipeline(store.clone()).run(reference, parser(reference)).await.unwrap();

        assert_eq!(result.persisted(), 1);
        assert!(result.error.is_some());
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_missing_archive_is_archive_error() {
        let store = Arc::new(MemoryDeviceDataStore::new());
        let reference = "/definitely/not/here_dexcom";

        let result = pipeline(store).run(reference, parser(reference)).await.unwrap();

        assert_eq!(result.persisted(), 0);
        assert!(result.error.is_some());
    }

    #[tokio::test]
    async fn test_closed_store_aborts() {
        let file = dexcom_file(b"GlucoseDisplayTime\tGlucoseValue\n2014-03-01 08:00:00\t120\n2014-03-01 08:05:00\t125\n");
        let reference = file.path().to_str().unwrap();

        let mut store = MockDeviceDataStore::new();
        store
            .expect_save()
            .times(1)
            .returning(|_| Err(StoreError::from(sqlx::Error::PoolClosed)));

        let err = pipeline(Arc::new(store)).run(reference, parser(reference)).await.unwrap_err();
        assert!(err.is_closed());
    }

    #[tokio::test]
    async fn test_timed_out_save_is_counted_and_skipped() {
        let file = dexcom_file(
            b"GlucoseDisplayTime\tGlucoseValue\n\
              2014-03-01 08:00:00\t120\n\
              2014-03-01 08:05:00\t125\n\
              2014-03-01 08:10:00\t130\n",
        );
        let reference = file.path().to_str().unwrap();

        let mut store = MockDeviceDataStore::new();
        let mut calls = 0;
        store.expect_save().times(3).returning(move |entry| {
            calls += 1;
            if calls == 1 {
                Err(StoreError::from(sqlx::Error::PoolTimedOut))
            } else {
                Ok(entry)
            }
        });

        let result = pipeline(Arc::new(store)).run(reference, parser(reference)).await.unwrap();
        assert_eq!(result.failed, 1);
        assert_eq!(result.persisted(), 2);
        assert!(result.error.is_none());
    }

    #[tokio::test]
    async fn test_rejected_entry_is_counted() {
        let file = dexcom_file(b"GlucoseDisplayTime\tGlucoseValue\n2014-03-01 08:00:00\t120\n2014-03-01 08:05:00\t125\n");
        let reference = file.path().to_str().unwrap();

        let mut store = MockDeviceDataStore::new();
        let mut calls = 0;
        store.expect_save().times(2).returning(move |entry| {
            calls += 1;
            if calls == 1 {
                Err(StoreError::MissingKey(entry.kind))
            } else {
                Ok(entry)
            }
        });

        let result = pipeline(Arc::new(store)).run(reference, parser(reference)).await.unwrap();
        assert_eq!(result.failed, 1);
        assert_eq!(result.persisted(), 1);
    }
}
