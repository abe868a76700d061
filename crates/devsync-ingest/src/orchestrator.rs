//! Task orchestrator
//!
//! Looks up the task, wipes the group's existing device data, then re-ingests
//! each archive in task order. Archives are processed one after another;
//! an archive's failure never affects its siblings.

use std::sync::Arc;
use std::time::Instant;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::error::SyncError;
use crate::markup::{Clock, EntryMarkup};
use crate::pipeline::ArchivePipeline;
use crate::report::{ArchiveOutcome, RunReport};
use crate::store::DeviceDataStore;
use crate::tasks::TaskSource;
use crate::vendor::DecoderRegistry;

pub struct TaskSync {
    tasks: Arc<dyn TaskSource>,
    store: Arc<dyn DeviceDataStore>,
    registry: DecoderRegistry,
    pipeline: ArchivePipeline,
    clock: Option<Clock>,
}

impl TaskSync {
    pub fn new(
        tasks: Arc<dyn TaskSource>,
        store: Arc<dyn DeviceDataStore>,
        registry: DecoderRegistry,
        pipeline: ArchivePipeline,
    ) -> Self {
        Self {
            tasks,
            store,
            registry,
            pipeline,
            clock: None,
        }
    }

    /// Override the clock used for entries without a device time
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Run `task_id` to completion. Task-level failures are carried in the report.
    pub async fn run(&self, task_id: &str) -> RunReport {
        let run_id = Uuid::new_v4();
        let mut archives = Vec::new();
        let error = self.sync(run_id, task_id, &mut archives).await.err();

        RunReport {
            run_id,
            task_id: task_id.to_string(),
            archives,
            error,
        }
    }

    #[instrument(skip(self, outcomes))]
    async fn sync(&self, run_id: Uuid, task_id: &str, outcomes: &mut Vec<ArchiveOutcome>) -> Result<(), SyncError> {
        let start_time = Instant::now();

        // Step 1: Resolve the task
        let task = self.tasks.get(task_id).await?;
        let group_id = task.group_id().to_string();
        info!(group_id = %group_id, archives = task.archives().len(), "Starting sync");

        // Step 2: Wipe the group before anything is written
        let removed = self
            .store
            .remove_group(&group_id)
            .await
            .map_err(|source| SyncError::Wipe {
                group_id: group_id.clone(),
                source,
            })?;
        info!(group_id = %group_id, removed, "Removed existing device data");

        // Step 3: Re-ingest archives in order
        let mut markup = EntryMarkup::new(&group_id);
        if let Some(clock) = &self.clock {
            markup = markup.with_clock(Arc::clone(clock));
        }

        for reference in task.archives() {
            let Some(parser) = self.registry.route(reference, &markup) else {
                warn!(archive = %reference, "No vendor matches archive, passing through");
                outcomes.push(ArchiveOutcome::PassThrough {
                    reference: reference.clone(),
                });
                continue;
            };

            let result = self
                .pipeline
                .run(reference, parser)
                .await
                .map_err(|source| SyncError::StoreClosed {
                    archive: reference.clone(),
                    source,
                })?;
            outcomes.push(ArchiveOutcome::Ingested(result));
        }

        info!(
            group_id = %group_id,
            archives = outcomes.len(),
            "Sync finished in {:.2}s",
            start_time.elapsed().as_secs_f64()
        );

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FetchConfig;
    use crate::error::{StoreError, TaskError};
    use crate::fetch::ArchiveFetcher;
    use crate::report::EXIT_FAILURE;
    use crate::sink::PersistenceSink;
    use crate::store::MockDeviceDataStore;
    use crate::report::EXIT_SUCCESS;
    use crate::tasks::MockTaskSource;
    use devsync_common::types::Task;
    use std::io::Write;

    fn task_sync(tasks: MockTaskSource, store: MockDeviceDataStore) -> TaskSync {
        let store: Arc<dyn DeviceDataStore> = Arc::new(store);
        let fetcher = ArchiveFetcher::new(&FetchConfig::default()).unwrap();
        let pipeline = ArchivePipeline::new(fetcher, PersistenceSink::new(Arc::clone(&store)), 4);

        TaskSync::new(Arc::new(tasks), store, DecoderRegistry::with_defaults(), pipeline)
    }

    #[tokio::test]
    async fn test_lookup_failure_touches_nothing() {
        let mut tasks = MockTaskSource::new();
        tasks
            .expect_get()
            .returning(|id| Err(TaskError::NotFound(id.to_string())));

        let mut store = MockDeviceDataStore::new();
        store.expect_remove_group().never();
        store.expect_save().never();

        let report = task_sync(tasks, store).run("t-missing").await;

        assert!(matches!(report.error, Some(SyncError::TaskLookup(TaskError::NotFound(_)))));
        assert!(report.archives.is_empty());
        assert_eq!(report.exit_code(), EXIT_FAILURE);
    }

    #[tokio::test]
    async fn test_wipe_failure_skips_archives() {
        let mut tasks = MockTaskSource::new();
        tasks
            .expect_get()
            .returning(|id| Ok(Task::new(id, "g1", vec!["/tmp/a_carelink.csv".to_string()])));

        let mut store = MockDeviceDataStore::new();
        store
            .expect_remove_group()
            .withf(|group_id| group_id == "g1")
            .times(1)
            .returning(|_| Err(StoreError::Unavailable("connection refused".to_string())));
        store.expect_save().never();

        let report = task_sync(tasks, store).run("t1").await;

        assert!(matches!(report.error, Some(SyncError::Wipe { ref group_id, .. }) if group_id == "g1"));
        assert!(report.archives.is_empty());
        assert_eq!(report.exit_code(), EXIT_FAILURE);
    }

    #[tokio::test]
    async fn test_unrecognized_archives_pass_through() {
        let mut tasks = MockTaskSource::new();
        tasks.expect_get().returning(|id| {
            Ok(Task::new(
                id,
                "g1",
                vec!["/tmp/notes.txt".to_string(), "https://host/readme".to_string()],
            ))
        });

        let mut store = MockDeviceDataStore::new();
        store.expect_remove_group().times(1).returning(|_| Ok(0));
        store.expect_save().never();

        let report = task_sync(tasks, store).run("t1").await;

        assert!(report.error.is_none());
        assert_eq!(
            report.archives,
            vec![
                ArchiveOutcome::PassThrough {
                    reference: "/tmp/notes.txt".to_string()
                },
                ArchiveOutcome::PassThrough {
                    reference: "https://host/readme".to_string()
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_timed_out_save_does_not_stop_later_archives() {
        let mut first = tempfile::Builder::new().suffix("_dexcom").tempfile().unwrap();
        first
            .write_all(b"GlucoseDisplayTime\tGlucoseValue\n2014-03-01 08:00:00\t120\n")
            .unwrap();
        let mut second = tempfile::Builder::new().suffix("_dexcom").tempfile().unwrap();
        second
            .write_all(b"GlucoseDisplayTime\tGlucoseValue\n2014-03-01 09:00:00\t140\n2014-03-01 09:05:00\t145\n")
            .unwrap();
        let archives = vec![
            first.path().display().to_string(),
            second.path().display().to_string(),
        ];

        let mut tasks = MockTaskSource::new();
        tasks
            .expect_get()
            .returning(move |id| Ok(Task::new(id, "g1", archives.clone())));

        let mut store = MockDeviceDataStore::new();
        store.expect_remove_group().times(1).returning(|_| Ok(3));
        let mut calls = 0;
        store.expect_save().times(3).returning(move |entry| {
            calls += 1;
            if calls == 1 {
                Err(StoreError::from(sqlx::Error::PoolTimedOut))
            } else {
                Ok(entry)
            }
        });

        let report = task_sync(tasks, store).run("t1").await;

        assert!(report.error.is_none());
        assert_eq!(report.exit_code(), EXIT_SUCCESS);
        let counts: Vec<_> = report.archives.iter().map(ArchiveOutcome::persisted).collect();
        assert_eq!(counts, vec![0, 2]);
        match &report.archives[0] {
            ArchiveOutcome::Ingested(result) => assert_eq!(result.failed, 1),
            other => panic!("expected ingested archive, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_closed_store_aborts_task() {
        let mut file = tempfile::Builder::new().suffix("_dexcom").tempfile().unwrap();
        file.write_all(b"GlucoseDisplayTime\tGlucoseValue\n2014-03-01 08:00:00\t120\n").unwrap();
        let archives = vec![file.path().display().to_string(), "/tmp/later_dexcom".to_string()];

        let mut tasks = MockTaskSource::new();
        tasks
            .expect_get()
            .returning(move |id| Ok(Task::new(id, "g1", archives.clone())));

        let mut store = MockDeviceDataStore::new();
        store.expect_remove_group().returning(|_| Ok(0));
        store
            .expect_save()
            .times(1)
            .returning(|_| Err(StoreError::from(sqlx::Error::PoolClosed)));

        let report = task_sync(tasks, store).run("t1").await;

        assert!(matches!(report.error, Some(SyncError::StoreClosed { .. })));
        assert_eq!(report.exit_code(), EXIT_FAILURE);
    }
}
