//! devsync Ingest Library
//!
//! Re-ingests a group's device data from vendor export archives.
//!
//! # Pipeline
//!
//! - **Tasks**: a task id resolves to a group and an ordered list of archive references
//! - **Vendor dispatch**: the archive name's suffix picks a decoder (Diasend, CareLink, Dexcom)
//! - **Streaming**: fetch → decode → markup → identity → upsert, one archive at a time
//! - **Isolation**: a broken archive is logged and skipped; only task lookup,
//!   group wipe and an unreachable store fail the run
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use devsync_ingest::config::IngestConfig;
//! use devsync_ingest::fetch::ArchiveFetcher;
//! use devsync_ingest::pipeline::ArchivePipeline;
//! use devsync_ingest::sink::PersistenceSink;
//! use devsync_ingest::store::{DeviceDataStore, PgDeviceDataStore};
//! use devsync_ingest::tasks::PgTaskStore;
//! use devsync_ingest::vendor::DecoderRegistry;
//! use devsync_ingest::TaskSync;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = IngestConfig::load()?;
//!     let pg = PgDeviceDataStore::connect(&config.database).await?;
//!     let tasks = Arc::new(PgTaskStore::new(pg.pool().clone()));
//!     let store: Arc<dyn DeviceDataStore> = Arc::new(pg);
//!
//!     let fetcher = ArchiveFetcher::new(&config.fetch)?;
//!     let pipeline = ArchivePipeline::new(fetcher, PersistenceSink::new(store.clone()), config.pipeline.buffer);
//!     let sync = TaskSync::new(tasks, store.clone(), DecoderRegistry::with_defaults(), pipeline);
//!
//!     let report = sync.run("task-42").await;
//!     report.report();
//!     store.close().await;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod fetch;
pub mod markup;
pub mod orchestrator;
pub mod pipeline;
pub mod report;
pub mod sink;
pub mod store;
pub mod tasks;
pub mod vendor;

pub use error::{DecodeError, PersistError, StoreError, SyncError, TaskError};
pub use orchestrator::TaskSync;
pub use report::{ArchiveOutcome, ArchiveResult, RunReport};
