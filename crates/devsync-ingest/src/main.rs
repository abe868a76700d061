//! devsync-ingest - re-ingest a group's device data for one sync task

use anyhow::{Context, Result};
use clap::error::ErrorKind;
use clap::Parser;
use devsync_common::logging::{init_logging, LogConfig};
use devsync_ingest::config::IngestConfig;
use devsync_ingest::fetch::ArchiveFetcher;
use devsync_ingest::pipeline::ArchivePipeline;
use devsync_ingest::report::{EXIT_FAILURE, EXIT_SUCCESS, EXIT_USAGE};
use devsync_ingest::sink::PersistenceSink;
use devsync_ingest::store::{DeviceDataStore, PgDeviceDataStore};
use devsync_ingest::tasks::PgTaskStore;
use devsync_ingest::vendor::DecoderRegistry;
use devsync_ingest::TaskSync;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "devsync-ingest")]
#[command(author, version, about = "Re-ingest device data archives for a sync task")]
struct Cli {
    /// Sync task to run
    task_id: String,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let code = match err.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => EXIT_SUCCESS,
                _ => EXIT_USAGE,
            };
            let _ = err.print();
            return ExitCode::from(code);
        },
    };

    let log_config = LogConfig::builder()
        .log_file_prefix("devsync-ingest")
        .build()
        .merge_env();
    let _guard = match log_config.and_then(|config| init_logging(&config)) {
        Ok(guard) => guard,
        Err(err) => {
            eprintln!("Failed to initialize logging: {:#}", err);
            return ExitCode::from(EXIT_FAILURE);
        },
    };

    match run(&cli.task_id).await {
        Ok(code) => ExitCode::from(code),
        Err(err) => {
            error!(task_id = %cli.task_id, error = %format!("{:#}", err), "Sync could not start");
            ExitCode::from(EXIT_FAILURE)
        },
    }
}

async fn run(task_id: &str) -> Result<u8> {
    let config = IngestConfig::load()?;

    let pg = PgDeviceDataStore::connect(&config.database)
        .await
        .context("Failed to connect to device data store")?;
    if config.database.run_migrations {
        pg.migrate().await.context("Failed to run migrations")?;
    }

    let tasks = Arc::new(PgTaskStore::new(pg.pool().clone()));
    let store: Arc<dyn DeviceDataStore> = Arc::new(pg);

    let fetcher = ArchiveFetcher::new(&config.fetch)?;
    let pipeline = ArchivePipeline::new(
        fetcher,
        PersistenceSink::new(Arc::clone(&store)),
        config.pipeline.buffer,
    );
    let sync = TaskSync::new(tasks, Arc::clone(&store), DecoderRegistry::with_defaults(), pipeline);

    info!(task_id = %task_id, "Running sync task");
    let report = sync.run(task_id).await;
    let code = report.report();

    store.close().await;
    Ok(code)
}
