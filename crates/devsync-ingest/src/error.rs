//! Error types for the ingest pipeline
//!
//! Task-level errors ([`SyncError`]) abort the run and map to a failing exit
//! status. Everything else is scoped to one archive or one entry and is logged
//! and counted instead of propagated.

use devsync_common::CommonError;
use thiserror::Error;

use crate::vendor::VendorTag;

/// Errors building the archive fetcher
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

/// Errors raised while decoding an archive into entries
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("Failed to read archive: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed delimited record: {0}")]
    Delimited(#[from] csv_async::Error),

    #[error("Unreadable spreadsheet: {0}")]
    Spreadsheet(String),

    #[error("Header row with column '{0}' not found")]
    MissingHeader(String),

    #[error("No decoder installed for vendor tag '{0}'")]
    NoDecoder(VendorTag),
}

/// Device-data store errors
#[derive(Error, Debug)]
pub enum StoreError {
    /// The store is closed; nothing further can be written
    #[error("Device data store closed: {0}")]
    Closed(String),

    /// A single call could not reach the store (timeout, dropped connection)
    #[error("Device data store unavailable: {0}")]
    Unavailable(String),

    #[error("Database error: {0}")]
    Database(sqlx::Error),

    #[error("Migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Entry of type '{0}' has no storage key")]
    MissingKey(String),

    #[error(transparent)]
    Entry(#[from] CommonError),
}

impl StoreError {
    pub fn is_unavailable(&self) -> bool {
        matches!(self, StoreError::Unavailable(_) | StoreError::Closed(_))
    }

    pub fn is_closed(&self) -> bool {
        matches!(self, StoreError::Closed(_))
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolClosed => StoreError::Closed(err.to_string()),
            sqlx::Error::PoolTimedOut | sqlx::Error::Io(_) => StoreError::Unavailable(err.to_string()),
            other => StoreError::Database(other),
        }
    }
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Task lookup errors
#[derive(Error, Debug)]
pub enum TaskError {
    #[error("Task not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Invalid(#[from] CommonError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Failure to persist a single entry
#[derive(Error, Debug)]
pub enum PersistError {
    #[error("Identity assignment failed: {0}")]
    Identity(#[from] CommonError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Errors that abort the whole task
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Task lookup failed: {0}")]
    TaskLookup(#[from] TaskError),

    #[error("Failed to delete device data for group {group_id}: {source}")]
    Wipe {
        group_id: String,
        #[source]
        source: StoreError,
    },

    #[error("Store closed while ingesting {archive}: {source}")]
    StoreClosed {
        archive: String,
        #[source]
        source: StoreError,
    },
}
