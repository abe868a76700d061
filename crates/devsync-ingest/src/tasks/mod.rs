//! Sync task lookup

pub mod postgres;

use async_trait::async_trait;
use devsync_common::types::Task;

use crate::error::TaskError;

pub use postgres::PgTaskStore;

/// Resolves a task id to the group and archives it covers
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TaskSource: Send + Sync {
    async fn get(&self, task_id: &str) -> Result<Task, TaskError>;
}
