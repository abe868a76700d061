//! Tasks recorded by the scheduler in `sync_tasks`

use async_trait::async_trait;
use devsync_common::types::Task;
use sqlx::postgres::PgPool;
use sqlx::Row;
use tracing::instrument;

use super::TaskSource;
use crate::error::TaskError;

#[derive(Clone)]
pub struct PgTaskStore {
    pool: PgPool,
}

impl PgTaskStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TaskSource for PgTaskStore {
    #[instrument(skip(self))]
    async fn get(&self, task_id: &str) -> Result<Task, TaskError> {
        let row = sqlx::query("SELECT id, meta FROM sync_tasks WHERE id = $1")
            .bind(task_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| TaskError::NotFound(task_id.to_string()))?;

        let id: String = row.try_get("id")?;
        let meta: serde_json::Value = row.try_get("meta")?;

        Ok(Task::from_meta(id, meta)?)
    }
}
