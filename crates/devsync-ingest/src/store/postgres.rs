//! PostgreSQL-backed device-data store

use async_trait::async_trait;
use devsync_common::types::Entry;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::types::Json;
use std::time::Duration;
use tracing::{debug, info, instrument};

use super::DeviceDataStore;
use crate::config::DatabaseConfig;
use crate::error::{StoreError, StoreResult};

/// Entries live in `device_data` as JSONB documents keyed by `_id`
#[derive(Clone)]
pub struct PgDeviceDataStore {
    pool: PgPool,
}

impl PgDeviceDataStore {
    pub async fn connect(config: &DatabaseConfig) -> StoreResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
            .idle_timeout(Duration::from_secs(config.idle_timeout_secs))
            .connect(&config.url)
            .await?;

        info!(
            max_connections = config.max_connections,
            min_connections = config.min_connections,
            "Database connection pool created"
        );

        Ok(Self::from_pool(pool))
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Apply pending schema migrations
    pub async fn migrate(&self) -> StoreResult<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        info!("Database migrations completed");
        Ok(())
    }
}

#[async_trait]
impl DeviceDataStore for PgDeviceDataStore {
    #[instrument(skip(self))]
    async fn remove_group(&self, group_id: &str) -> StoreResult<u64> {
        let result = sqlx::query("DELETE FROM device_data WHERE group_id = $1")
            .bind(group_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    async fn save(&self, entry: Entry) -> StoreResult<Entry> {
        let key = entry
            .storage_id
            .clone()
            .ok_or_else(|| StoreError::MissingKey(entry.kind.clone()))?;
        let document = entry.to_document()?;

        sqlx::query(
            r#"
            INSERT INTO device_data (id, group_id, entry, updated_at)
            VALUES ($1, $2, $3, NOW())
            ON CONFLICT (id) DO UPDATE
            SET group_id = EXCLUDED.group_id,
                entry = EXCLUDED.entry,
                updated_at = NOW()
            "#,
        )
        .bind(&key)
        .bind(entry.group_id.as_deref().unwrap_or_default())
        .bind(Json(document))
        .execute(&self.pool)
        .await?;

        debug!(id = %key, kind = %entry.kind, "Stored entry");
        Ok(entry)
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}
