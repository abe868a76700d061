//! Configuration management

use serde::{Deserialize, Serialize};
use std::str::FromStr;

// ============================================================================
// Configuration Constants
// ============================================================================

/// Default database URL for local development.
pub const DEFAULT_DATABASE_URL: &str = "postgresql://localhost/devsync";

/// Default maximum database connections in the pool.
pub const DEFAULT_DATABASE_MAX_CONNECTIONS: u32 = 10;

/// Default minimum database connections in the pool.
pub const DEFAULT_DATABASE_MIN_CONNECTIONS: u32 = 1;

/// Default database connection timeout in seconds.
pub const DEFAULT_DATABASE_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Default database idle timeout in seconds (10 minutes).
pub const DEFAULT_DATABASE_IDLE_TIMEOUT_SECS: u64 = 600;

/// Default timeout for a whole archive download (5 minutes).
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 300;

/// User agent sent with archive downloads.
pub const DEFAULT_USER_AGENT: &str = concat!("devsync-ingest/", env!("CARGO_PKG_VERSION"));

/// Entries buffered between the decode and persist stages of one archive.
pub const DEFAULT_PIPELINE_BUFFER: usize = 64;

/// Ingest configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    pub database: DatabaseConfig,
    pub fetch: FetchConfig,
    pub pipeline: PipelineConfig,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout_secs: u64,
    pub idle_timeout_secs: u64,
    /// Apply pending migrations before the run
    pub run_migrations: bool,
}

/// Archive download configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    pub timeout_secs: u64,
    /// Archive hosts are internal; their certificates are not validated
    pub accept_invalid_certs: bool,
    pub user_agent: String,
}

/// Per-archive pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub buffer: usize,
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}

impl IngestConfig {
    /// Load configuration from `.env`, environment and defaults
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let config = IngestConfig {
            database: DatabaseConfig {
                url: std::env::var("DATABASE_URL")
                    .unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string()),
                max_connections: env_or("DATABASE_MAX_CONNECTIONS", DEFAULT_DATABASE_MAX_CONNECTIONS),
                min_connections: env_or("DATABASE_MIN_CONNECTIONS", DEFAULT_DATABASE_MIN_CONNECTIONS),
                connect_timeout_secs: env_or(
                    "DATABASE_CONNECT_TIMEOUT",
                    DEFAULT_DATABASE_CONNECT_TIMEOUT_SECS,
                ),
                idle_timeout_secs: env_or("DATABASE_IDLE_TIMEOUT", DEFAULT_DATABASE_IDLE_TIMEOUT_SECS),
                run_migrations: env_or("DEVSYNC_RUN_MIGRATIONS", true),
            },
            fetch: FetchConfig {
                timeout_secs: env_or("DEVSYNC_FETCH_TIMEOUT", DEFAULT_FETCH_TIMEOUT_SECS),
                accept_invalid_certs: env_or("DEVSYNC_ACCEPT_INVALID_CERTS", true),
                user_agent: std::env::var("DEVSYNC_USER_AGENT")
                    .unwrap_or_else(|_| DEFAULT_USER_AGENT.to_string()),
            },
            pipeline: PipelineConfig {
                buffer: env_or("DEVSYNC_PIPELINE_BUFFER", DEFAULT_PIPELINE_BUFFER),
            },
        };

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.database.url.is_empty() {
            anyhow::bail!("Database URL cannot be empty");
        }

        if self.database.max_connections == 0 {
            anyhow::bail!("Database max_connections must be greater than 0");
        }

        if self.database.min_connections > self.database.max_connections {
            anyhow::bail!(
                "Database min_connections ({}) cannot be greater than max_connections ({})",
                self.database.min_connections,
                self.database.max_connections
            );
        }

        if self.fetch.timeout_secs == 0 {
            anyhow::bail!("Fetch timeout must be greater than 0");
        }

        if self.pipeline.buffer == 0 {
            anyhow::bail!("Pipeline buffer must be greater than 0");
        }

        if self.fetch.accept_invalid_certs {
            tracing::debug!("Archive downloads accept invalid TLS certificates");
        }

        Ok(())
    }
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: DEFAULT_DATABASE_URL.to_string(),
                max_connections: DEFAULT_DATABASE_MAX_CONNECTIONS,
                min_connections: DEFAULT_DATABASE_MIN_CONNECTIONS,
                connect_timeout_secs: DEFAULT_DATABASE_CONNECT_TIMEOUT_SECS,
                idle_timeout_secs: DEFAULT_DATABASE_IDLE_TIMEOUT_SECS,
                run_migrations: true,
            },
            fetch: FetchConfig::default(),
            pipeline: PipelineConfig::default(),
        }
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_FETCH_TIMEOUT_SECS,
            accept_invalid_certs: true,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            buffer: DEFAULT_PIPELINE_BUFFER,
        }
    }
}
