//! Error types shared across devsync crates

use thiserror::Error;

/// Result type alias for common operations
pub type Result<T> = std::result::Result<T, CommonError>;

/// Errors raised while building or identifying entries
#[derive(Error, Debug)]
pub enum CommonError {
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Entry of type '{kind}' has no deviceTime")]
    MissingDeviceTime { kind: String },

    #[error("Entry of type '{kind}' has no groupId")]
    MissingGroupId { kind: String },

    #[error("Invalid task metadata: {0}")]
    InvalidTask(String),
}
