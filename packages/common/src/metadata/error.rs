use thiserror::Error;

/// Errors from the metadata key-value store.
#[derive(Debug, Error)]
pub enum MetadataError {
    #[cfg(feature = "redis")]
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("corrupt record at {key}: {reason}")]
    Corrupt { key: String, reason: String },

    #[error("metadata backend error: {0}")]
    Backend(String),
}
