use thiserror::Error;

/// Result type alias for shard-router operations
pub type Result<T, E = ShardRouterError> = std::result::Result<T, E>;

/// Errors that can occur while routing a client batch across shards
#[derive(Error, Debug)]
pub enum ShardRouterError {
    /// A key or value declared an encoding tag other than `plain` or `binary`.
    #[error("Unsupported encoding: {0}")]
    InvalidEncoding(String),

    #[error("Failed to decode request body: {0}")]
    InvalidRequestBody(String),

    /// Transport-level failure talking to one shard.
    #[error("Shard {shard} unreachable: {reason}")]
    ShardUnreachable { shard: usize, reason: String },

    #[error("Shard {0} timed out")]
    ShardTimeout(usize),

    #[error("Failed to read response body: {0}")]
    ResponseBodyError(String),

    #[error("Failed to serialize response: {0}")]
    SerializationFailure(String),

    #[error("No shards configured")]
    NoShardsConfigured,

    #[error("Internal error: {0}")]
    InternalError(String),

    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
