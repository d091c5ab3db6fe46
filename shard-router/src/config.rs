use crate::aggregator::TotalFailurePolicy;
use crate::key_codec::BinaryKeyValidation;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Port cannot be 0")]
    InvalidPort,

    #[error("No shards configured")]
    NoShardsConfigured,

    #[error("Shard {0} has an empty address")]
    EmptyShardAddress(usize),

    #[error("Shard {index} has port 0")]
    InvalidShardPort { index: usize },

    #[error("Shard {0} is not a valid address")]
    InvalidShardAddress(String),

    #[error("Duplicate shard: {0}")]
    DuplicateShard(String),

    #[error("http_timeout_secs cannot be 0")]
    ZeroTimeout,
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("could not read shard file {path}: {source}")]
    ShardFileLoad {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("could not parse shard file {path}: {source}")]
    ShardFileParse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("invalid configuration: {0}")]
    Validation(#[from] ValidationError),
}

/// Shard router configuration
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Config {
    /// Listener for client `/fetch`, `/query` and `/set` requests
    pub listener: Listener,
    /// Optional listener serving `/health` and `/ready`
    #[serde(default)]
    pub admin_listener: Option<Listener>,
    /// Backend storage servers. Position in the list is the shard index.
    #[serde(flatten)]
    pub shards: ShardSource,
    #[serde(default)]
    pub dispatch: DispatchConfig,
    #[serde(default)]
    pub aggregation: AggregationConfig,
    #[serde(default)]
    pub keys: KeysConfig,
}

impl Config {
    /// Validates everything that can be checked without touching the filesystem
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.listener.validate()?;
        if let Some(admin) = &self.admin_listener {
            admin.validate()?;
        }

        if self.dispatch.http_timeout_secs == Some(0) {
            return Err(ValidationError::ZeroTimeout);
        }

        if let ShardSource::Inline { shards } = &self.shards {
            validate_shards(shards)?;
        }

        Ok(())
    }

    /// Returns the shard list, reading `shards_file` if the list is external.
    pub fn load_shards(&self) -> Result<Vec<ShardTarget>, ConfigError> {
        let shards = match &self.shards {
            ShardSource::Inline { shards } => shards.clone(),
            ShardSource::File { shards_file } => load_shard_file(shards_file)?,
        };
        validate_shards(&shards)?;
        Ok(shards)
    }
}

/// Reads a JSON shard list, e.g. `[{"IP": "10.0.0.1", "Port": 9000}]`.
pub fn load_shard_file(path: &Path) -> Result<Vec<ShardTarget>, ConfigError> {
    let data = std::fs::read(path).map_err(|source| ConfigError::ShardFileLoad {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_slice(&data).map_err(|source| ConfigError::ShardFileParse {
        path: path.to_path_buf(),
        source,
    })
}

fn validate_shards(shards: &[ShardTarget]) -> Result<(), ValidationError> {
    if shards.is_empty() {
        return Err(ValidationError::NoShardsConfigured);
    }

    let mut seen = HashSet::new();
    for (index, shard) in shards.iter().enumerate() {
        if shard.ip.trim().is_empty() {
            return Err(ValidationError::EmptyShardAddress(index));
        }
        if shard.port == 0 {
            return Err(ValidationError::InvalidShardPort { index });
        }
        if !seen.insert((shard.ip.as_str(), shard.port)) {
            return Err(ValidationError::DuplicateShard(shard.to_string()));
        }
    }

    Ok(())
}

/// Network listener configuration
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Listener {
    /// Host address to bind to (e.g., "0.0.0.0" or "127.0.0.1")
    pub host: String,
    /// Port number to listen on
    pub port: u16,
}

impl Listener {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.port == 0 {
            return Err(ValidationError::InvalidPort);
        }
        Ok(())
    }
}

/// Where the shard list comes from
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum ShardSource {
    Inline { shards: Vec<ShardTarget> },
    File { shards_file: PathBuf },
}

/// Address of one backend storage server
#[derive(Clone, Debug, Deserialize, PartialEq, Eq, Hash)]
pub struct ShardTarget {
    #[serde(alias = "IP")]
    pub ip: String,
    #[serde(alias = "Port")]
    pub port: u16,
}

impl std::fmt::Display for ShardTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.ip.contains(':') {
            write!(f, "[{}]:{}", self.ip, self.port)
        } else {
            write!(f, "{}:{}", self.ip, self.port)
        }
    }
}

const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

fn default_http_timeout_secs() -> Option<u64> {
    Some(DEFAULT_HTTP_TIMEOUT_SECS)
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct DispatchConfig {
    /// Deadline for a single shard call. An explicit `null` disables it.
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: Option<u64>,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            http_timeout_secs: default_http_timeout_secs(),
        }
    }
}

impl DispatchConfig {
    pub fn http_timeout(&self) -> Option<Duration> {
        self.http_timeout_secs.map(Duration::from_secs)
    }
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct AggregationConfig {
    #[serde(default)]
    pub total_failure: TotalFailurePolicy,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct KeysConfig {
    #[serde(default)]
    pub binary: BinaryKeyValidation,
}
