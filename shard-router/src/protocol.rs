//! Wire types for the client API and the backend shard API.
//!
//! Client requests (one JSON array per call):
//!
//! ```json
//! [{"Key": {"Encoding": "plain", "Data": "k1"}}]
//! [{"Key": {"Encoding": "binary", "Data": "k1"}, "Value": {"Encoding": "plain", "Data": "v1"}}]
//! ```
//!
//! Each shard receives only its own entries:
//!
//! ```json
//! [{"Key": "k1"}, {"Key": "azE=", "Value": "v1"}]
//! ```
//!
//! Shards answer `/fetch` and `/query` with `[{"key": ..., "value": ...}]` and
//! `/set` with `{"keys_added": 3, "keys_failed": ["k2"]}`. The aggregate sent
//! back to the client has the same shape.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;

/// The three batched operations, one endpoint each.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operation {
    Fetch,
    Query,
    Set,
}

impl Operation {
    pub const ALL: [Operation; 3] = [Operation::Fetch, Operation::Query, Operation::Set];

    pub const fn as_str(&self) -> &'static str {
        match self {
            Operation::Fetch => "fetch",
            Operation::Query => "query",
            Operation::Set => "set",
        }
    }

    /// Endpoint path, identical on the proxy and on every shard.
    pub const fn path(&self) -> &'static str {
        match self {
            Operation::Fetch => "/fetch",
            Operation::Query => "/query",
            Operation::Set => "/set",
        }
    }

    pub fn from_path(path: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.path() == path)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A client-supplied `(encoding, data)` pair.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct EncodedData {
    #[serde(rename = "Encoding", alias = "encoding", default)]
    pub encoding: Option<String>,
    #[serde(rename = "Data", alias = "data", default)]
    pub data: String,
}

/// One item of a `/fetch` or `/query` batch.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct KeyItem {
    #[serde(rename = "Key", alias = "key")]
    pub key: EncodedData,
}

/// One item of a `/set` batch.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SetItem {
    #[serde(rename = "Key", alias = "key")]
    pub key: EncodedData,
    #[serde(rename = "Value", alias = "value", default)]
    pub value: EncodedData,
}

/// One entry of the body sent to a shard.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ShardEntry {
    #[serde(rename = "Key")]
    pub key: String,
    #[serde(rename = "Value", skip_serializing_if = "Option::is_none", default)]
    pub value: Option<String>,
}

/// A record returned by `/fetch` or `/query`.
///
/// The value is passed through untouched: shards answer fetch with booleans
/// and query with strings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Record {
    #[serde(alias = "Key")]
    pub key: String,
    #[serde(alias = "Value", default)]
    pub value: JsonValue,
}

/// Result of a `/set`, both per shard and aggregated.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SetSummary {
    #[serde(alias = "KeysAdded", default)]
    pub keys_added: u64,
    #[serde(alias = "KeysFailed", default, deserialize_with = "null_as_empty")]
    pub keys_failed: Vec<String>,
}

/// Body of every error the proxy answers itself.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorBody {
    #[serde(rename = "Code")]
    pub code: u16,
    #[serde(rename = "Message")]
    pub message: String,
}

/// Decodes a JSON array, treating a `null` document as empty.
pub fn decode_list<T>(bytes: &[u8]) -> serde_json::Result<Vec<T>>
where
    T: for<'de> Deserialize<'de>,
{
    Ok(serde_json::from_slice::<Option<Vec<T>>>(bytes)?.unwrap_or_default())
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<String>>::deserialize(deserializer)?.unwrap_or_default())
}
