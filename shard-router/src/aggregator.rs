//! Merging of per-shard outcomes into the client response.
//!
//! # Status policy
//!
//! The aggregate starts at `200 OK` and degrades to `206 Partial Content`
//! whenever a shard
//! - could not be reached or timed out,
//! - answered with a status other than `200`,
//! - answered with a body that does not decode as the expected shape,
//! - (for `/set`) reported failed keys.
//!
//! It never degrades further by default: even when every shard failed the
//! answer is `206` with an empty payload. Whether a total failure should
//! instead be a hard error is an open product decision, so the behaviour is
//! selected explicitly through [`TotalFailurePolicy`].

use crate::errors::{Result, ShardRouterError};
use crate::protocol::{Operation, Record, SetSummary, decode_list};
use crate::router::ShardId;
use hyper::StatusCode;
use hyper::body::Bytes;
use serde::{Deserialize, Serialize};

/// Raw answer of one shard.
#[derive(Debug, Clone)]
pub struct ShardReply {
    pub status: StatusCode,
    pub body: Bytes,
}

/// Result of one outbound shard call.
#[derive(Debug)]
pub struct ShardOutcome {
    pub shard: ShardId,
    pub result: Result<ShardReply>,
}

/// Status returned when every dispatched shard failed.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TotalFailurePolicy {
    /// Fold total failure into `206 Partial Content`.
    #[default]
    PartialSuccess,
    /// Answer `502 Bad Gateway` when no dispatched shard succeeded.
    BadGateway,
}

/// Final `(status, payload)` pair for the client.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateResult {
    pub status: StatusCode,
    pub payload: Bytes,
}

struct StatusTracker {
    policy: TotalFailurePolicy,
    dispatched: usize,
    succeeded: usize,
    degraded: bool,
}

impl StatusTracker {
    fn new(policy: TotalFailurePolicy, dispatched: usize) -> Self {
        Self {
            policy,
            dispatched,
            succeeded: 0,
            degraded: false,
        }
    }

    fn reachable(&mut self, status: StatusCode) {
        self.succeeded += 1;
        if status != StatusCode::OK {
            self.degraded = true;
        }
    }

    fn failed(&mut self) {
        self.degraded = true;
    }

    fn degrade(&mut self) {
        self.degraded = true;
    }

    fn finish(self) -> StatusCode {
        if self.policy == TotalFailurePolicy::BadGateway
            && self.dispatched > 0
            && self.succeeded == 0
        {
            StatusCode::BAD_GATEWAY
        } else if self.degraded {
            StatusCode::PARTIAL_CONTENT
        } else {
            StatusCode::OK
        }
    }
}

/// Extracts and decodes the body of a usable shard reply, recording the
/// outcome on `tracker`. Returns `None` for failed shards.
fn accept<T, F>(
    outcome: ShardOutcome,
    operation: Operation,
    tracker: &mut StatusTracker,
    decode: F,
) -> Option<T>
where
    F: FnOnce(&[u8]) -> serde_json::Result<T>,
{
    let shard = outcome.shard;
    let reply = match outcome.result {
        Ok(reply) => reply,
        Err(e) => {
            tracing::warn!(shard, operation = %operation, error = %e, "Shard request failed");
            tracker.failed();
            return None;
        }
    };

    if !reply.status.is_success() {
        tracing::warn!(
            shard,
            operation = %operation,
            status = %reply.status,
            "Shard answered with non-success status"
        );
        tracker.failed();
        return None;
    }

    match decode(&reply.body) {
        Ok(value) => {
            tracker.reachable(reply.status);
            Some(value)
        }
        Err(e) => {
            tracing::warn!(shard, operation = %operation, error = %e, "Failed to decode shard response");
            tracker.failed();
            None
        }
    }
}

fn serialize<T: Serialize>(value: &T) -> Result<Bytes> {
    serde_json::to_vec(value)
        .map(Bytes::from)
        .map_err(|e| ShardRouterError::SerializationFailure(e.to_string()))
}

/// Concatenates the records of every usable shard reply, in arrival order.
pub fn merge_records(
    outcomes: Vec<ShardOutcome>,
    operation: Operation,
    policy: TotalFailurePolicy,
) -> Result<AggregateResult> {
    let mut tracker = StatusTracker::new(policy, outcomes.len());
    let mut records: Vec<Record> = Vec::new();

    for outcome in outcomes {
        if let Some(batch) = accept(outcome, operation, &mut tracker, decode_list::<Record>) {
            records.extend(batch);
        }
    }

    Ok(AggregateResult {
        payload: serialize(&records)?,
        status: tracker.finish(),
    })
}

/// Sums `keys_added` and concatenates `keys_failed` across shard replies.
pub fn merge_set(outcomes: Vec<ShardOutcome>, policy: TotalFailurePolicy) -> Result<AggregateResult> {
    let mut tracker = StatusTracker::new(policy, outcomes.len());
    let mut merged = SetSummary::default();

    for outcome in outcomes {
        if let Some(summary) = accept(
            outcome,
            Operation::Set,
            &mut tracker,
            |body: &[u8]| serde_json::from_slice::<SetSummary>(body),
        ) {
            merged.keys_added += summary.keys_added;
            merged.keys_failed.extend(summary.keys_failed);
        }
    }

    if !merged.keys_failed.is_empty() {
        tracker.degrade();
    }

    Ok(AggregateResult {
        payload: serialize(&merged)?,
        status: tracker.finish(),
    })
}

/// Merges outcomes with the strategy of `operation`.
pub fn merge(
    outcomes: Vec<ShardOutcome>,
    operation: Operation,
    policy: TotalFailurePolicy,
) -> Result<AggregateResult> {
    match operation {
        Operation::Fetch | Operation::Query => merge_records(outcomes, operation, policy),
        Operation::Set => merge_set(outcomes, policy),
    }
}
