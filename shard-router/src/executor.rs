use crate::aggregator::{ShardOutcome, ShardReply};
use crate::errors::{Result, ShardRouterError};
use crate::metrics_defs::{SHARD_FAILURES, SHARD_REQUESTS};
use crate::protocol::Operation;
use crate::router::{ShardBatch, ShardId};
use crate::shards::{Shard, ShardPool};
use async_trait::async_trait;
use hyper::body::Bytes;
use serde::Serialize;
use shared::counter;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;

/// Sends one serialized batch to one shard.
#[async_trait]
pub trait ShardTransport: Send + Sync {
    async fn send(&self, shard: &Shard, operation: Operation, body: Bytes) -> Result<ShardReply>;
}

/// Fans a shard batch out to the backends and collects every outcome.
#[derive(Clone)]
pub struct Dispatcher {
    transport: Arc<dyn ShardTransport>,
    pool: ShardPool,
    timeout: Option<Duration>,
}

impl Dispatcher {
    pub fn new(transport: Arc<dyn ShardTransport>, pool: ShardPool) -> Self {
        Self {
            transport,
            pool,
            timeout: None,
        }
    }

    /// Deadline applied to each shard call individually.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn pool(&self) -> &ShardPool {
        &self.pool
    }

    /// Issues one request per non-empty shard group concurrently and waits for
    /// all of them.
    ///
    /// Returns exactly one outcome per dispatched shard, in completion order.
    /// Failures of any kind (transport, timeout, panicking task) become failed
    /// outcomes and never affect sibling requests. Dropping the returned future
    /// aborts every outstanding shard call.
    pub async fn dispatch<T: Serialize>(
        &self,
        batch: ShardBatch<T>,
        operation: Operation,
    ) -> Vec<ShardOutcome> {
        let mut outcomes = Vec::with_capacity(batch.len());
        let mut join_set = JoinSet::new();
        let mut task_shards: HashMap<tokio::task::Id, ShardId> = HashMap::new();

        for (shard_id, entries) in batch {
            if entries.is_empty() {
                continue;
            }

            let prepared = self
                .pool
                .get(shard_id)
                .cloned()
                .ok_or_else(|| {
                    ShardRouterError::InternalError(format!("Unknown shard: {shard_id}"))
                })
                .and_then(|shard| {
                    serde_json::to_vec(&entries)
                        .map(|body| (shard, Bytes::from(body)))
                        .map_err(|e| {
                            ShardRouterError::InternalError(format!(
                                "Failed to serialize shard request: {e}"
                            ))
                        })
                });

            let (shard, body) = match prepared {
                Ok(prepared) => prepared,
                Err(e) => {
                    tracing::error!(shard = shard_id, error = %e, "Could not build shard request");
                    outcomes.push(ShardOutcome {
                        shard: shard_id,
                        result: Err(e),
                    });
                    continue;
                }
            };

            counter!(SHARD_REQUESTS, "operation" => operation.as_str()).increment(1);

            let transport = self.transport.clone();
            let timeout = self.timeout;
            let handle = join_set.spawn(async move {
                let call = transport.send(&shard, operation, body);
                let result = match timeout {
                    Some(limit) => tokio::time::timeout(limit, call)
                        .await
                        .unwrap_or_else(|_| Err(ShardRouterError::ShardTimeout(shard_id))),
                    None => call.await,
                };
                ShardOutcome {
                    shard: shard_id,
                    result,
                }
            });
            task_shards.insert(handle.id(), shard_id);
        }

        // Drain until the set is empty: every spawned task yields exactly one outcome.
        while let Some(joined) = join_set.join_next_with_id().await {
            let outcome = match joined {
                Ok((_, outcome)) => outcome,
                Err(e) => {
                    let Some(shard) = task_shards.get(&e.id()).copied() else {
                        tracing::error!(error = %e, "Untracked shard task failed");
                        continue;
                    };
                    tracing::error!(shard, error = %e, "Shard task failed");
                    ShardOutcome {
                        shard,
                        result: Err(ShardRouterError::ShardUnreachable {
                            shard,
                            reason: format!("task failed: {e}"),
                        }),
                    }
                }
            };

            if is_failure(&outcome) {
                counter!(SHARD_FAILURES, "operation" => operation.as_str()).increment(1);
                match &outcome.result {
                    Err(e) => tracing::debug!(
                        shard = outcome.shard,
                        operation = %operation,
                        error = %e,
                        "Shard call failed"
                    ),
                    Ok(reply) => tracing::debug!(
                        shard = outcome.shard,
                        operation = %operation,
                        status = %reply.status,
                        "Shard answered with error status"
                    ),
                }
            }
            outcomes.push(outcome);
        }

        outcomes
    }
}

/// A shard call failed if it never produced a reply or the reply is not 2xx.
fn is_failure(outcome: &ShardOutcome) -> bool {
    match &outcome.result {
        Ok(reply) => !reply.status.is_success(),
        Err(_) => true,
    }
}
