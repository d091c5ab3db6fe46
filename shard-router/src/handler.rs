use crate::aggregator::{AggregateResult, ShardOutcome, TotalFailurePolicy};
use crate::errors::ShardRouterError;
use crate::key_codec::KeyCodec;
use crate::protocol::{Operation, ShardEntry};
use crate::router::{ShardBatch, ShardRouter};

/// Handler for an endpoint whose batch is split across shards and merged back
///
/// The handler implements endpoint-specific logic:
/// - How to decode the client batch and route each entry to its shard
/// - How to merge the per-shard outcomes into a single response
pub trait Handler: Send + Sync {
    fn operation(&self) -> Operation;

    /// Decode the client body and group its entries by owning shard
    ///
    /// Every key is validated before anything is returned, so a single bad
    /// encoding rejects the whole batch and no shard is contacted.
    fn split_request(
        &self,
        body: &[u8],
        codec: &KeyCodec,
        router: &ShardRouter,
    ) -> Result<ShardBatch<ShardEntry>, ShardRouterError>;

    /// Merge every shard outcome into the client payload and status
    fn merge_responses(
        &self,
        outcomes: Vec<ShardOutcome>,
        policy: TotalFailurePolicy,
    ) -> Result<AggregateResult, ShardRouterError>;
}
