use crate::aggregator::{self, AggregateResult, ShardOutcome, TotalFailurePolicy};
use crate::api::decode_items;
use crate::errors::ShardRouterError;
use crate::handler::Handler;
use crate::key_codec::{CanonicalKey, KeyCodec};
use crate::protocol::{KeyItem, Operation, ShardEntry};
use crate::router::{ShardBatch, ShardRouter};

/// Handler for the key-only lookups, `/fetch` and `/query`.
///
/// Both split the same way and concatenate the records returned by each
/// shard; they differ only in the backend endpoint they hit.
pub struct RecordsHandler {
    operation: Operation,
}

impl RecordsHandler {
    pub fn new(operation: Operation) -> Self {
        debug_assert!(operation != Operation::Set);
        Self { operation }
    }
}

impl Handler for RecordsHandler {
    fn operation(&self) -> Operation {
        self.operation
    }

    fn split_request(
        &self,
        body: &[u8],
        codec: &KeyCodec,
        router: &ShardRouter,
    ) -> Result<ShardBatch<ShardEntry>, ShardRouterError> {
        let items: Vec<KeyItem> = decode_items(body)?;

        let keys = items
            .iter()
            .map(|item| codec.normalize(item.key.encoding.as_deref(), &item.key.data))
            .collect::<Result<Vec<CanonicalKey>, _>>()?;

        let batch = router
            .route(keys)
            .into_iter()
            .map(|(shard, keys)| {
                let entries = keys
                    .into_iter()
                    .map(|key| ShardEntry {
                        key: key.into_string(),
                        value: None,
                    })
                    .collect();
                (shard, entries)
            })
            .collect();

        Ok(batch)
    }

    fn merge_responses(
        &self,
        outcomes: Vec<ShardOutcome>,
        policy: TotalFailurePolicy,
    ) -> Result<AggregateResult, ShardRouterError> {
        aggregator::merge_records(outcomes, self.operation, policy)
    }
}
