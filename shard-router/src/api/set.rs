use crate::aggregator::{self, AggregateResult, ShardOutcome, TotalFailurePolicy};
use crate::api::decode_items;
use crate::errors::ShardRouterError;
use crate::handler::Handler;
use crate::key_codec::{CanonicalKey, KeyCodec, KeyEncoding};
use crate::protocol::{Operation, SetItem, ShardEntry};
use crate::router::{ShardBatch, ShardRouter};

/// Handler for `/set`.
///
/// Keys are canonicalized and routed like lookups. Value encoding tags are
/// validated but value data is forwarded to the shard unchanged.
pub struct SetHandler;

impl Handler for SetHandler {
    fn operation(&self) -> Operation {
        Operation::Set
    }

    fn split_request(
        &self,
        body: &[u8],
        codec: &KeyCodec,
        router: &ShardRouter,
    ) -> Result<ShardBatch<ShardEntry>, ShardRouterError> {
        let items: Vec<SetItem> = decode_items(body)?;

        let pairs = items
            .into_iter()
            .map(|item| {
                let key = codec.normalize(item.key.encoding.as_deref(), &item.key.data)?;
                KeyEncoding::parse(item.value.encoding.as_deref())?;
                Ok((key, item.value.data))
            })
            .collect::<Result<Vec<(CanonicalKey, String)>, ShardRouterError>>()?;

        let batch = router
            .partition(pairs, |(key, _)| key)
            .into_iter()
            .map(|(shard, pairs)| {
                let entries = pairs
                    .into_iter()
                    .map(|(key, value)| ShardEntry {
                        key: key.into_string(),
                        value: Some(value),
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
        aggregator::merge_set(outcomes, policy)
    }
}
