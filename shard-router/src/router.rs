//! Deterministic key-to-shard assignment.
//!
//! Shard index is `fnv1a_32(key) % shard_count`. The shard count is fixed for
//! the lifetime of the process; there is no ring and no resharding.

use crate::errors::{Result, ShardRouterError};
use crate::key_codec::CanonicalKey;
use std::collections::BTreeMap;
use std::num::NonZeroUsize;

/// Position of a shard in the configured pool.
pub type ShardId = usize;

/// Per-shard groups of one client request, keyed by shard index.
///
/// Ordered by shard so that dispatch order is deterministic.
pub type ShardBatch<T> = BTreeMap<ShardId, Vec<T>>;

const FNV_OFFSET_BASIS: u32 = 0x811c_9dc5;
const FNV_PRIME: u32 = 0x0100_0193;

/// 32-bit FNV-1a over `bytes`.
pub fn fnv1a_32(bytes: &[u8]) -> u32 {
    bytes.iter().fold(FNV_OFFSET_BASIS, |hash, byte| {
        (hash ^ u32::from(*byte)).wrapping_mul(FNV_PRIME)
    })
}

#[derive(Clone, Copy, Debug)]
pub struct ShardRouter {
    shard_count: NonZeroUsize,
}

impl ShardRouter {
    pub fn new(shard_count: usize) -> Result<Self> {
        let shard_count =
            NonZeroUsize::new(shard_count).ok_or(ShardRouterError::NoShardsConfigured)?;
        Ok(Self { shard_count })
    }

    pub fn shard_count(&self) -> usize {
        self.shard_count.get()
    }

    pub fn shard_for(&self, key: &CanonicalKey) -> ShardId {
        fnv1a_32(key.as_bytes()) as usize % self.shard_count.get()
    }

    /// Groups canonical keys by owning shard.
    pub fn route(&self, keys: Vec<CanonicalKey>) -> ShardBatch<CanonicalKey> {
        self.partition(keys, |key| key)
    }

    /// Stable partition of `items` by the shard owning `key_of(item)`.
    ///
    /// Items bound for the same shard keep their relative order.
    pub fn partition<T, F>(&self, items: Vec<T>, key_of: F) -> ShardBatch<T>
    where
        F: Fn(&T) -> &CanonicalKey,
    {
        let mut batch: ShardBatch<T> = BTreeMap::new();
        for item in items {
            let shard = self.shard_for(key_of(&item));
            batch.entry(shard).or_default().push(item);
        }
        batch
    }
}
