//! The fixed pool of backend shards.
//!
//! Built once at startup from configuration and shared read-only by every
//! request. A shard's position in the pool is its shard index.

use crate::config::{ShardTarget, ValidationError};
use crate::router::{ShardId, ShardRouter};
use std::sync::Arc;
use url::Url;

/// One backend storage server.
#[derive(Clone, Debug)]
pub struct Shard {
    id: ShardId,
    target: ShardTarget,
    base_url: Url,
}

impl Shard {
    pub fn id(&self) -> ShardId {
        self.id
    }

    pub fn target(&self) -> &ShardTarget {
        &self.target
    }

    /// `http://<ip>:<port>/`
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }
}

#[derive(Clone, Debug)]
pub struct ShardPool {
    shards: Arc<[Shard]>,
    router: ShardRouter,
}

impl ShardPool {
    pub fn new(targets: Vec<ShardTarget>) -> Result<Self, ValidationError> {
        let router =
            ShardRouter::new(targets.len()).map_err(|_| ValidationError::NoShardsConfigured)?;

        let shards = targets
            .into_iter()
            .enumerate()
            .map(|(id, target)| {
                let base_url = Url::parse(&format!("http://{target}/"))
                    .map_err(|_| ValidationError::InvalidShardAddress(target.to_string()))?;
                Ok(Shard {
                    id,
                    target,
                    base_url,
                })
            })
            .collect::<Result<Vec<_>, ValidationError>>()?;

        Ok(Self {
            shards: shards.into(),
            router,
        })
    }

    pub fn len(&self) -> usize {
        self.shards.len()
    }

    /// Always false; an empty pool cannot be constructed.
    pub fn is_empty(&self) -> bool {
        self.shards.is_empty()
    }

    pub fn get(&self, id: ShardId) -> Option<&Shard> {
        self.shards.get(id)
    }

    pub fn router(&self) -> ShardRouter {
        self.router
    }
}
