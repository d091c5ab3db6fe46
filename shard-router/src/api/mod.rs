pub mod records;
pub mod set;

use crate::errors::ShardRouterError;
use crate::handler::Handler;
use crate::protocol::{Operation, decode_list};
use serde::Deserialize;
use std::sync::Arc;

pub use records::RecordsHandler;
pub use set::SetHandler;

/// Returns the handler serving `operation`.
pub fn handler_for(operation: Operation) -> Arc<dyn Handler> {
    match operation {
        Operation::Fetch | Operation::Query => Arc::new(RecordsHandler::new(operation)),
        Operation::Set => Arc::new(SetHandler),
    }
}

/// Decodes a client batch body.
pub(crate) fn decode_items<T>(body: &[u8]) -> Result<Vec<T>, ShardRouterError>
where
    T: for<'de> Deserialize<'de>,
{
    decode_list(body).map_err(|e| ShardRouterError::InvalidRequestBody(e.to_string()))
}
