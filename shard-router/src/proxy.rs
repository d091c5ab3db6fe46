use crate::aggregator::{AggregateResult, TotalFailurePolicy};
use crate::config::{Config, ConfigError};
use crate::errors::{Result, ShardRouterError};
use crate::executor::Dispatcher;
use crate::handler::Handler;
use crate::http::HttpTransport;
use crate::key_codec::KeyCodec;
use crate::protocol::ErrorBody;
use crate::shards::ShardPool;
use hyper::body::Bytes;
use hyper::{Response, StatusCode};
use shared::http::json_response;
use std::sync::Arc;

/// Runs one client batch end to end: split, fan out, merge.
pub struct ShardProxy {
    codec: KeyCodec,
    dispatcher: Dispatcher,
    policy: TotalFailurePolicy,
}

impl ShardProxy {
    pub fn new(codec: KeyCodec, dispatcher: Dispatcher, policy: TotalFailurePolicy) -> Self {
        Self {
            codec,
            dispatcher,
            policy,
        }
    }

    pub fn from_config(config: &Config) -> std::result::Result<Self, ConfigError> {
        config.validate()?;
        let pool = ShardPool::new(config.load_shards()?)?;
        let dispatcher = Dispatcher::new(Arc::new(HttpTransport::new()), pool)
            .with_timeout(config.dispatch.http_timeout());

        Ok(Self::new(
            KeyCodec::new(config.keys.binary),
            dispatcher,
            config.aggregation.total_failure,
        ))
    }

    pub fn pool(&self) -> &ShardPool {
        self.dispatcher.pool()
    }

    /// Executes `body` with `handler` and renders the client response.
    ///
    /// Validation errors are returned before any shard is contacted.
    pub async fn execute(&self, handler: &dyn Handler, body: &[u8]) -> Response<Bytes> {
        match self.try_execute(handler, body).await {
            Ok(result) => json_response(result.status, result.payload),
            Err(e) => error_response(&e),
        }
    }

    async fn try_execute(&self, handler: &dyn Handler, body: &[u8]) -> Result<AggregateResult> {
        let router = self.pool().router();
        let batch = handler.split_request(body, &self.codec, &router)?;
        let outcomes = self.dispatcher.dispatch(batch, handler.operation()).await;
        handler.merge_responses(outcomes, self.policy)
    }
}

/// Maps an error to the `{"Code", "Message"}` body sent to clients.
pub fn error_response(error: &ShardRouterError) -> Response<Bytes> {
    let (status, message) = match error {
        ShardRouterError::InvalidEncoding(_) => {
            (StatusCode::METHOD_NOT_ALLOWED, "Bad key encoding.")
        }
        ShardRouterError::InvalidRequestBody(_) => {
            (StatusCode::METHOD_NOT_ALLOWED, "Bad request body.")
        }
        ShardRouterError::SerializationFailure(_) => {
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to serialize response.")
        }
        _ => (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error."),
    };

    if status.is_server_error() {
        tracing::error!(error = %error, "Request failed");
    } else {
        tracing::debug!(error = %error, "Rejected client batch");
    }

    error_body(status, message)
}

/// JSON error response with the given status and message.
pub fn error_body(status: StatusCode, message: &str) -> Response<Bytes> {
    let body = ErrorBody {
        code: status.as_u16(),
        message: message.to_string(),
    };
    match serde_json::to_vec(&body) {
        Ok(bytes) => json_response(status, Bytes::from(bytes)),
        Err(_) => shared::http::make_error_response(status),
    }
}
