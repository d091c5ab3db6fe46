use crate::api::handler_for;
use crate::errors::ShardRouterError;
use crate::handler::Handler;
use crate::metrics_defs::{REQUEST_DURATION, REQUESTS_INFLIGHT};
use crate::protocol::Operation;
use crate::proxy::{ShardProxy, error_body, error_response};
use http_body_util::combinators::BoxBody;
use http_body_util::{BodyExt, Full};
use hyper::body::{Body, Bytes, Incoming};
use hyper::service::Service;
use hyper::{Method, Request, Response, StatusCode};
use shared::http::make_error_response;
use shared::{gauge, histogram};
use std::collections::HashMap;
use std::fmt::Display;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;

/// Client-facing service exposing `/fetch`, `/query` and `/set`.
#[derive(Clone)]
pub struct ShardRouterService {
    proxy: Arc<ShardProxy>,
    handlers: Arc<HashMap<Operation, Arc<dyn Handler>>>,
}

impl ShardRouterService {
    pub fn new(proxy: ShardProxy) -> Self {
        let handlers = Operation::ALL
            .into_iter()
            .map(|operation| (operation, handler_for(operation)))
            .collect();

        Self {
            proxy: Arc::new(proxy),
            handlers: Arc::new(handlers),
        }
    }

    async fn handle<B>(&self, req: Request<B>) -> Response<Bytes>
    where
        B: Body,
        B::Error: Display,
    {
        let Some(handler) = Operation::from_path(req.uri().path())
            .and_then(|operation| self.handlers.get(&operation))
        else {
            return make_error_response(StatusCode::NOT_FOUND);
        };

        let _inflight = InflightGuard::new();
        let start = Instant::now();

        let response = if req.method() != Method::POST {
            error_body(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed.")
        } else {
            match req.into_body().collect().await {
                Ok(collected) => {
                    self.proxy
                        .execute(handler.as_ref(), &collected.to_bytes())
                        .await
                }
                Err(e) => error_response(&ShardRouterError::InvalidRequestBody(e.to_string())),
            }
        };

        histogram!(
            REQUEST_DURATION,
            "operation" => handler.operation().as_str(),
            "status" => response.status().as_str().to_string()
        )
        .record(start.elapsed().as_secs_f64());

        response
    }
}

impl Service<Request<Incoming>> for ShardRouterService {
    type Response = Response<BoxBody<Bytes, Self::Error>>;
    type Error = ShardRouterError;
    type Future =
        Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send + 'static>>;

    fn call(&self, req: Request<Incoming>) -> Self::Future {
        let service = self.clone();
        Box::pin(async move {
            let response = service.handle(req).await;
            Ok(response.map(boxed))
        })
    }
}

fn boxed(body: Bytes) -> BoxBody<Bytes, ShardRouterError> {
    Full::new(body).map_err(|e| match e {}).boxed()
}

struct InflightGuard;

impl InflightGuard {
    fn new() -> Self {
        gauge!(REQUESTS_INFLIGHT).increment(1.0);
        Self
    }
}

impl Drop for InflightGuard {
    fn drop(&mut self) {
        gauge!(REQUESTS_INFLIGHT).decrement(1.0);
    }
}
