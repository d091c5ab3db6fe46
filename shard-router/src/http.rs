use crate::aggregator::ShardReply;
use crate::errors::{Result, ShardRouterError};
use crate::executor::ShardTransport;
use crate::protocol::Operation;
use crate::router::ShardId;
use crate::shards::Shard;
use async_trait::async_trait;
use http_body_util::{BodyExt, Full};
use hyper::body::Bytes;
use hyper::header::{CONTENT_TYPE, HeaderValue};
use hyper::{Method, Request};
use hyper_util::client::legacy::Client;
use hyper_util::client::legacy::connect::{Connect, HttpConnector};
use hyper_util::rt::TokioExecutor;

/// Shard transport over HTTP/1.1 using a pooled hyper client.
#[derive(Clone)]
pub struct HttpTransport {
    client: Client<HttpConnector, Full<Bytes>>,
}

impl HttpTransport {
    pub fn new() -> Self {
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());
        Self { client }
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ShardTransport for HttpTransport {
    async fn send(&self, shard: &Shard, operation: Operation, body: Bytes) -> Result<ShardReply> {
        let url = shard.base_url().join(operation.path()).map_err(|e| {
            ShardRouterError::InternalError(format!("Invalid shard URL for {}: {e}", shard.id()))
        })?;
        send_to_shard(&self.client, shard.id(), &url, body).await
    }
}

/// POSTs a JSON body to `url` and collects the complete response.
///
/// Connection failures and errors while reading the body are reported as
/// failures of `shard`. Any HTTP status, including errors, is returned as a
/// reply; interpreting it is left to the caller.
pub async fn send_to_shard<C>(
    client: &Client<C, Full<Bytes>>,
    shard: ShardId,
    url: &url::Url,
    body: Bytes,
) -> Result<ShardReply>
where
    C: Connect + Clone + Send + Sync + 'static,
{
    let request = Request::builder()
        .method(Method::POST)
        .uri(url.as_str())
        .header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
        .body(Full::new(body))
        .map_err(|e| ShardRouterError::InternalError(format!("Failed to build request: {e}")))?;

    let response = client
        .request(request)
        .await
        .map_err(|e| ShardRouterError::ShardUnreachable {
            shard,
            reason: e.to_string(),
        })?;

    let (parts, body) = response.into_parts();
    let body = body
        .collect()
        .await
        .map(|collected| collected.to_bytes())
        .map_err(|e| ShardRouterError::ResponseBodyError(e.to_string()))?;

    Ok(ShardReply {
        status: parts.status,
        body,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ShardTarget;
    use crate::shards::ShardPool;
    use hyper::service::service_fn;
    use hyper::{Response, StatusCode};
    use std::convert::Infallible;
    use tokio::net::TcpListener;

    // Echo server describing the request it received as JSON
    async fn echo_handler(
        req: Request<hyper::body::Incoming>,
    ) -> std::result::Result<Response<Full<Bytes>>, Infallible> {
        let (parts, body) = req.into_parts();
        let body_bytes = body
            .collect()
            .await
            .map(|collected| collected.to_bytes())
            .unwrap_or_else(|_| Bytes::new());

        let content_type = parts
            .headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();

        let echo = serde_json::json!({
            "method": parts.method.as_str(),
            "path": parts.uri.path(),
            "content_type": content_type,
            "body": String::from_utf8_lossy(&body_bytes),
        });
        Ok(Response::new(Full::new(Bytes::from(echo.to_string()))))
    }

    async fn start_test_server() -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind to address");

        let port = listener.local_addr().unwrap().port();

        tokio::spawn(async move {
            loop {
                let (stream, _) = listener.accept().await.unwrap();
                let io = hyper_util::rt::TokioIo::new(stream);

                tokio::spawn(async move {
                    let _ = hyper_util::server::conn::auto::Builder::new(TokioExecutor::new())
                        .serve_connection(io, service_fn(echo_handler))
                        .await;
                });
            }
        });

        port
    }

    fn single_shard(port: u16) -> ShardPool {
        ShardPool::new(vec![ShardTarget {
            ip: "127.0.0.1".to_string(),
            port,
        }])
        .unwrap()
    }

    #[tokio::test]
    async fn test_send_posts_json_to_operation_path() {
        let port = start_test_server().await;
        let pool = single_shard(port);
        let transport = HttpTransport::new();

        for operation in Operation::ALL {
            let reply = transport
                .send(
                    pool.get(0).unwrap(),
                    operation,
                    Bytes::from_static(br#"[{"Key":"k1"}]"#),
                )
                .await
                .unwrap();

            assert_eq!(reply.status, StatusCode::OK);
            let echo: serde_json::Value = serde_json::from_slice(&reply.body).unwrap();
            assert_eq!(echo["method"], "POST");
            assert_eq!(echo["path"], operation.path());
            assert_eq!(echo["content_type"], "application/json");
            assert_eq!(echo["body"], r#"[{"Key":"k1"}]"#);
        }
    }

    #[tokio::test]
    async fn test_error_status_is_a_reply() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let io = hyper_util::rt::TokioIo::new(stream);
            let service = service_fn(|_req: Request<hyper::body::Incoming>| async {
                let mut response = Response::new(Full::new(Bytes::from_static(b"boom")));
                *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
                Ok::<_, Infallible>(response)
            });
            let _ = hyper_util::server::conn::auto::Builder::new(TokioExecutor::new())
                .serve_connection(io, service)
                .await;
        });

        let client: Client<HttpConnector, Full<Bytes>> =
            Client::builder(TokioExecutor::new()).build(HttpConnector::new());
        let url = url::Url::parse(&format!("http://127.0.0.1:{port}/fetch")).unwrap();

        let reply = send_to_shard(&client, 3, &url, Bytes::from_static(b"[]"))
            .await
            .unwrap();
        assert_eq!(reply.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(reply.body.as_ref(), b"boom");
    }

    #[tokio::test]
    async fn test_connection_refused() {
        // Bind and immediately release a port so nothing is listening on it.
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap().port()
        };
        let pool = single_shard(port);
        let transport = HttpTransport::new();

        let result = transport
            .send(pool.get(0).unwrap(), Operation::Fetch, Bytes::from_static(b"[]"))
            .await;

        assert!(matches!(
            result.unwrap_err(),
            ShardRouterError::ShardUnreachable { shard: 0, .. }
        ));
    }
}
