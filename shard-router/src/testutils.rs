use crate::config::ShardTarget;
use crate::protocol::{Record, SetSummary, ShardEntry};
use http_body_util::{BodyExt, Full};
use hyper::body::{Bytes, Incoming};
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::{TokioExecutor, TokioIo};
use std::convert::Infallible;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::net::TcpListener;

/// How a mock shard answers.
#[derive(Clone, Copy, Debug)]
pub enum MockReply {
    /// Lookups return one record per key with value `v:<key>`. Sets report
    /// every key as added.
    Store,
    /// Always answers with this status and body.
    Fixed(StatusCode, &'static str),
}

pub struct MockShard {
    pub target: ShardTarget,
    calls: Arc<AtomicUsize>,
}

impl MockShard {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

pub async fn spawn_mock_shard(reply: MockReply) -> MockShard {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let calls = Arc::new(AtomicUsize::new(0));

    let counter = calls.clone();
    tokio::spawn(async move {
        loop {
            let Ok((stream, _)) = listener.accept().await else {
                return;
            };
            let counter = counter.clone();
            tokio::spawn(async move {
                let service = service_fn(move |req| {
                    counter.fetch_add(1, Ordering::SeqCst);
                    answer(req, reply)
                });
                let _ = hyper_util::server::conn::auto::Builder::new(TokioExecutor::new())
                    .serve_connection(TokioIo::new(stream), service)
                    .await;
            });
        }
    });

    MockShard {
        target: local_target(port),
        calls,
    }
}

/// A target nothing listens on.
pub async fn unreachable_target() -> ShardTarget {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    local_target(port)
}

fn local_target(port: u16) -> ShardTarget {
    ShardTarget {
        ip: "127.0.0.1".into(),
        port,
    }
}

async fn answer(
    req: Request<Incoming>,
    reply: MockReply,
) -> Result<Response<Full<Bytes>>, Infallible> {
    let (status, body) = match reply {
        MockReply::Fixed(status, body) => (status, Bytes::from_static(body.as_bytes())),
        MockReply::Store => {
            let is_set = req.uri().path() == "/set";
            let body = req.into_body().collect().await.unwrap().to_bytes();
            let entries: Vec<ShardEntry> = serde_json::from_slice(&body).unwrap();
            let payload = if is_set {
                serde_json::to_vec(&SetSummary {
                    keys_added: entries.len() as u64,
                    keys_failed: Vec::new(),
                })
            } else {
                let records: Vec<Record> = entries
                    .into_iter()
                    .map(|entry| Record {
                        value: format!("v:{}", entry.key).into(),
                        key: entry.key,
                    })
                    .collect();
                serde_json::to_vec(&records)
            };
            (StatusCode::OK, Bytes::from(payload.unwrap()))
        }
    };

    let mut response = Response::new(Full::new(body));
    *response.status_mut() = status;
    Ok(response)
}
