//! Key-based sharding proxy.
//!
//! Client batches posted to `/fetch`, `/query` or `/set` are split by key,
//! fanned out to the owning backend shards concurrently and merged back into
//! a single response. The aggregate status is 200 when every shard answered
//! cleanly and 206 when at least one shard failed or reported partial work.

pub mod aggregator;
pub mod api;
pub mod config;
pub mod errors;
pub mod executor;
pub mod handler;
pub mod http;
pub mod key_codec;
pub mod metrics_defs;
pub mod protocol;
pub mod proxy;
pub mod router;
pub mod service;
pub mod shards;

#[cfg(test)]
mod testutils;

use crate::config::Config;
use crate::errors::ShardRouterError;
use crate::proxy::ShardProxy;
use crate::service::ShardRouterService;
use shared::admin_service::AdminService;
use shared::http::{bind_listener, serve};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

pub async fn run(config: Config) -> Result<(), ShardRouterError> {
    let proxy = ShardProxy::from_config(&config)?;
    shared::metrics_defs::describe_all(metrics_defs::ALL_METRICS);

    let ready = Arc::new(AtomicBool::new(false));

    let admin_task = {
        let ready = ready.clone();
        let admin_listener = config.admin_listener.clone();
        async move {
            let Some(admin) = admin_listener else {
                return Ok(());
            };
            let listener = bind_listener(&admin.host, admin.port).await?;
            tracing::info!(host = %admin.host, port = admin.port, "Admin listener started");
            let service: AdminService<_, ShardRouterError> =
                AdminService::new(move || ready.load(Ordering::Relaxed));
            serve(listener, service).await
        }
    };

    let router_task = async {
        let listener = bind_listener(&config.listener.host, config.listener.port).await?;
        tracing::info!(
            host = %config.listener.host,
            port = config.listener.port,
            shards = proxy.pool().len(),
            "Shard router listening"
        );
        ready.store(true, Ordering::Relaxed);
        serve(listener, ShardRouterService::new(proxy)).await
    };

    tokio::try_join!(router_task, admin_task)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutils::unreachable_target;
    use http_body_util::Full;
    use hyper::body::Bytes;
    use hyper::{Method, Request, StatusCode};
    use hyper_util::client::legacy::Client;
    use hyper_util::client::legacy::connect::HttpConnector;
    use hyper_util::rt::TokioExecutor;
    use std::time::Duration;

    async fn status_of(
        client: &Client<HttpConnector, Full<Bytes>>,
        method: Method,
        url: &str,
        body: &'static str,
    ) -> Option<StatusCode> {
        let request = Request::builder()
            .method(method)
            .uri(url)
            .body(Full::new(Bytes::from_static(body.as_bytes())))
            .unwrap();
        client.request(request).await.ok().map(|res| res.status())
    }

    #[tokio::test]
    async fn test_ready_once_listener_is_bound() {
        let port = unreachable_target().await.port;
        let admin_port = unreachable_target().await.port;
        let shard = unreachable_target().await;

        let config: Config = serde_yaml::from_str(&format!(
            r#"
listener: {{host: 127.0.0.1, port: {port}}}
admin_listener: {{host: 127.0.0.1, port: {admin_port}}}
shards: [{{ip: {}, port: {}}}]
"#,
            shard.ip, shard.port
        ))
        .unwrap();
        let server = tokio::spawn(run(config));

        let client = Client::builder(TokioExecutor::new()).build_http();
        let ready_url = format!("http://127.0.0.1:{admin_port}/ready");

        let mut ready = None;
        for _ in 0..100 {
            ready = status_of(&client, Method::GET, &ready_url, "").await;
            if ready == Some(StatusCode::OK) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert_eq!(ready, Some(StatusCode::OK));

        // Ready implies the main listener already accepts requests
        let fetch_url = format!("http://127.0.0.1:{port}/fetch");
        assert_eq!(
            status_of(&client, Method::POST, &fetch_url, "[]").await,
            Some(StatusCode::OK)
        );
        let health_url = format!("http://127.0.0.1:{admin_port}/health");
        assert_eq!(
            status_of(&client, Method::GET, &health_url, "").await,
            Some(StatusCode::OK)
        );

        server.abort();
    }
}
