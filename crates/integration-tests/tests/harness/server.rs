//! Test server wrapper that starts Cadabra on a random port

use std::net::SocketAddr;
use std::sync::Arc;

use cadabra_config::Config;
use cadabra_experiments::MetricSource;
use cadabra_server::Server;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use super::config::{SERVICE_TOKEN, STAFF_TOKEN};

/// A running test server instance
pub struct TestServer {
    addr: SocketAddr,
    shutdown: CancellationToken,
    client: reqwest::Client,
}

impl TestServer {
    /// Start a test server with the given configuration
    ///
    /// Binds to port 0 for automatic port assignment
    pub async fn start(config: Config) -> anyhow::Result<Self> {
        Self::start_with_metrics(config, None).await
    }

    /// Start a test server that adds `metrics` to every report
    pub async fn start_with_metrics(config: Config, metrics: Option<Arc<dyn MetricSource>>) -> anyhow::Result<Self> {
        let server = Server::with_metric_source(config, metrics).await?;
        let shutdown = CancellationToken::new();
        let shutdown_clone = shutdown.clone();

        // Bind the listener here so we know the actual port
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;

        tokio::spawn(async move {
            axum::serve(listener, server.into_router())
                .with_graceful_shutdown(async move {
                    shutdown_clone.cancelled().await;
                })
                .await
                .ok();
        });

        let client = reqwest::Client::new();

        Ok(Self { addr, shutdown, client })
    }

    /// Base URL of the running test server
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{path}", self.addr)
    }

    /// Get a reference to the HTTP client
    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    /// Request an assignment with the service token
    pub async fn assign(&self, user_id: Option<i64>, experiment: &str, buckets: &[&str]) -> reqwest::Response {
        self.client
            .post(self.url("/v1/assignments"))
            .bearer_auth(SERVICE_TOKEN)
            .json(&serde_json::json!({
                "user_id": user_id,
                "experiment": experiment,
                "buckets": buckets,
            }))
            .send()
            .await
            .unwrap()
    }

    /// Assign and return the bucket, panicking on failure
    pub async fn bucket(&self, user_id: i64, experiment: &str, buckets: &[&str]) -> String {
        let resp = self.assign(Some(user_id), experiment, buckets).await;
        assert_eq!(resp.status(), 200);
        let body: Value = resp.json().await.unwrap();
        body["bucket"].as_str().unwrap().to_owned()
    }

    /// Mirror a user with the service token
    pub async fn save_user(&self, id: i64, body: Value) -> reqwest::Response {
        self.client
            .put(self.url(&format!("/v1/users/{id}")))
            .bearer_auth(SERVICE_TOKEN)
            .json(&body)
            .send()
            .await
            .unwrap()
    }

    /// GET with the staff token
    pub async fn staff_get(&self, path: &str) -> reqwest::Response {
        self.client
            .get(self.url(path))
            .bearer_auth(STAFF_TOKEN)
            .send()
            .await
            .unwrap()
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}
