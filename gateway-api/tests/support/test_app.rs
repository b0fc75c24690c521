#![allow(dead_code)]

use gateway_api::routes::resources::CreateResourceRequest;
use gateway_api::test_utils::credentials::ScriptedCredentialIssuer;
use gateway_api::test_utils::custom_objects::InMemoryCustomObjectClient;
use gateway_api::{config::ApiConfig, startup::run};
use gateway_config::{Environment, load_config};
use gateway_telemetry::metrics::init_metrics_handle;
use rand::random_range;
use reqwest::{IntoUrl, RequestBuilder};
use std::io;
use std::net::TcpListener;
use std::sync::Arc;

/// Route segment of the cluster backend.
pub const CLUSTERS: &str = "kubernetes";

/// Route segment of the application backend.
pub const APPLICATIONS: &str = "argo";

pub struct TestApp {
    pub address: String,
    pub api_client: reqwest::Client,
    pub api_key: String,
    pub client: InMemoryCustomObjectClient,
    pub issuer: ScriptedCredentialIssuer,
    server_handle: tokio::task::JoinHandle<io::Result<()>>,
}

impl TestApp {
    fn get_authenticated<U: IntoUrl>(&self, url: U) -> RequestBuilder {
        self.api_client.get(url).bearer_auth(self.api_key.clone())
    }

    fn post_authenticated<U: IntoUrl>(&self, url: U) -> RequestBuilder {
        self.api_client.post(url).bearer_auth(self.api_key.clone())
    }

    fn patch_authenticated<U: IntoUrl>(&self, url: U) -> RequestBuilder {
        self.api_client.patch(url).bearer_auth(self.api_key.clone())
    }

    fn delete_authenticated<U: IntoUrl>(&self, url: U) -> RequestBuilder {
        self.api_client
            .delete(url)
            .bearer_auth(self.api_key.clone())
    }

    pub async fn list(&self, backend: &str, ids: &[&str]) -> reqwest::Response {
        let query: Vec<(&str, &str)> = ids.iter().map(|id| ("id", *id)).collect();
        self.get_authenticated(format!("{}/api/v1/{backend}", &self.address))
            .query(&query)
            .send()
            .await
            .expect("failed to execute request")
    }

    pub async fn create(&self, backend: &str, request: &CreateResourceRequest) -> reqwest::Response {
        self.post_authenticated(format!("{}/api/v1/{backend}", &self.address))
            .json(request)
            .send()
            .await
            .expect("Failed to execute request.")
    }

    pub async fn create_with_id(&self, backend: &str, id: &str) -> reqwest::Response {
        let request = CreateResourceRequest { id: id.to_string() };
        self.create(backend, &request).await
    }

    pub async fn update(&self, backend: &str, id: &str) -> reqwest::Response {
        self.patch_authenticated(format!("{}/api/v1/{backend}/{id}", &self.address))
            .json(&serde_json::json!({ "plan": 0 }))
            .send()
            .await
            .expect("Failed to execute request.")
    }

    pub async fn delete(&self, backend: &str, id: &str) -> reqwest::Response {
        self.delete_authenticated(format!("{}/api/v1/{backend}/{id}", &self.address))
            .send()
            .await
            .expect("Failed to execute request.")
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        self.server_handle.abort();
    }
}

pub async fn spawn_test_app() -> TestApp {
    // We set the environment to dev.
    Environment::Dev.set();

    let base_address = "127.0.0.1";
    let listener =
        TcpListener::bind(format!("{base_address}:0")).expect("failed to bind random port");
    let port = listener.local_addr().unwrap().port();

    let config = load_config::<ApiConfig>().expect("Failed to read configuration");

    // We choose a random API key from the ones configured to show that rotation works.
    let api_key_index = random_range(0..config.api_keys.len());
    let api_key = config.api_keys[api_key_index].expose().to_string();

    let client = InMemoryCustomObjectClient::new();
    let issuer = ScriptedCredentialIssuer::new();
    let metrics_handle = init_metrics_handle().expect("failed to install metrics recorder");

    let server = run(
        config,
        listener,
        Arc::new(client.clone()),
        Arc::new(issuer.clone()),
        metrics_handle,
    )
    .await
    .expect("failed to bind address");

    let server_handle = tokio::spawn(server);

    TestApp {
        address: format!("http://{base_address}:{port}"),
        api_client: reqwest::Client::new(),
        api_key,
        client,
        issuer,
        server_handle,
    }
}
