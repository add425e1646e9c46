#![allow(dead_code)]
use clap::Parser;
use msgdrop_server::config::Config;
use msgdrop_server::storage::{self, MessageStorage};
use msgdrop_server::{App, api};
use std::net::SocketAddr;
use std::sync::{Arc, Once};
use tokio::net::TcpListener;

static INIT: Once = Once::new();

pub fn setup_tracing() {
    INIT.call_once(|| {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "warn".into())
            .add_directive("msgdrop_server=debug".parse().unwrap())
            .add_directive("sqlx=warn".parse().unwrap())
            .add_directive("tower=warn".parse().unwrap())
            .add_directive("hyper=warn".parse().unwrap())
            .add_directive("reqwest=warn".parse().unwrap());

        tracing_subscriber::fmt().with_env_filter(filter).with_test_writer().init();
    });
}

pub fn get_test_config() -> Config {
    config_from_args(&["--storage-backend", "memory"])
}

pub fn config_from_args(args: &[&str]) -> Config {
    let mut argv = vec!["msgdrop-server", "--host", "127.0.0.1", "--port", "0", "--mgmt-port", "0"];
    argv.extend_from_slice(args);
    let config = Config::try_parse_from(argv).expect("Invalid test configuration");
    config.validate().expect("Test configuration failed validation");
    config
}

pub fn temp_messages_dir() -> std::path::PathBuf {
    std::env::temp_dir().join(format!("msgdrop-test-{}", uuid::Uuid::new_v4()))
}

pub struct TestApp {
    pub server_url: String,
    pub mgmt_url: String,
    pub client: reqwest::Client,
    pub config: Config,
    pub storage: Arc<dyn MessageStorage>,
}

impl TestApp {
    pub async fn spawn() -> Self {
        Self::spawn_with_config(get_test_config()).await
    }

    pub async fn spawn_with_config(config: Config) -> Self {
        setup_tracing();
        let storage = storage::open(&config.storage).await.expect("Failed to open storage");
        Self::spawn_with_storage(config, storage).await
    }

    pub async fn spawn_with_storage(config: Config, storage: Arc<dyn MessageStorage>) -> Self {
        setup_tracing();
        let app = App::new(&config, Arc::clone(&storage));

        let api_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let server_url = format!("http://{}", api_listener.local_addr().unwrap());
        let mgmt_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let mgmt_url = format!("http://{}", mgmt_listener.local_addr().unwrap());

        let app_router = api::app_router(config.clone(), app.services);
        let mgmt_router = api::mgmt_router(app.mgmt);

        tokio::spawn(async move {
            axum::serve(api_listener, app_router.into_make_service_with_connect_info::<SocketAddr>()).await.unwrap();
        });
        tokio::spawn(async move {
            axum::serve(mgmt_listener, mgmt_router.into_make_service_with_connect_info::<SocketAddr>()).await.unwrap();
        });

        Self { server_url, mgmt_url, client: reqwest::Client::new(), config, storage }
    }

    pub async fn post_message(&self, message: &str) -> reqwest::Response {
        self.client
            .post(format!("{}/api/messages", self.server_url))
            .json(&serde_json::json!({ "message": message }))
            .send()
            .await
            .unwrap()
    }

    pub async fn list_messages(&self, query: &str) -> serde_json::Value {
        let resp = self.client.get(format!("{}/api/messages{}", self.server_url, query)).send().await.unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::OK);
        resp.json().await.unwrap()
    }

    pub async fn count(&self) -> i64 {
        let resp = self.client.get(format!("{}/api/messages/count", self.server_url)).send().await.unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::OK);
        let body: serde_json::Value = resp.json().await.unwrap();
        body["count"].as_i64().unwrap()
    }
}
