#![allow(dead_code)]

use aggregator::{config::Config, AppState};
use axum::{
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use reqwest::{Client, Response};
use serde_json::{json, Value};
use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

/// Test client wrapper with convenience methods
pub struct TestClient {
    client: Client,
    base_url: String,
}

impl TestClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
        }
    }

    pub async fn get(&self, path: &str) -> reqwest::Result<Response> {
        self.client
            .get(format!("{}{}", self.base_url, path))
            .send()
            .await
    }

    /// GET a path and return status plus parsed JSON body
    pub async fn get_json(&self, path: &str) -> (reqwest::StatusCode, Value) {
        let response = self.get(path).await.expect("Failed to send request");
        let status = response.status();
        let body = response.json().await.expect("Failed to parse JSON response");
        (status, body)
    }
}

/// Spawn an axum app on an ephemeral port and return its base URL
pub async fn serve(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

/// How the mock service-a answers `/fortunes`
#[derive(Clone, Copy)]
pub enum Behavior {
    Fortune,
    Error(u16),
    Slow(Duration),
    NotJson,
}

/// Spawn a mock service-a and return its base URL plus a call counter
pub async fn spawn_service_a(behavior: Behavior) -> (String, Arc<AtomicU64>) {
    let calls = Arc::new(AtomicU64::new(0));
    let counter = calls.clone();
    let app = Router::new().route(
        "/fortunes",
        get(move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                match behavior {
                    Behavior::Fortune => {
                        Json(json!({"fortune": "Green deployments for the win!"})).into_response()
                    }
                    Behavior::Error(code) => (
                        StatusCode::from_u16(code).unwrap(),
                        Json(json!({"detail": "Synthetic canary failure"})),
                    )
                        .into_response(),
                    Behavior::Slow(delay) => {
                        tokio::time::sleep(delay).await;
                        Json(json!({"fortune": "late"})).into_response()
                    }
                    Behavior::NotJson => (StatusCode::OK, "fortune: none").into_response(),
                }
            }
        }),
    );
    (serve(app).await, calls)
}

/// Spawn the aggregator pointed at `service_a_url`
pub async fn spawn_aggregator(service_a_url: &str, timeout: Duration) -> TestClient {
    let config = Config {
        port: 0,
        service_a_url: service_a_url.to_string(),
        fortunes_path: "/fortunes".to_string(),
        downstream_timeout: timeout,
    };
    let base = serve(aggregator::app(AppState::new(&config))).await;
    TestClient::new(base)
}
