#![allow(dead_code)]

use std::{
    collections::{HashMap, HashSet},
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use async_trait::async_trait;
use axum::{
    extract::State,
    http::{StatusCode, Uri},
    response::{IntoResponse, Response},
    Json, Router,
};
use chrono::Utc;
use loadgen::{Executor, OutcomeSink};
use serde_json::json;
use traffic_model::{RequestOutcome, TaskDefinition};

/// Sink that keeps everything it receives for later assertions
#[derive(Default)]
pub struct CollectingSink {
    outcomes: Mutex<Vec<RequestOutcome>>,
    skipped: AtomicU64,
}

impl CollectingSink {
    pub fn outcomes(&self) -> Vec<RequestOutcome> {
        self.outcomes.lock().unwrap().clone()
    }

    pub fn count(&self) -> usize {
        self.outcomes.lock().unwrap().len()
    }

    pub fn skipped(&self) -> u64 {
        self.skipped.load(Ordering::SeqCst)
    }
}

impl OutcomeSink for CollectingSink {
    fn emit(&self, outcome: RequestOutcome) {
        self.outcomes.lock().unwrap().push(outcome);
    }

    fn skipped(&self, _task_name: &str, _user_id: usize) {
        self.skipped.fetch_add(1, Ordering::SeqCst);
    }
}

/// Executor with a fixed latency that can fail on a schedule and detects
/// overlapping requests from the same user
#[derive(Default)]
pub struct ScriptedExecutor {
    pub delay: Duration,
    pub fail_every: Option<u64>,
    started: AtomicU64,
    completed: AtomicU64,
    in_flight: Mutex<HashSet<usize>>,
    overlapped: AtomicBool,
}

impl ScriptedExecutor {
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    pub fn failing_every(mut self, n: u64) -> Self {
        self.fail_every = Some(n);
        self
    }

    pub fn started(&self) -> u64 {
        self.started.load(Ordering::SeqCst)
    }

    pub fn completed(&self) -> u64 {
        self.completed.load(Ordering::SeqCst)
    }

    pub fn overlapped(&self) -> bool {
        self.overlapped.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Executor<()> for ScriptedExecutor {
    async fn execute(&self, user_id: usize, task: &TaskDefinition<()>) -> RequestOutcome {
        let n = self.started.fetch_add(1, Ordering::SeqCst) + 1;
        if !self.in_flight.lock().unwrap().insert(user_id) {
            self.overlapped.store(true, Ordering::SeqCst);
        }

        let started_at = Utc::now();
        tokio::time::sleep(self.delay).await;

        self.in_flight.lock().unwrap().remove(&user_id);
        self.completed.fetch_add(1, Ordering::SeqCst);

        let status = match self.fail_every {
            Some(k) if n % k == 0 => 503,
            _ => 200,
        };
        RequestOutcome::from_status(&task.name, user_id, started_at, self.delay, status)
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

/// Hit counters of a mock gateway, keyed by request path
#[derive(Default)]
pub struct Hits(Mutex<HashMap<String, u64>>);

impl Hits {
    pub fn get(&self, path: &str) -> u64 {
        self.0.lock().unwrap().get(path).copied().unwrap_or(0)
    }

    pub fn total(&self) -> u64 {
        self.0.lock().unwrap().values().sum()
    }
}

async fn gateway(State(hits): State<Arc<Hits>>, uri: Uri) -> Response {
    let path = uri.path().to_string();
    *hits.0.lock().unwrap().entry(path.clone()).or_default() += 1;

    match path.as_str() {
        "/" => Json(json!({"service": "service-a", "version": "v2"})).into_response(),
        "/fortunes" => Json(json!({"fortune": "Metrics keep outages short"})).into_response(),
        "/beta-insights" => Json(json!({"beta_score": 0.8})).into_response(),
        "/service-b/aggregate" => (
            StatusCode::BAD_GATEWAY,
            Json(json!({"error": {"message": "service-a call failed", "status": 502}})),
        )
            .into_response(),
        "/slow" => {
            tokio::time::sleep(Duration::from_secs(2)).await;
            Json(json!({})).into_response()
        }
        _ => StatusCode::NOT_FOUND.into_response(),
    }
}

/// Mock gateway in front of the canary services. The aggregate route always
/// answers 502
pub async fn spawn_gateway() -> (String, Arc<Hits>) {
    let hits = Arc::new(Hits::default());
    let app = Router::new().fallback(gateway).with_state(hits.clone());
    (serve(app).await, hits)
}
