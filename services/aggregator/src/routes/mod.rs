use axum::{routing::get, Json, Router};
use serde_json::{json, Value};

use crate::AppState;

mod aggregate;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(root))
        .route("/aggregate", get(aggregate::handler))
        .route("/healthz", get(healthz))
}

async fn root() -> Json<Value> {
    Json(json!({
        "service": "service-b",
        "message": "Greetings from service-b",
    }))
}

async fn healthz() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
