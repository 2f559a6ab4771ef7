use std::sync::Arc;

use axum::Router;
use downstream::DownstreamClient;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

pub mod config;
pub mod errors;
pub mod orchestrator;
mod routes;

use crate::config::Config;
use crate::orchestrator::Orchestrator;

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
}

impl AppState {
    pub fn new(config: &Config) -> Self {
        let downstream = DownstreamClient::new(&config.service_a_url, config.downstream_timeout);
        Self {
            orchestrator: Arc::new(Orchestrator::new(downstream, &config.fortunes_path)),
        }
    }
}

/// Full router with tracing and CORS layers applied.
pub fn app(state: AppState) -> Router {
    routes::router()
        .layer(
            ServiceBuilder::new()
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                        .on_response(DefaultOnResponse::new().level(Level::INFO)),
                )
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}
