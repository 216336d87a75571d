//! HTTP observability endpoints.

use std::sync::Arc;

use axum::extract::State;
use axum::http::HeaderValue;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use tower_http::cors::CorsLayer;
use vigil_rules::{AlertEngine, BucketSnapshot, DetectionRule};

use crate::worker::{StatsSnapshot, WorkerStats};

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<AlertEngine>,
    pub stats: Arc<WorkerStats>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub rules: usize,
    pub aggregations: usize,
    #[serde(flatten)]
    pub stats: StatsSnapshot,
}

/// Build the router for `/health`, `/rules` and `/aggregations`.
pub fn build_router(state: AppState, cors_origin: &str) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/rules", get(rules))
        .route("/aggregations", get(aggregations))
        .layer(cors_layer(cors_origin))
        .with_state(state)
}

fn cors_layer(origin: &str) -> CorsLayer {
    if origin == "*" {
        return CorsLayer::permissive();
    }
    match origin.parse::<HeaderValue>() {
        Ok(value) => CorsLayer::new().allow_origin(value),
        Err(e) => {
            tracing::warn!(origin, error = %e, "invalid CORS origin, allowing any origin");
            CorsLayer::permissive()
        }
    }
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        rules: state.engine.rule_set().len(),
        aggregations: state.engine.tracker().len(),
        stats: state.stats.snapshot(),
    })
}

pub async fn rules(State(state): State<AppState>) -> Json<Vec<DetectionRule>> {
    Json(state.engine.rules())
}

pub async fn aggregations(State(state): State<AppState>) -> Json<Vec<BucketSnapshot>> {
    Json(state.engine.tracker().snapshot())
}
