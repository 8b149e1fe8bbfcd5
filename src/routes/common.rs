//! Service routes under /_service: health, readiness, version.

use crate::config::SERVICE_PATH_SEGMENT;
use crate::state::AppState;
use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use serde::Serialize;

#[derive(Serialize)]
struct HealthBody {
    status: &'static str,
}

#[derive(Serialize)]
struct ReadyBody {
    status: &'static str,
    database: &'static str,
    resources: usize,
}

async fn health() -> Json<HealthBody> {
    Json(HealthBody { status: "ok" })
}

async fn ready(State(state): State<AppState>) -> (StatusCode, Json<ReadyBody>) {
    let resources = state.registry.len();
    if let Err(e) = state.store.ping().await {
        tracing::warn!(error = %e, "readiness check failed");
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ReadyBody {
                status: "degraded",
                database: "unavailable",
                resources,
            }),
        );
    }
    (
        StatusCode::OK,
        Json(ReadyBody {
            status: "ok",
            database: "ok",
            resources,
        }),
    )
}

async fn version() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// GET /_service/health, /_service/ready (store ping), /_service/version.
pub fn service_routes(state: AppState) -> Router {
    let base = format!("/{}", SERVICE_PATH_SEGMENT);
    Router::new()
        .route(&format!("{}/health", base), get(health))
        .route(&format!("{}/ready", base), get(ready))
        .route(&format!("{}/version", base), get(version))
        .with_state(state)
}
