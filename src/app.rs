//! Assemble the router: one resource service per model plus the /_service routes.

use crate::error::{ConfigError, ErrorBody};
use crate::middleware::{cache_control, conditional_get};
use crate::routes::{resource_routes, service_routes};
use crate::service::ResourceService;
use crate::state::AppState;
use axum::{
    http::{HeaderValue, StatusCode, Uri},
    middleware,
    response::IntoResponse,
    Json, Router,
};
use std::sync::Arc;
use tower_http::{limit::RequestBodyLimitLayer, trace::TraceLayer};

async fn not_found(uri: Uri) -> impl IntoResponse {
    let status = StatusCode::NOT_FOUND;
    (status, Json(ErrorBody::new(status, "not found", Some(uri.path().to_string()))))
}

pub fn build_router(state: AppState) -> Result<Router, ConfigError> {
    let mut app: Router = Router::new();
    for model in state.registry.iter() {
        let service = Arc::new(ResourceService::new(
            model.clone(),
            state.store.clone(),
            state.settings.page_size,
        ));
        let methods: Vec<&str> = model.methods.iter().map(|m| m.as_str()).collect();
        tracing::info!(
            table = %model.table_name,
            path = %format!("/{}", model.path_segment),
            methods = %methods.join(","),
            "registered resource"
        );
        app = app.merge(resource_routes(service));
    }

    let mut app = app
        .merge(service_routes(state.clone()))
        .fallback(not_found)
        .layer(middleware::from_fn(conditional_get));

    if let Some(value) = state.settings.cache_control_value() {
        let value = HeaderValue::from_str(&value)
            .map_err(|_| ConfigError::Validation(format!("invalid cache_control value '{}'", value)))?;
        app = app.layer(middleware::from_fn_with_state(value, cache_control));
    }

    Ok(app
        .layer(RequestBodyLimitLayer::new(state.settings.body_limit_bytes))
        .layer(TraceLayer::new_for_http()))
}
