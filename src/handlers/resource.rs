//! Resource handlers: list, meta, create, read, replace, update, delete.

use crate::error::AppError;
use crate::response;
use crate::service::{CreateOutcome, ResourceService};
use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
pub struct ListParams {
    page: Option<String>,
}

fn json_body(body: Result<Json<Value>, JsonRejection>) -> Result<Value, AppError> {
    body.map(|Json(v)| v)
        .map_err(|rejection| AppError::BadRequest(rejection.body_text()))
}

pub async fn list(
    State(svc): State<Arc<ResourceService>>,
    Query(params): Query<ListParams>,
) -> Result<Json<Value>, AppError> {
    Ok(Json(svc.list(params.page.as_deref()).await?))
}

pub async fn meta(State(svc): State<Arc<ResourceService>>) -> Json<Value> {
    Json(svc.meta())
}

pub async fn create(
    State(svc): State<Arc<ResourceService>>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Response, AppError> {
    let body = json_body(body)?;
    Ok(match svc.create(body).await? {
        CreateOutcome::Created(row) => response::created(row).into_response(),
        CreateOutcome::Duplicate => response::no_content().into_response(),
    })
}

pub async fn read(
    State(svc): State<Arc<ResourceService>>,
    Path(id): Path<String>,
) -> Result<Json<Value>, AppError> {
    Ok(Json(svc.read(&id).await?))
}

pub async fn replace(
    State(svc): State<Arc<ResourceService>>,
    Path(id): Path<String>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<Value>, AppError> {
    let body = json_body(body)?;
    Ok(Json(svc.replace(&id, body).await?))
}

pub async fn update(
    State(svc): State<Arc<ResourceService>>,
    Path(id): Path<String>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<Value>, AppError> {
    let body = json_body(body)?;
    Ok(Json(svc.update(&id, body).await?))
}

pub async fn delete(
    State(svc): State<Arc<ResourceService>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    svc.delete(&id).await?;
    Ok(response::no_content())
}
