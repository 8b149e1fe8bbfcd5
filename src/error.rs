//! Typed errors and HTTP mapping.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing reference: {kind} '{id}'")]
    MissingReference { kind: &'static str, id: String },
    #[error("invalid primary key: table {table}: {reason}")]
    InvalidPrimaryKey { table: String, reason: String },
    #[error("duplicate path segment: {0}")]
    DuplicatePathSegment(String),
    #[error("config load: {0}")]
    Load(String),
    #[error("validation: {0}")]
    Validation(String),
}

/// Failures reported by a row store.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The database rejected the write (unique, not-null, foreign key, check, bad input syntax).
    #[error("{0}")]
    Constraint(String),
    #[error("database: {0}")]
    Db(#[from] sqlx::Error),
    #[error("store: {0}")]
    Backend(String),
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("forbidden")]
    Forbidden,
    #[error("not acceptable")]
    NotAcceptable,
    #[error("not found: {0}")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("server error: {0}")]
    ServerError(String),
    #[error("not implemented")]
    NotImplemented,
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Serialize)]
pub struct ErrorBody {
    pub status: u16,
    pub error: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ErrorBody {
    pub fn new(status: StatusCode, error: &'static str, message: Option<String>) -> Self {
        ErrorBody {
            status: status.as_u16(),
            error,
            message,
        }
    }
}

impl AppError {
    fn status_and_label(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad request"),
            AppError::Forbidden => (StatusCode::FORBIDDEN, "forbidden"),
            AppError::NotAcceptable => (StatusCode::NOT_ACCEPTABLE, "not acceptable"),
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, "not found"),
            AppError::Conflict(_) => (StatusCode::CONFLICT, "conflict"),
            AppError::NotImplemented => (StatusCode::NOT_IMPLEMENTED, "not implemented"),
            AppError::ServiceUnavailable(_) => (StatusCode::SERVICE_UNAVAILABLE, "service unavailable"),
            AppError::Store(StoreError::Constraint(_)) => (StatusCode::BAD_REQUEST, "bad request"),
            AppError::ServerError(_) | AppError::Store(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "server error")
            }
        }
    }

    fn message(&self) -> Option<String> {
        match self {
            AppError::BadRequest(m)
            | AppError::NotFound(m)
            | AppError::Conflict(m)
            | AppError::ServiceUnavailable(m) => Some(m.clone()),
            AppError::Store(StoreError::Constraint(m)) => Some(m.clone()),
            AppError::Forbidden | AppError::NotAcceptable | AppError::NotImplemented => None,
            // Internal detail stays in the log.
            AppError::ServerError(_) | AppError::Store(_) => None,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, label) = self.status_and_label();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        let body = ErrorBody::new(status, label, self.message());
        (status, Json(body)).into_response()
    }
}
