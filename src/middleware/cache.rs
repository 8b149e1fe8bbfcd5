//! Configured Cache-Control on successful reads.

use axum::{
    extract::{Request, State},
    http::{header, HeaderValue, Method},
    middleware::Next,
    response::Response,
};

pub async fn cache_control(State(value): State<HeaderValue>, req: Request, next: Next) -> Response {
    let read = matches!(*req.method(), Method::GET | Method::HEAD);
    let mut response = next.run(req).await;
    if read && response.status().is_success() {
        response.headers_mut().insert(header::CACHE_CONTROL, value);
    }
    response
}
