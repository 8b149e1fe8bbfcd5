//! Conditional GET: MD5 entity tags with If-Match / If-None-Match short-circuits.

use crate::error::{AppError, ErrorBody};
use axum::{
    body::{to_bytes, Body},
    extract::Request,
    http::{header, HeaderMap, HeaderValue, Method, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use md5::{Digest, Md5};

/// Quoted hex MD5 of the body.
pub fn entity_tag(body: &[u8]) -> String {
    format!("\"{}\"", hex::encode(Md5::digest(body)))
}

/// Whether a comma-separated If-Match / If-None-Match value names `etag` or is `*`.
/// Weak validators compare by their opaque tag.
fn listed(header_value: &str, etag: &str) -> bool {
    header_value
        .split(',')
        .map(str::trim)
        .any(|t| t == "*" || t == etag || t.strip_prefix("W/") == Some(etag))
}

fn header_text(headers: &HeaderMap, name: header::HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

fn short_circuit(status: StatusCode, label: &'static str, etag: &HeaderValue) -> Response {
    let mut response = (status, Json(ErrorBody::new(status, label, None))).into_response();
    response.headers_mut().insert(header::ETAG, etag.clone());
    response
}

/// Buffer successful GET/HEAD responses, tag them and answer 412 / 304 when the
/// request's preconditions say so. Other methods and statuses pass through untouched.
pub async fn conditional_get(mut req: Request, next: Next) -> Response {
    let head = *req.method() == Method::HEAD;
    if *req.method() != Method::GET && !head {
        return next.run(req).await;
    }
    let if_match = header_text(req.headers(), header::IF_MATCH);
    let if_none_match = header_text(req.headers(), header::IF_NONE_MATCH);
    // HEAD bodies are stripped by the router; run as GET so the tag matches.
    if head {
        *req.method_mut() = Method::GET;
    }

    let response = next.run(req).await;
    if !response.status().is_success() {
        return response;
    }

    let (mut parts, body) = response.into_parts();
    let bytes = match to_bytes(body, usize::MAX).await {
        Ok(b) => b,
        Err(e) => return AppError::ServerError(format!("buffer response body: {}", e)).into_response(),
    };
    let etag = entity_tag(&bytes);
    let Ok(etag_value) = HeaderValue::from_str(&etag) else {
        return Response::from_parts(parts, Body::from(bytes));
    };

    if let Some(wanted) = if_match {
        if !listed(&wanted, &etag) {
            return short_circuit(StatusCode::PRECONDITION_FAILED, "precondition failed", &etag_value);
        }
    } else if let Some(cached) = if_none_match {
        if listed(&cached, &etag) {
            return short_circuit(StatusCode::NOT_MODIFIED, "not modified", &etag_value);
        }
    }

    parts.headers.insert(header::ETAG, etag_value);
    if head {
        parts.headers.insert(header::CONTENT_LENGTH, HeaderValue::from(bytes.len()));
        return Response::from_parts(parts, Body::empty());
    }
    Response::from_parts(parts, Body::from(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{middleware, routing::get, Router};
    use tower::ServiceExt;

    fn app() -> Router {
        Router::new()
            .route("/album", get(|| async { Json(serde_json::json!({"Title": "Balls to the Wall"})) }))
            .route("/missing", get(|| async { StatusCode::NOT_FOUND }))
            .layer(middleware::from_fn(conditional_get))
    }

    async fn call(method: Method, uri: &str, headers: &[(header::HeaderName, &str)]) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);
        for (k, v) in headers {
            builder = builder.header(k, *v);
        }
        app().oneshot(builder.body(Body::empty()).unwrap()).await.unwrap()
    }

    async fn tag() -> String {
        let r = call(Method::GET, "/album", &[]).await;
        r.headers()[header::ETAG].to_str().unwrap().to_string()
    }

    #[test]
    fn tag_is_quoted_md5_hex() {
        assert_eq!(entity_tag(b""), "\"d41d8cd98f00b204e9800998ecf8427e\"");
    }

    #[test]
    fn header_lists_and_wildcards() {
        assert!(listed("\"a\", \"b\"", "\"b\""));
        assert!(listed("*", "\"z\""));
        assert!(listed("W/\"a\"", "\"a\""));
        assert!(!listed("\"a\"", "\"b\""));
    }

    #[tokio::test]
    async fn identical_content_gets_identical_tags() {
        let a = tag().await;
        let b = tag().await;
        assert_eq!(a, b);
        let head = call(Method::HEAD, "/album", &[]).await;
        assert_eq!(head.headers()[header::ETAG].to_str().unwrap(), a);
    }

    #[tokio::test]
    async fn if_none_match_hit_is_not_modified() {
        let etag = tag().await;
        let r = call(Method::GET, "/album", &[(header::IF_NONE_MATCH, etag.as_str())]).await;
        assert_eq!(r.status(), StatusCode::NOT_MODIFIED);
        let r = call(Method::GET, "/album", &[(header::IF_NONE_MATCH, "\"stale\"")]).await;
        assert_eq!(r.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn if_match_miss_is_precondition_failed() {
        let r = call(Method::GET, "/album", &[(header::IF_MATCH, "\"stale\"")]).await;
        assert_eq!(r.status(), StatusCode::PRECONDITION_FAILED);
        let bytes = to_bytes(r.into_body(), 1024).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body, serde_json::json!({"status": 412, "error": "precondition failed"}));

        let etag = tag().await;
        let r = call(Method::GET, "/album", &[(header::IF_MATCH, etag.as_str())]).await;
        assert_eq!(r.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn failures_are_not_tagged() {
        let r = call(Method::GET, "/missing", &[(header::IF_MATCH, "\"stale\"")]).await;
        assert_eq!(r.status(), StatusCode::NOT_FOUND);
        assert!(r.headers().get(header::ETAG).is_none());
    }
}
