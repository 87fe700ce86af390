use axum::{
    body::{to_bytes, Body},
    extract::{Request, State},
    http::{header, HeaderValue, Method},
    middleware::Next,
    response::{IntoResponse, Response},
};
use service_core::error::AppError;

use crate::services::idempotency::{CachedResponse, IdempotencyCache};
use crate::services::metrics::record_idempotent_replay;

pub const IDEMPOTENCY_KEY_HEADER: &str = "idempotency-key";
pub const IDEMPOTENCY_REPLAYED_HEADER: &str = "idempotency-replayed";

/// Upper bound for a buffered response body.
const MAX_CACHED_BODY_BYTES: usize = 1024 * 1024;

fn replay(cached: CachedResponse) -> Response {
    let mut response = Response::new(Body::from(cached.body));
    *response.status_mut() = cached.status;

    if let Some(value) = cached
        .content_type
        .as_deref()
        .and_then(|ct| HeaderValue::from_str(ct).ok())
    {
        response.headers_mut().insert(header::CONTENT_TYPE, value);
    }
    response.headers_mut().insert(
        IDEMPOTENCY_REPLAYED_HEADER,
        HeaderValue::from_static("true"),
    );
    response
}

/// Require an `Idempotency-Key` on POST and PUT and replay the first response
/// recorded for a key. Other methods pass through untouched.
pub async fn idempotency_middleware(
    State(cache): State<IdempotencyCache>,
    req: Request,
    next: Next,
) -> Response {
    if !matches!(*req.method(), Method::POST | Method::PUT) {
        return next.run(req).await;
    }

    let key = match req
        .headers()
        .get(IDEMPOTENCY_KEY_HEADER)
        .and_then(|h| h.to_str().ok())
        .map(str::trim)
        .filter(|k| !k.is_empty())
    {
        Some(key) => key.to_string(),
        None => {
            return AppError::BadRequest(anyhow::anyhow!(
                "The Idempotency-Key header is required"
            ))
            .into_response();
        }
    };

    if let Some(cached) = cache.get(&key) {
        tracing::info!(
            idempotency_key = %key,
            status = %cached.status,
            "Replaying cached response"
        );
        record_idempotent_replay();
        return replay(cached);
    }

    let response = next.run(req).await;

    // Server errors are not cached so the client can retry.
    if response.status().is_server_error() {
        return response;
    }

    let (parts, body) = response.into_parts();
    let bytes = match to_bytes(body, MAX_CACHED_BODY_BYTES).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::error!(
                idempotency_key = %key,
                error = %e,
                "Failed to buffer response body"
            );
            return AppError::InternalError(anyhow::anyhow!("Failed to buffer response"))
                .into_response();
        }
    };

    let content_type = parts
        .headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    cache.insert(key, parts.status, content_type, bytes.clone());

    Response::from_parts(parts, Body::from(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::StatusCode, middleware::from_fn_with_state, routing::post, Router};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use tower::ServiceExt;

    fn app(cache: IdempotencyCache, hits: Arc<AtomicUsize>) -> Router {
        Router::new()
            .route(
                "/",
                post(move || {
                    let hits = hits.clone();
                    async move {
                        let n = hits.fetch_add(1, Ordering::SeqCst) + 1;
                        (StatusCode::CREATED, format!("call {}", n))
                    }
                })
                .get(|| async { "ok" }),
            )
            .layer(from_fn_with_state(cache, idempotency_middleware))
    }

    fn post_with_key(key: Option<&str>) -> Request {
        let mut builder = axum::http::Request::builder().method(Method::POST).uri("/");
        if let Some(key) = key {
            builder = builder.header(IDEMPOTENCY_KEY_HEADER, key);
        }
        builder.body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn missing_key_is_rejected() {
        let hits = Arc::new(AtomicUsize::new(0));
        let cache = IdempotencyCache::new(Duration::from_secs(60));

        let response = app(cache, hits.clone())
            .oneshot(post_with_key(None))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn repeated_key_replays_first_response() {
        let hits = Arc::new(AtomicUsize::new(0));
        let cache = IdempotencyCache::new(Duration::from_secs(60));

        let first = app(cache.clone(), hits.clone())
            .oneshot(post_with_key(Some("abc")))
            .await
            .unwrap();
        assert_eq!(first.status(), StatusCode::CREATED);
        assert!(first.headers().get(IDEMPOTENCY_REPLAYED_HEADER).is_none());

        let second = app(cache, hits.clone())
            .oneshot(post_with_key(Some("abc")))
            .await
            .unwrap();
        assert_eq!(second.status(), StatusCode::CREATED);
        assert_eq!(
            second.headers().get(IDEMPOTENCY_REPLAYED_HEADER).unwrap(),
            "true"
        );

        let body = to_bytes(second.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"call 1");
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn get_requests_pass_through_without_key() {
        let hits = Arc::new(AtomicUsize::new(0));
        let cache = IdempotencyCache::new(Duration::from_secs(60));

        let response = app(cache.clone(), hits)
            .oneshot(axum::http::Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(cache.is_empty());
    }
}
