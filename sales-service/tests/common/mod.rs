//! Common test utilities for sales-service integration tests.

#![allow(dead_code)]

use axum::body::Body;
use axum::http::{header, HeaderMap, Method, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use sales_service::config::SalesConfig;
use sales_service::middleware::IDEMPOTENCY_KEY_HEADER;
use sales_service::services::{InMemorySaleRepository, RecordingEventSink};
use sales_service::startup::{build_router, AppState};
use serde_json::{json, Value};
use std::sync::{Arc, Once};
use tower::ServiceExt;
use uuid::Uuid;

static INIT: Once = Once::new();

/// Initialize tracing for tests (only once).
pub fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter("info,sales_service=debug")
            .with_test_writer()
            .try_init()
            .ok();
    });
}

pub struct TestApp {
    pub router: Router,
    pub repository: InMemorySaleRepository,
    pub events: RecordingEventSink,
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

/// Router over the in-memory store, with events captured for assertions.
pub fn spawn_app() -> TestApp {
    spawn_app_with(SalesConfig::in_memory())
}

pub fn spawn_app_with(config: SalesConfig) -> TestApp {
    init_tracing();

    let repository = InMemorySaleRepository::new();
    let events = RecordingEventSink::new();
    let state = AppState::new(
        config,
        Arc::new(repository.clone()),
        Arc::new(events.clone()),
    );

    TestApp {
        router: build_router(state),
        repository,
        events,
    }
}

impl TestApp {
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        idempotency_key: Option<&str>,
    ) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(key) = idempotency_key {
            builder = builder.header(IDEMPOTENCY_KEY_HEADER, key);
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                Value::String(String::from_utf8_lossy(&bytes).into_owned())
            })
        };

        TestResponse {
            status,
            headers,
            body,
        }
    }

    pub async fn get(&self, uri: &str) -> TestResponse {
        self.request(Method::GET, uri, None, None).await
    }

    /// POST with a fresh idempotency key.
    pub async fn post(&self, uri: &str, body: Value) -> TestResponse {
        let key = Uuid::new_v4().to_string();
        self.request(Method::POST, uri, Some(body), Some(&key)).await
    }

    pub async fn put(&self, uri: &str, body: Value) -> TestResponse {
        let key = Uuid::new_v4().to_string();
        self.request(Method::PUT, uri, Some(body), Some(&key)).await
    }

    pub async fn patch(&self, uri: &str) -> TestResponse {
        self.request(Method::PATCH, uri, None, None).await
    }

    pub async fn delete(&self, uri: &str) -> TestResponse {
        self.request(Method::DELETE, uri, None, None).await
    }

    /// Create a sale and return its id.
    pub async fn create_sale(&self, sale_number: &str, quantity: i32, unit_price: &str) -> String {
        let response = self
            .post("/api/sales", sale_body(sale_number, quantity, unit_price))
            .await;
        assert_eq!(response.status, StatusCode::CREATED, "{}", response.body);
        response.body["id"].as_str().unwrap().to_string()
    }
}

pub fn sale_body(sale_number: &str, quantity: i32, unit_price: &str) -> Value {
    json!({
        "sale_number": sale_number,
        "customer": "Acme Corp",
        "branch": "Downtown",
        "items": [
            { "name": "Beer", "quantity": quantity, "unit_price": unit_price }
        ]
    })
}

/// Parse a decimal field that may be rendered as a string or a number.
pub fn decimal(value: &Value) -> rust_decimal::Decimal {
    match value {
        Value::String(s) => s.parse().unwrap(),
        Value::Number(n) => n.to_string().parse().unwrap(),
        other => panic!("not a decimal: {}", other),
    }
}
