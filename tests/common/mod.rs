use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
    Router,
};
use meter_sync::{app::build_app, AppState};
use serde_json::Value;
use tower::ServiceExt;

#[allow(dead_code)]
pub const API_KEY: &str = "test-api-key";

/// Router over a fresh in-memory store, plus the state behind it.
#[allow(dead_code)]
pub fn test_app() -> (Router, AppState) {
    let state = AppState::in_memory();
    (build_app(state.clone()), state)
}

/// Sends an authenticated request and decodes the JSON response body
/// (`Value::Null` when the body is empty).
#[allow(dead_code)]
pub async fn call(
    app: &Router,
    method: Method,
    uri: &str,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut req = Request::builder()
        .method(method)
        .uri(uri)
        .header("x-api-key", API_KEY);
    let body = match body {
        Some(v) => {
            req = req.header("content-type", "application/json");
            Body::from(v.to_string())
        }
        None => Body::empty(),
    };

    let response = app
        .clone()
        .oneshot(req.body(body).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, json)
}

#[allow(dead_code)]
pub async fn push(app: &Router, body: Value) -> (StatusCode, Value) {
    call(app, Method::POST, "/api/v1/sync/push", Some(body)).await
}

/// Pulls everything, or everything after `since`.
#[allow(dead_code)]
pub async fn pull(app: &Router, since: Option<&str>) -> Value {
    let uri = match since {
        Some(s) => format!("/api/v1/sync/pull?since={}", encode_query(s)),
        None => "/api/v1/sync/pull".to_string(),
    };
    let (status, body) = call(app, Method::GET, &uri, None).await;
    assert_eq!(status, StatusCode::OK, "pull failed: {body}");
    body
}

/// Minimal escaping for RFC 3339 values in a query string.
#[allow(dead_code)]
pub fn encode_query(s: &str) -> String {
    s.replace('+', "%2B").replace(':', "%3A")
}
