#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Method, Request};
use axum::response::Response;
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use custody_api::config::ServerConfig;
use custody_api::state::AppState;
use custody_core::lifecycle::TransitionRules;
use custody_core::memory::InMemoryStore;

/// User id registered in every test store.
pub const OPERATOR_ID: i64 = 1;

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        database_url: None,
        db_max_connections: 1,
        transition_rules_path: None,
        log_json: false,
    }
}

/// An in-memory store with one known operator.
pub async fn test_store() -> Arc<InMemoryStore> {
    let store = Arc::new(InMemoryStore::new());
    store.add_user(OPERATOR_ID, "Olive Operator").await;
    store
}

/// Build the full application router over `store`, with the same middleware
/// stack production uses.
pub fn build_test_app(store: Arc<InMemoryStore>) -> Router {
    let state = AppState::new(store, TransitionRules::standard(), test_config());
    custody_api::build_app(state).unwrap()
}

pub async fn body_json(response: Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn send(app: Router, method: Method, uri: &str, body: Option<Value>) -> Response {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("x-actor-id", OPERATOR_ID.to_string());
    let body = match body {
        Some(json) => {
            builder = builder.header("content-type", "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };
    app.oneshot(builder.body(body).unwrap()).await.unwrap()
}

pub async fn get(app: Router, uri: &str) -> Response {
    send(app, Method::GET, uri, None).await
}

pub async fn post(app: Router, uri: &str) -> Response {
    send(app, Method::POST, uri, None).await
}

pub async fn post_json(app: Router, uri: &str, body: Value) -> Response {
    send(app, Method::POST, uri, Some(body)).await
}

pub async fn delete(app: Router, uri: &str) -> Response {
    send(app, Method::DELETE, uri, None).await
}

/// Register an asset through the API and assert it was created.
pub async fn register(app: Router, asset_number: &str, asset_type: &str, state: &str) {
    let response = post_json(
        app,
        "/api/v1/assets",
        serde_json::json!({
            "asset_number": asset_number,
            "asset_type": asset_type,
            "state": state,
        }),
    )
    .await;
    assert_eq!(
        response.status(),
        axum::http::StatusCode::CREATED,
        "registering {asset_number}"
    );
}
