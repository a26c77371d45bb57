//! Shared test helpers for API integration tests.
#![allow(dead_code)]

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use odyssey_core::storage::{KeyValueStore, MemoryStore};
use odyssey_narrative::domain::registry::SceneRegistry;
use odyssey_preload::config::PreloadConfig;
use odyssey_preload::preloader::Preloader;
use odyssey_test_support::{FixedClock, RecordingSleeper, ScriptedGenerator};
use tower::ServiceExt;

use odyssey_api::routes;
use odyssey_api::state::AppState;

/// Build app state with a scripted generator, in-memory storage and a
/// sleeper that returns immediately.
pub fn build_test_state() -> AppState {
    build_test_state_with(ScriptedGenerator::new(), Arc::new(MemoryStore::new()))
}

/// Build app state around the given generator and durable storage.
pub fn build_test_state_with(
    generator: ScriptedGenerator,
    storage: Arc<dyn KeyValueStore>,
) -> AppState {
    let registry = Arc::new(SceneRegistry::builtin().unwrap());
    let generator = Arc::new(generator);
    let sleeper = Arc::new(RecordingSleeper::new());
    let preloader = Preloader::for_registry(
        &registry,
        generator.clone(),
        Arc::clone(&storage),
        sleeper.clone(),
        PreloadConfig::default(),
    );
    let clock = Arc::new(FixedClock(
        chrono::TimeZone::with_ymd_and_hms(&chrono::Utc, 2026, 1, 15, 10, 0, 0).unwrap(),
    ));
    AppState::new(registry, storage, generator, preloader, clock, sleeper)
}

/// Build the full app router. Uses the same route structure as `main.rs`.
pub fn build_test_app(state: &AppState) -> Router {
    Router::new()
        .merge(routes::health::router())
        .nest("/api/v1/sessions", routes::sessions::router())
        .nest("/api/v1", routes::preload::router())
        .with_state(state.clone())
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let body_bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = if body_bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&body_bytes).unwrap()
    };

    (status, json)
}

/// Send a POST request with a JSON body and return the response.
pub async fn post_json(
    app: Router,
    uri: &str,
    body: &serde_json::Value,
) -> (StatusCode, serde_json::Value) {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(body).unwrap()))
        .unwrap();

    send(app, request).await
}

/// Send a bodiless POST request and return the response.
pub async fn post(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .body(Body::empty())
        .unwrap();

    send(app, request).await
}

/// Send a GET request and return the response.
pub async fn get_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let request = Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap();

    send(app, request).await
}

/// Send a DELETE request and return the response.
pub async fn delete(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let request = Request::builder()
        .method("DELETE")
        .uri(uri)
        .body(Body::empty())
        .unwrap();

    send(app, request).await
}

/// Create a session and return its id.
pub async fn create_session(state: &AppState) -> String {
    let (status, json) = post_json(
        build_test_app(state),
        "/api/v1/sessions",
        &serde_json::json!({}),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    json["session_id"].as_str().unwrap().to_owned()
}
