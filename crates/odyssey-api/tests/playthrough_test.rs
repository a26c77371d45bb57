//! Integration tests that play sessions end to end over HTTP.

mod common;

use std::sync::Arc;

use axum::http::StatusCode;
use odyssey_core::error::GenerationError;
use odyssey_core::storage::MemoryStore;
use odyssey_test_support::ScriptedGenerator;
use serde_json::json;

async fn next(state: &odyssey_api::state::AppState, id: &str) -> serde_json::Value {
    let (status, _) = common::post(
        common::build_test_app(state),
        &format!("/api/v1/sessions/{id}/narrative-complete"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let (status, json) = common::post(
        common::build_test_app(state),
        &format!("/api/v1/sessions/{id}/next"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    json
}

#[tokio::test]
async fn test_mars_route_reaches_pioneer_ending() {
    // Arrange
    let state = common::build_test_state();
    let id = common::create_session(&state).await;
    let (status, _) = common::post(
        common::build_test_app(&state),
        &format!("/api/v1/sessions/{id}/begin"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    // Act
    for _ in 0..4 {
        next(&state, &id).await;
    }
    let (status, at_mars) = common::post_json(
        common::build_test_app(&state),
        &format!("/api/v1/sessions/{id}/choose"),
        &json!({ "choice_id": "goto-mars" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(at_mars["current_scene_id"], 6);
    assert_eq!(at_mars["presentation"]["audio"]["ambient"], "mars");

    let mut last = json!(null);
    for _ in 0..5 {
        last = next(&state, &id).await;
    }

    // Assert
    assert_eq!(last["phase"], "ENDING");
    assert_eq!(last["ending"]["id"], "pioneer");
    assert_eq!(last["visited_scenes"], json!([0, 1, 2, 3, 4, 6, 7, 8, 9, 10]));

    let (status, json) = common::post(
        common::build_test_app(&state),
        &format!("/api/v1/sessions/{id}/next"),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["error"], "session_finished");
}

#[tokio::test]
async fn test_offline_generation_serves_static_content() {
    let state = common::build_test_state_with(
        ScriptedGenerator::new().with_text(Err(GenerationError::Quota("daily".into()))),
        Arc::new(MemoryStore::new()),
    );
    let id = common::create_session(&state).await;

    let (status, json) = common::post(
        common::build_test_app(&state),
        &format!("/api/v1/sessions/{id}/begin"),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["phase"], "NARRATIVE");
    assert!(
        json["current_narrative"]
            .as_str()
            .unwrap()
            .starts_with("The captain stands on the bridge")
    );
    assert_eq!(json["current_choices"][0]["id"], "address-crew");
}

#[tokio::test]
async fn test_reset_returns_session_to_boot() {
    let state = common::build_test_state();
    let id = common::create_session(&state).await;
    common::post(
        common::build_test_app(&state),
        &format!("/api/v1/sessions/{id}/begin"),
    )
    .await;
    next(&state, &id).await;

    let (status, json) = common::post(
        common::build_test_app(&state),
        &format!("/api/v1/sessions/{id}/reset"),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["phase"], "BOOT");
    assert_eq!(json["current_scene_id"], 0);
    assert_eq!(json["visited_scenes"], json!([]));
}

#[tokio::test]
async fn test_preload_progress_is_shared_across_routes() {
    let state = common::build_test_state();
    state.preloader.preload_all(|_| {}).await;

    let (status, json) =
        common::get_json(common::build_test_app(&state), "/api/v1/preload").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["loaded"], 11);
    assert_eq!(json["percent"], 100);
}
