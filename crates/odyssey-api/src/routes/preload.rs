//! Routes for the shared anchor preloader.

use axum::extract::{Path, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use odyssey_core::id::SceneId;
use tracing::info;

use crate::error::ApiError;
use crate::routes::sessions::PreloadView;
use crate::state::AppState;

/// GET /preload
async fn progress(State(state): State<AppState>) -> Json<PreloadView> {
    Json(state.preloader.progress().into())
}

/// DELETE /preload
async fn clear(State(state): State<AppState>) -> Json<PreloadView> {
    state.preloader.clear_cache();
    info!("anchor cache cleared on request");
    Json(state.preloader.progress().into())
}

/// GET /anchors/{scene_id}
async fn anchor(
    State(state): State<AppState>,
    Path(scene_id): Path<u32>,
) -> Result<Response, ApiError> {
    let id = SceneId(scene_id);
    let asset = state
        .preloader
        .get_asset(id)
        .ok_or(ApiError::AnchorNotFound(id))?;
    Ok(([(header::CONTENT_TYPE, asset.mime_type.clone())], asset.data.clone()).into_response())
}

/// Returns the router for preload progress and cached anchors.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/preload", get(progress).delete(clear))
        .route("/anchors/{scene_id}", get(anchor))
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use odyssey_core::clock::SystemClock;
    use odyssey_core::storage::MemoryStore;
    use odyssey_narrative::domain::registry::SceneRegistry;
    use odyssey_preload::config::PreloadConfig;
    use odyssey_preload::preloader::Preloader;
    use odyssey_test_support::{RecordingSleeper, ScriptedGenerator};
    use serde_json::Value;
    use tower::ServiceExt;

    fn test_app_state() -> AppState {
        let registry = Arc::new(SceneRegistry::builtin().unwrap());
        let generator = Arc::new(ScriptedGenerator::new());
        let sleeper = Arc::new(RecordingSleeper::new());
        let preloader = Preloader::for_registry(
            &registry,
            generator.clone(),
            Arc::new(MemoryStore::new()),
            sleeper.clone(),
            PreloadConfig::default(),
        );
        AppState::new(
            registry,
            Arc::new(MemoryStore::new()),
            generator,
            preloader,
            Arc::new(SystemClock),
            sleeper,
        )
    }

    async fn request(state: &AppState, method: &str, uri: &str) -> Response {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap();
        router().with_state(state.clone()).oneshot(request).await.unwrap()
    }

    async fn json_of(response: Response) -> Value {
        let body_bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&body_bytes).unwrap()
    }

    #[tokio::test]
    async fn test_progress_starts_empty() {
        let state = test_app_state();

        let response = request(&state, "GET", "/preload").await;

        assert_eq!(response.status(), StatusCode::OK);
        let json = json_of(response).await;
        assert_eq!(json["loaded"], 0);
        assert_eq!(json["total"], 11);
        assert_eq!(json["percent"], 0);
    }

    #[tokio::test]
    async fn test_cached_anchor_is_served_with_its_content_type() {
        // Arrange
        let state = test_app_state();
        state.preloader.preload_all(|_| {}).await;

        // Act
        let response = request(&state, "GET", "/anchors/0").await;

        // Assert
        assert_eq!(response.status(), StatusCode::OK);
        let expected = state.preloader.get_asset(SceneId(0)).unwrap();
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            expected.mime_type.as_str()
        );
        let body_bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(body_bytes.as_ref(), expected.data.as_slice());
    }

    #[tokio::test]
    async fn test_missing_anchor_returns_404() {
        let state = test_app_state();

        let response = request(&state, "GET", "/anchors/3").await;

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(json_of(response).await["error"], "anchor_not_found");
    }

    #[tokio::test]
    async fn test_clear_resets_progress() {
        let state = test_app_state();
        state.preloader.preload_all(|_| {}).await;

        let response = request(&state, "DELETE", "/preload").await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_of(response).await["loaded"], 0);
        assert!(state.preloader.get_asset(SceneId(0)).is_none());
    }
}
