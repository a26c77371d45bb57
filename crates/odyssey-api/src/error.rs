//! Odyssey — API error types.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use odyssey_core::error::StorageError;
use odyssey_core::id::SceneId;
use odyssey_engine::error::SessionError;
use odyssey_narrative::domain::registry::RegistryError;
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

/// Startup and runtime errors for the API server.
#[derive(Debug, Error)]
pub enum AppError {
    /// A required environment variable is missing or invalid.
    #[error("configuration error: {0}")]
    Config(String),

    /// The scene registry failed validation.
    #[error("scene registry error: {0}")]
    Registry(#[from] RegistryError),

    /// Durable storage could not be opened.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Network binding or I/O error.
    #[error("server error: {0}")]
    Server(#[from] std::io::Error),
}

/// JSON body returned for error responses.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Machine-readable error code.
    pub error: &'static str,
    /// Human-readable error message.
    pub message: String,
}

/// Errors returned by request handlers.
#[derive(Debug, Error)]
pub enum ApiError {
    /// No live session has the id.
    #[error("session {0} not found")]
    SessionNotFound(Uuid),

    /// No anchor image is cached for the scene.
    #[error("no anchor cached for scene {0}")]
    AnchorNotFound(SceneId),

    /// The session rejected the request.
    #[error(transparent)]
    Session(#[from] SessionError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code) = match &self {
            ApiError::SessionNotFound(_) => (StatusCode::NOT_FOUND, "session_not_found"),
            ApiError::AnchorNotFound(_) => (StatusCode::NOT_FOUND, "anchor_not_found"),
            ApiError::Session(SessionError::Finished(_)) => {
                (StatusCode::CONFLICT, "session_finished")
            }
            ApiError::Session(SessionError::Busy) => (StatusCode::CONFLICT, "session_busy"),
            ApiError::Session(SessionError::NotReady(_)) => {
                (StatusCode::CONFLICT, "invalid_phase")
            }
            ApiError::Session(e) if e.is_fatal() => {
                (StatusCode::INTERNAL_SERVER_ERROR, "session_error")
            }
            ApiError::Session(_) => (StatusCode::BAD_REQUEST, "validation_error"),
        };

        let body = ErrorBody {
            error: error_code,
            message: self.to_string(),
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use odyssey_core::error::StreamError;
    use odyssey_session::domain::phase::Phase;

    fn status_of(err: ApiError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn test_unknown_session_maps_to_404() {
        assert_eq!(
            status_of(ApiError::SessionNotFound(Uuid::new_v4())),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn test_missing_anchor_maps_to_404() {
        assert_eq!(
            status_of(ApiError::AnchorNotFound(SceneId(3))),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn test_request_errors_map_to_400() {
        assert_eq!(
            status_of(SessionError::UnknownChoice("fly".into()).into()),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(SessionError::EmptyPrompt.into()),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_finished_session_maps_to_409() {
        assert_eq!(
            status_of(SessionError::Finished(Phase::Ending).into()),
            StatusCode::CONFLICT
        );
    }

    #[test]
    fn test_busy_and_out_of_phase_requests_map_to_409() {
        assert_eq!(
            status_of(SessionError::Busy.into()),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(SessionError::NotReady(Phase::Transitioning).into()),
            StatusCode::CONFLICT
        );
    }

    #[test]
    fn test_collaborator_errors_map_to_500() {
        assert_eq!(
            status_of(SessionError::Stream(StreamError::NotConnected).into()),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
