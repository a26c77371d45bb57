//! Routes for driving play sessions.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use odyssey_preload::progress::Progress;
use odyssey_session::domain::state::SessionState;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::error::ApiError;
use crate::relay::{AudioView, StreamView};
use crate::state::{AppState, SessionHandle};

/// Request body for POST /.
#[derive(Debug, Default, Deserialize)]
pub struct CreateSessionRequest {
    /// Restore the saved session instead of starting fresh.
    #[serde(default)]
    pub resume: bool,
}

/// Request body for POST /{id}/choose.
#[derive(Debug, Deserialize)]
pub struct ChooseRequest {
    /// Id of a choice currently on offer.
    pub choice_id: String,
}

/// Request body for POST /{id}/interact.
#[derive(Debug, Deserialize)]
pub struct InteractRequest {
    /// Free-form prompt for the live stream.
    pub prompt: String,
}

/// Request body for POST /{id}/npc-chat.
#[derive(Debug, Deserialize)]
pub struct NpcChatRequest {
    /// Character to talk to.
    pub npc_id: String,
}

/// Request body for PUT /{id}/volume.
#[derive(Debug, Deserialize)]
pub struct VolumeRequest {
    /// Requested master volume; clamped into `0.0..=1.0`.
    pub level: f32,
}

/// The scene being played, as shown to the player.
#[derive(Debug, Serialize)]
pub struct SceneSummary {
    /// Scene id.
    pub id: u32,
    /// Display name.
    pub name: String,
    /// Display subtitle.
    pub subtitle: String,
    /// Characters the player can talk to.
    pub npcs: Vec<String>,
    /// Whether advancing from here ends the session.
    pub is_ending: bool,
}

/// Cues the client should render.
#[derive(Debug, Serialize)]
pub struct Presentation {
    /// Live stream cues.
    pub stream: StreamView,
    /// Audio cues.
    pub audio: AudioView,
}

/// Anchor preload progress.
#[derive(Debug, Serialize)]
pub struct PreloadView {
    /// Anchors cached.
    pub loaded: usize,
    /// Anchors wanted.
    pub total: usize,
    /// Rounded percentage.
    pub percent: u8,
}

impl From<Progress> for PreloadView {
    fn from(progress: Progress) -> Self {
        Self {
            loaded: progress.loaded,
            total: progress.total,
            percent: progress.percent(),
        }
    }
}

/// Full view of a session.
#[derive(Debug, Serialize)]
pub struct SessionView {
    /// Session id.
    pub session_id: Uuid,
    /// Current scene.
    pub scene: Option<SceneSummary>,
    /// Session record.
    #[serde(flatten)]
    pub state: SessionState,
    /// Latest presentation cues.
    pub presentation: Presentation,
    /// Anchor preload progress.
    pub preload: PreloadView,
}

/// Response body for POST /.
#[derive(Debug, Serialize)]
pub struct CreateSessionResponse {
    /// Id of the new session.
    pub session_id: Uuid,
    /// Whether a saved session was restored.
    pub resumed: bool,
    /// The new session.
    pub session: SessionView,
}

/// Response body for POST /{id}/interact.
#[derive(Debug, Serialize)]
pub struct InteractResponse {
    /// False when the prompt was dropped by the cooldown or no scene is
    /// streaming.
    pub sent: bool,
}

/// Response body for POST /{id}/save.
#[derive(Debug, Serialize)]
pub struct SaveResponse {
    /// Whether the save record was written.
    pub saved: bool,
}

/// Response body for PUT /{id}/volume.
#[derive(Debug, Serialize)]
pub struct VolumeResponse {
    /// Volume applied.
    pub volume: f32,
}

fn view(state: &AppState, handle: &SessionHandle) -> SessionView {
    let session = handle.director.state();
    let scene = state
        .registry
        .get(session.current_scene_id)
        .map(|scene| SceneSummary {
            id: scene.id.0,
            name: scene.name.clone(),
            subtitle: scene.subtitle.clone(),
            npcs: scene.npcs.clone(),
            is_ending: scene.is_ending(),
        });
    SessionView {
        session_id: handle.director.id(),
        scene,
        state: SessionState::clone(&session),
        presentation: Presentation {
            stream: handle.stream.view(),
            audio: handle.audio.view(),
        },
        preload: state.preloader.progress().into(),
    }
}

/// POST /
#[instrument(skip(state, request), fields(resume = request.resume))]
async fn create_session(
    State(state): State<AppState>,
    Json(request): Json<CreateSessionRequest>,
) -> (StatusCode, Json<CreateSessionResponse>) {
    let handle = state.create_session();
    let resumed = request.resume && handle.director.resume();
    handle.director.start_preload();
    info!(session_id = %handle.director.id(), resumed, "session ready");

    (
        StatusCode::CREATED,
        Json(CreateSessionResponse {
            session_id: handle.director.id(),
            resumed,
            session: view(&state, &handle),
        }),
    )
}

/// GET /{id}
async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionView>, ApiError> {
    let handle = state.session(id)?;
    Ok(Json(view(&state, &handle)))
}

/// DELETE /{id}
#[instrument(skip(state))]
async fn delete_session(State(state): State<AppState>, Path(id): Path<Uuid>) -> StatusCode {
    if let Some(handle) = state.remove_session(id) {
        handle.director.teardown().await;
    }
    StatusCode::NO_CONTENT
}

/// POST /{id}/begin
#[instrument(skip(state))]
async fn begin(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionView>, ApiError> {
    let handle = state.session(id)?;
    handle.director.begin().await?;
    Ok(Json(view(&state, &handle)))
}

/// POST /{id}/narrative-complete
async fn narrative_complete(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionView>, ApiError> {
    let handle = state.session(id)?;
    handle.director.narrative_complete()?;
    Ok(Json(view(&state, &handle)))
}

/// POST /{id}/next
#[instrument(skip(state))]
async fn next(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionView>, ApiError> {
    let handle = state.session(id)?;
    handle.director.advance().await?;
    Ok(Json(view(&state, &handle)))
}

/// POST /{id}/choose
#[instrument(skip(state, request), fields(choice_id = %request.choice_id))]
async fn choose(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<ChooseRequest>,
) -> Result<Json<SessionView>, ApiError> {
    let handle = state.session(id)?;
    handle.director.choose(&request.choice_id).await?;
    Ok(Json(view(&state, &handle)))
}

/// POST /{id}/interact
async fn interact(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<InteractRequest>,
) -> Result<Json<InteractResponse>, ApiError> {
    let handle = state.session(id)?;
    let sent = handle.director.interact(&request.prompt).await?;
    Ok(Json(InteractResponse { sent }))
}

/// POST /{id}/npc-chat
async fn open_npc_chat(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<NpcChatRequest>,
) -> Result<Json<SessionView>, ApiError> {
    let handle = state.session(id)?;
    handle.director.open_npc_chat(&request.npc_id)?;
    Ok(Json(view(&state, &handle)))
}

/// DELETE /{id}/npc-chat
async fn close_npc_chat(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionView>, ApiError> {
    let handle = state.session(id)?;
    handle.director.close_npc_chat()?;
    Ok(Json(view(&state, &handle)))
}

/// PUT /{id}/volume
async fn set_volume(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<VolumeRequest>,
) -> Result<Json<VolumeResponse>, ApiError> {
    let handle = state.session(id)?;
    let volume = handle.director.set_volume(request.level);
    Ok(Json(VolumeResponse { volume }))
}

/// POST /{id}/save
async fn save(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SaveResponse>, ApiError> {
    let handle = state.session(id)?;
    let saved = handle.director.save();
    Ok(Json(SaveResponse { saved }))
}

/// POST /{id}/reset
async fn reset(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionView>, ApiError> {
    let handle = state.session(id)?;
    handle.director.reset();
    Ok(Json(view(&state, &handle)))
}

/// Returns the router for sessions.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_session))
        .route("/{id}", get(get_session).delete(delete_session))
        .route("/{id}/begin", post(begin))
        .route("/{id}/narrative-complete", post(narrative_complete))
        .route("/{id}/next", post(next))
        .route("/{id}/choose", post(choose))
        .route("/{id}/interact", post(interact))
        .route("/{id}/npc-chat", post(open_npc_chat).delete(close_npc_chat))
        .route("/{id}/volume", put(set_volume))
        .route("/{id}/save", post(save))
        .route("/{id}/reset", post(reset))
}
