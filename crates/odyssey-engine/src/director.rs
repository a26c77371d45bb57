//! The session director.
//!
//! A `Director` owns one play session. Its operations are the only way the
//! session moves forward: each one updates the session store, talks to the
//! collaborators, and on failure leaves the session in the `Error` phase
//! with a message rather than returning the failure to the caller.
//!
//! The store lock is only ever held for synchronous sections; it is always
//! released before awaiting a collaborator. Player actions that move the
//! session (`begin`, `narrative_complete`, `choose`, `advance`) also take a
//! per-session turn; one that arrives while another holds it is rejected
//! with `SessionError::Busy`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use odyssey_core::asset::Asset;
use odyssey_core::audio::AudioSink;
use odyssey_core::clock::{Clock, Sleeper};
use odyssey_core::generator::Generator;
use odyssey_core::id::SceneId;
use odyssey_core::storage::KeyValueStore;
use odyssey_core::stream::LiveStream;
use odyssey_narrative::application::prompts::{
    NARRATOR_SYSTEM_PROMPT, choice_interact_prompt, choices_prompt, narrative_prompt,
    parse_choices, stream_prompt,
};
use odyssey_narrative::application::resolver::Resolution;
use odyssey_narrative::domain::registry::SceneRegistry;
use odyssey_narrative::domain::scene::{Choice, Scene, Transition};
use odyssey_preload::preloader::{PreloadTask, Preloader};
use odyssey_preload::progress::Progress;
use odyssey_session::application::store::SessionStore;
use odyssey_session::domain::phase::Phase;
use odyssey_session::domain::state::{SessionPatch, SessionState, clamp_volume};
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::config::{DirectorConfig, StreamConfig};
use crate::error::SessionError;
use crate::stream_driver::StreamDriver;

/// Everything a director talks to.
#[derive(Clone)]
pub struct Collaborators {
    /// The scene graph.
    pub registry: Arc<SceneRegistry>,
    /// Durable storage for the saved session.
    pub storage: Arc<dyn KeyValueStore>,
    /// Live video stream.
    pub stream: Arc<dyn LiveStream>,
    /// Audio output.
    pub audio: Arc<dyn AudioSink>,
    /// Text and image generation.
    pub generator: Arc<dyn Generator>,
    /// Shared anchor preloader.
    pub preloader: Preloader,
    /// Time source for rate limiting.
    pub clock: Arc<dyn Clock>,
    /// Timer for pauses and retries.
    pub sleeper: Arc<dyn Sleeper>,
}

/// Orchestrates one play session.
pub struct Director {
    id: Uuid,
    registry: Arc<SceneRegistry>,
    store: Arc<Mutex<SessionStore>>,
    stream: StreamDriver,
    audio: Arc<dyn AudioSink>,
    generator: Arc<dyn Generator>,
    preloader: Preloader,
    sleeper: Arc<dyn Sleeper>,
    config: DirectorConfig,
    preload_task: Mutex<Option<PreloadTask>>,
    turn: tokio::sync::Mutex<()>,
    torn_down: AtomicBool,
}

impl std::fmt::Debug for Director {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Director")
            .field("id", &self.id)
            .field("phase", &self.state().phase)
            .field("stream", &self.stream)
            .finish_non_exhaustive()
    }
}

impl Director {
    /// Creates a director for a fresh session.
    #[must_use]
    pub fn new(
        id: Uuid,
        parts: Collaborators,
        stream_config: StreamConfig,
        config: DirectorConfig,
    ) -> Self {
        let store = SessionStore::new(Arc::clone(&parts.registry), parts.storage);
        let stream = StreamDriver::new(
            parts.stream,
            parts.clock,
            Arc::clone(&parts.sleeper),
            stream_config,
        );
        Self {
            id,
            registry: parts.registry,
            store: Arc::new(Mutex::new(store)),
            stream,
            audio: parts.audio,
            generator: parts.generator,
            preloader: parts.preloader,
            sleeper: parts.sleeper,
            config,
            preload_task: Mutex::new(None),
            turn: tokio::sync::Mutex::new(()),
            torn_down: AtomicBool::new(false),
        }
    }

    /// The session identifier.
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// The current session snapshot.
    #[must_use]
    pub fn state(&self) -> Arc<SessionState> {
        self.store().get_state()
    }

    /// Whether the live stream is connected.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.stream.is_connected()
    }

    /// Whether [`teardown`](Self::teardown) has run.
    #[must_use]
    pub fn is_torn_down(&self) -> bool {
        self.torn_down.load(Ordering::Acquire)
    }

    fn store(&self) -> MutexGuard<'_, SessionStore> {
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn preload_task(&self) -> MutexGuard<'_, Option<PreloadTask>> {
        self.preload_task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn update(&self, patch: SessionPatch) {
        self.store().set_state(patch);
    }

    fn fail(&self, err: &SessionError) {
        error!(session_id = %self.id, error = %err, "session failed");
        self.update(SessionPatch::new().fail(err.to_string()));
    }

    fn take_turn(&self) -> Result<tokio::sync::MutexGuard<'_, ()>, SessionError> {
        self.turn.try_lock().map_err(|_| SessionError::Busy)
    }

    /// Choosing and advancing are offered once the scene has loaded.
    fn ensure_choosing(state: &SessionState) -> Result<(), SessionError> {
        match state.phase {
            Phase::Narrative | Phase::Choices => Ok(()),
            phase => Err(SessionError::NotReady(phase)),
        }
    }

    fn ensure_active(&self) -> Result<Arc<SessionState>, SessionError> {
        let state = self.state();
        match state.phase {
            Phase::Error | Phase::Ending => Err(SessionError::Finished(state.phase)),
            _ => Ok(state),
        }
    }

    fn current_scene(&self, state: &SessionState) -> Result<&Scene, SessionError> {
        self.registry
            .get(state.current_scene_id)
            .ok_or(SessionError::UnknownScene(state.current_scene_id))
    }

    /// Restores the saved session, if there is one.
    pub fn resume(&self) -> bool {
        self.store().load()
    }

    /// Starts filling the anchor cache in the background. The session moves
    /// to `SceneReady` as soon as one anchor is cached.
    pub fn start_preload(&self) {
        self.update(SessionPatch::new().phase(Phase::Preloading));

        let store = Arc::clone(&self.store);
        let task = self.preloader.spawn(move |progress: Progress| {
            if progress.loaded == 0 {
                return;
            }
            let mut store = store.lock().unwrap_or_else(PoisonError::into_inner);
            if store.get_state().phase == Phase::Preloading {
                store.set_state(SessionPatch::new().phase(Phase::SceneReady));
            }
        });

        let previous = self.preload_task().replace(task);
        if let Some(previous) = previous {
            previous.detach();
        }
    }

    /// Waits for a preload started by [`start_preload`](Self::start_preload).
    /// `None` if none is pending.
    pub async fn wait_for_preload(&self) -> Option<Progress> {
        let task = self.preload_task().take();
        match task {
            Some(task) => task.join().await,
            None => None,
        }
    }

    /// Connects the stream and loads the current scene.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Busy` while another action is running, or
    /// `SessionError::Finished` if the session has ended or failed.
    #[instrument(skip(self), fields(session_id = %self.id))]
    pub async fn begin(&self) -> Result<(), SessionError> {
        let _turn = self.take_turn()?;
        let state = self.ensure_active()?;
        self.audio.set_volume(state.volume);
        self.update(SessionPatch::new().phase(Phase::Connecting));

        if let Err(e) = self.stream.connect().await {
            self.fail(&SessionError::from(e));
            return Ok(());
        }
        self.load_scene(state.current_scene_id).await;
        Ok(())
    }

    /// Makes `id` the current scene: starts its stream and ambience, then
    /// fills in narrative and choices, falling back to the scene's static
    /// content when generation fails.
    #[instrument(skip(self), fields(session_id = %self.id, scene_id = %id))]
    pub async fn load_scene(&self, id: SceneId) {
        if let Err(e) = self.try_load_scene(id).await {
            self.fail(&e);
        }
    }

    async fn try_load_scene(&self, id: SceneId) -> Result<(), SessionError> {
        let scene = self
            .registry
            .get(id)
            .ok_or(SessionError::UnknownScene(id))?;

        self.update(
            SessionPatch::new()
                .scene(id)
                .phase(Phase::SceneLoading)
                .narrative("")
                .choices(Vec::new()),
        );

        self.audio
            .crossfade_to(&scene.audio_type, self.config.crossfade_seconds);
        self.stream.start_scene(&stream_prompt(scene)).await?;

        self.update(SessionPatch::new().phase(Phase::Narrative));

        let previous_choice = self
            .state()
            .choice_history
            .last()
            .map(|record| record.text.clone());
        let narrative = self
            .generate_narrative(scene, previous_choice.as_deref())
            .await;
        let choices = self.generate_choices(scene).await;

        self.update(SessionPatch::new().narrative(narrative).choices(choices));
        info!(scene = %scene.name, "scene loaded");
        Ok(())
    }

    async fn generate_narrative(&self, scene: &Scene, previous_choice: Option<&str>) -> String {
        let prompt = narrative_prompt(scene, previous_choice);
        match self
            .generator
            .generate_text(&prompt, Some(NARRATOR_SYSTEM_PROMPT))
            .await
        {
            Ok(text) if !text.trim().is_empty() => text.trim().to_owned(),
            Ok(_) => {
                warn!(scene_id = %scene.id, "empty narrative generated, using scene context");
                scene.narrative_context.clone()
            }
            Err(e) => {
                warn!(scene_id = %scene.id, error = %e, "narrative generation failed, using scene context");
                scene.narrative_context.clone()
            }
        }
    }

    /// Branch scenes always offer their static choices, since their ids are
    /// the branch keys. Ending scenes offer none.
    async fn generate_choices(&self, scene: &Scene) -> Vec<Choice> {
        match scene.transition {
            Transition::Ending => return Vec::new(),
            Transition::Branch { .. } => return scene.fallback_choices.clone(),
            Transition::Linear { .. } | Transition::Visit { .. } => {}
        }

        let generated = self
            .generator
            .generate_structured(&choices_prompt(scene))
            .await
            .and_then(parse_choices);
        match generated {
            Ok(choices) => choices,
            Err(e) => {
                warn!(scene_id = %scene.id, error = %e, "choice generation failed, using fallback choices");
                scene.fallback_choices.clone()
            }
        }
    }

    /// The narrative has been shown; offer the choices.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Busy` while another action is running,
    /// `SessionError::NotReady` before the scene has loaded, or
    /// `SessionError::Finished` if the session has ended or failed.
    pub fn narrative_complete(&self) -> Result<(), SessionError> {
        let _turn = self.take_turn()?;
        let state = self.ensure_active()?;
        Self::ensure_choosing(&state)?;
        self.update(SessionPatch::new().phase(Phase::Choices));
        Ok(())
    }

    /// Records the chosen choice, acts it out on the stream, and moves on
    /// along the branch it selects.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::UnknownChoice` if `choice_id` is not on offer,
    /// `SessionError::Busy` while another action is running,
    /// `SessionError::NotReady` outside the narrative and choice phases, or
    /// `SessionError::Finished` if the session has ended or failed.
    #[instrument(skip(self), fields(session_id = %self.id))]
    pub async fn choose(&self, choice_id: &str) -> Result<(), SessionError> {
        let _turn = self.take_turn()?;
        let state = self.ensure_active()?;
        Self::ensure_choosing(&state)?;
        let choice = state
            .current_choices
            .iter()
            .find(|c| c.id == choice_id)
            .cloned()
            .ok_or_else(|| SessionError::UnknownChoice(choice_id.to_owned()))?;

        let resolution = {
            let mut store = self.store();
            store.record_choice(state.current_scene_id, &choice);
            store.set_state(SessionPatch::new().phase(Phase::Acting));
            store.next_scene(Some(choice_id))
        };
        info!(choice = %choice.id, tone = %choice.tone, "choice recorded");

        self.stream
            .interact(&choice_interact_prompt(&choice))
            .await;
        self.follow(state.current_scene_id, resolution).await;
        Ok(())
    }

    /// Marks the current scene visited and moves to its successor, or ends
    /// the session on an ending scene.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Busy` while another action is running,
    /// `SessionError::NotReady` outside the narrative and choice phases, or
    /// `SessionError::Finished` if the session has ended or failed.
    #[instrument(skip(self), fields(session_id = %self.id))]
    pub async fn advance(&self) -> Result<(), SessionError> {
        let _turn = self.take_turn()?;
        let state = self.ensure_active()?;
        Self::ensure_choosing(&state)?;
        let resolution = {
            let mut store = self.store();
            store.mark_visited(state.current_scene_id);
            store.next_scene(None)
        };
        self.follow(state.current_scene_id, resolution).await;
        Ok(())
    }

    async fn follow(&self, from: SceneId, resolution: Resolution) {
        if let Some(target) = resolution.advance_target() {
            info!(from = %from, to = %target, "advancing");
            self.transition_to(target).await;
            return;
        }
        match resolution {
            Resolution::Ended => {
                let ending = self.store().compute_ending();
                info!(session_id = %self.id, ending = %ending.id, "session reached its ending");
            }
            Resolution::Unresolved(e) => self.fail(&SessionError::from(e)),
            Resolution::Next(_) | Resolution::Options(_) => {}
        }
    }

    /// Ends the current stream, plays the transition cue, pauses, then loads
    /// `id`.
    #[instrument(skip(self), fields(session_id = %self.id, scene_id = %id))]
    pub async fn transition_to(&self, id: SceneId) {
        self.update(SessionPatch::new().phase(Phase::Transitioning));
        self.stream.end_scene().await;
        self.audio.play_one_shot(&self.config.transition_cue);
        self.sleeper.sleep(self.config.transition_pause).await;
        self.load_scene(id).await;
    }

    /// Sends a free-form interaction to the stream. Returns whether it was
    /// sent; prompts inside the cooldown are dropped.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::EmptyPrompt` for a blank prompt, or
    /// `SessionError::Finished` if the session has ended or failed.
    pub async fn interact(&self, prompt: &str) -> Result<bool, SessionError> {
        self.ensure_active()?;
        let prompt = prompt.trim();
        if prompt.is_empty() {
            return Err(SessionError::EmptyPrompt);
        }
        Ok(self.stream.interact(prompt).await)
    }

    /// Opens the chat overlay with a character in the current scene.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::UnknownNpc` if the character is not in the
    /// scene, or `SessionError::Finished` if the session has ended or failed.
    pub fn open_npc_chat(&self, npc_id: &str) -> Result<(), SessionError> {
        let state = self.ensure_active()?;
        let scene = self.current_scene(&state)?;
        if !scene.npcs.iter().any(|npc| npc == npc_id) {
            return Err(SessionError::UnknownNpc(npc_id.to_owned()));
        }
        self.update(
            SessionPatch::new()
                .phase(Phase::NpcChat)
                .npc_chat(Some(npc_id.to_owned())),
        );
        Ok(())
    }

    /// Closes the chat overlay and returns to the choices.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Finished` if the session has ended or failed.
    pub fn close_npc_chat(&self) -> Result<(), SessionError> {
        let state = self.ensure_active()?;
        if state.npc_chat_open {
            self.update(SessionPatch::new().phase(Phase::Choices).npc_chat(None));
        }
        Ok(())
    }

    /// Sets the master volume, clamped into `0.0..=1.0`, and returns the
    /// value applied.
    pub fn set_volume(&self, level: f32) -> f32 {
        let applied = clamp_volume(level, self.state().volume);
        self.update(SessionPatch::new().volume(applied));
        self.audio.set_volume(applied);
        applied
    }

    /// Saves the resumable part of the session. Returns whether it was
    /// written.
    pub fn save(&self) -> bool {
        self.store().save()
    }

    /// Discards the session and its saved copy, returning to `Boot`.
    pub fn reset(&self) {
        self.store().reset();
    }

    /// The cached anchor image for `id`.
    #[must_use]
    pub fn anchor(&self, id: SceneId) -> Option<Arc<Asset>> {
        self.preloader.get_asset(id)
    }

    /// Detaches the preload, disconnects the stream and stops audio. Only
    /// the first call does anything.
    #[instrument(skip(self), fields(session_id = %self.id))]
    pub async fn teardown(&self) {
        if self.torn_down.swap(true, Ordering::AcqRel) {
            return;
        }
        let task = self.preload_task().take();
        if let Some(task) = task {
            task.detach();
        }
        self.stream.disconnect().await;
        self.audio.stop();
        info!("session torn down");
    }
}
