//! `SessionStore`: the only place session state changes.
//!
//! Every mutation builds a new immutable snapshot, swaps it in and then
//! notifies listeners synchronously with `(new, previous)`. Mutation takes
//! `&mut self`, so a listener cannot call back into the store that is
//! notifying it.

use std::collections::BTreeMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use odyssey_core::id::SceneId;
use odyssey_core::storage::KeyValueStore;
use odyssey_narrative::application::resolver::{Resolution, resolve_next};
use odyssey_narrative::domain::ending::{Ending, classify};
use odyssey_narrative::domain::registry::SceneRegistry;
use odyssey_narrative::domain::scene::Choice;
use tracing::{debug, error, info, warn};

use crate::domain::phase::Phase;
use crate::domain::state::{
    ChoiceRecord, PersistedSession, SessionPatch, SessionState, clamp_volume,
};

/// Key the resumable subset is stored under.
pub const SAVE_KEY: &str = "odyssey_save";

/// Error a listener may report. It is logged and otherwise ignored.
pub type ListenerError = Box<dyn std::error::Error + Send + Sync>;

type Listener = Box<dyn FnMut(&SessionState, &SessionState) -> Result<(), ListenerError> + Send>;

/// Handle returned by [`SessionStore::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriptionId(u64);

/// Owns one session's state and its observers.
pub struct SessionStore {
    registry: Arc<SceneRegistry>,
    storage: Arc<dyn KeyValueStore>,
    state: Arc<SessionState>,
    listeners: BTreeMap<SubscriptionId, Listener>,
    next_subscription: u64,
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("state", &self.state)
            .field("listeners", &self.listeners.len())
            .finish_non_exhaustive()
    }
}

impl SessionStore {
    /// Creates a store holding a fresh default session.
    #[must_use]
    pub fn new(registry: Arc<SceneRegistry>, storage: Arc<dyn KeyValueStore>) -> Self {
        Self {
            registry,
            storage,
            state: Arc::new(SessionState::default()),
            listeners: BTreeMap::new(),
            next_subscription: 0,
        }
    }

    /// The scene registry this session plays through.
    #[must_use]
    pub fn registry(&self) -> &Arc<SceneRegistry> {
        &self.registry
    }

    /// The current snapshot.
    #[must_use]
    pub fn get_state(&self) -> Arc<SessionState> {
        Arc::clone(&self.state)
    }

    /// Registers `listener`; it is called after every change with
    /// `(new, previous)`, after all earlier subscribers. A listener that
    /// returns an error or panics is logged and skipped; the change and the
    /// remaining listeners go ahead.
    pub fn subscribe<F>(&mut self, listener: F) -> SubscriptionId
    where
        F: FnMut(&SessionState, &SessionState) -> Result<(), ListenerError> + Send + 'static,
    {
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;
        self.listeners.insert(id, Box::new(listener));
        id
    }

    /// Removes a listener. Returns whether it was registered.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.listeners.remove(&id).is_some()
    }

    /// Merges `patch` into the state and notifies listeners.
    ///
    /// A patch naming an unregistered scene is not applied; the session
    /// moves to `Error` instead. Phase moves outside the session graph are
    /// applied but logged.
    pub fn set_state(&mut self, patch: SessionPatch) {
        if let Some(id) = patch.current_scene_id {
            if !self.registry.contains(id) {
                warn!(scene_id = %id, "rejected patch to unregistered scene");
                let failed = SessionPatch::new()
                    .fail(format!("scene {id} is not registered"))
                    .apply_to(&self.state);
                self.commit(failed);
                return;
            }
        }

        if let Some(phase) = patch.phase {
            let from = self.state.phase;
            if !from.can_transition_to(phase) {
                warn!(%from, to = %phase, "phase transition outside the session graph");
            }
        }

        let next = patch.apply_to(&self.state);
        self.commit(next);
    }

    /// Replaces the state with a fresh default and removes the saved record.
    pub fn reset(&mut self) {
        if let Err(e) = self.storage.remove(SAVE_KEY) {
            warn!(error = %e, "failed to remove saved session");
        }
        info!("session reset");
        self.commit(SessionState::default());
    }

    /// Writes the resumable subset to durable storage. Returns whether the
    /// write succeeded; failures are logged.
    pub fn save(&self) -> bool {
        let record = PersistedSession::from(self.state.as_ref());
        let json = match serde_json::to_string(&record) {
            Ok(json) => json,
            Err(e) => {
                warn!(error = %e, "failed to encode session");
                return false;
            }
        };
        match self.storage.set(SAVE_KEY, &json) {
            Ok(()) => {
                debug!(scene_id = %record.current_scene_id, "session saved");
                true
            }
            Err(e) => {
                warn!(error = %e, "failed to save session");
                false
            }
        }
    }

    /// Restores the resumable subset from durable storage, replacing the
    /// current scene, visited set, history and volume. Returns whether a
    /// usable record was found and applied.
    pub fn load(&mut self) -> bool {
        let raw = match self.storage.get(SAVE_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return false,
            Err(e) => {
                warn!(error = %e, "failed to read saved session");
                return false;
            }
        };
        let record: PersistedSession = match serde_json::from_str(&raw) {
            Ok(record) => record,
            Err(e) => {
                warn!(error = %e, "saved session is corrupt");
                return false;
            }
        };
        if !self.registry.contains(record.current_scene_id) {
            warn!(scene_id = %record.current_scene_id, "saved session points at an unregistered scene");
            return false;
        }

        let mut next = self.state.as_ref().clone();
        next.current_scene_id = record.current_scene_id;
        next.visited_scenes = record.visited_scenes.into_iter().collect();
        next.choice_history = record.choice_history;
        next.volume = clamp_volume(record.volume, next.volume);
        info!(scene_id = %next.current_scene_id, "session restored");
        self.commit(next);
        true
    }

    /// Appends `choice` to the history and marks `scene_id` visited.
    pub fn record_choice(&mut self, scene_id: SceneId, choice: &Choice) {
        let mut next = self.state.as_ref().clone();
        next.choice_history.push(ChoiceRecord::new(scene_id, choice));
        next.visited_scenes.insert(scene_id);
        self.commit(next);
    }

    /// Adds `id` to the visited set.
    pub fn mark_visited(&mut self, id: SceneId) {
        if self.state.visited_scenes.contains(&id) {
            return;
        }
        self.set_state(SessionPatch::new().visit(id));
    }

    /// Resolves the successor of the current scene.
    #[must_use]
    pub fn next_scene(&self, choice_id: Option<&str>) -> Resolution {
        resolve_next(
            &self.registry,
            self.state.current_scene_id,
            choice_id,
            &self.state.visited_scenes,
        )
    }

    /// Classifies the history, stores the ending and moves to `Ending`.
    /// Once stored, the ending is returned unchanged by later calls.
    pub fn compute_ending(&mut self) -> Ending {
        if let Some(ending) = &self.state.ending {
            return ending.clone();
        }
        let ending = classify(&self.state.choice_history);
        info!(ending = %ending.id, choices = self.state.choice_history.len(), "session ended");

        let mut next = self.state.as_ref().clone();
        next.ending = Some(ending.clone());
        next.phase = Phase::Ending;
        self.commit(next);
        ending
    }

    fn commit(&mut self, next: SessionState) {
        let previous = std::mem::replace(&mut self.state, Arc::new(next));
        for (id, listener) in &mut self.listeners {
            let current = self.state.as_ref();
            match catch_unwind(AssertUnwindSafe(|| listener(current, previous.as_ref()))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!(subscription = id.0, error = %e, "session listener failed"),
                Err(_) => error!(subscription = id.0, "session listener panicked"),
            }
        }
    }
}
