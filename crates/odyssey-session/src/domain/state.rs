//! The session record, partial updates to it, and its persisted subset.

use std::collections::BTreeSet;

use odyssey_core::id::SceneId;
use odyssey_narrative::domain::ending::{Ending, Toned};
use odyssey_narrative::domain::scene::{Choice, Tone};
use serde::{Deserialize, Serialize};

use super::phase::Phase;

/// Volume used by fresh and restored sessions when none is stored.
pub const DEFAULT_VOLUME: f32 = 0.7;

/// A choice the player made, as recorded in the history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChoiceRecord {
    /// Scene the choice was made in.
    pub scene_id: SceneId,
    /// Id of the chosen choice.
    pub choice_id: String,
    /// Text shown to the player.
    pub text: String,
    /// Tone of the choice.
    pub tone: Tone,
}

impl ChoiceRecord {
    /// Records `choice` as made in `scene_id`.
    #[must_use]
    pub fn new(scene_id: SceneId, choice: &Choice) -> Self {
        Self {
            scene_id,
            choice_id: choice.id.clone(),
            text: choice.text.clone(),
            tone: choice.tone,
        }
    }
}

impl Toned for ChoiceRecord {
    fn tone(&self) -> Tone {
        self.tone
    }
}

/// The full session record. Snapshots are immutable; every change produces
/// a new record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionState {
    /// Lifecycle phase.
    pub phase: Phase,
    /// The scene being played. Always registered.
    pub current_scene_id: SceneId,
    /// Scenes entered so far. Only grows until a reset or restore.
    pub visited_scenes: BTreeSet<SceneId>,
    /// Choices made so far, oldest first.
    pub choice_history: Vec<ChoiceRecord>,
    /// Narrative text of the current scene.
    pub current_narrative: String,
    /// Choices on offer in the current scene.
    pub current_choices: Vec<Choice>,
    /// Master volume in `0.0..=1.0`.
    pub volume: f32,
    /// Message describing the failure that moved the session to `Error`.
    pub error: Option<String>,
    /// Set once the session ends; never changed afterwards.
    pub ending: Option<Ending>,
    /// Whether the character chat overlay is open.
    pub npc_chat_open: bool,
    /// Character the overlay is talking to.
    pub active_npc_id: Option<String>,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            phase: Phase::Boot,
            current_scene_id: SceneId(0),
            visited_scenes: BTreeSet::new(),
            choice_history: Vec::new(),
            current_narrative: String::new(),
            current_choices: Vec::new(),
            volume: DEFAULT_VOLUME,
            error: None,
            ending: None,
            npc_chat_open: false,
            active_npc_id: None,
        }
    }
}

/// A partial update. Only the fields that are set are applied.
///
/// `visited` is merged into the visited set rather than replacing it. The
/// choice history and the ending have no patch field: they change only
/// through the store's `record_choice` and `compute_ending`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionPatch {
    /// New phase.
    pub phase: Option<Phase>,
    /// New current scene. Must be registered.
    pub current_scene_id: Option<SceneId>,
    /// Scenes to add to the visited set.
    pub visited: Option<BTreeSet<SceneId>>,
    /// New narrative text.
    pub current_narrative: Option<String>,
    /// New choices on offer.
    pub current_choices: Option<Vec<Choice>>,
    /// New volume; clamped into range.
    pub volume: Option<f32>,
    /// New error message, or `Some(None)` to clear it.
    pub error: Option<Option<String>>,
    /// Open or close the chat overlay.
    pub npc_chat_open: Option<bool>,
    /// New chat partner, or `Some(None)` to clear it.
    pub active_npc_id: Option<Option<String>>,
}

impl SessionPatch {
    /// An empty patch.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the phase.
    #[must_use]
    pub fn phase(mut self, phase: Phase) -> Self {
        self.phase = Some(phase);
        self
    }

    /// Sets the current scene.
    #[must_use]
    pub fn scene(mut self, id: SceneId) -> Self {
        self.current_scene_id = Some(id);
        self
    }

    /// Adds `id` to the visited set.
    #[must_use]
    pub fn visit(mut self, id: SceneId) -> Self {
        self.visited.get_or_insert_with(BTreeSet::new).insert(id);
        self
    }

    /// Sets the narrative text.
    #[must_use]
    pub fn narrative(mut self, text: impl Into<String>) -> Self {
        self.current_narrative = Some(text.into());
        self
    }

    /// Sets the choices on offer.
    #[must_use]
    pub fn choices(mut self, choices: Vec<Choice>) -> Self {
        self.current_choices = Some(choices);
        self
    }

    /// Sets the volume.
    #[must_use]
    pub fn volume(mut self, level: f32) -> Self {
        self.volume = Some(level);
        self
    }

    /// Moves to `Error` with `message`.
    #[must_use]
    pub fn fail(mut self, message: impl Into<String>) -> Self {
        self.phase = Some(Phase::Error);
        self.error = Some(Some(message.into()));
        self
    }

    /// Opens the chat overlay with `npc_id`, or closes it when `None`.
    #[must_use]
    pub fn npc_chat(mut self, npc_id: Option<String>) -> Self {
        self.npc_chat_open = Some(npc_id.is_some());
        self.active_npc_id = Some(npc_id);
        self
    }

    /// Applies the patch to a copy of `state`.
    ///
    /// The caller is responsible for checking that a new scene id is
    /// registered before applying.
    #[must_use]
    pub fn apply_to(self, state: &SessionState) -> SessionState {
        let mut next = state.clone();
        if let Some(phase) = self.phase {
            next.phase = phase;
        }
        if let Some(id) = self.current_scene_id {
            next.current_scene_id = id;
        }
        if let Some(visited) = self.visited {
            next.visited_scenes.extend(visited);
        }
        if let Some(text) = self.current_narrative {
            next.current_narrative = text;
        }
        if let Some(choices) = self.current_choices {
            next.current_choices = choices;
        }
        if let Some(level) = self.volume {
            next.volume = clamp_volume(level, state.volume);
        }
        if let Some(error) = self.error {
            next.error = error;
        }
        if let Some(open) = self.npc_chat_open {
            next.npc_chat_open = open;
        }
        if let Some(npc) = self.active_npc_id {
            next.active_npc_id = npc;
        }
        next
    }
}

/// Clamps `level` into `0.0..=1.0`, keeping `fallback` for non-finite input.
#[must_use]
pub fn clamp_volume(level: f32, fallback: f32) -> f32 {
    if level.is_finite() {
        level.clamp(0.0, 1.0)
    } else {
        fallback
    }
}

/// The resumable subset of a session, as stored under the save key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PersistedSession {
    /// Scene to resume at.
    pub current_scene_id: SceneId,
    /// Visited scenes.
    pub visited_scenes: Vec<SceneId>,
    /// Choice history.
    pub choice_history: Vec<ChoiceRecord>,
    /// Master volume.
    pub volume: f32,
}

impl Default for PersistedSession {
    fn default() -> Self {
        Self {
            current_scene_id: SceneId(0),
            visited_scenes: Vec::new(),
            choice_history: Vec::new(),
            volume: DEFAULT_VOLUME,
        }
    }
}

impl From<&SessionState> for PersistedSession {
    fn from(state: &SessionState) -> Self {
        Self {
            current_scene_id: state.current_scene_id,
            visited_scenes: state.visited_scenes.iter().copied().collect(),
            choice_history: state.choice_history.clone(),
            volume: state.volume,
        }
    }
}
