//! Session phases and the moves between them.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Where a session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Phase {
    /// Fresh session, nothing started.
    #[default]
    Boot,
    /// Anchor images are being fetched.
    Preloading,
    /// At least one anchor is cached; the session can begin.
    SceneReady,
    /// The live stream is being established.
    Connecting,
    /// A scene is being set up.
    SceneLoading,
    /// Narrative for the current scene is being shown.
    Narrative,
    /// The player is choosing.
    Choices,
    /// The player's choice is being acted out.
    Acting,
    /// Moving to the next scene.
    Transitioning,
    /// Overlay conversation with a scene character.
    NpcChat,
    /// The session has finished.
    Ending,
    /// Something failed; only a reset leaves this phase.
    Error,
}

impl Phase {
    /// Whether moving from `self` to `next` follows the session graph.
    ///
    /// Staying in the same phase is always allowed and `Error` is reachable
    /// from anywhere. Nothing leaves `Error` except a reset, which does not
    /// go through this check.
    #[must_use]
    pub fn can_transition_to(self, next: Phase) -> bool {
        use Phase::{
            Acting, Boot, Choices, Connecting, Ending, Error, Narrative, NpcChat, Preloading,
            SceneLoading, SceneReady, Transitioning,
        };

        if self == next || next == Error {
            return true;
        }
        matches!(
            (self, next),
            (Boot, Preloading | Connecting)
                | (Preloading, SceneReady | Connecting)
                | (SceneReady, Connecting)
                | (Connecting, SceneLoading)
                | (SceneLoading, Narrative)
                | (Narrative, Choices | Ending)
                | (Choices, Acting | Transitioning | NpcChat | Ending)
                | (NpcChat, Choices)
                | (Acting, Transitioning | Ending)
                | (Transitioning, SceneLoading)
        )
    }

    /// The wire name, e.g. `SCENE_READY`.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Boot => "BOOT",
            Phase::Preloading => "PRELOADING",
            Phase::SceneReady => "SCENE_READY",
            Phase::Connecting => "CONNECTING",
            Phase::SceneLoading => "SCENE_LOADING",
            Phase::Narrative => "NARRATIVE",
            Phase::Choices => "CHOICES",
            Phase::Acting => "ACTING",
            Phase::Transitioning => "TRANSITIONING",
            Phase::NpcChat => "NPC_CHAT",
            Phase::Ending => "ENDING",
            Phase::Error => "ERROR",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
