//! Session error types.

use odyssey_core::error::StreamError;
use odyssey_core::id::SceneId;
use odyssey_narrative::application::resolver::TransitionError;
use odyssey_session::domain::phase::Phase;
use thiserror::Error;

/// Errors raised while driving a session.
///
/// Fatal variants never reach callers: the director records them on the
/// session (phase `Error`, with the message) instead. Callers only see the
/// request-level variants.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// The choice is not among the ones on offer.
    #[error("choice {0:?} is not on offer")]
    UnknownChoice(String),

    /// The character is not present in the current scene.
    #[error("character {0:?} is not in this scene")]
    UnknownNpc(String),

    /// An interaction prompt was blank.
    #[error("interaction prompt is empty")]
    EmptyPrompt,

    /// Another action on the session is still running.
    #[error("session is busy with another action")]
    Busy,

    /// The action is not available in the current phase.
    #[error("action not available in phase {0}")]
    NotReady(Phase),

    /// The session has ended or failed and only accepts a reset.
    #[error("session is finished (phase {0})")]
    Finished(Phase),

    /// The live stream failed.
    #[error(transparent)]
    Stream(#[from] StreamError),

    /// The scene graph could not produce a successor.
    #[error(transparent)]
    Transition(#[from] TransitionError),

    /// A scene id does not exist.
    #[error("scene {0} is not registered")]
    UnknownScene(SceneId),
}

impl SessionError {
    /// Whether the error ends the session rather than rejecting one request.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Stream(_) | Self::Transition(_) | Self::UnknownScene(_)
        )
    }
}
