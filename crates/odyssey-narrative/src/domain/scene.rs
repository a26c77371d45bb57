//! Scene descriptors.

use std::collections::BTreeMap;
use std::fmt;

use odyssey_core::id::SceneId;
use serde::{Deserialize, Serialize};

/// Categorical tag attached to a player choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tone {
    /// Careful, methodical.
    Cautious,
    /// Decisive, risk-taking.
    Bold,
    /// Unexpected, lateral.
    Creative,
}

impl Tone {
    /// All tones, in declaration order.
    pub const ALL: [Tone; 3] = [Tone::Cautious, Tone::Bold, Tone::Creative];

    /// The lowercase wire name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Tone::Cautious => "cautious",
            Tone::Bold => "bold",
            Tone::Creative => "creative",
        }
    }
}

impl fmt::Display for Tone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A choice offered to the player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Choice {
    /// Short kebab-case identifier; branch transitions key on it.
    pub id: String,
    /// Player-facing text.
    pub text: String,
    /// Tone used for ending classification.
    pub tone: Tone,
}

/// Camera framing used when composing anchor image prompts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Camera {
    /// Ultra-wide, deep depth of field.
    #[default]
    Establishing,
    /// Eye-level medium shot.
    Medium,
    /// Shallow-focus close-up.
    Close,
    /// First-person perspective.
    Pov,
    /// Low-angle dramatic shot.
    Dramatic,
}

/// The rule that determines a scene's successor(s).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Transition {
    /// Always continue to `next`.
    Linear {
        /// The successor scene.
        next: SceneId,
    },
    /// Continue to the scene keyed by the chosen choice id.
    Branch {
        /// Choice id to successor scene.
        options: BTreeMap<String, SceneId>,
    },
    /// Explore `pool` in any order; `then` unlocks after `min_visits`.
    Visit {
        /// Scenes that may be visited in any order.
        pool: Vec<SceneId>,
        /// Pool scenes that must be visited before `then` is offered.
        min_visits: usize,
        /// The scene that follows the pool.
        then: SceneId,
    },
    /// Terminal scene.
    Ending,
}

impl Transition {
    /// Every scene this transition can lead to.
    #[must_use]
    pub fn targets(&self) -> Vec<SceneId> {
        match self {
            Transition::Linear { next } => vec![*next],
            Transition::Branch { options } => options.values().copied().collect(),
            Transition::Visit { pool, then, .. } => {
                pool.iter().copied().chain(std::iter::once(*then)).collect()
            }
            Transition::Ending => Vec::new(),
        }
    }
}

/// An immutable, statically registered scene.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scene {
    /// Dense identifier.
    pub id: SceneId,
    /// Display name.
    pub name: String,
    /// Display subtitle.
    pub subtitle: String,
    /// Description used for the anchor image.
    pub anchor_image_prompt: String,
    /// Stative description used for the live stream.
    pub stream_context: String,
    /// Context used for narrative generation and as fallback narrative.
    pub narrative_context: String,
    /// Guidance used for choice generation.
    pub choice_context: String,
    /// Anchor image framing.
    #[serde(default)]
    pub camera: Camera,
    /// Characters present in the scene.
    #[serde(default)]
    pub npcs: Vec<String>,
    /// Ambient audio tag.
    pub audio_type: String,
    /// Static choices used when generation fails. Empty, or exactly three.
    #[serde(default)]
    pub fallback_choices: Vec<Choice>,
    /// Successor rule.
    pub transition: Transition,
}

impl Scene {
    /// Whether the scene ends the session.
    #[must_use]
    pub fn is_ending(&self) -> bool {
        matches!(self.transition, Transition::Ending)
    }
}
