//! Transition resolution.
//!
//! `resolve_next` is pure with respect to the registry; the visited set is
//! its only varying input.
//!
//! Visit pools follow an advance-to-last rule. Below the minimum the result
//! lists only the unvisited pool scenes. Once the minimum is met the pool's
//! `then` scene is appended after any unvisited pool scenes. A caller that
//! moves on always takes the last element, so `then` is chosen as soon as it
//! is offered, while the earlier entries remain available to a presentation
//! layer that lets the player keep exploring.

use std::collections::BTreeSet;

use odyssey_core::id::SceneId;
use thiserror::Error;

use crate::domain::registry::SceneRegistry;
use crate::domain::scene::Transition;

/// Why a transition could not be resolved.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    /// The current scene is not registered.
    #[error("scene {0} is not registered")]
    UnknownScene(SceneId),

    /// A branch was resolved without a choice.
    #[error("scene {scene} branches on a choice, but none was given")]
    MissingChoice {
        /// The branching scene.
        scene: SceneId,
    },

    /// A branch was resolved with a choice it does not offer.
    #[error("scene {scene} has no branch for choice {choice_id:?}")]
    UnknownChoice {
        /// The branching scene.
        scene: SceneId,
        /// The unmatched choice id.
        choice_id: String,
    },

    /// A visit pool produced no candidates.
    #[error("scene {0} has an empty visit pool")]
    EmptyPool(SceneId),
}

/// The outcome of resolving a transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// A single successor.
    Next(SceneId),
    /// Candidate successors from a visit pool; advance to the last one.
    Options(Vec<SceneId>),
    /// The current scene ends the session.
    Ended,
    /// Resolution failed; this is an error, never an ending.
    Unresolved(TransitionError),
}

impl Resolution {
    /// The scene a caller moving on should advance to: the single successor,
    /// or the last of several candidates. `None` for `Ended` and `Unresolved`.
    #[must_use]
    pub fn advance_target(&self) -> Option<SceneId> {
        match self {
            Resolution::Next(id) => Some(*id),
            Resolution::Options(ids) => ids.last().copied(),
            Resolution::Ended | Resolution::Unresolved(_) => None,
        }
    }
}

/// Computes the successor(s) of `current`.
///
/// `choice_id` is only consulted for branch transitions.
#[must_use]
pub fn resolve_next(
    registry: &SceneRegistry,
    current: SceneId,
    choice_id: Option<&str>,
    visited: &BTreeSet<SceneId>,
) -> Resolution {
    let Some(scene) = registry.get(current) else {
        return Resolution::Unresolved(TransitionError::UnknownScene(current));
    };

    match &scene.transition {
        Transition::Linear { next } => Resolution::Next(*next),
        Transition::Branch { options } => {
            let Some(choice_id) = choice_id else {
                return Resolution::Unresolved(TransitionError::MissingChoice { scene: current });
            };
            match options.get(choice_id) {
                Some(next) => Resolution::Next(*next),
                None => Resolution::Unresolved(TransitionError::UnknownChoice {
                    scene: current,
                    choice_id: choice_id.to_owned(),
                }),
            }
        }
        Transition::Visit {
            pool,
            min_visits,
            then,
        } => {
            let candidates = visit_candidates(pool, *min_visits, *then, visited);
            if candidates.is_empty() {
                Resolution::Unresolved(TransitionError::EmptyPool(current))
            } else {
                Resolution::Options(candidates)
            }
        }
        Transition::Ending => Resolution::Ended,
    }
}

fn visit_candidates(
    pool: &[SceneId],
    min_visits: usize,
    then: SceneId,
    visited: &BTreeSet<SceneId>,
) -> Vec<SceneId> {
    let seen = pool.iter().filter(|id| visited.contains(id)).count();
    let mut remaining: Vec<SceneId> = pool
        .iter()
        .copied()
        .filter(|id| !visited.contains(id))
        .collect();

    if seen >= min_visits {
        remaining.push(then);
    }
    remaining
}
