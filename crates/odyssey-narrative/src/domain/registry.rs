//! The static scene registry.

use odyssey_core::id::SceneId;
use thiserror::Error;
use tracing::debug;

use super::scene::{Scene, Transition};

const BUILTIN_SCENES: &str = include_str!("../../data/scenes.yaml");

/// Errors raised while loading or validating a registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// The source document could not be parsed.
    #[error("scene registry parse error: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// The registry contains no scenes.
    #[error("scene registry is empty")]
    Empty,

    /// Scene ids are not dense and in order.
    #[error("scene at position {position} has id {found}")]
    OutOfOrder {
        /// Index in the source list.
        position: usize,
        /// The id found there.
        found: SceneId,
    },

    /// A transition points at a scene that is not registered.
    #[error("scene {scene} transitions to unregistered scene {target}")]
    DanglingTarget {
        /// The scene owning the transition.
        scene: SceneId,
        /// The missing target.
        target: SceneId,
    },

    /// A visit transition is unsatisfiable.
    #[error("scene {scene} has an invalid visit pool: {reason}")]
    InvalidVisitPool {
        /// The scene owning the transition.
        scene: SceneId,
        /// What was wrong.
        reason: String,
    },

    /// A scene declares fallback choices, but not exactly three.
    #[error("scene {scene} declares {count} fallback choices, expected 3")]
    FallbackChoiceCount {
        /// The offending scene.
        scene: SceneId,
        /// How many were declared.
        count: usize,
    },
}

/// Immutable registry of scenes, indexed by dense id.
#[derive(Debug, Clone)]
pub struct SceneRegistry {
    scenes: Vec<Scene>,
}

impl SceneRegistry {
    /// Loads the built-in scene graph.
    ///
    /// # Errors
    ///
    /// Returns `RegistryError` if the embedded document is invalid.
    pub fn builtin() -> Result<Self, RegistryError> {
        Self::from_yaml(BUILTIN_SCENES)
    }

    /// Parses and validates a YAML list of scenes.
    ///
    /// # Errors
    ///
    /// Returns `RegistryError::Parse` for malformed YAML and the other
    /// variants for structural violations.
    pub fn from_yaml(source: &str) -> Result<Self, RegistryError> {
        let scenes: Vec<Scene> = serde_yaml::from_str(source)?;
        Self::new(scenes)
    }

    /// Validates an in-memory scene list.
    ///
    /// # Errors
    ///
    /// Returns `RegistryError` if ids are not dense, a transition target is
    /// unregistered, a visit pool is unsatisfiable, or a scene declares other
    /// than three fallback choices.
    pub fn new(scenes: Vec<Scene>) -> Result<Self, RegistryError> {
        if scenes.is_empty() {
            return Err(RegistryError::Empty);
        }

        for (position, scene) in scenes.iter().enumerate() {
            if scene.id.index() != position {
                return Err(RegistryError::OutOfOrder {
                    position,
                    found: scene.id,
                });
            }
        }

        for scene in &scenes {
            if let Some(target) = scene
                .transition
                .targets()
                .into_iter()
                .find(|t| t.index() >= scenes.len())
            {
                return Err(RegistryError::DanglingTarget {
                    scene: scene.id,
                    target,
                });
            }

            if let Transition::Visit {
                pool, min_visits, ..
            } = &scene.transition
            {
                if pool.is_empty() {
                    return Err(RegistryError::InvalidVisitPool {
                        scene: scene.id,
                        reason: "pool is empty".into(),
                    });
                }
                if *min_visits > pool.len() {
                    return Err(RegistryError::InvalidVisitPool {
                        scene: scene.id,
                        reason: format!(
                            "min_visits {min_visits} exceeds pool size {}",
                            pool.len()
                        ),
                    });
                }
            }

            let count = scene.fallback_choices.len();
            if count != 0 && count != 3 {
                return Err(RegistryError::FallbackChoiceCount {
                    scene: scene.id,
                    count,
                });
            }
        }

        debug!(scene_count = scenes.len(), "scene registry loaded");
        Ok(Self { scenes })
    }

    /// Returns the scene with `id`, if registered.
    #[must_use]
    pub fn get(&self, id: SceneId) -> Option<&Scene> {
        self.scenes.get(id.index())
    }

    /// Whether `id` refers to a registered scene.
    #[must_use]
    pub fn contains(&self, id: SceneId) -> bool {
        id.index() < self.scenes.len()
    }

    /// Number of registered scenes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.scenes.len()
    }

    /// Always false: an empty registry fails validation.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.scenes.is_empty()
    }

    /// All registered ids, ascending.
    pub fn ids(&self) -> impl Iterator<Item = SceneId> + '_ {
        self.scenes.iter().map(|s| s.id)
    }

    /// All scenes, in id order.
    pub fn scenes(&self) -> impl Iterator<Item = &Scene> {
        self.scenes.iter()
    }

    /// The entry scene of every session.
    #[must_use]
    pub fn first(&self) -> SceneId {
        SceneId(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal(transition_yaml: &str) -> String {
        format!(
            "- id: 0\n  name: a\n  subtitle: b\n  anchor_image_prompt: c\n  stream_context: d\n  narrative_context: e\n  choice_context: f\n  audio_type: g\n  transition:\n{transition_yaml}"
        )
    }

    #[test]
    fn test_builtin_registry_loads_eleven_scenes() {
        let registry = SceneRegistry::builtin().unwrap();

        assert_eq!(registry.len(), 11);
        assert_eq!(registry.get(SceneId(0)).unwrap().name, "The Bridge");
        assert!(registry.get(SceneId(10)).unwrap().is_ending());
        assert!(registry.get(SceneId(11)).is_none());
    }

    #[test]
    fn test_builtin_hub_branches_to_the_three_outposts() {
        let registry = SceneRegistry::builtin().unwrap();

        let hub = registry.get(SceneId(4)).unwrap();

        match &hub.transition {
            Transition::Branch { options } => {
                assert_eq!(options.get("goto-moon"), Some(&SceneId(5)));
                assert_eq!(options.get("goto-mars"), Some(&SceneId(6)));
                assert_eq!(options.get("goto-asteroid"), Some(&SceneId(7)));
            }
            other => panic!("expected Branch, got {other:?}"),
        }
    }

    #[test]
    fn test_builtin_scenes_all_have_three_fallback_choices() {
        let registry = SceneRegistry::builtin().unwrap();

        assert!(registry.scenes().all(|s| s.fallback_choices.len() == 3));
    }

    #[test]
    fn test_single_ending_scene_is_valid() {
        let registry = SceneRegistry::from_yaml(&minimal("    type: ending\n")).unwrap();

        assert_eq!(registry.len(), 1);
        assert!(registry.contains(SceneId(0)));
        assert!(!registry.contains(SceneId(1)));
    }

    #[test]
    fn test_dangling_target_is_rejected() {
        let result = SceneRegistry::from_yaml(&minimal("    type: linear\n    next: 3\n"));

        match result {
            Err(RegistryError::DanglingTarget { scene, target }) => {
                assert_eq!(scene, SceneId(0));
                assert_eq!(target, SceneId(3));
            }
            other => panic!("expected DanglingTarget, got {other:?}"),
        }
    }

    #[test]
    fn test_unsatisfiable_visit_pool_is_rejected() {
        let result = SceneRegistry::from_yaml(&minimal(
            "    type: visit\n    pool: [0]\n    min_visits: 2\n    then: 0\n",
        ));

        assert!(matches!(
            result,
            Err(RegistryError::InvalidVisitPool { .. })
        ));
    }

    #[test]
    fn test_out_of_order_ids_are_rejected() {
        let yaml = minimal("    type: ending\n").replace("id: 0", "id: 2");

        let result = SceneRegistry::from_yaml(&yaml);

        assert!(matches!(
            result,
            Err(RegistryError::OutOfOrder { position: 0, .. })
        ));
    }

    #[test]
    fn test_wrong_fallback_choice_count_is_rejected() {
        let yaml = minimal("    type: ending\n").replace(
            "  audio_type: g\n",
            "  audio_type: g\n  fallback_choices:\n    - { id: x, text: y, tone: bold }\n",
        );

        let result = SceneRegistry::from_yaml(&yaml);

        assert!(matches!(
            result,
            Err(RegistryError::FallbackChoiceCount { count: 1, .. })
        ));
    }

    #[test]
    fn test_empty_registry_is_rejected() {
        assert!(matches!(
            SceneRegistry::from_yaml("[]"),
            Err(RegistryError::Empty)
        ));
    }
}
