//! Prompt composition for the generation and stream collaborators, and
//! validation of generated choices.

use odyssey_core::error::GenerationError;

use crate::domain::scene::{Camera, Choice, Scene};

const STYLE_CORE: &str = "Photorealistic cinematic science fiction. Grounded near-future \
    technology with subtle futuristic elements. Volumetric lighting, atmospheric haze, film grain.";

const STYLE_LIGHTING: &str = "Dramatic directional lighting with cool blue-cyan key lights and \
    warm amber fill. Deep shadows with visible light rays through atmospheric dust and vapor.";

const STYLE_PALETTE: &str = "Deep space blacks, steel grays, navy blues. Accent lighting in cyan, \
    teal and warm amber. Holographic displays emit a soft blue-white glow.";

const PROTAGONIST: &str = "Captain Aria Chen";

const PROTAGONIST_APPEARANCE: &str = "A woman in her mid-30s with short black hair and sharp, \
    determined eyes, wearing a fitted dark navy flight suit with subtle cyan piping and an \
    ODYSSEY mission patch on her shoulder.";

/// System prompt for every narrative generation call.
pub const NARRATOR_SYSTEM_PROMPT: &str = "You are the narrator of \"Odyssey to the Stars,\" an \
    interactive cinematic science fiction story. Write in second person present tense, two to \
    four sentences per beat, with rich sensory detail. Never break the fourth wall or reference \
    game mechanics. The protagonist is Captain Aria Chen, captain of the starship Odyssey on \
    humanity's first deep-space exploration mission.";

fn camera_direction(camera: Camera) -> &'static str {
    match camera {
        Camera::Establishing => {
            "Ultra-wide establishing shot, deep depth of field, slight low angle to convey grandeur"
        }
        Camera::Medium => "Medium shot at eye level, moderate depth of field, natural framing",
        Camera::Close => {
            "Close-up with shallow depth of field, intimate framing, subtle lens distortion"
        }
        Camera::Pov => "First-person perspective, slight camera sway, wide field of view",
        Camera::Dramatic => {
            "Low angle dramatic shot, wide lens, exaggerated perspective, strong rim lighting"
        }
    }
}

/// Prompt for a scene's anchor image.
#[must_use]
pub fn image_prompt(scene: &Scene) -> String {
    [
        STYLE_CORE,
        STYLE_LIGHTING,
        STYLE_PALETTE,
        "",
        format!("Scene: {}", scene.anchor_image_prompt).as_str(),
        "",
        format!("Camera: {}", camera_direction(scene.camera)).as_str(),
        "",
        PROTAGONIST_APPEARANCE,
        "The captain is present in the scene.",
        "",
        "Photorealistic, cinematic 16:9 aspect ratio, film grain, anamorphic lens.",
        "No text, no UI overlays, no watermarks.",
    ]
    .join("\n")
}

/// Prompt for the live stream. Every verb in it is continuous ("is
/// drifting"), which the stream collaborator requires.
#[must_use]
pub fn stream_prompt(scene: &Scene) -> String {
    [
        scene.stream_context.as_str(),
        "",
        "The scene is alive with subtle ambient motion.",
        "Atmospheric particles are drifting slowly through beams of light.",
        "The captain is standing and observing the environment.",
        "",
        format!("Visual style: {STYLE_CORE}").as_str(),
    ]
    .join("\n")
}

/// Prompt for a scene's narrative passage.
#[must_use]
pub fn narrative_prompt(scene: &Scene, previous_choice: Option<&str>) -> String {
    let mut lines = vec![
        format!(
            "Generate a short narrative passage (2-4 sentences) for the scene \"{}\".",
            scene.name
        ),
        format!("Context: {}", scene.narrative_context),
    ];
    if let Some(choice) = previous_choice {
        lines.push(format!(
            "The player just chose: \"{choice}\". Acknowledge this choice naturally in the opening line."
        ));
    }
    lines.push(String::new());
    lines.push(format!(
        "Focus on what {PROTAGONIST} sees, hears, and feels in this moment."
    ));
    lines.push("Return ONLY the narrative text, no labels or formatting.".to_owned());
    lines.join("\n")
}

/// Prompt asking for exactly three JSON choices.
#[must_use]
pub fn choices_prompt(scene: &Scene) -> String {
    [
        format!(
            "Based on the current scene \"{}\", generate exactly 3 choices for the player.",
            scene.name
        ),
        String::new(),
        format!("Scene context: {}", scene.narrative_context),
        format!("Choice guidance: {}", scene.choice_context),
        String::new(),
        "Return a JSON array of 3 objects with fields \"id\" (short kebab-case), \"text\" \
         (8-15 words, second person, action-oriented) and \"tone\" (one of \"cautious\", \
         \"bold\", \"creative\")."
            .to_owned(),
        "Return ONLY valid JSON, no markdown fences.".to_owned(),
    ]
    .join("\n")
}

/// Stream interaction prompt for a choice the player just made.
#[must_use]
pub fn choice_interact_prompt(choice: &Choice) -> String {
    format!(
        "The captain is acting on a decision: {}. The surroundings are responding with subtle motion.",
        choice.text.trim_end_matches('.')
    )
}

/// Validates a structured generator response as exactly three choices.
///
/// A string payload is treated as JSON text and has surrounding markdown
/// code fences stripped first.
///
/// # Errors
///
/// Returns `GenerationError::Parse` if the payload is not an array of three
/// objects with non-empty `id` and `text` and a known `tone`.
pub fn parse_choices(value: serde_json::Value) -> Result<Vec<Choice>, GenerationError> {
    let value = match value {
        serde_json::Value::String(text) => serde_json::from_str(strip_fences(&text))
            .map_err(|e| GenerationError::Parse(format!("choices are not JSON: {e}")))?,
        other => other,
    };

    let choices: Vec<Choice> = serde_json::from_value(value)
        .map_err(|e| GenerationError::Parse(format!("invalid choice list: {e}")))?;

    if choices.len() != 3 {
        return Err(GenerationError::Parse(format!(
            "expected 3 choices, got {}",
            choices.len()
        )));
    }
    if let Some(bad) = choices
        .iter()
        .find(|c| c.id.trim().is_empty() || c.text.trim().is_empty())
    {
        return Err(GenerationError::Parse(format!(
            "choice is missing an id or text: {bad:?}"
        )));
    }
    Ok(choices)
}

fn strip_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest
        .strip_prefix("json")
        .or_else(|| rest.strip_prefix("JSON"))
        .unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::registry::SceneRegistry;
    use crate::domain::scene::Tone;
    use odyssey_core::id::SceneId;
    use serde_json::json;

    fn scene(id: u32) -> Scene {
        SceneRegistry::builtin()
            .unwrap()
            .get(SceneId(id))
            .unwrap()
            .clone()
    }

    #[test]
    fn test_image_prompt_includes_scene_and_camera() {
        let bridge = scene(0);

        let prompt = image_prompt(&bridge);

        assert!(prompt.contains(&bridge.anchor_image_prompt));
        assert!(prompt.contains("Medium shot at eye level"));
    }

    #[test]
    fn test_image_prompts_differ_per_scene() {
        assert_ne!(image_prompt(&scene(0)), image_prompt(&scene(1)));
    }

    #[test]
    fn test_narrative_prompt_mentions_previous_choice_only_when_given() {
        let bridge = scene(0);

        let fresh = narrative_prompt(&bridge, None);
        let follow_up = narrative_prompt(&bridge, Some("Engage the engines"));

        assert!(!fresh.contains("The player just chose"));
        assert!(follow_up.contains("\"Engage the engines\""));
    }

    #[test]
    fn test_parse_choices_accepts_three_valid_choices() {
        let value = json!([
            { "id": "a", "text": "Do a", "tone": "cautious" },
            { "id": "b", "text": "Do b", "tone": "bold" },
            { "id": "c", "text": "Do c", "tone": "creative" },
        ]);

        let choices = parse_choices(value).unwrap();

        assert_eq!(choices.len(), 3);
        assert_eq!(choices[1].tone, Tone::Bold);
    }

    #[test]
    fn test_parse_choices_strips_markdown_fences() {
        let text = "```json\n[{\"id\":\"a\",\"text\":\"x\",\"tone\":\"bold\"},\
                    {\"id\":\"b\",\"text\":\"y\",\"tone\":\"bold\"},\
                    {\"id\":\"c\",\"text\":\"z\",\"tone\":\"creative\"}]\n```";

        let choices = parse_choices(serde_json::Value::String(text.to_owned())).unwrap();

        assert_eq!(choices[2].id, "c");
    }

    #[test]
    fn test_parse_choices_rejects_wrong_count() {
        let value = json!([{ "id": "a", "text": "x", "tone": "bold" }]);

        assert!(matches!(
            parse_choices(value),
            Err(GenerationError::Parse(_))
        ));
    }

    #[test]
    fn test_parse_choices_rejects_unknown_tone() {
        let value = json!([
            { "id": "a", "text": "x", "tone": "bold" },
            { "id": "b", "text": "y", "tone": "reckless" },
            { "id": "c", "text": "z", "tone": "creative" },
        ]);

        assert!(matches!(
            parse_choices(value),
            Err(GenerationError::Parse(_))
        ));
    }

    #[test]
    fn test_parse_choices_rejects_blank_text() {
        let value = json!([
            { "id": "a", "text": " ", "tone": "bold" },
            { "id": "b", "text": "y", "tone": "cautious" },
            { "id": "c", "text": "z", "tone": "creative" },
        ]);

        assert!(parse_choices(value).is_err());
    }
}
