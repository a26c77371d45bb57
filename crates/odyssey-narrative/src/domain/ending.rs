//! Ending classification.
//!
//! The ending depends only on how many recorded choices carry each tone.
//! When no tone holds more than 40% of the total the balanced ending wins.
//! Otherwise the dominant tone decides, checked in a fixed order: bold
//! first, then cautious, with creative taking whatever is left. Ties
//! therefore favour bold over cautious over creative.

use serde::{Deserialize, Serialize};

use super::scene::Tone;

/// Share of the total a tone may hold while the mix still counts as balanced.
const BALANCED_THRESHOLD: f64 = 0.4;

/// The outcome of a completed session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ending {
    /// Stable identifier.
    pub id: String,
    /// Display title.
    pub title: String,
    /// Closing passage.
    pub description: String,
}

/// Anything that carries a tone, such as a recorded choice.
pub trait Toned {
    /// The tone of this item.
    fn tone(&self) -> Tone;
}

impl Toned for Tone {
    fn tone(&self) -> Tone {
        *self
    }
}

/// Per-tone occurrence counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ToneCounts {
    /// Cautious choices.
    pub cautious: usize,
    /// Bold choices.
    pub bold: usize,
    /// Creative choices.
    pub creative: usize,
}

impl ToneCounts {
    /// Counts the tones of `items`.
    pub fn tally<'a, T: Toned + 'a>(items: impl IntoIterator<Item = &'a T>) -> Self {
        items
            .into_iter()
            .fold(Self::default(), |mut counts, item| {
                match item.tone() {
                    Tone::Cautious => counts.cautious += 1,
                    Tone::Bold => counts.bold += 1,
                    Tone::Creative => counts.creative += 1,
                }
                counts
            })
    }

    /// Sum of all counts.
    #[must_use]
    pub fn total(self) -> usize {
        self.cautious + self.bold + self.creative
    }

    /// The largest single count.
    #[must_use]
    pub fn max(self) -> usize {
        self.cautious.max(self.bold).max(self.creative)
    }

    /// Whether no tone exceeds the balanced threshold. Always false for an
    /// empty tally.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn is_balanced(self) -> bool {
        let total = self.total();
        total > 0 && (self.max() as f64 / total as f64) <= BALANCED_THRESHOLD
    }
}

/// Classifies a choice history into an ending. Pure and order-independent.
pub fn classify<'a, T: Toned + 'a>(history: impl IntoIterator<Item = &'a T>) -> Ending {
    classify_counts(ToneCounts::tally(history))
}

/// Classifies pre-computed tone counts.
#[must_use]
pub fn classify_counts(counts: ToneCounts) -> Ending {
    if counts.is_balanced() {
        return one_more_mission();
    }
    if counts.bold >= counts.cautious && counts.bold >= counts.creative {
        return pioneer();
    }
    if counts.cautious >= counts.bold && counts.cautious >= counts.creative {
        return discoverer();
    }
    changed()
}

fn ending(id: &str, title: &str, description: &str) -> Ending {
    Ending {
        id: id.to_owned(),
        title: title.to_owned(),
        description: description.to_owned(),
    }
}

fn one_more_mission() -> Ending {
    ending(
        "one-more-mission",
        "One More Mission",
        "You radio Earth with your findings and a simple message: \"Preparing for next \
         mission.\" There is always more to see, more to learn, more to become. The Odyssey \
         turns toward the next star, and you smile. The journey is the destination.",
    )
}

fn pioneer() -> Ending {
    ending(
        "pioneer",
        "The Pioneer",
        "You push the throttle forward. The stars blur and stretch. Behind you, the solar \
         system shrinks to a point of light. Ahead, the unknown, vast and welcoming. You are \
         the first, but you will not be the last. The Odyssey sails on.",
    )
}

fn discoverer() -> Ending {
    ending(
        "discoverer",
        "The Discoverer",
        "You set course for home, carrying knowledge that will reshape human understanding. \
         The data, the samples, the recordings: each one a key to a door humanity didn't know \
         existed. As Earth grows in the viewport, you know this is just the beginning.",
    )
}

fn changed() -> Ending {
    ending(
        "changed",
        "Changed",
        "You power down the engines and float among Saturn's rings. The ice catches the light \
         and you see, for the first time, the pattern that connects everything. You are no \
         longer just an explorer. You are part of it.",
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counts(cautious: usize, bold: usize, creative: usize) -> ToneCounts {
        ToneCounts {
            cautious,
            bold,
            creative,
        }
    }

    #[test]
    fn test_one_of_each_tone_is_balanced() {
        let history = [Tone::Cautious, Tone::Bold, Tone::Creative];

        let ending = classify(&history);

        assert_eq!(ending.id, "one-more-mission");
    }

    #[test]
    fn test_three_bold_choices_yield_pioneer_every_time() {
        let history = [Tone::Bold; 3];

        let first = classify(&history);
        let second = classify(&history);

        assert_eq!(first.id, "pioneer");
        assert_eq!(first, second);
    }

    #[test]
    fn test_empty_history_skips_balanced_and_falls_to_pioneer() {
        let history: [Tone; 0] = [];

        let first = classify(&history);
        let second = classify(&history);

        assert_eq!(first.id, "pioneer");
        assert_eq!(first, second);
    }

    #[test]
    fn test_dominant_cautious_yields_discoverer() {
        assert_eq!(classify_counts(counts(3, 1, 0)).id, "discoverer");
    }

    #[test]
    fn test_dominant_creative_yields_changed() {
        assert_eq!(classify_counts(counts(0, 1, 3)).id, "changed");
    }

    #[test]
    fn test_bold_wins_ties_against_cautious() {
        assert_eq!(classify_counts(counts(2, 2, 0)).id, "pioneer");
    }

    #[test]
    fn test_cautious_wins_ties_against_creative() {
        assert_eq!(classify_counts(counts(2, 0, 2)).id, "discoverer");
    }

    #[test]
    fn test_exactly_forty_percent_is_still_balanced() {
        // 2 / 5 = 0.4
        assert_eq!(classify_counts(counts(2, 2, 1)).id, "one-more-mission");
    }

    #[test]
    fn test_just_over_forty_percent_is_not_balanced() {
        // 3 / 7 ≈ 0.43
        assert_eq!(classify_counts(counts(2, 3, 2)).id, "pioneer");
    }

    #[test]
    fn test_classification_ignores_order() {
        let forward = [Tone::Creative, Tone::Creative, Tone::Bold];
        let backward = [Tone::Bold, Tone::Creative, Tone::Creative];

        assert_eq!(classify(&forward), classify(&backward));
        assert_eq!(classify(&forward).id, "changed");
    }
}
