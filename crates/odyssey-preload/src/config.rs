//! Preloader tunables.

use std::collections::BTreeSet;
use std::time::Duration;

use odyssey_core::id::SceneId;

/// Default number of concurrent workers.
pub const DEFAULT_MAX_CONCURRENCY: usize = 2;

/// Default number of attempts per asset.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default wait after the first failed attempt.
pub const DEFAULT_BASE_BACKOFF: Duration = Duration::from_millis(1000);

/// Default durable key prefix; the scene id is appended.
pub const DEFAULT_KEY_PREFIX: &str = "odyssey_anchor_";

/// How the preloader schedules and retries work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreloadConfig {
    /// Priority tiers, highest first. Ids in no tier run last, in id order.
    pub tiers: Vec<Vec<SceneId>>,
    /// Upper bound on concurrent workers.
    pub max_concurrency: usize,
    /// Attempts per asset before it is skipped.
    pub max_retries: u32,
    /// Wait after the first failed attempt; doubles after each further one.
    pub base_backoff: Duration,
    /// Durable key prefix.
    pub key_prefix: String,
}

impl Default for PreloadConfig {
    fn default() -> Self {
        Self {
            tiers: vec![
                vec![SceneId(0)],
                vec![SceneId(1), SceneId(2), SceneId(3)],
                (4..=10).map(SceneId).collect(),
            ],
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            max_retries: DEFAULT_MAX_RETRIES,
            base_backoff: DEFAULT_BASE_BACKOFF,
            key_prefix: DEFAULT_KEY_PREFIX.to_owned(),
        }
    }
}

impl PreloadConfig {
    /// Orders `pending` by tier. Each id appears once; ids named by no tier
    /// follow in ascending order.
    #[must_use]
    pub fn queue_order(&self, pending: &BTreeSet<SceneId>) -> Vec<SceneId> {
        let mut ordered = Vec::with_capacity(pending.len());
        let mut placed = BTreeSet::new();

        for id in self.tiers.iter().flatten() {
            if pending.contains(id) && placed.insert(*id) {
                ordered.push(*id);
            }
        }
        ordered.extend(pending.iter().filter(|id| !placed.contains(*id)));
        ordered
    }

    /// Wait after failed attempt number `attempt` (zero-based):
    /// `base_backoff * 2^attempt`, saturating.
    #[must_use]
    pub fn backoff(&self, attempt: u32) -> Duration {
        2_u32
            .checked_pow(attempt)
            .map_or(Duration::MAX, |factor| self.base_backoff.saturating_mul(factor))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(raw: &[u32]) -> BTreeSet<SceneId> {
        raw.iter().copied().map(SceneId).collect()
    }

    #[test]
    fn test_default_tiers_put_the_bridge_first() {
        let config = PreloadConfig::default();

        let order = config.queue_order(&ids(&[10, 3, 0, 5, 1]));

        assert_eq!(order, vec![SceneId(0), SceneId(1), SceneId(3), SceneId(5), SceneId(10)]);
    }

    #[test]
    fn test_untiered_ids_are_appended_in_id_order() {
        let config = PreloadConfig {
            tiers: vec![vec![SceneId(4)], vec![SceneId(2)]],
            ..PreloadConfig::default()
        };

        let order = config.queue_order(&ids(&[0, 1, 2, 3, 4]));

        assert_eq!(
            order,
            vec![SceneId(4), SceneId(2), SceneId(0), SceneId(1), SceneId(3)]
        );
    }

    #[test]
    fn test_duplicate_tier_entries_are_queued_once() {
        let config = PreloadConfig {
            tiers: vec![vec![SceneId(1)], vec![SceneId(1), SceneId(0)]],
            ..PreloadConfig::default()
        };

        let order = config.queue_order(&ids(&[0, 1]));

        assert_eq!(order, vec![SceneId(1), SceneId(0)]);
    }

    #[test]
    fn test_backoff_doubles_per_attempt() {
        let config = PreloadConfig::default();

        assert_eq!(config.backoff(0), Duration::from_secs(1));
        assert_eq!(config.backoff(1), Duration::from_secs(2));
        assert_eq!(config.backoff(2), Duration::from_secs(4));
    }

    #[test]
    fn test_backoff_saturates_instead_of_overflowing() {
        let config = PreloadConfig::default();

        assert_eq!(config.backoff(64), Duration::MAX);
    }
}
