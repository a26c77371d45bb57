//! Preload progress.

use serde::Serialize;

/// How many anchors are cached out of how many are wanted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Progress {
    /// Anchors confirmed cached. Never exceeds `total`.
    pub loaded: usize,
    /// Anchors wanted.
    pub total: usize,
}

impl Progress {
    /// Creates a progress value, capping `loaded` at `total`.
    #[must_use]
    pub fn new(loaded: usize, total: usize) -> Self {
        Self {
            loaded: loaded.min(total),
            total,
        }
    }

    /// Rounded percentage; 100 when nothing is wanted.
    #[must_use]
    pub fn percent(self) -> u8 {
        if self.total == 0 {
            return 100;
        }
        let percent = (self.loaded * 200 + self.total) / (self.total * 2);
        u8::try_from(percent).unwrap_or(100)
    }

    /// Whether every wanted anchor is cached.
    #[must_use]
    pub fn is_complete(self) -> bool {
        self.loaded >= self.total
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percent_rounds_to_nearest() {
        assert_eq!(Progress::new(1, 3).percent(), 33);
        assert_eq!(Progress::new(2, 3).percent(), 67);
        assert_eq!(Progress::new(11, 11).percent(), 100);
    }

    #[test]
    fn test_empty_target_set_is_complete() {
        let progress = Progress::new(0, 0);

        assert!(progress.is_complete());
        assert_eq!(progress.percent(), 100);
    }

    #[test]
    fn test_loaded_is_capped_at_total() {
        assert_eq!(Progress::new(5, 3).loaded, 3);
    }
}
