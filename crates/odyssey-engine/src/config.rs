//! Orchestration tunables.

use std::time::Duration;

/// How the stream driver retries and rate-limits.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StreamConfig {
    /// Attempts to start a scene while the channel is not ready.
    pub start_attempts: u32,
    /// Fixed wait between start attempts.
    pub start_retry_delay: Duration,
    /// Minimum spacing between interaction prompts; extra calls are dropped.
    pub interact_cooldown: Duration,
    /// Upper bound on establishing a connection.
    pub connect_timeout: Duration,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            start_attempts: 10,
            start_retry_delay: Duration::from_millis(300),
            interact_cooldown: Duration::from_millis(1500),
            connect_timeout: Duration::from_secs(30),
        }
    }
}

/// How the director paces scene changes.
#[derive(Debug, Clone, PartialEq)]
pub struct DirectorConfig {
    /// Pause between ending one stream and loading the next scene.
    pub transition_pause: Duration,
    /// Ambient crossfade length in seconds.
    pub crossfade_seconds: f32,
    /// One-shot cue played on every scene change.
    pub transition_cue: String,
}

impl Default for DirectorConfig {
    fn default() -> Self {
        Self {
            transition_pause: Duration::from_millis(500),
            crossfade_seconds: 1.5,
            transition_cue: "transition".to_owned(),
        }
    }
}
