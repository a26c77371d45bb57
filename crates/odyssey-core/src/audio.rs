//! Ambient and one-shot audio abstraction.

/// The audio subsystem. Every call is fire-and-forget.
pub trait AudioSink: Send + Sync {
    /// Starts the ambient bed identified by `tag`.
    fn play_ambient(&self, tag: &str);

    /// Crossfades from the current ambient bed to `tag`.
    fn crossfade_to(&self, tag: &str, duration_seconds: f32);

    /// Plays a named one-shot cue.
    fn play_one_shot(&self, name: &str);

    /// Sets the master volume, `0.0..=1.0`.
    fn set_volume(&self, level: f32);

    /// Stops all playback.
    fn stop(&self);
}
