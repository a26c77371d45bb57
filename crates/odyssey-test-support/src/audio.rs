//! Recording audio — mock `AudioSink` implementation for tests.

use std::sync::Mutex;

use odyssey_core::audio::AudioSink;

/// A call received by [`RecordingAudio`].
#[derive(Debug, Clone, PartialEq)]
pub enum AudioCall {
    /// `play_ambient(tag)`
    Ambient(String),
    /// `crossfade_to(tag, seconds)`
    Crossfade(String, f32),
    /// `play_one_shot(name)`
    OneShot(String),
    /// `set_volume(level)`
    Volume(f32),
    /// `stop()`
    Stop,
}

/// An audio sink that records every call.
#[derive(Debug, Default)]
pub struct RecordingAudio {
    calls: Mutex<Vec<AudioCall>>,
}

impl RecordingAudio {
    /// Create an empty recording sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns every call received, in call order.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn calls(&self) -> Vec<AudioCall> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: AudioCall) {
        self.calls.lock().unwrap().push(call);
    }
}

impl AudioSink for RecordingAudio {
    fn play_ambient(&self, tag: &str) {
        self.record(AudioCall::Ambient(tag.to_owned()));
    }

    fn crossfade_to(&self, tag: &str, duration_seconds: f32) {
        self.record(AudioCall::Crossfade(tag.to_owned(), duration_seconds));
    }

    fn play_one_shot(&self, name: &str) {
        self.record(AudioCall::OneShot(name.to_owned()));
    }

    fn set_volume(&self, level: f32) {
        self.record(AudioCall::Volume(level));
    }

    fn stop(&self) {
        self.record(AudioCall::Stop);
    }
}
