//! Stream and audio collaborators that record presentation cues.
//!
//! The server does not render video or sound itself. These relays accept the
//! engine's calls and keep the latest cues so a client can poll and render
//! them.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use odyssey_core::audio::AudioSink;
use odyssey_core::error::StreamError;
use odyssey_core::stream::LiveStream;
use serde::Serialize;

/// Number of recent interactions and one-shot cues kept.
pub const CUE_HISTORY: usize = 8;

/// What the stream relay last received.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StreamView {
    /// Whether `connect` has been called since the last disconnect.
    pub connected: bool,
    /// Prompt of the scene being streamed.
    pub scene_prompt: Option<String>,
    /// Recent interaction prompts, oldest first.
    pub interactions: VecDeque<String>,
}

/// Records stream calls for the client.
#[derive(Debug, Default)]
pub struct StreamRelay {
    view: Mutex<StreamView>,
}

impl StreamRelay {
    /// Creates a disconnected relay.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn view_mut(&self) -> MutexGuard<'_, StreamView> {
        self.view.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// A copy of the recorded cues.
    #[must_use]
    pub fn view(&self) -> StreamView {
        self.view_mut().clone()
    }
}

#[async_trait]
impl LiveStream for StreamRelay {
    async fn connect(&self) -> Result<(), StreamError> {
        self.view_mut().connected = true;
        Ok(())
    }

    async fn start_scene(&self, prompt: &str) -> Result<(), StreamError> {
        let mut view = self.view_mut();
        if !view.connected {
            return Err(StreamError::NotConnected);
        }
        view.scene_prompt = Some(prompt.to_owned());
        view.interactions.clear();
        Ok(())
    }

    async fn interact(&self, prompt: &str) -> Result<(), StreamError> {
        let mut view = self.view_mut();
        if view.scene_prompt.is_none() {
            return Err(StreamError::NotConnected);
        }
        push_bounded(&mut view.interactions, prompt.to_owned());
        Ok(())
    }

    async fn end_scene(&self) -> Result<(), StreamError> {
        self.view_mut().scene_prompt = None;
        Ok(())
    }

    async fn disconnect(&self) {
        *self.view_mut() = StreamView::default();
    }
}

/// What the audio relay last received.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AudioView {
    /// Ambient tag currently playing.
    pub ambient: Option<String>,
    /// Crossfade length requested with the current ambient tag.
    pub crossfade_seconds: Option<f32>,
    /// Recent one-shot cues, oldest first.
    pub cues: VecDeque<String>,
    /// Master volume.
    pub volume: f32,
    /// Whether playback has been stopped.
    pub stopped: bool,
}

impl Default for AudioView {
    fn default() -> Self {
        Self {
            ambient: None,
            crossfade_seconds: None,
            cues: VecDeque::new(),
            volume: odyssey_session::domain::state::DEFAULT_VOLUME,
            stopped: false,
        }
    }
}

/// Records audio calls for the client.
#[derive(Debug, Default)]
pub struct AudioRelay {
    view: Mutex<AudioView>,
}

impl AudioRelay {
    /// Creates a silent relay.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn view_mut(&self) -> MutexGuard<'_, AudioView> {
        self.view.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// A copy of the recorded cues.
    #[must_use]
    pub fn view(&self) -> AudioView {
        self.view_mut().clone()
    }
}

impl AudioSink for AudioRelay {
    fn play_ambient(&self, tag: &str) {
        let mut view = self.view_mut();
        view.ambient = Some(tag.to_owned());
        view.crossfade_seconds = None;
        view.stopped = false;
    }

    fn crossfade_to(&self, tag: &str, duration_seconds: f32) {
        let mut view = self.view_mut();
        view.ambient = Some(tag.to_owned());
        view.crossfade_seconds = Some(duration_seconds);
        view.stopped = false;
    }

    fn play_one_shot(&self, name: &str) {
        push_bounded(&mut self.view_mut().cues, name.to_owned());
    }

    fn set_volume(&self, level: f32) {
        self.view_mut().volume = level;
    }

    fn stop(&self) {
        let mut view = self.view_mut();
        view.ambient = None;
        view.crossfade_seconds = None;
        view.stopped = true;
    }
}

fn push_bounded(queue: &mut VecDeque<String>, item: String) {
    if queue.len() == CUE_HISTORY {
        queue.pop_front();
    }
    queue.push_back(item);
}
