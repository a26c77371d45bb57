//! Recording stream — mock `LiveStream` implementation for tests.

use std::sync::Mutex;

use async_trait::async_trait;
use odyssey_core::error::StreamError;
use odyssey_core::stream::LiveStream;

/// A call received by [`RecordingStream`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamCall {
    /// `connect()`
    Connect,
    /// `start_scene(prompt)`
    StartScene(String),
    /// `interact(prompt)`
    Interact(String),
    /// `end_scene()`
    EndScene,
    /// `disconnect()`
    Disconnect,
}

/// A stream that records every call. `start_scene` can be scripted to report
/// a not-ready channel a number of times, or to fail outright.
#[derive(Debug, Default)]
pub struct RecordingStream {
    not_ready_starts: Mutex<u32>,
    start_error: Option<StreamError>,
    connect_error: Option<StreamError>,
    calls: Mutex<Vec<StreamCall>>,
}

impl RecordingStream {
    /// Create a stream where every call succeeds.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Report `StreamError::ChannelNotReady` for the first `times` starts.
    #[must_use]
    pub fn with_not_ready_starts(self, times: u32) -> Self {
        *self.not_ready_starts.lock().unwrap() = times;
        self
    }

    /// Fail every `start_scene` with `error` (after any not-ready starts).
    #[must_use]
    pub fn with_start_error(mut self, error: StreamError) -> Self {
        self.start_error = Some(error);
        self
    }

    /// Fail every `connect` with `error`.
    #[must_use]
    pub fn with_connect_error(mut self, error: StreamError) -> Self {
        self.connect_error = Some(error);
        self
    }

    /// Returns every call received, in call order.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn calls(&self) -> Vec<StreamCall> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: StreamCall) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl LiveStream for RecordingStream {
    async fn connect(&self) -> Result<(), StreamError> {
        self.record(StreamCall::Connect);
        match &self.connect_error {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }

    async fn start_scene(&self, prompt: &str) -> Result<(), StreamError> {
        self.record(StreamCall::StartScene(prompt.to_owned()));
        {
            let mut remaining = self.not_ready_starts.lock().unwrap();
            if *remaining > 0 {
                *remaining -= 1;
                return Err(StreamError::ChannelNotReady);
            }
        }
        match &self.start_error {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }

    async fn interact(&self, prompt: &str) -> Result<(), StreamError> {
        self.record(StreamCall::Interact(prompt.to_owned()));
        Ok(())
    }

    async fn end_scene(&self) -> Result<(), StreamError> {
        self.record(StreamCall::EndScene);
        Ok(())
    }

    async fn disconnect(&self) {
        self.record(StreamCall::Disconnect);
    }
}
