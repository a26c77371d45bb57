//! Connection state, retry and rate limiting around a [`LiveStream`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use odyssey_core::clock::{Clock, Sleeper};
use odyssey_core::error::StreamError;
use odyssey_core::stream::LiveStream;
use tracing::{debug, info, warn};

use crate::config::StreamConfig;

/// Wraps the stream collaborator with the session's connection rules.
pub struct StreamDriver {
    stream: Arc<dyn LiveStream>,
    clock: Arc<dyn Clock>,
    sleeper: Arc<dyn Sleeper>,
    config: StreamConfig,
    connected: AtomicBool,
    streaming: AtomicBool,
    last_interact: Mutex<Option<DateTime<Utc>>>,
}

impl std::fmt::Debug for StreamDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamDriver")
            .field("config", &self.config)
            .field("connected", &self.is_connected())
            .field("streaming", &self.is_streaming())
            .finish_non_exhaustive()
    }
}

impl StreamDriver {
    /// Creates a disconnected driver.
    #[must_use]
    pub fn new(
        stream: Arc<dyn LiveStream>,
        clock: Arc<dyn Clock>,
        sleeper: Arc<dyn Sleeper>,
        config: StreamConfig,
    ) -> Self {
        Self {
            stream,
            clock,
            sleeper,
            config,
            connected: AtomicBool::new(false),
            streaming: AtomicBool::new(false),
            last_interact: Mutex::new(None),
        }
    }

    /// Whether a connection is established.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    /// Whether a scene is currently streaming.
    #[must_use]
    pub fn is_streaming(&self) -> bool {
        self.streaming.load(Ordering::Acquire)
    }

    /// Connects, first dropping any stale connection.
    ///
    /// # Errors
    ///
    /// Returns the collaborator's `StreamError`, or
    /// `StreamError::ConnectTimeout` if connecting takes longer than the
    /// configured timeout.
    pub async fn connect(&self) -> Result<(), StreamError> {
        if self.is_connected() {
            debug!("replacing stale stream connection");
            self.disconnect().await;
        }

        let timeout = self.config.connect_timeout;
        match tokio::time::timeout(timeout, self.stream.connect()).await {
            Ok(Ok(())) => {
                self.connected.store(true, Ordering::Release);
                info!("stream connected");
                Ok(())
            }
            Ok(Err(e)) => Err(e),
            Err(_) => Err(StreamError::ConnectTimeout(timeout.as_secs())),
        }
    }

    /// Starts streaming `prompt`, ending any active scene first.
    ///
    /// A not-ready channel is retried after a fixed delay until the
    /// configured number of attempts is used up.
    ///
    /// # Errors
    ///
    /// Returns `StreamError::NotConnected` without a connection, the last
    /// `ChannelNotReady` once attempts run out, or any other collaborator
    /// error immediately.
    pub async fn start_scene(&self, prompt: &str) -> Result<(), StreamError> {
        if !self.is_connected() {
            return Err(StreamError::NotConnected);
        }
        if self.is_streaming() {
            self.end_scene().await;
        }

        let attempts = self.config.start_attempts.max(1);
        let mut attempt = 1;
        loop {
            match self.stream.start_scene(prompt).await {
                Ok(()) => {
                    self.streaming.store(true, Ordering::Release);
                    debug!(attempt, "scene stream started");
                    return Ok(());
                }
                Err(e) if e.is_transient() && attempt < attempts => {
                    warn!(attempt, attempts, "stream channel not ready, retrying");
                    self.sleeper.sleep(self.config.start_retry_delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Sends an interaction prompt unless one was sent within the cooldown.
    /// Returns whether the prompt was sent. Send failures are logged.
    pub async fn interact(&self, prompt: &str) -> bool {
        if !self.is_streaming() {
            return false;
        }

        let now = self.clock.now();
        {
            let mut last = self
                .last_interact
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            if let Some(previous) = *last {
                let elapsed = (now - previous).to_std().unwrap_or_default();
                if elapsed < self.config.interact_cooldown {
                    debug!("interaction dropped by cooldown");
                    return false;
                }
            }
            *last = Some(now);
        }

        if let Err(e) = self.stream.interact(prompt).await {
            warn!(error = %e, "stream interaction failed");
        }
        true
    }

    /// Ends the active scene, if any. Failures are ignored.
    pub async fn end_scene(&self) {
        if self.streaming.swap(false, Ordering::AcqRel) {
            if let Err(e) = self.stream.end_scene().await {
                debug!(error = %e, "ending stream failed");
            }
        }
    }

    /// Drops the connection and resets all state. Safe to call repeatedly.
    pub async fn disconnect(&self) {
        self.streaming.store(false, Ordering::Release);
        *self
            .last_interact
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = None;
        if self.connected.swap(false, Ordering::AcqRel) {
            self.stream.disconnect().await;
            info!("stream disconnected");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chrono::TimeZone;
    use odyssey_test_support::{ManualClock, RecordingSleeper, RecordingStream, StreamCall};

    use super::*;

    struct Harness {
        stream: Arc<RecordingStream>,
        clock: Arc<ManualClock>,
        sleeper: Arc<RecordingSleeper>,
        driver: StreamDriver,
    }

    fn harness(stream: RecordingStream) -> Harness {
        let stream = Arc::new(stream);
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0).unwrap(),
        ));
        let sleeper = Arc::new(RecordingSleeper::new());
        let driver = StreamDriver::new(
            stream.clone(),
            clock.clone(),
            sleeper.clone(),
            StreamConfig::default(),
        );
        Harness {
            stream,
            clock,
            sleeper,
            driver,
        }
    }

    #[tokio::test]
    async fn test_start_scene_requires_connection() {
        let h = harness(RecordingStream::new());

        let result = h.driver.start_scene("scene").await;

        assert_eq!(result, Err(StreamError::NotConnected));
        assert!(h.stream.calls().is_empty());
    }

    #[tokio::test]
    async fn test_not_ready_channel_is_retried_with_fixed_delay() {
        // Arrange
        let h = harness(RecordingStream::new().with_not_ready_starts(3));
        h.driver.connect().await.unwrap();

        // Act
        let result = h.driver.start_scene("bridge").await;

        // Assert
        assert!(result.is_ok());
        assert!(h.driver.is_streaming());
        let starts = h
            .stream
            .calls()
            .into_iter()
            .filter(|c| matches!(c, StreamCall::StartScene(_)))
            .count();
        assert_eq!(starts, 4);
        assert_eq!(h.sleeper.sleeps(), vec![Duration::from_millis(300); 3]);
    }

    #[tokio::test]
    async fn test_not_ready_channel_gives_up_after_ten_attempts() {
        let h = harness(RecordingStream::new().with_not_ready_starts(20));
        h.driver.connect().await.unwrap();

        let result = h.driver.start_scene("bridge").await;

        assert_eq!(result, Err(StreamError::ChannelNotReady));
        assert_eq!(h.sleeper.sleeps().len(), 9);
        assert!(!h.driver.is_streaming());
    }

    #[tokio::test]
    async fn test_other_start_errors_are_not_retried() {
        let h = harness(RecordingStream::new().with_start_error(StreamError::Other("boom".into())));
        h.driver.connect().await.unwrap();

        let result = h.driver.start_scene("bridge").await;

        assert_eq!(result, Err(StreamError::Other("boom".into())));
        assert!(h.sleeper.sleeps().is_empty());
    }

    #[tokio::test]
    async fn test_starting_a_new_scene_ends_the_previous_one() {
        let h = harness(RecordingStream::new());
        h.driver.connect().await.unwrap();
        h.driver.start_scene("one").await.unwrap();

        h.driver.start_scene("two").await.unwrap();

        assert_eq!(
            h.stream.calls(),
            vec![
                StreamCall::Connect,
                StreamCall::StartScene("one".into()),
                StreamCall::EndScene,
                StreamCall::StartScene("two".into()),
            ]
        );
    }

    #[tokio::test]
    async fn test_interactions_inside_cooldown_are_dropped() {
        // Arrange
        let h = harness(RecordingStream::new());
        h.driver.connect().await.unwrap();
        h.driver.start_scene("bridge").await.unwrap();

        // Act
        let first = h.driver.interact("wave").await;
        h.clock.advance(Duration::from_millis(1499));
        let second = h.driver.interact("wave again").await;
        h.clock.advance(Duration::from_millis(1));
        let third = h.driver.interact("nod").await;

        // Assert
        assert!(first);
        assert!(!second);
        assert!(third);
        let interactions: Vec<_> = h
            .stream
            .calls()
            .into_iter()
            .filter_map(|c| match c {
                StreamCall::Interact(p) => Some(p),
                _ => None,
            })
            .collect();
        assert_eq!(interactions, vec!["wave".to_owned(), "nod".to_owned()]);
    }

    #[tokio::test]
    async fn test_interaction_without_stream_is_dropped() {
        let h = harness(RecordingStream::new());
        h.driver.connect().await.unwrap();

        assert!(!h.driver.interact("wave").await);
    }

    #[tokio::test]
    async fn test_connect_replaces_stale_connection() {
        let h = harness(RecordingStream::new());
        h.driver.connect().await.unwrap();

        h.driver.connect().await.unwrap();

        assert_eq!(
            h.stream.calls(),
            vec![StreamCall::Connect, StreamCall::Disconnect, StreamCall::Connect]
        );
    }

    #[tokio::test]
    async fn test_connect_error_leaves_driver_disconnected() {
        let h = harness(RecordingStream::new().with_connect_error(StreamError::Other("refused".into())));

        let result = h.driver.connect().await;

        assert!(result.is_err());
        assert!(!h.driver.is_connected());
    }

    #[tokio::test]
    async fn test_disconnect_is_idempotent() {
        let h = harness(RecordingStream::new());
        h.driver.connect().await.unwrap();
        h.driver.start_scene("bridge").await.unwrap();

        h.driver.disconnect().await;
        h.driver.disconnect().await;

        let disconnects = h
            .stream
            .calls()
            .into_iter()
            .filter(|c| *c == StreamCall::Disconnect)
            .count();
        assert_eq!(disconnects, 1);
        assert!(!h.driver.is_connected());
        assert!(!h.driver.is_streaming());
    }
}
