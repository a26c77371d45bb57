//! Collaborator error types.

use thiserror::Error;

/// Failure of the text/image generation backend.
///
/// Every consumer recovers from these locally, either by retrying with
/// backoff or by falling back to static content.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GenerationError {
    /// The backend rejected the request because a quota was exhausted.
    #[error("generation quota exceeded: {0}")]
    Quota(String),

    /// The backend did not answer in time.
    #[error("generation timed out after {0}s")]
    Timeout(u64),

    /// The backend answered, but the response carried no usable content.
    #[error("malformed generation response: {0}")]
    Malformed(String),

    /// The response content did not match the expected schema.
    #[error("failed to parse generated content: {0}")]
    Parse(String),

    /// Any other transport or backend failure.
    #[error("generation backend error: {0}")]
    Backend(String),
}

/// Failure of the live video stream collaborator.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StreamError {
    /// The client-to-streamer channel is not open yet. Transient.
    #[error("stream channel not ready")]
    ChannelNotReady,

    /// An operation that needs a connection was called without one.
    #[error("stream is not connected")]
    NotConnected,

    /// Connecting did not complete in time.
    #[error("stream connection timed out after {0}s")]
    ConnectTimeout(u64),

    /// Any other stream failure.
    #[error("stream error: {0}")]
    Other(String),
}

impl StreamError {
    /// Whether the caller should retry the operation after a short delay.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::ChannelNotReady)
    }
}

/// Failure of the durable key-value store. Always swallowed by callers.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    /// The store is full; the write was not applied.
    #[error("storage quota exceeded writing {key}")]
    QuotaExceeded {
        /// The key that could not be written.
        key: String,
    },

    /// A stored value could not be decoded.
    #[error("corrupt stored value under {key}: {reason}")]
    Corrupt {
        /// The key holding the bad value.
        key: String,
        /// What was wrong with it.
        reason: String,
    },

    /// An I/O or backend failure.
    #[error("storage backend error: {0}")]
    Backend(String),
}
