//! Live video stream abstraction.

use async_trait::async_trait;

use crate::error::StreamError;

/// The live video streaming session.
///
/// Implementations do not rate-limit `interact` and do not retry
/// `start_scene`; both are the caller's responsibility.
#[async_trait]
pub trait LiveStream: Send + Sync {
    /// Opens a connection to the streaming service.
    async fn connect(&self) -> Result<(), StreamError>;

    /// Starts streaming a scene described by `prompt`. May fail with
    /// `StreamError::ChannelNotReady` shortly after connecting.
    async fn start_scene(&self, prompt: &str) -> Result<(), StreamError>;

    /// Sends an interaction prompt to the active scene.
    async fn interact(&self, prompt: &str) -> Result<(), StreamError>;

    /// Ends the active scene.
    async fn end_scene(&self) -> Result<(), StreamError>;

    /// Closes the connection. Calling this without a connection is a no-op.
    async fn disconnect(&self);
}
