//! Odyssey — Engine.
//!
//! Drives one play session end to end: it sequences the session phases,
//! asks the resolver where to go next, and coordinates the live stream,
//! audio and generation collaborators around each scene.

pub mod config;
pub mod director;
pub mod error;
pub mod stream_driver;
