//! Odyssey — Preload context.
//!
//! Fetches one anchor image per scene in the background, highest priority
//! first, through a bounded pool of workers with retry and exponential
//! backoff. Results land in a fast in-process tier backed by a durable
//! store that is consulted before anything is generated.

pub mod cache;
pub mod config;
pub mod preloader;
pub mod progress;
