//! Odyssey — Session context.
//!
//! Holds the single mutable record of a play session, notifies observers of
//! every change, persists the resumable subset, and answers navigation
//! questions against the scene graph.

pub mod application;
pub mod domain;
