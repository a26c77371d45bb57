//! Odyssey — Narrative context.
//!
//! Owns the static scene graph, the rules that move a session from one scene
//! to the next, the ending classifier, and the prompts handed to generators.

pub mod application;
pub mod domain;
