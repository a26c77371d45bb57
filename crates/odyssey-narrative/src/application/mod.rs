//! Operations over the scene graph.

pub mod prompts;
pub mod resolver;
