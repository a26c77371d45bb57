//! Odyssey — HTTP API over the session engine.

pub mod config;
pub mod error;
pub mod gemini;
pub mod relay;
pub mod routes;
pub mod state;
