//! Odyssey Core — shared abstractions.
//!
//! This crate defines the identifiers, collaborator traits and error types
//! that every other crate depends on. It contains no orchestration logic.

pub mod asset;
pub mod audio;
pub mod clock;
pub mod error;
pub mod generator;
pub mod id;
pub mod storage;
pub mod stream;
