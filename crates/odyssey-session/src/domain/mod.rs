//! Session state types.

pub mod phase;
pub mod state;
