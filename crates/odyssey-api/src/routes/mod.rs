//! Route modules.

pub mod health;
pub mod preload;
pub mod sessions;
