//! Scene graph types and pure narrative rules.

pub mod ending;
pub mod registry;
pub mod scene;
