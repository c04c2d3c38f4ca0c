//! Render orchestration and artifact lifecycle.

pub mod artifacts;
pub mod assets;
pub mod bundle;
pub mod cache_key;
pub mod engine;
pub mod error;
pub mod registry;
pub mod render;
