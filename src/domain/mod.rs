//! Domain layer types and invariants.

pub mod artifact;
pub mod composition;
pub mod error;
