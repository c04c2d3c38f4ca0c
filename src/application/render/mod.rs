//! Render job execution.
//!
//! A request is validated, checked against the artifact cache under a
//! per-composition lock and, on a miss, handed to the engine. Fresh artifacts
//! are recorded in the index and retention runs before the lock is released.

mod executor;
mod runtime;
mod types;

pub use executor::RenderService;
pub(crate) use executor::{
    METRIC_CACHE_HIT, METRIC_CACHE_MISS, METRIC_ENGINE_MS, METRIC_RENDER_FAILED,
};
pub use runtime::{CompositionGuard, CompositionLocks};
pub use types::{RenderError, RenderOutcome, RenderRequest};
