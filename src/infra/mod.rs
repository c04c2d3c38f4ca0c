//! Infrastructure adapters and runtime bootstrap.

pub mod engine;
pub mod error;
pub mod http;
pub mod registry;
pub mod telemetry;
pub mod uploads;
