//! Boundary to the external rendering engine.
//!
//! The engine bundles presentation code once and renders compositions from
//! that bundle. Everything behind this trait is opaque to the render core: it
//! only sees success, or a failure carrying the engine's message.

use std::io;
use std::path::PathBuf;

use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::domain::composition::{Codec, CompositionDescriptor};

/// Location of the one bundle built for this process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleHandle(String);

impl BundleHandle {
    pub fn new(location: impl Into<String>) -> Self {
        Self(location.into())
    }

    pub fn location(&self) -> &str {
        &self.0
    }
}

/// Inputs to the engine's build step.
#[derive(Debug, Clone)]
pub struct BundleSpec {
    pub entry_point: PathBuf,
    pub plugins: Vec<String>,
}

/// One render invocation. `codec` is `None` for stills.
#[derive(Debug, Clone)]
pub struct RenderJob {
    pub bundle: BundleHandle,
    pub composition: CompositionDescriptor,
    pub props: Map<String, Value>,
    pub output: PathBuf,
    pub codec: Option<Codec>,
}

impl RenderJob {
    pub fn codec_or_default(&self) -> Codec {
        self.codec.unwrap_or_default()
    }
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("render engine unavailable: {0}")]
    Unavailable(String),
    #[error("{message}")]
    Failed {
        message: String,
        exit_code: Option<i32>,
    },
    #[error("render engine produced no usable output: {0}")]
    InvalidOutput(String),
    #[error("render engine i/o failure: {0}")]
    Io(#[from] io::Error),
}

impl EngineError {
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed {
            message: message.into(),
            exit_code: None,
        }
    }
}

#[async_trait]
pub trait RenderEngine: Send + Sync {
    /// Build the presentation bundle and return where it lives.
    async fn bundle(&self, spec: &BundleSpec) -> Result<BundleHandle, EngineError>;

    /// Encode a video of the composition to `job.output`.
    async fn render_media(&self, job: &RenderJob) -> Result<(), EngineError>;

    /// Render a single frame of the composition to `job.output`.
    async fn render_still(&self, job: &RenderJob) -> Result<(), EngineError>;
}
