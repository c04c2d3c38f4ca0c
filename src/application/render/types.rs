use std::io;

use serde_json::{Map, Value};
use thiserror::Error;

use crate::application::engine::EngineError;
use crate::application::registry::RegistryError;
use crate::domain::artifact::RenderedArtifact;
use crate::domain::composition::{Codec, CompositionKind};

/// One render request, discarded once answered.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderRequest {
    pub composition_id: String,
    pub kind: CompositionKind,
    pub input_props: Map<String, Value>,
    /// Reuse a matching artifact instead of rendering again.
    pub cache_enabled: bool,
    /// Only meaningful for videos; stills ignore it.
    pub codec: Option<Codec>,
}

impl RenderRequest {
    pub fn new(composition_id: impl Into<String>, kind: CompositionKind) -> Self {
        Self {
            composition_id: composition_id.into(),
            kind,
            input_props: Map::new(),
            cache_enabled: false,
            codec: None,
        }
    }

    pub fn with_props(mut self, input_props: Map<String, Value>) -> Self {
        self.input_props = input_props;
        self
    }

    pub fn with_cache(mut self, enabled: bool) -> Self {
        self.cache_enabled = enabled;
        self
    }

    pub fn with_codec(mut self, codec: Option<Codec>) -> Self {
        self.codec = codec;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderOutcome {
    pub artifact: RenderedArtifact,
    pub cached: bool,
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("{0}")]
    Validation(String),
    #[error("composition `{0}` not found")]
    CompositionNotFound(String),
    #[error("invalid input props for `{composition}`: {message}")]
    InvalidInputProps { composition: String, message: String },
    #[error("composition registry failed: {0}")]
    Registry(String),
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error("failed to prepare render output: {0}")]
    Io(#[from] io::Error),
}

impl From<RegistryError> for RenderError {
    fn from(error: RegistryError) -> Self {
        match error {
            RegistryError::NotFound(id) => Self::CompositionNotFound(id),
            RegistryError::InvalidInputProps {
                composition,
                problems,
            } => Self::InvalidInputProps {
                composition,
                message: problems.join("; "),
            },
            RegistryError::Unavailable(message) => Self::Registry(message),
        }
    }
}

impl RenderError {
    /// True when the caller sent a bad request rather than the render failing.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}
