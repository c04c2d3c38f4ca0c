//! Composition registry backed by a JSON manifest on disk.
//!
//! The manifest is either `{"compositions": [...]}` or a bare array of
//! descriptors. It is read once at startup.

use std::io::ErrorKind;
use std::path::Path;

use serde::Deserialize;
use tokio::fs;
use tracing::{info, warn};

use crate::application::registry::StaticRegistry;
use crate::domain::composition::{CompositionDescriptor, validate_composition_id};

use super::error::InfraError;

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ManifestDocument {
    Wrapped {
        compositions: Vec<CompositionDescriptor>,
    },
    Bare(Vec<CompositionDescriptor>),
}

impl ManifestDocument {
    fn into_descriptors(self) -> Vec<CompositionDescriptor> {
        match self {
            ManifestDocument::Wrapped { compositions } => compositions,
            ManifestDocument::Bare(compositions) => compositions,
        }
    }
}

/// Load the manifest at `path`. A missing file yields an empty registry.
pub async fn load_manifest(path: &Path) -> Result<StaticRegistry, InfraError> {
    let bytes = match fs::read(path).await {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            warn!(
                target = "infra::registry",
                op = "registry::load_manifest",
                path = %path.display(),
                "Composition manifest not found; no compositions are registered"
            );
            return Ok(StaticRegistry::default());
        }
        Err(err) => return Err(InfraError::Io(err)),
    };

    let document: ManifestDocument = serde_json::from_slice(&bytes).map_err(|err| {
        InfraError::configuration(format!(
            "composition manifest {} is invalid: {err}",
            path.display()
        ))
    })?;
    let descriptors = document.into_descriptors();

    for descriptor in &descriptors {
        validate_composition_id(&descriptor.id).map_err(|err| {
            InfraError::configuration(format!(
                "composition manifest {}: {err}",
                path.display()
            ))
        })?;
    }

    let registry = StaticRegistry::from_descriptors(descriptors).map_err(|err| {
        InfraError::configuration(format!(
            "composition manifest {}: {err}",
            path.display()
        ))
    })?;

    info!(
        target = "infra::registry",
        op = "registry::load_manifest",
        path = %path.display(),
        compositions = registry.len(),
        "Composition manifest loaded"
    );
    Ok(registry)
}
