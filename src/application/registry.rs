//! Composition registry boundary.
//!
//! Compositions are registered outside this service. The registry turns an
//! identifier plus input props into a descriptor and the final props the
//! engine should render with.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::domain::composition::CompositionDescriptor;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("composition `{0}` not found")]
    NotFound(String),
    #[error("invalid input props for `{composition}`: {}", problems.join("; "))]
    InvalidInputProps {
        composition: String,
        problems: Vec<String>,
    },
    #[error("composition registry unavailable: {0}")]
    Unavailable(String),
}

/// A composition ready to hand to the engine.
#[derive(Debug, Clone)]
pub struct ResolvedComposition {
    pub descriptor: CompositionDescriptor,
    pub props: Map<String, Value>,
}

#[async_trait]
pub trait CompositionRegistry: Send + Sync {
    async fn list(&self) -> Result<Vec<CompositionDescriptor>, RegistryError>;

    async fn resolve(
        &self,
        composition_id: &str,
        input_props: &Map<String, Value>,
    ) -> Result<ResolvedComposition, RegistryError>;
}

/// Merge `input_props` over the descriptor defaults and validate against its schema.
pub fn resolve_with(
    descriptor: &CompositionDescriptor,
    input_props: &Map<String, Value>,
) -> Result<ResolvedComposition, RegistryError> {
    let props = descriptor.merge_props(input_props);
    descriptor
        .check_props(&props)
        .map_err(|problems| RegistryError::InvalidInputProps {
            composition: descriptor.id.clone(),
            problems,
        })?;

    Ok(ResolvedComposition {
        descriptor: descriptor.clone(),
        props,
    })
}

/// Fixed set of descriptors held in memory, in id order.
#[derive(Debug, Clone, Default)]
pub struct StaticRegistry {
    compositions: BTreeMap<String, CompositionDescriptor>,
}

impl StaticRegistry {
    /// Build a registry, rejecting duplicate identifiers.
    pub fn from_descriptors(
        descriptors: impl IntoIterator<Item = CompositionDescriptor>,
    ) -> Result<Self, RegistryError> {
        let mut compositions = BTreeMap::new();
        for descriptor in descriptors {
            let id = descriptor.id.clone();
            if compositions.insert(id.clone(), descriptor).is_some() {
                return Err(RegistryError::Unavailable(format!(
                    "composition `{id}` is registered twice"
                )));
            }
        }
        Ok(Self { compositions })
    }

    pub fn len(&self) -> usize {
        self.compositions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.compositions.is_empty()
    }
}

#[async_trait]
impl CompositionRegistry for StaticRegistry {
    async fn list(&self) -> Result<Vec<CompositionDescriptor>, RegistryError> {
        Ok(self.compositions.values().cloned().collect())
    }

    async fn resolve(
        &self,
        composition_id: &str,
        input_props: &Map<String, Value>,
    ) -> Result<ResolvedComposition, RegistryError> {
        let descriptor = self
            .compositions
            .get(composition_id)
            .ok_or_else(|| RegistryError::NotFound(composition_id.to_string()))?;
        resolve_with(descriptor, input_props)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn registry() -> StaticRegistry {
        let intro: CompositionDescriptor = serde_json::from_value(json!({
            "id": "Intro",
            "kind": "still",
            "width": 1920,
            "height": 1080,
            "schema": { "title": { "type": "string", "required": true } },
            "defaultProps": { "title": "Welcome" }
        }))
        .expect("descriptor");
        StaticRegistry::from_descriptors([intro]).expect("registry")
    }

    #[tokio::test]
    async fn resolve_merges_defaults() {
        let resolved = registry()
            .resolve("Intro", &Map::new())
            .await
            .expect("resolves");
        assert_eq!(resolved.props["title"], "Welcome");
    }

    #[tokio::test]
    async fn resolve_rejects_unknown_and_invalid() {
        let registry = registry();
        assert!(matches!(
            registry.resolve("Missing", &Map::new()).await,
            Err(RegistryError::NotFound(id)) if id == "Missing"
        ));

        let bad = json!({ "title": 42 });
        let err = registry
            .resolve("Intro", bad.as_object().expect("object"))
            .await
            .expect_err("type mismatch");
        assert!(matches!(err, RegistryError::InvalidInputProps { .. }));
        assert!(err.to_string().contains("`title` must be of type string"));
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let descriptor: CompositionDescriptor = serde_json::from_value(json!({
            "id": "Intro", "kind": "video", "width": 10, "height": 10
        }))
        .expect("descriptor");
        let result = StaticRegistry::from_descriptors([descriptor.clone(), descriptor]);
        assert!(matches!(result, Err(RegistryError::Unavailable(_))));
    }
}
