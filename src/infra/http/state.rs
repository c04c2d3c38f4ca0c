use std::sync::Arc;

use crate::application::artifacts::ArtifactIndex;
use crate::application::assets::AssetIndexer;
use crate::application::registry::CompositionRegistry;
use crate::application::render::RenderService;
use crate::infra::uploads::UploadStorage;

#[derive(Clone)]
pub struct HttpState {
    pub renders: Arc<RenderService>,
    pub registry: Arc<dyn CompositionRegistry>,
    pub assets: Arc<AssetIndexer>,
    pub uploads: Arc<UploadStorage>,
}

impl HttpState {
    pub fn artifacts(&self) -> &Arc<ArtifactIndex> {
        self.renders.artifacts()
    }
}
