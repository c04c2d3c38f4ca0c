use std::sync::Arc;
use std::time::Instant;

use metrics::{counter, histogram};
use time::OffsetDateTime;
use tokio::fs;
use tracing::{info, warn};

use super::runtime::CompositionLocks;
use super::types::{RenderError, RenderOutcome, RenderRequest};
use crate::application::artifacts::ArtifactIndex;
use crate::application::bundle::BundleManager;
use crate::application::cache_key::cache_key;
use crate::application::engine::{EngineError, RenderEngine, RenderJob};
use crate::application::registry::CompositionRegistry;
use crate::domain::artifact::{RenderedArtifact, artifact_filename, next_filename_instant};
use crate::domain::composition::{Codec, CompositionKind, validate_composition_id};

pub(crate) const METRIC_CACHE_HIT: &str = "framehouse_render_cache_hit_total";
pub(crate) const METRIC_CACHE_MISS: &str = "framehouse_render_cache_miss_total";
pub(crate) const METRIC_ENGINE_MS: &str = "framehouse_render_engine_ms";
pub(crate) const METRIC_RENDER_FAILED: &str = "framehouse_render_failed_total";

/// Drives the engine for render requests and keeps the artifact index in step.
pub struct RenderService {
    bundles: Arc<BundleManager>,
    registry: Arc<dyn CompositionRegistry>,
    engine: Arc<dyn RenderEngine>,
    artifacts: Arc<ArtifactIndex>,
    locks: CompositionLocks,
    retention_keep: usize,
    default_codec: Codec,
}

impl RenderService {
    pub fn new(
        bundles: Arc<BundleManager>,
        registry: Arc<dyn CompositionRegistry>,
        engine: Arc<dyn RenderEngine>,
        artifacts: Arc<ArtifactIndex>,
        retention_keep: usize,
    ) -> Self {
        Self {
            bundles,
            registry,
            engine,
            artifacts,
            locks: CompositionLocks::new(),
            retention_keep,
            default_codec: Codec::default(),
        }
    }

    pub fn with_default_codec(mut self, codec: Codec) -> Self {
        self.default_codec = codec;
        self
    }

    pub fn artifacts(&self) -> &Arc<ArtifactIndex> {
        &self.artifacts
    }

    pub async fn render(&self, request: RenderRequest) -> Result<RenderOutcome, RenderError> {
        let started_at = Instant::now();
        validate_composition_id(&request.composition_id)
            .map_err(|err| RenderError::Validation(err.to_string()))?;

        let codec = match request.kind {
            CompositionKind::Video => Some(request.codec.unwrap_or(self.default_codec)),
            CompositionKind::Still => None,
        };
        let key = cache_key(
            &request.composition_id,
            request.kind,
            codec,
            &request.input_props,
        );

        let _guard = self.locks.acquire(&request.composition_id).await;

        if request.cache_enabled {
            if let Some(artifact) = self
                .artifacts
                .find_cached(&request.composition_id, request.kind, &key)
                .await
            {
                counter!(METRIC_CACHE_HIT, "kind" => request.kind.as_str()).increment(1);
                info!(
                    target = "application::render",
                    op = "render::execute",
                    result = "cache_hit",
                    composition_id = %request.composition_id,
                    kind = request.kind.as_str(),
                    cache_key = %key,
                    filename = %artifact.filename,
                    elapsed_ms = started_at.elapsed().as_millis() as u64,
                    "Serving cached artifact"
                );
                return Ok(RenderOutcome {
                    artifact,
                    cached: true,
                });
            }
            counter!(METRIC_CACHE_MISS, "kind" => request.kind.as_str()).increment(1);
        }

        let outcome = self.render_fresh(&request, codec, key, started_at).await;
        if outcome.is_err() {
            counter!(METRIC_RENDER_FAILED, "kind" => request.kind.as_str()).increment(1);
        }
        outcome
    }

    async fn render_fresh(
        &self,
        request: &RenderRequest,
        codec: Option<Codec>,
        key: String,
        started_at: Instant,
    ) -> Result<RenderOutcome, RenderError> {
        let bundle = self.bundles.get_bundle().await?;
        let resolved = self
            .registry
            .resolve(&request.composition_id, &request.input_props)
            .await?;

        fs::create_dir_all(self.artifacts.dir()).await?;
        let (filename, output) = self.free_output_path(request).await?;

        let job = RenderJob {
            bundle,
            composition: resolved.descriptor,
            props: resolved.props,
            output: output.clone(),
            codec,
        };

        let engine_started_at = Instant::now();
        let result = match request.kind {
            CompositionKind::Video => self.engine.render_media(&job).await,
            CompositionKind::Still => self.engine.render_still(&job).await,
        };
        let engine_ms = engine_started_at.elapsed().as_millis() as u64;
        histogram!(METRIC_ENGINE_MS, "kind" => request.kind.as_str()).record(engine_ms as f64);

        if let Err(err) = result {
            warn!(
                target = "application::render",
                op = "render::execute",
                result = "error",
                composition_id = %request.composition_id,
                kind = request.kind.as_str(),
                engine_ms,
                error = %err,
                "Render engine failed"
            );
            return Err(err.into());
        }

        let metadata = match fs::metadata(&output).await {
            Ok(metadata) if metadata.is_file() => metadata,
            _ => {
                return Err(EngineError::InvalidOutput(format!(
                    "expected output at {}",
                    output.display()
                ))
                .into());
            }
        };
        let now = OffsetDateTime::now_utc();
        let modified = metadata.modified().map(OffsetDateTime::from).unwrap_or(now);

        let artifact = RenderedArtifact {
            composition_id: request.composition_id.clone(),
            kind: request.kind,
            filename,
            path: output,
            created: metadata.created().map(OffsetDateTime::from).unwrap_or(modified),
            modified,
            cache_key: Some(key),
        };
        self.artifacts.record(artifact.clone()).await;
        let report = self
            .artifacts
            .prune(&request.composition_id, request.kind, self.retention_keep)
            .await;

        info!(
            target = "application::render",
            op = "render::execute",
            result = "rendered",
            composition_id = %request.composition_id,
            kind = request.kind.as_str(),
            filename = %artifact.filename,
            engine_ms,
            pruned = report.deleted.len(),
            elapsed_ms = started_at.elapsed().as_millis() as u64,
            "Artifact rendered"
        );

        Ok(RenderOutcome {
            artifact,
            cached: false,
        })
    }

    async fn free_output_path(
        &self,
        request: &RenderRequest,
    ) -> Result<(String, std::path::PathBuf), RenderError> {
        let mut at = OffsetDateTime::now_utc();
        loop {
            let filename = artifact_filename(&request.composition_id, request.kind, at);
            let path = self.artifacts.path_for(&filename);
            if !fs::try_exists(&path).await? {
                return Ok((filename, path));
            }
            at = next_filename_instant(at);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use serde_json::{Map, Value, json};
    use tempfile::TempDir;

    use crate::application::engine::{BundleHandle, BundleSpec};
    use crate::application::registry::StaticRegistry;
    use crate::domain::composition::CompositionDescriptor;

    #[derive(Default)]
    struct RecordingEngine {
        renders: AtomicUsize,
        fail_with: Option<String>,
        jobs: Mutex<Vec<RenderJob>>,
    }

    #[async_trait]
    impl RenderEngine for RecordingEngine {
        async fn bundle(&self, _spec: &BundleSpec) -> Result<BundleHandle, EngineError> {
            Ok(BundleHandle::new("/bundle"))
        }

        async fn render_media(&self, job: &RenderJob) -> Result<(), EngineError> {
            self.render_still(job).await
        }

        async fn render_still(&self, job: &RenderJob) -> Result<(), EngineError> {
            self.renders.fetch_add(1, Ordering::SeqCst);
            self.jobs.lock().expect("jobs").push(job.clone());
            if let Some(message) = &self.fail_with {
                return Err(EngineError::failed(message.clone()));
            }
            std::fs::write(&job.output, b"pixels")?;
            Ok(())
        }
    }

    async fn service(dir: PathBuf, engine: Arc<RecordingEngine>) -> RenderService {
        let intro: CompositionDescriptor = serde_json::from_value(json!({
            "id": "Intro",
            "kind": "still",
            "width": 1280,
            "height": 720,
            "schema": { "title": { "type": "string" } },
            "defaultProps": { "title": "Hello", "accent": "#ff0000" }
        }))
        .expect("descriptor");
        let registry = Arc::new(StaticRegistry::from_descriptors([intro]).expect("registry"));
        let bundles = Arc::new(BundleManager::new(
            engine.clone(),
            BundleSpec {
                entry_point: PathBuf::from("src/index.ts"),
                plugins: Vec::new(),
            },
        ));
        let artifacts = Arc::new(ArtifactIndex::open(dir).await);
        RenderService::new(bundles, registry, engine, artifacts, 10)
    }

    fn props(value: Value) -> Map<String, Value> {
        value.as_object().cloned().expect("object")
    }

    #[tokio::test]
    async fn cache_hit_skips_engine() {
        let dir = TempDir::new().expect("temp dir");
        let engine = Arc::new(RecordingEngine::default());
        let service = service(dir.path().to_path_buf(), engine.clone()).await;

        let request = RenderRequest::new("Intro", CompositionKind::Still)
            .with_props(props(json!({ "title": "Hi" })))
            .with_cache(true);
        let first = service.render(request.clone()).await.expect("first render");
        assert!(!first.cached);

        let second = service.render(request).await.expect("second render");
        assert!(second.cached);
        assert_eq!(second.artifact.filename, first.artifact.filename);
        assert_eq!(engine.renders.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn merged_props_reach_the_engine() {
        let dir = TempDir::new().expect("temp dir");
        let engine = Arc::new(RecordingEngine::default());
        let service = service(dir.path().to_path_buf(), engine.clone()).await;

        service
            .render(
                RenderRequest::new("Intro", CompositionKind::Video)
                    .with_props(props(json!({ "title": "Override" }))),
            )
            .await
            .expect("render");

        let jobs = engine.jobs.lock().expect("jobs");
        assert_eq!(jobs[0].props["title"], "Override");
        assert_eq!(jobs[0].props["accent"], "#ff0000");
        assert_eq!(jobs[0].codec, Some(Codec::H264));
        assert!(jobs[0].output.to_string_lossy().ends_with(".mp4"));
    }

    #[tokio::test]
    async fn invalid_ids_never_reach_the_engine() {
        let dir = TempDir::new().expect("temp dir");
        let engine = Arc::new(RecordingEngine::default());
        let service = service(dir.path().to_path_buf(), engine.clone()).await;

        let err = service
            .render(RenderRequest::new("../etc", CompositionKind::Still))
            .await
            .expect_err("rejected");
        assert!(err.is_client_error());
        assert_eq!(engine.renders.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn engine_message_is_preserved() {
        let dir = TempDir::new().expect("temp dir");
        let engine = Arc::new(RecordingEngine {
            fail_with: Some("Composition crashed at frame 12".into()),
            ..Default::default()
        });
        let service = service(dir.path().to_path_buf(), engine).await;

        let err = service
            .render(RenderRequest::new("Intro", CompositionKind::Still))
            .await
            .expect_err("engine failure");
        assert!(matches!(err, RenderError::Engine(_)));
        assert_eq!(err.to_string(), "Composition crashed at frame 12");
        assert_eq!(service.artifacts().tracked(), 0);
    }

    #[tokio::test]
    async fn unknown_composition_is_reported() {
        let dir = TempDir::new().expect("temp dir");
        let engine = Arc::new(RecordingEngine::default());
        let service = service(dir.path().to_path_buf(), engine.clone()).await;

        let err = service
            .render(RenderRequest::new("Missing", CompositionKind::Still))
            .await
            .expect_err("not found");
        assert!(matches!(err, RenderError::CompositionNotFound(id) if id == "Missing"));
        assert_eq!(engine.renders.load(Ordering::SeqCst), 0);
    }
}
