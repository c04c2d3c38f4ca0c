#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Request, Response, StatusCode, header};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tempfile::TempDir;
use tower::ServiceExt;

use framehouse::application::artifacts::ArtifactIndex;
use framehouse::application::assets::AssetIndexer;
use framehouse::application::bundle::BundleManager;
use framehouse::application::engine::{
    BundleHandle, BundleSpec, EngineError, RenderEngine, RenderJob,
};
use framehouse::application::registry::{CompositionRegistry, StaticRegistry};
use framehouse::application::render::RenderService;
use framehouse::domain::composition::CompositionDescriptor;
use framehouse::infra::http::{self, HttpState};
use framehouse::infra::uploads::UploadStorage;

pub const BODY_LIMIT: usize = 64 * 1024;
pub const PIXEL_PNG: &str = "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mP8z8BQDwAEhQGAhKmMIQAAAABJRU5ErkJggg==";

/// Engine double that writes a small file per render and counts invocations.
///
/// A `crash` prop makes the render fail with the prop's value as message.
#[derive(Default)]
pub struct CountingEngine {
    pub bundles: AtomicUsize,
    pub videos: AtomicUsize,
    pub stills: AtomicUsize,
}

impl CountingEngine {
    pub fn renders(&self) -> usize {
        self.videos.load(Ordering::SeqCst) + self.stills.load(Ordering::SeqCst)
    }

    async fn write(job: &RenderJob, contents: &[u8]) -> Result<(), EngineError> {
        if let Some(message) = job.props.get("crash").and_then(Value::as_str) {
            return Err(EngineError::failed(message));
        }
        tokio::fs::write(&job.output, contents).await?;
        Ok(())
    }
}

#[async_trait]
impl RenderEngine for CountingEngine {
    async fn bundle(&self, _spec: &BundleSpec) -> Result<BundleHandle, EngineError> {
        self.bundles.fetch_add(1, Ordering::SeqCst);
        Ok(BundleHandle::new("/srv/bundle"))
    }

    async fn render_media(&self, job: &RenderJob) -> Result<(), EngineError> {
        self.videos.fetch_add(1, Ordering::SeqCst);
        Self::write(job, b"mp4").await
    }

    async fn render_still(&self, job: &RenderJob) -> Result<(), EngineError> {
        self.stills.fetch_add(1, Ordering::SeqCst);
        Self::write(job, b"png").await
    }
}

pub fn registry() -> StaticRegistry {
    let descriptors: Vec<CompositionDescriptor> = serde_json::from_value(json!([
        {
            "id": "Intro",
            "kind": "still",
            "width": 1200,
            "height": 630,
            "defaultProps": { "title": "Hello", "theme": "dark" }
        },
        {
            "id": "Clip",
            "kind": "video",
            "width": 1280,
            "height": 720,
            "fps": 30,
            "durationInFrames": 90,
            "schema": { "title": { "type": "string" } }
        }
    ]))
    .expect("descriptors");
    StaticRegistry::from_descriptors(descriptors).expect("registry")
}

pub struct TestApp {
    pub router: Router,
    pub engine: Arc<CountingEngine>,
    pub renders_dir: PathBuf,
    pub public_dir: PathBuf,
    _root: TempDir,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_retention(10).await
    }

    pub async fn with_retention(keep: usize) -> Self {
        let root = TempDir::new().expect("temp dir");
        let renders_dir = root.path().join("renders");
        let public_dir = root.path().join("public");
        std::fs::create_dir_all(&public_dir).expect("public dir");

        let engine = Arc::new(CountingEngine::default());
        let registry: Arc<dyn CompositionRegistry> = Arc::new(registry());
        let bundles = Arc::new(BundleManager::new(
            engine.clone(),
            BundleSpec {
                entry_point: PathBuf::from("src/index.ts"),
                plugins: Vec::new(),
            },
        ));
        let artifacts = Arc::new(ArtifactIndex::open(renders_dir.clone()).await);
        let renders = Arc::new(RenderService::new(
            bundles,
            registry.clone(),
            engine.clone(),
            artifacts,
            keep,
        ));

        let state = HttpState {
            renders,
            registry,
            assets: Arc::new(
                AssetIndexer::new(public_dir.clone(), "http://localhost:3000").expect("indexer"),
            ),
            uploads: Arc::new(UploadStorage::new(public_dir.clone()).expect("uploads")),
        };

        Self {
            router: http::build_router(state, BODY_LIMIT),
            engine,
            renders_dir,
            public_dir,
            _root: root,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible")
    }

    pub async fn post_json(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.post_raw(uri, body.to_string()).await
    }

    pub async fn post_raw(&self, uri: &str, body: impl Into<Body>) -> (StatusCode, Value) {
        let request = Request::post(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(body.into())
            .expect("request");
        let response = self.send(request).await;
        json_body(response).await
    }

    pub async fn get_json(&self, uri: &str) -> (StatusCode, Value) {
        let request = Request::get(uri).body(Body::empty()).expect("request");
        json_body(self.send(request).await).await
    }

    pub async fn delete_json(&self, uri: &str) -> (StatusCode, Value) {
        let request = Request::delete(uri).body(Body::empty()).expect("request");
        json_body(self.send(request).await).await
    }
}

pub async fn json_body(response: Response<Body>) -> (StatusCode, Value) {
    let status = response.status();
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body")
        .to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|_| {
            panic!("response is not JSON: {}", String::from_utf8_lossy(&bytes))
        })
    };
    (status, value)
}

pub fn file_count(dir: &std::path::Path) -> usize {
    std::fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(Result::ok)
                .filter(|entry| !entry.file_name().to_string_lossy().starts_with('.'))
                .count()
        })
        .unwrap_or(0)
}
