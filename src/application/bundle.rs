use std::sync::Arc;
use std::time::Instant;

use tokio::sync::OnceCell;
use tracing::{info, warn};

use super::engine::{BundleHandle, BundleSpec, EngineError, RenderEngine};

/// Builds the presentation bundle on first use and hands out the same handle afterwards.
///
/// Concurrent first callers share one build. A failed build leaves the cell
/// empty so the next caller tries again; a successful one is never rebuilt.
pub struct BundleManager {
    engine: Arc<dyn RenderEngine>,
    spec: BundleSpec,
    handle: OnceCell<BundleHandle>,
}

impl BundleManager {
    pub fn new(engine: Arc<dyn RenderEngine>, spec: BundleSpec) -> Self {
        Self {
            engine,
            spec,
            handle: OnceCell::new(),
        }
    }

    pub async fn get_bundle(&self) -> Result<BundleHandle, EngineError> {
        let handle = self
            .handle
            .get_or_try_init(|| async {
                let started_at = Instant::now();
                info!(
                    target = "framehouse::bundle",
                    op = "bundle::build",
                    entry_point = %self.spec.entry_point.display(),
                    plugins = self.spec.plugins.len(),
                    "Building presentation bundle"
                );

                match self.engine.bundle(&self.spec).await {
                    Ok(handle) => {
                        info!(
                            target = "framehouse::bundle",
                            op = "bundle::build",
                            result = "ok",
                            elapsed_ms = started_at.elapsed().as_millis() as u64,
                            location = handle.location(),
                            "Presentation bundle ready"
                        );
                        Ok(handle)
                    }
                    Err(err) => {
                        warn!(
                            target = "framehouse::bundle",
                            op = "bundle::build",
                            result = "error",
                            elapsed_ms = started_at.elapsed().as_millis() as u64,
                            error = %err,
                            "Presentation bundle build failed; will retry on next request"
                        );
                        Err(err)
                    }
                }
            })
            .await?;

        Ok(handle.clone())
    }

    pub fn is_built(&self) -> bool {
        self.handle.initialized()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;

    use crate::application::engine::RenderJob;

    #[derive(Default)]
    struct SlowBundler {
        builds: AtomicUsize,
        fail_first: bool,
    }

    #[async_trait]
    impl RenderEngine for SlowBundler {
        async fn bundle(&self, _spec: &BundleSpec) -> Result<BundleHandle, EngineError> {
            let attempt = self.builds.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            if self.fail_first && attempt == 0 {
                return Err(EngineError::failed("bundler crashed"));
            }
            Ok(BundleHandle::new(format!("/tmp/bundle-{attempt}")))
        }

        async fn render_media(&self, _job: &RenderJob) -> Result<(), EngineError> {
            unreachable!("bundle tests never render")
        }

        async fn render_still(&self, _job: &RenderJob) -> Result<(), EngineError> {
            unreachable!("bundle tests never render")
        }
    }

    fn spec() -> BundleSpec {
        BundleSpec {
            entry_point: PathBuf::from("src/index.ts"),
            plugins: vec!["tailwind".into()],
        }
    }

    #[tokio::test]
    async fn concurrent_first_calls_build_once() {
        let engine = Arc::new(SlowBundler::default());
        let manager = BundleManager::new(engine.clone(), spec());

        let (first, second, third) =
            tokio::join!(manager.get_bundle(), manager.get_bundle(), manager.get_bundle());

        assert_eq!(engine.builds.load(Ordering::SeqCst), 1);
        let first = first.expect("bundle");
        assert_eq!(first, second.expect("bundle"));
        assert_eq!(first, third.expect("bundle"));
        assert!(manager.is_built());

        manager.get_bundle().await.expect("memoized bundle");
        assert_eq!(engine.builds.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failed_build_is_retried() {
        let engine = Arc::new(SlowBundler {
            fail_first: true,
            ..Default::default()
        });
        let manager = BundleManager::new(engine.clone(), spec());

        let err = manager.get_bundle().await.expect_err("first build fails");
        assert_eq!(err.to_string(), "bundler crashed");
        assert!(!manager.is_built());

        let handle = manager.get_bundle().await.expect("second build succeeds");
        assert_eq!(handle.location(), "/tmp/bundle-1");
        assert_eq!(engine.builds.load(Ordering::SeqCst), 2);
    }
}
