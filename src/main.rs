use std::{future::IntoFuture, process, sync::Arc};

use framehouse::{
    application::{
        artifacts::ArtifactIndex,
        assets::AssetIndexer,
        bundle::BundleManager,
        engine::{BundleSpec, RenderEngine},
        error::AppError,
        registry::CompositionRegistry,
        render::{RenderRequest, RenderService},
    },
    config,
    domain::composition::{Codec, CompositionKind},
    infra::{
        engine::CommandEngine,
        error::InfraError,
        http::{self, HttpState},
        registry, telemetry,
        uploads::UploadStorage,
    },
};
use serde_json::{Map, Value};
use tokio::sync::watch;
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::Render(args) => run_render(settings, args).await,
        config::Command::Prune(_) => run_prune(settings).await,
    }
}

struct ApplicationContext {
    renders: Arc<RenderService>,
    registry: Arc<dyn CompositionRegistry>,
}

async fn build_application_context(
    settings: &config::Settings,
) -> Result<ApplicationContext, AppError> {
    let registry: Arc<dyn CompositionRegistry> =
        Arc::new(registry::load_manifest(&settings.registry.manifest_path).await?);
    let engine: Arc<dyn RenderEngine> =
        Arc::new(CommandEngine::new(settings.render.engine_path.clone()));
    let bundles = Arc::new(BundleManager::new(
        engine.clone(),
        BundleSpec {
            entry_point: settings.render.entry_point.clone(),
            plugins: settings.render.plugins.clone(),
        },
    ));
    let artifacts = Arc::new(ArtifactIndex::open(settings.storage.renders_dir.clone()).await);

    let renders = RenderService::new(
        bundles,
        registry.clone(),
        engine,
        artifacts,
        settings.render.retention_keep.get() as usize,
    )
    .with_default_codec(settings.render.default_codec);

    Ok(ApplicationContext {
        renders: Arc::new(renders),
        registry,
    })
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let app = build_application_context(&settings).await?;

    let uploads = Arc::new(
        UploadStorage::new(settings.storage.public_dir.clone())
            .map_err(|err| AppError::from(InfraError::Io(err)))?,
    );
    let assets = Arc::new(
        AssetIndexer::new(
            settings.storage.public_dir.clone(),
            &settings.server.public_base_url,
        )
        .map_err(|err| {
            AppError::from(InfraError::configuration(format!(
                "invalid public base url: {err}"
            )))
        })?,
    );

    let state = HttpState {
        renders: app.renders,
        registry: app.registry,
        assets,
        uploads,
    };

    serve_http(&settings, state).await
}

async fn run_render(settings: config::Settings, args: config::RenderArgs) -> Result<(), AppError> {
    let app = build_application_context(&settings).await?;

    let input_props = match args.props.as_deref() {
        None => Map::new(),
        Some(raw) => match serde_json::from_str::<Value>(raw) {
            Ok(Value::Object(map)) => map,
            Ok(_) => return Err(AppError::validation("--props must be a JSON object")),
            Err(err) => return Err(AppError::validation(format!("--props is not JSON: {err}"))),
        },
    };
    let codec = args
        .codec
        .as_deref()
        .map(str::parse::<Codec>)
        .transpose()?;
    let kind = if args.still {
        CompositionKind::Still
    } else {
        CompositionKind::Video
    };

    let request = RenderRequest::new(args.composition, kind)
        .with_props(input_props)
        .with_cache(args.cache)
        .with_codec(codec);
    let outcome = app
        .renders
        .render(request)
        .await
        .map_err(|err| AppError::unexpected(format!("render failed: {err}")))?;

    info!(
        target = "framehouse::render",
        filename = %outcome.artifact.filename,
        cached = outcome.cached,
        "Render finished"
    );
    println!("{}", outcome.artifact.filename);
    Ok(())
}

async fn run_prune(settings: config::Settings) -> Result<(), AppError> {
    let artifacts = ArtifactIndex::open(settings.storage.renders_dir.clone()).await;
    let keep = settings.render.retention_keep.get() as usize;
    let reports = artifacts.prune_all(keep).await;

    let deleted: usize = reports.iter().map(|report| report.deleted.len()).sum();
    let failed: usize = reports.iter().map(|report| report.failed.len()).sum();
    info!(
        target = "framehouse::prune",
        keep,
        groups = reports.len(),
        deleted,
        failed,
        "Prune completed"
    );
    if failed > 0 {
        return Err(AppError::unexpected(format!(
            "{failed} artifact(s) could not be deleted"
        )));
    }
    Ok(())
}

async fn serve_http(settings: &config::Settings, state: HttpState) -> Result<(), AppError> {
    let body_limit = settings.uploads.max_request_bytes.get() as usize;
    let router = http::build_router(state, body_limit);

    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;
    info!(
        target = "framehouse::serve",
        addr = %settings.server.addr,
        public_base_url = %settings.server.public_base_url,
        "Render server listening"
    );

    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
    let server = axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            let _ = shutdown_tx.send(true);
        })
        .into_future();
    tokio::pin!(server);

    tokio::select! {
        result = &mut server => {
            return result.map_err(|err| AppError::unexpected(format!("server error: {err}")));
        }
        _ = shutdown_rx.changed() => {}
    }

    let grace = settings.server.graceful_shutdown;
    info!(
        target = "framehouse::serve",
        grace_secs = grace.as_secs(),
        "Shutdown requested; draining in-flight requests"
    );
    match tokio::time::timeout(grace, server).await {
        Ok(result) => result.map_err(|err| AppError::unexpected(format!("server error: {err}"))),
        Err(_) => {
            warn!(
                target = "framehouse::serve",
                "Graceful shutdown timed out; abandoning in-flight requests"
            );
            Ok(())
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(target = "framehouse::serve", error = %err, "Failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                warn!(target = "framehouse::serve", error = %err, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
