//! Configuration layer: typed settings with layered precedence (file → env → CLI).

use std::{
    net::SocketAddr,
    num::{NonZeroU32, NonZeroU64},
    path::PathBuf,
    str::FromStr,
    time::Duration,
};

use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

use crate::domain::composition::Codec;

mod cli;

pub use cli::{
    CliArgs, Command, EngineOverrides, PruneArgs, RenderArgs, ServeArgs, ServeOverrides,
    StorageOverrides,
};

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "framehouse";
const ENV_PREFIX: &str = "FRAMEHOUSE";
const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_GRACEFUL_SHUTDOWN_SECS: u64 = 30;
const DEFAULT_RENDERS_DIR: &str = "renders";
const DEFAULT_PUBLIC_DIR: &str = "public";
const DEFAULT_ENGINE_PATH: &str = "framehouse-engine";
const DEFAULT_ENTRY_POINT: &str = "src/index.ts";
const DEFAULT_RETENTION_KEEP: u64 = 10;
const DEFAULT_REGISTRY_MANIFEST: &str = "compositions.json";
const DEFAULT_UPLOAD_REQUEST_LIMIT_BYTES: u64 = 10 * 1024 * 1024;

/// Fully-resolved deployment settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub storage: StorageSettings,
    pub render: RenderSettings,
    pub registry: RegistrySettings,
    pub uploads: UploadSettings,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub addr: SocketAddr,
    pub graceful_shutdown: Duration,
    /// Absolute origin used to build asset URLs, e.g. `http://localhost:3000`.
    pub public_base_url: String,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone)]
pub struct StorageSettings {
    pub renders_dir: PathBuf,
    pub public_dir: PathBuf,
}

#[derive(Debug, Clone)]
pub struct RenderSettings {
    pub engine_path: PathBuf,
    pub entry_point: PathBuf,
    pub plugins: Vec<String>,
    pub retention_keep: NonZeroU32,
    pub default_codec: Codec,
}

#[derive(Debug, Clone)]
pub struct RegistrySettings {
    pub manifest_path: PathBuf,
}

#[derive(Debug, Clone)]
pub struct UploadSettings {
    pub max_request_bytes: NonZeroU64,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .separator("__")
            .list_separator(",")
            .with_list_parse_key("render.plugins")
            .try_parsing(true),
    );

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    if let Some(port) = cli.port {
        raw.server.port = Some(port);
    }

    match cli.command.as_ref() {
        Some(Command::Serve(args)) => raw.apply_serve_overrides(&args.overrides),
        Some(Command::Render(args)) => {
            raw.apply_storage_overrides(&args.storage);
            raw.apply_engine_overrides(&args.engine);
        }
        Some(Command::Prune(args)) => {
            raw.apply_storage_overrides(&args.storage);
            if let Some(keep) = args.keep {
                raw.render.retention_keep = Some(keep);
            }
        }
        None => raw.apply_serve_overrides(&ServeOverrides::default()),
    }

    Settings::from_raw(raw)
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    server: RawServerSettings,
    logging: RawLoggingSettings,
    storage: RawStorageSettings,
    render: RawRenderSettings,
    registry: RawRegistrySettings,
    uploads: RawUploadSettings,
}

impl RawSettings {
    fn apply_serve_overrides(&mut self, overrides: &ServeOverrides) {
        if let Some(host) = overrides.server_host.as_ref() {
            self.server.host = Some(host.clone());
        }
        if let Some(seconds) = overrides.server_graceful_shutdown_seconds {
            self.server.graceful_shutdown_seconds = Some(seconds);
        }
        if let Some(url) = overrides.public_base_url.as_ref() {
            self.server.public_base_url = Some(url.clone());
        }
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        if let Some(keep) = overrides.retention_keep {
            self.render.retention_keep = Some(keep);
        }
        if let Some(limit) = overrides.uploads_max_request_bytes {
            self.uploads.max_request_bytes = Some(limit);
        }
        self.apply_storage_overrides(&overrides.storage);
        self.apply_engine_overrides(&overrides.engine);
    }

    fn apply_storage_overrides(&mut self, overrides: &StorageOverrides) {
        if let Some(dir) = overrides.renders_dir.as_ref() {
            self.storage.renders_dir = Some(dir.clone());
        }
        if let Some(dir) = overrides.public_dir.as_ref() {
            self.storage.public_dir = Some(dir.clone());
        }
    }

    fn apply_engine_overrides(&mut self, overrides: &EngineOverrides) {
        if let Some(path) = overrides.engine_path.as_ref() {
            self.render.engine_path = Some(path.clone());
        }
        if let Some(path) = overrides.entry_point.as_ref() {
            self.render.entry_point = Some(path.clone());
        }
        if let Some(path) = overrides.registry_manifest.as_ref() {
            self.registry.manifest_path = Some(path.clone());
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            server,
            logging,
            storage,
            render,
            registry,
            uploads,
        } = raw;

        Ok(Self {
            server: build_server_settings(server)?,
            logging: build_logging_settings(logging)?,
            storage: build_storage_settings(storage)?,
            render: build_render_settings(render)?,
            registry: build_registry_settings(registry)?,
            uploads: build_upload_settings(uploads)?,
        })
    }
}

fn build_server_settings(server: RawServerSettings) -> Result<ServerSettings, LoadError> {
    let host = server.host.unwrap_or_else(|| DEFAULT_HOST.to_string());
    let port = server.port.unwrap_or(DEFAULT_PORT);
    if port == 0 {
        return Err(LoadError::invalid(
            "server.port",
            "port must be greater than zero",
        ));
    }
    let addr = parse_socket_addr(&host, port)
        .map_err(|reason| LoadError::invalid("server.addr", reason))?;

    let graceful_secs = server
        .graceful_shutdown_seconds
        .unwrap_or(DEFAULT_GRACEFUL_SHUTDOWN_SECS);
    if graceful_secs == 0 {
        return Err(LoadError::invalid(
            "server.graceful_shutdown_seconds",
            "must be greater than zero",
        ));
    }

    let public_base_url = match server.public_base_url {
        Some(value) => {
            let trimmed = value.trim().trim_end_matches('/');
            let parsed = url::Url::parse(trimmed).map_err(|err| {
                LoadError::invalid("server.public_base_url", format!("invalid URL: {err}"))
            })?;
            if !matches!(parsed.scheme(), "http" | "https") {
                return Err(LoadError::invalid(
                    "server.public_base_url",
                    "scheme must be http or https",
                ));
            }
            trimmed.to_string()
        }
        None => format!("http://localhost:{port}"),
    };

    Ok(ServerSettings {
        addr,
        graceful_shutdown: Duration::from_secs(graceful_secs),
        public_base_url,
    })
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_storage_settings(storage: RawStorageSettings) -> Result<StorageSettings, LoadError> {
    let renders_dir = non_empty_path(
        storage.renders_dir,
        DEFAULT_RENDERS_DIR,
        "storage.renders_dir",
    )?;
    let public_dir = non_empty_path(storage.public_dir, DEFAULT_PUBLIC_DIR, "storage.public_dir")?;
    if renders_dir == public_dir {
        return Err(LoadError::invalid(
            "storage.renders_dir",
            "must differ from storage.public_dir",
        ));
    }
    Ok(StorageSettings {
        renders_dir,
        public_dir,
    })
}

fn build_render_settings(render: RawRenderSettings) -> Result<RenderSettings, LoadError> {
    let engine_path = non_empty_path(
        render.engine_path,
        DEFAULT_ENGINE_PATH,
        "render.engine_path",
    )?;
    let entry_point = non_empty_path(
        render.entry_point,
        DEFAULT_ENTRY_POINT,
        "render.entry_point",
    )?;
    let plugins = render
        .plugins
        .unwrap_or_default()
        .into_iter()
        .map(|plugin| plugin.trim().to_string())
        .filter(|plugin| !plugin.is_empty())
        .collect();
    let retention_keep = non_zero_u32(
        render.retention_keep.unwrap_or(DEFAULT_RETENTION_KEEP),
        "render.retention_keep",
    )?;
    let default_codec = match render.default_codec {
        Some(value) => Codec::from_str(value.trim())
            .map_err(|err| LoadError::invalid("render.default_codec", err.to_string()))?,
        None => Codec::default(),
    };

    Ok(RenderSettings {
        engine_path,
        entry_point,
        plugins,
        retention_keep,
        default_codec,
    })
}

fn build_registry_settings(registry: RawRegistrySettings) -> Result<RegistrySettings, LoadError> {
    Ok(RegistrySettings {
        manifest_path: non_empty_path(
            registry.manifest_path,
            DEFAULT_REGISTRY_MANIFEST,
            "registry.manifest_path",
        )?,
    })
}

fn build_upload_settings(uploads: RawUploadSettings) -> Result<UploadSettings, LoadError> {
    let max_request_bytes_value = uploads
        .max_request_bytes
        .unwrap_or(DEFAULT_UPLOAD_REQUEST_LIMIT_BYTES);
    let max_request_bytes = NonZeroU64::new(max_request_bytes_value).ok_or_else(|| {
        LoadError::invalid("uploads.max_request_bytes", "must be greater than zero")
    })?;
    usize::try_from(max_request_bytes_value).map_err(|_| {
        LoadError::invalid(
            "uploads.max_request_bytes",
            "value exceeds supported range for usize",
        )
    })?;

    Ok(UploadSettings { max_request_bytes })
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawServerSettings {
    host: Option<String>,
    port: Option<u16>,
    graceful_shutdown_seconds: Option<u64>,
    public_base_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawStorageSettings {
    renders_dir: Option<PathBuf>,
    public_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawRenderSettings {
    engine_path: Option<PathBuf>,
    entry_point: Option<PathBuf>,
    plugins: Option<Vec<String>>,
    retention_keep: Option<u64>,
    default_codec: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawRegistrySettings {
    manifest_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawUploadSettings {
    max_request_bytes: Option<u64>,
}

fn parse_socket_addr(host: &str, port: u16) -> Result<SocketAddr, String> {
    let candidate = format!("{host}:{port}");
    candidate
        .parse()
        .map_err(|err| format!("invalid address `{candidate}`: {err}"))
}

fn non_empty_path(
    value: Option<PathBuf>,
    default: &str,
    key: &'static str,
) -> Result<PathBuf, LoadError> {
    let path = value.unwrap_or_else(|| PathBuf::from(default));
    if path.as_os_str().is_empty() {
        return Err(LoadError::invalid(key, "path must not be empty"));
    }
    Ok(path)
}

fn non_zero_u32(value: u64, key: &'static str) -> Result<NonZeroU32, LoadError> {
    if value == 0 {
        return Err(LoadError::invalid(key, "must be greater than zero"));
    }
    let value_u32: u32 = value
        .try_into()
        .map_err(|_| LoadError::invalid(key, "value exceeds supported range for u32"))?;
    NonZeroU32::new(value_u32).ok_or_else(|| LoadError::invalid(key, "must be greater than zero"))
}
