use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueHint, builder::BoolishValueParser};

/// Command-line arguments for the framehouse binary.
#[derive(Debug, Parser)]
#[command(name = "framehouse", version, about = "On-demand media render service")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(
        long = "config-file",
        env = "FRAMEHOUSE_CONFIG_FILE",
        value_name = "PATH",
        global = true
    )]
    pub config_file: Option<PathBuf>,

    /// Listen port; also read from `PORT`.
    #[arg(long = "port", env = "PORT", value_name = "PORT", global = true)]
    pub port: Option<u16>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the HTTP service.
    Serve(Box<ServeArgs>),
    /// Render one composition and print the artifact filename.
    Render(RenderArgs),
    /// Apply the retention policy to every composition in the renders directory.
    Prune(PruneArgs),
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub overrides: ServeOverrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct StorageOverrides {
    /// Override the directory rendered artifacts are written to.
    #[arg(long = "renders-dir", value_name = "PATH", value_hint = ValueHint::DirPath)]
    pub renders_dir: Option<PathBuf>,

    /// Override the public asset directory.
    #[arg(long = "public-dir", value_name = "PATH", value_hint = ValueHint::DirPath)]
    pub public_dir: Option<PathBuf>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct EngineOverrides {
    /// Override the render engine executable.
    #[arg(long = "engine-path", value_name = "PATH", value_hint = ValueHint::FilePath)]
    pub engine_path: Option<PathBuf>,

    /// Override the presentation entry point handed to the bundler.
    #[arg(long = "entry-point", value_name = "PATH", value_hint = ValueHint::FilePath)]
    pub entry_point: Option<PathBuf>,

    /// Override the composition manifest.
    #[arg(long = "registry-manifest", value_name = "PATH", value_hint = ValueHint::FilePath)]
    pub registry_manifest: Option<PathBuf>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeOverrides {
    #[command(flatten)]
    pub storage: StorageOverrides,

    #[command(flatten)]
    pub engine: EngineOverrides,

    /// Override the listener host.
    #[arg(long = "server-host", value_name = "HOST")]
    pub server_host: Option<String>,

    /// Override the graceful shutdown timeout.
    #[arg(long = "server-graceful-shutdown-seconds", value_name = "SECONDS")]
    pub server_graceful_shutdown_seconds: Option<u64>,

    /// Override the base URL used in asset links.
    #[arg(long = "public-base-url", value_name = "URL")]
    pub public_base_url: Option<String>,

    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub log_json: Option<bool>,

    /// Override how many artifacts to keep per composition and kind.
    #[arg(long = "retention-keep", value_name = "COUNT")]
    pub retention_keep: Option<u64>,

    /// Override the maximum request body size in bytes.
    #[arg(long = "uploads-max-request-bytes", value_name = "BYTES")]
    pub uploads_max_request_bytes: Option<u64>,
}

#[derive(Debug, Args, Clone)]
pub struct RenderArgs {
    /// Composition identifier.
    #[arg(value_name = "COMPOSITION")]
    pub composition: String,

    /// Input props as a JSON object.
    #[arg(long, value_name = "JSON")]
    pub props: Option<String>,

    /// Render a still image instead of a video.
    #[arg(long, action = clap::ArgAction::SetTrue)]
    pub still: bool,

    /// Video codec (h264|h265).
    #[arg(long, value_name = "CODEC")]
    pub codec: Option<String>,

    /// Reuse a matching artifact when one exists.
    #[arg(long, action = clap::ArgAction::SetTrue)]
    pub cache: bool,

    #[command(flatten)]
    pub storage: StorageOverrides,

    #[command(flatten)]
    pub engine: EngineOverrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct PruneArgs {
    /// Number of artifacts to keep per composition and kind.
    #[arg(long, value_name = "COUNT")]
    pub keep: Option<u64>,

    #[command(flatten)]
    pub storage: StorageOverrides,
}
