//! Render engine driven as an external command-line program.
//!
//! Subcommands:
//!
//! - `bundle --entry <path> [--plugin <name>]...` prints the bundle location
//!   on its last non-empty stdout line.
//! - `render --bundle <loc> --composition <id> --props <json> --codec <codec>
//!   --output <path> --width <w> --height <h> --fps <fps> --frames <n>`
//! - `still --bundle <loc> --composition <id> --props <json> --output <path>
//!   --width <w> --height <h>`
//!
//! A non-zero exit is a failure whose message is the trimmed stderr.

use std::ffi::OsString;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Instant;

use async_trait::async_trait;
use serde_json::Value;
use tokio::process::Command;
use tracing::{info, warn};

use crate::application::engine::{BundleHandle, BundleSpec, EngineError, RenderEngine, RenderJob};

#[derive(Debug, Clone)]
pub struct CommandEngine {
    program: PathBuf,
}

struct Captured {
    stdout: String,
}

impl CommandEngine {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    async fn run(&self, op: &'static str, args: Vec<OsString>) -> Result<Captured, EngineError> {
        let started_at = Instant::now();
        let output = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|err| {
                warn!(
                    target = "infra::engine",
                    op,
                    result = "error",
                    elapsed_ms = started_at.elapsed().as_millis() as u64,
                    error_code = "spawn_engine",
                    program = %self.program.display(),
                    error = %err,
                    "Failed to spawn render engine"
                );
                if err.kind() == ErrorKind::NotFound {
                    EngineError::Unavailable(format!(
                        "`{}` not found: {err}",
                        self.program.display()
                    ))
                } else {
                    EngineError::Io(err)
                }
            })?;

        if !output.status.success() {
            let exit_code = output.status.code();
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            warn!(
                target = "infra::engine",
                op,
                result = "error",
                elapsed_ms = started_at.elapsed().as_millis() as u64,
                exit_code = exit_code.map(i64::from).unwrap_or(-1),
                error_code = "engine_exit",
                stderr = %stderr,
                "Render engine invocation failed"
            );
            let message = if stderr.is_empty() {
                match exit_code {
                    Some(code) => format!("render engine exited with status {code}"),
                    None => "render engine terminated by signal".to_string(),
                }
            } else {
                stderr
            };
            return Err(EngineError::Failed { message, exit_code });
        }

        info!(
            target = "infra::engine",
            op,
            result = "ok",
            elapsed_ms = started_at.elapsed().as_millis() as u64,
            "Render engine invocation finished"
        );

        Ok(Captured {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        })
    }
}

fn props_arg(job: &RenderJob) -> OsString {
    Value::Object(job.props.clone()).to_string().into()
}

fn common_args(subcommand: &str, job: &RenderJob) -> Vec<OsString> {
    vec![
        subcommand.into(),
        "--bundle".into(),
        job.bundle.location().into(),
        "--composition".into(),
        job.composition.id.clone().into(),
        "--props".into(),
        props_arg(job),
        "--output".into(),
        job.output.clone().into_os_string(),
        "--width".into(),
        job.composition.width.to_string().into(),
        "--height".into(),
        job.composition.height.to_string().into(),
    ]
}

#[async_trait]
impl RenderEngine for CommandEngine {
    async fn bundle(&self, spec: &BundleSpec) -> Result<BundleHandle, EngineError> {
        let mut args: Vec<OsString> = vec![
            "bundle".into(),
            "--entry".into(),
            spec.entry_point.clone().into_os_string(),
        ];
        for plugin in &spec.plugins {
            args.push("--plugin".into());
            args.push(plugin.into());
        }

        let captured = self.run("engine::bundle", args).await?;
        captured
            .stdout
            .lines()
            .map(str::trim)
            .rfind(|line| !line.is_empty())
            .map(BundleHandle::new)
            .ok_or_else(|| EngineError::InvalidOutput("bundler printed no location".to_string()))
    }

    async fn render_media(&self, job: &RenderJob) -> Result<(), EngineError> {
        let mut args = common_args("render", job);
        args.extend([
            OsString::from("--codec"),
            OsString::from(job.codec_or_default().as_str()),
            OsString::from("--fps"),
            OsString::from(job.composition.fps.to_string()),
            OsString::from("--frames"),
            OsString::from(job.composition.duration_in_frames.to_string()),
        ]);
        self.run("engine::render_media", args).await.map(|_| ())
    }

    async fn render_still(&self, job: &RenderJob) -> Result<(), EngineError> {
        let args = common_args("still", job);
        self.run("engine::render_still", args).await.map(|_| ())
    }
}
