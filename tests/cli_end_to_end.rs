#![cfg(unix)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use predicates::str::contains;
use tempfile::TempDir;

const ENGINE_SCRIPT: &str = r#"#!/bin/sh
set -eu
cmd="$1"; shift
if [ "$cmd" = "bundle" ]; then
  echo "bundling"
  echo "/tmp/framehouse-bundle"
  exit 0
fi
out=""
while [ "$#" -gt 0 ]; do
  case "$1" in
    --output) shift; out="$1" ;;
  esac
  shift
done
printf '%s' "$cmd" > "$out"
"#;

struct Workspace {
    root: TempDir,
}

impl Workspace {
    fn new() -> Self {
        let root = TempDir::new().expect("temp dir");
        let engine = root.path().join("engine.sh");
        fs::write(&engine, ENGINE_SCRIPT).expect("engine script");
        let mut perms = fs::metadata(&engine).expect("metadata").permissions();
        perms.set_mode(0o755);
        fs::set_permissions(&engine, perms).expect("permissions");

        fs::write(
            root.path().join("compositions.json"),
            r#"{"compositions":[{"id":"Intro","kind":"still","width":640,"height":360}]}"#,
        )
        .expect("manifest");
        Self { root }
    }

    fn path(&self) -> &Path {
        self.root.path()
    }

    fn renders(&self) -> PathBuf {
        self.path().join("renders")
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("framehouse"));
        cmd.current_dir(self.path())
            .env("RUST_LOG", "off")
            .env_remove("FRAMEHOUSE_CONFIG_FILE")
            .env_remove("PORT");
        cmd
    }

    fn artifacts(&self) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(self.renders())
            .map(|entries| {
                entries
                    .filter_map(Result::ok)
                    .map(|entry| entry.file_name().to_string_lossy().into_owned())
                    .filter(|name| !name.starts_with('.'))
                    .collect()
            })
            .unwrap_or_default();
        names.sort();
        names
    }
}

#[test]
fn render_command_prints_the_artifact_filename() {
    let workspace = Workspace::new();

    let assert = workspace
        .command()
        .args(["render", "Intro", "--still", "--props", r#"{"title":"Hi"}"#])
        .arg("--engine-path")
        .arg(workspace.path().join("engine.sh"))
        .assert()
        .success();

    let stdout = String::from_utf8_lossy(&assert.get_output().stdout)
        .trim()
        .to_string();
    assert_eq!(workspace.artifacts(), vec![stdout.clone()]);
    assert!(stdout.starts_with("Intro_") && stdout.ends_with(".png"), "{stdout}");
    assert_eq!(
        fs::read_to_string(workspace.renders().join(&stdout)).expect("artifact"),
        "still"
    );
}

#[test]
fn render_command_rejects_non_object_props() {
    let workspace = Workspace::new();
    workspace
        .command()
        .args(["render", "Intro", "--still", "--props", "[1,2]"])
        .arg("--engine-path")
        .arg(workspace.path().join("engine.sh"))
        .assert()
        .failure();
    assert!(workspace.artifacts().is_empty());
}

#[test]
fn render_command_reports_unknown_compositions() {
    let workspace = Workspace::new();
    workspace
        .command()
        .env("RUST_LOG", "error")
        .args(["render", "Outro"])
        .arg("--engine-path")
        .arg(workspace.path().join("engine.sh"))
        .assert()
        .failure()
        .stdout(contains("Outro"));
}

#[test]
fn prune_command_keeps_the_newest_artifacts() {
    let workspace = Workspace::new();
    fs::create_dir_all(workspace.renders()).expect("renders dir");
    for stamp in ["10", "11", "12"] {
        let name = format!("Intro_2026-01-01T00-00-{stamp}-000Z.png");
        fs::write(workspace.renders().join(name), b"png").expect("artifact");
    }
    fs::write(
        workspace.renders().join("Outro_2026-01-01T00-00-00-000Z.mp4"),
        b"mp4",
    )
    .expect("video");

    workspace
        .command()
        .args(["prune", "--keep", "1"])
        .assert()
        .success();

    let remaining = workspace.artifacts();
    assert_eq!(remaining.len(), 2, "{remaining:?}");
    assert!(remaining.iter().any(|name| name.starts_with("Outro_")));
}
