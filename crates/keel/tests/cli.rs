// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (c) 2025 The Keel Authors

//! Subprocess tests for the `keel` binary.
//!
//! Every test runs against a config in its own temp dir with encryption
//! disabled, and none of them needs a reachable node.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use tempfile::TempDir;

fn keel_bin() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_keel"))
}

fn run(dir: &Path, args: &[&str]) -> Output {
    Command::new(keel_bin())
        .current_dir(dir)
        .env("RUST_LOG", "warn")
        .args(args)
        .output()
        .expect("failed to run keel")
}

fn write_config(dir: &Path, nodes: &str) -> PathBuf {
    let path = dir.join("keel.toml");
    let content = format!(
        r#"
cluster_name = "lab"

[secrets]
path = "{}"
encryption_tool = ""

{nodes}
"#,
        dir.join("secrets.yaml").display()
    );
    std::fs::write(&path, content).expect("write config");
    path
}

#[test]
fn test_version() {
    let dir = TempDir::new().unwrap();
    let output = run(dir.path(), &["version"]);

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.starts_with("keel "));
}

#[test]
fn test_missing_config_fails() {
    let dir = TempDir::new().unwrap();
    let output = run(dir.path(), &["--config", "absent.toml", "nodes"]);

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Failed to load configuration"), "stderr: {stderr}");
}

#[test]
fn test_bootstrap_rejects_worker_first() {
    let dir = TempDir::new().unwrap();
    write_config(
        dir.path(),
        r#"
[[nodes]]
host = "127.0.0.1:1"
role = "worker"
"#,
    );

    let output = run(dir.path(), &["bootstrap"]);

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("bootstrap requires at least 1 control plane node"), "stderr: {stderr}");
}

#[test]
fn test_secrets_import_then_access_config() {
    let dir = TempDir::new().unwrap();
    write_config(
        dir.path(),
        r#"
[[nodes]]
host = "10.0.0.5:50000"
role = "controlplane"
"#,
    );

    let bundle = dir.path().join("bundle.yaml");
    std::fs::write(&bundle, "certs:\n  os:\n    crt: Y2E=\n").unwrap();

    let output = run(dir.path(), &["secrets", "import", bundle.to_str().unwrap()]);
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    assert_eq!(
        std::fs::read(dir.path().join("secrets.yaml")).unwrap(),
        std::fs::read(&bundle).unwrap()
    );

    let output = run(dir.path(), &["access-config"]);
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("context: lab"));
    assert!(stdout.contains("10.0.0.5:50000"));
    assert!(stdout.contains("Y2E="));
}

#[test]
fn test_access_config_without_secrets_fails() {
    let dir = TempDir::new().unwrap();
    write_config(dir.path(), "");

    let output = run(dir.path(), &["access-config", "--output", "talosconfig"]);

    assert!(!output.status.success());
    assert!(!dir.path().join("talosconfig").exists());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("no secrets bundle stored for cluster lab"), "stderr: {stderr}");
}

#[test]
fn test_reset_empty_topology() {
    let dir = TempDir::new().unwrap();
    write_config(dir.path(), "");

    let output = run(dir.path(), &["reset"]);

    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Succeeded:      0"));
}

#[test]
fn test_reset_skips_unreachable_node_and_writes_metrics() {
    let dir = TempDir::new().unwrap();
    let textfile = dir.path().join("keel.prom");
    write_config(
        dir.path(),
        &format!(
            r#"
[metrics]
enabled = true
textfile = "{}"

[[nodes]]
host = "127.0.0.1:1"
role = "controlplane"
"#,
            textfile.display()
        ),
    );

    let output = run(dir.path(), &["reset"]);

    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Skipped:        1"), "stdout: {stdout}");
    assert!(stdout.contains("Failed:         0"), "stdout: {stdout}");

    let rendered = std::fs::read_to_string(&textfile).expect("metrics textfile");
    assert!(rendered.contains(r#"keel_reset_nodes_total{outcome="skipped"} 1"#), "{rendered}");
}

#[test]
fn test_metrics_disabled_by_default() {
    let dir = TempDir::new().unwrap();
    write_config(dir.path(), "");

    let output = run(dir.path(), &["reset"]);

    assert!(output.status.success());
    assert!(!dir.path().join("keel.prom").exists());
}
