// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (c) 2025 The Keel Authors

//! Cluster CLI command handlers.
//!
//! This module implements the handlers for node lifecycle commands.

use std::io::{BufRead, Write};
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use keel_cluster::{
    build_access_config, BootstrapOrchestrator, Cluster, Confirmer, DefaultConfigGenerator,
    HttpConnector, Node, ResetOptions, ResetOrchestrator, ResetTally,
};
use keel_core::Config;
use keel_secrets::{FilesystemSecretsStore, SecretsStore};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::cli::{AccessConfigArgs, ImportSecretsArgs, NodesArgs, OutputFormat, ResetArgs};

/// Build a cluster handle wired to the HTTP management API and the
/// configured secrets file.
pub fn create_cluster(config: Config) -> Cluster {
    let connector = Arc::new(HttpConnector::new(config.api.clone()));
    let secrets = Arc::new(FilesystemSecretsStore::from_config(&config.secrets));
    Cluster::new(config, connector, secrets)
}

/// Handle the bootstrap command.
pub async fn handle_bootstrap(cluster: &Cluster, cancel: CancellationToken) -> Result<()> {
    let nodes = cluster.node_states().context("Failed to load cluster topology")?;
    let orchestrator = BootstrapOrchestrator::from_config(&cluster.config().bootstrap);

    let outcome = orchestrator.run(&nodes, &cancel).await.context("Bootstrap failed")?;

    println!("✓ Cluster {}: {}", cluster.name(), outcome);
    Ok(())
}

/// Handle the reset command.
pub async fn handle_reset(cluster: &Cluster, args: ResetArgs) -> Result<()> {
    let options = ResetOptions {
        confirm: args.confirm,
        full_wipe: args.full,
        graceful: args.graceful,
        shutdown: args.shutdown,
    };

    let orchestrator = ResetOrchestrator::new(options, Arc::new(StdinConfirmer));
    let tally = orchestrator.run(cluster).await.context("Failed to gather cluster nodes")?;

    print_tally(&tally);
    if !tally.is_clean() {
        anyhow::bail!("{} of {} nodes failed to reset", tally.fail_count, tally.total());
    }

    Ok(())
}

fn print_tally(tally: &ResetTally) {
    println!("\n  Reset Summary");
    println!("  ─────────────────────────────────────────────");
    println!("  Succeeded:      {}", tally.success_count);
    println!("  Skipped:        {}", tally.skip_count);
    println!("  Failed:         {}", tally.fail_count);
    println!();
}

/// Handle the nodes command.
pub async fn handle_nodes(cluster: &Cluster, args: NodesArgs) -> Result<()> {
    let nodes = cluster.nodes().await.context("Failed to gather cluster nodes")?;
    print!("{}", render_nodes(&nodes, args.format)?);
    Ok(())
}

/// Render node states in the requested format.
fn render_nodes(nodes: &[Node<'_>], format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => {
            let mut out = serde_json::to_string_pretty(nodes).context("Failed to encode nodes")?;
            out.push('\n');
            Ok(out)
        }
        OutputFormat::Yaml => serde_yaml::to_string(nodes).context("Failed to encode nodes"),
        OutputFormat::Text => Ok(nodes_table(nodes)),
    }
}

fn nodes_table(nodes: &[Node<'_>]) -> String {
    let mut out = format!(
        "  {:<24}  {:<12}  {:<14}  {:<10}  {}\n",
        "HOST", "ROLE", "STAGE", "VERSION", "ERROR"
    );

    for node in nodes {
        let version =
            if node.status().os_version.is_empty() { "-" } else { node.status().os_version.as_str() };
        let error = node.last_error().map(ToString::to_string).unwrap_or_else(|| "-".to_string());
        out.push_str(&format!(
            "  {:<24}  {:<12}  {:<14}  {:<10}  {}\n",
            node.host(),
            node.role().as_str(),
            node.status().stage.to_string(),
            version,
            error
        ));
    }

    out
}

/// Handle the access-config command.
pub async fn handle_access_config(cluster: &Cluster, args: AccessConfigArgs) -> Result<()> {
    let access = build_access_config(cluster, &DefaultConfigGenerator)
        .await
        .context("Failed to build access config")?;
    let yaml = access.to_yaml()?;

    match args.output {
        Some(path) => {
            tokio::fs::write(&path, yaml)
                .await
                .with_context(|| format!("Failed to write {}", path.display()))?;
            info!(path = %path.display(), "Wrote access config");
            println!("✓ Access config written to {}", path.display());
        }
        None => print!("{yaml}"),
    }

    Ok(())
}

/// Handle the secrets import command.
pub async fn handle_secrets_import(cluster: &Cluster, args: ImportSecretsArgs) -> Result<()> {
    let bundle = tokio::fs::read(&args.file)
        .await
        .with_context(|| format!("Failed to read {}", args.file.display()))?;
    if bundle.is_empty() {
        warn!(path = %args.file.display(), "Importing an empty secrets bundle");
    }

    cluster
        .secrets_store()
        .put(cluster.name(), bundle.into())
        .await
        .context("Failed to store secrets bundle")?;

    println!("✓ Secrets bundle stored for cluster {}", cluster.name());
    Ok(())
}

/// Prompts on the terminal for each node.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdinConfirmer;

#[async_trait]
impl Confirmer for StdinConfirmer {
    async fn confirm(&self, message: &str) -> bool {
        let message = message.to_string();

        let answer = tokio::task::spawn_blocking(move || -> std::io::Result<String> {
            let mut stdout = std::io::stdout().lock();
            write!(stdout, "{message} [y/n] ")?;
            stdout.flush()?;

            let mut line = String::new();
            std::io::stdin().lock().read_line(&mut line)?;
            Ok(line)
        })
        .await;

        match answer {
            Ok(Ok(line)) => is_yes(&line),
            Ok(Err(e)) => {
                warn!(error = %e, "Failed to read confirmation, treating as no");
                false
            }
            Err(e) => {
                warn!(error = %e, "Confirmation prompt aborted, treating as no");
                false
            }
        }
    }
}

/// Only an explicit yes counts.
fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().chars().next(), Some('y' | 'Y'))
}

#[cfg(test)]
mod tests {
    use keel_cluster::testing::{FakeConnector, FakeMachine};
    use keel_core::{MachineStage, NodeEntry, NodeStatus};

    use super::*;

    fn sample_entries() -> Vec<NodeEntry> {
        vec![NodeEntry::control_plane("10.0.0.1"), NodeEntry::worker("10.0.0.2")]
    }

    #[test]
    fn test_is_yes() {
        assert!(is_yes("y\n"));
        assert!(is_yes("Yes"));
        assert!(!is_yes("n\n"));
        assert!(!is_yes(""));
        assert!(!is_yes("  \n"));
    }

    #[test]
    fn test_render_nodes_text() {
        let entries = sample_entries();
        let connector = Arc::new(FakeConnector::new());
        let nodes = vec![
            Node::new(&entries[0], connector.clone()).with_status(NodeStatus {
                stage: MachineStage::Running,
                schematic: String::new(),
                os_version: "v1.9.0".to_string(),
            }),
            Node::new(&entries[1], connector),
        ];

        let text = render_nodes(&nodes, OutputFormat::Text).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].contains("HOST"));
        assert!(lines[1].contains("10.0.0.1") && lines[1].contains("running") && lines[1].contains("v1.9.0"));
        assert!(lines[2].contains("worker") && lines[2].contains("unknown"));
    }

    #[tokio::test]
    async fn test_render_nodes_structured() {
        let entries = sample_entries();
        let connector = FakeConnector::new();
        connector.add(
            "10.0.0.1",
            FakeMachine::new().with_status(NodeStatus {
                stage: MachineStage::Booting,
                ..Default::default()
            }),
        );
        let connector = Arc::new(connector);
        let mut nodes: Vec<_> = entries.iter().map(|e| Node::new(e, connector.clone())).collect();
        for node in &mut nodes {
            let _ = node.refresh().await;
        }

        let json = render_nodes(&nodes, OutputFormat::Json).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert!(value[0].get("error").is_none());
        assert_eq!(value[0]["stage"], "booting");
        assert_eq!(value[1]["error"], "node 10.0.0.2 is unreachable: no such node");

        let yaml = render_nodes(&nodes, OutputFormat::Yaml).unwrap();
        let value: serde_yaml::Value = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(value[0]["node"]["host"].as_str(), Some("10.0.0.1"));
        assert_eq!(value[1]["error"].as_str(), Some("node 10.0.0.2 is unreachable: no such node"));
    }

    #[test]
    fn test_table_placeholders() {
        let entries = sample_entries();
        let node = Node::new(&entries[0], Arc::new(FakeConnector::new()));
        let table = nodes_table(std::slice::from_ref(&node));
        assert!(table.lines().nth(1).unwrap().trim_end().ends_with('-'));
    }
}
