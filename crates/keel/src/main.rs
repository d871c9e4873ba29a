// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (c) 2025 The Keel Authors

//! Keel: lifecycle management for immutable-OS cluster nodes.

use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;
use keel_cluster::Cluster;
use keel_core::config::{Config, LogFormat, MetricsConfig};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

mod cli;
mod cluster_cli;

use cli::{Cli, Commands, SecretsSubcommand};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Commands::Version = cli.command {
        println!("keel {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let config = load_config(&cli.config)?;
    init_logging(&config)?;

    let metrics = if config.metrics.enabled { Some(init_metrics()?) } else { None };
    let metrics_config = config.metrics.clone();

    let cluster = cluster_cli::create_cluster(config);

    let result = run_command(cli.command, &cluster).await;

    if let Some(handle) = metrics {
        write_metrics(&handle, &metrics_config).await;
    }

    result
}

async fn run_command(command: Commands, cluster: &Cluster) -> Result<()> {
    match command {
        Commands::Bootstrap => {
            let cancel = CancellationToken::new();
            tokio::spawn(cancel_on_signal(cancel.clone()));
            cluster_cli::handle_bootstrap(cluster, cancel).await
        }
        Commands::Reset(args) => cluster_cli::handle_reset(cluster, args).await,
        Commands::Nodes(args) => cluster_cli::handle_nodes(cluster, args).await,
        Commands::AccessConfig(args) => cluster_cli::handle_access_config(cluster, args).await,
        Commands::Secrets(cmd) => match cmd.command {
            SecretsSubcommand::Import(args) => {
                cluster_cli::handle_secrets_import(cluster, args).await
            }
        },
        Commands::Version => Ok(()),
    }
}

fn load_config(path: &Path) -> Result<Config> {
    Config::from_file(path)
        .with_context(|| format!("Failed to load configuration from {}", path.display()))
}

fn init_logging(config: &Config) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.logging.level));

    let fmt_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    match config.logging.format {
        LogFormat::Json => {
            tracing_subscriber::registry().with(filter).with(fmt_layer.json()).init();
        }
        LogFormat::Pretty => {
            tracing_subscriber::registry().with(filter).with(fmt_layer).init();
        }
    }

    Ok(())
}

fn init_metrics() -> Result<PrometheusHandle> {
    PrometheusBuilder::new()
        .install_recorder()
        .context("Failed to install Prometheus recorder")
}

/// Writes the rendered counters. A failed write is logged and does not
/// change the command's outcome.
async fn write_metrics(handle: &PrometheusHandle, config: &MetricsConfig) {
    match tokio::fs::write(&config.textfile, handle.render()).await {
        Ok(()) => info!(path = %config.textfile.display(), "Wrote metrics"),
        Err(e) => warn!(path = %config.textfile.display(), error = %e, "Failed to write metrics"),
    }
}

/// Cancels `token` on Ctrl+C or SIGTERM.
async fn cancel_on_signal(token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, cancelling");
        }
        _ = terminate => {
            info!("Received SIGTERM, cancelling");
        }
    }

    token.cancel();
}
