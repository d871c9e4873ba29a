// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (c) 2025 The Keel Authors

//! Command line interface definition.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use keel_core::DEFAULT_CONFIG_PATH;

/// Keel: lifecycle management for immutable-OS cluster nodes.
#[derive(Parser)]
#[command(name = "keel")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to the cluster configuration file.
    #[arg(short, long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    /// Command to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Bootstrap the consensus store on the first control-plane node.
    Bootstrap,
    /// Reset every node back to maintenance.
    Reset(ResetArgs),
    /// Show the runtime state of every node.
    Nodes(NodesArgs),
    /// Write the client access bundle.
    AccessConfig(AccessConfigArgs),
    /// Manage the cluster secrets bundle.
    Secrets(SecretsCommand),
    /// Print version information.
    Version,
}

/// Arguments for the reset command.
#[derive(Args)]
pub struct ResetArgs {
    /// Ask for confirmation before resetting each node.
    #[arg(long)]
    pub confirm: bool,

    /// Wipe every partition instead of only STATE and EPHEMERAL.
    #[arg(long)]
    pub full: bool,

    /// Stop services gracefully before wiping.
    #[arg(long)]
    pub graceful: bool,

    /// Power nodes off after reset instead of rebooting them.
    #[arg(long)]
    pub shutdown: bool,
}

/// Arguments for the nodes command.
#[derive(Args)]
pub struct NodesArgs {
    /// Output format (text, json, yaml).
    #[arg(short, long, default_value = "text")]
    pub format: OutputFormat,
}

/// Arguments for the access-config command.
#[derive(Args)]
pub struct AccessConfigArgs {
    /// File to write the bundle to. Prints to stdout when omitted.
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Secrets bundle commands.
#[derive(Args)]
pub struct SecretsCommand {
    /// Secrets subcommand.
    #[command(subcommand)]
    pub command: SecretsSubcommand,
}

/// Secrets subcommands.
#[derive(Subcommand)]
pub enum SecretsSubcommand {
    /// Store a plaintext secrets bundle, encrypting it when possible.
    Import(ImportSecretsArgs),
}

/// Arguments for the secrets import command.
#[derive(Args)]
pub struct ImportSecretsArgs {
    /// Plaintext secrets bundle to import.
    pub file: PathBuf,
}

/// Output format for CLI commands.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output.
    #[default]
    Text,
    /// JSON output for scripting.
    Json,
    /// YAML output.
    Yaml,
}
