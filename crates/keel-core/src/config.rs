// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (c) 2025 The Keel Authors

//! Configuration management for Keel.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::types::NodeEntry;

/// Default location of the cluster configuration file.
pub const DEFAULT_CONFIG_PATH: &str = "keel.toml";

/// Main configuration for a Keel-managed cluster.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// Name of the cluster. Used as the access bundle context name.
    pub cluster_name: String,
    /// Nodes that make up the cluster.
    pub nodes: Vec<NodeEntry>,
    /// Secrets storage configuration.
    pub secrets: SecretsConfig,
    /// Bootstrap retry configuration.
    pub bootstrap: BootstrapConfig,
    /// Management API client configuration.
    pub api: ApiConfig,
    /// Logging configuration.
    pub logging: LoggingConfig,
    /// Metrics configuration.
    pub metrics: MetricsConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn from_file(path: &Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path).map_err(crate::Error::Io)?;
        Self::parse(&content)
    }

    /// Load configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the string cannot be parsed or validated.
    pub fn parse(content: &str) -> crate::Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks the invariants every topology must hold.
    ///
    /// # Errors
    ///
    /// Returns an error if the cluster name is empty, a host is empty, or
    /// two nodes share the same host.
    pub fn validate(&self) -> crate::Result<()> {
        if self.cluster_name.trim().is_empty() {
            return Err(crate::Error::config("cluster_name must not be empty"));
        }

        let mut seen = HashSet::with_capacity(self.nodes.len());
        for node in &self.nodes {
            if node.host.trim().is_empty() {
                return Err(crate::Error::config("node host must not be empty"));
            }
            if !seen.insert(node.host.as_str()) {
                return Err(crate::Error::DuplicateHost(node.host.clone()));
            }
        }

        Ok(())
    }
}

/// Secrets storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SecretsConfig {
    /// Path of the secrets bundle file, relative to the working directory.
    pub path: PathBuf,
    /// External encryption tool binary. Empty disables encryption.
    pub encryption_tool: String,
    /// Write the bundle in plaintext when the encryption tool is missing
    /// or fails.
    pub allow_plaintext_fallback: bool,
}

impl Default for SecretsConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("secrets.yaml"),
            encryption_tool: "sops".to_string(),
            allow_plaintext_fallback: true,
        }
    }
}

/// Bootstrap retry configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BootstrapConfig {
    /// Total wall-clock budget for the bootstrap protocol, in seconds.
    pub timeout_secs: u64,
    /// Constant wait between attempts, in milliseconds.
    pub retry_interval_ms: u64,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self { timeout_secs: 600, retry_interval_ms: 1000 }
    }
}

impl BootstrapConfig {
    /// Returns the retry budget.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Returns the interval between attempts.
    #[must_use]
    pub fn retry_interval(&self) -> Duration {
        Duration::from_millis(self.retry_interval_ms)
    }
}

/// Management API client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// URL scheme used to reach node management endpoints.
    pub scheme: String,
    /// Per-request timeout, in seconds.
    pub request_timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self { scheme: "http".to_string(), request_timeout_secs: 30 }
    }
}

impl ApiConfig {
    /// Returns the per-request timeout.
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable format.
    #[default]
    Pretty,
    /// JSON format.
    Json,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    pub level: String,
    /// Log output format.
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), format: LogFormat::Pretty }
    }
}

/// Metrics configuration.
///
/// Each command is a short-lived process, so counters are written once in
/// Prometheus text format when the command finishes, for a node exporter
/// textfile collector to pick up.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Enable metrics collection.
    pub enabled: bool,
    /// File the rendered metrics are written to.
    pub textfile: PathBuf,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { enabled: false, textfile: PathBuf::from("keel.prom") }
    }
}
