// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (c) 2025 The Keel Authors

//! Client access bundle generation.
//!
//! A [`ConfigGenerator`] turns the cluster name and secrets bundle into an
//! [`AccessConfig`]; [`apply_topology`] then points its context at the
//! cluster's nodes:
//!
//! - one node: that node is the only endpoint and the only managed node
//! - several nodes: control-plane nodes are the endpoints, every node is
//!   managed
//!
//! With several nodes and no control-plane node among them the generator's
//! endpoints are left as they are, even though they will not reach the
//! cluster. Callers that need a usable bundle should check the topology.

use std::collections::BTreeMap;

use keel_core::NodeEntry;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::cluster::Cluster;
use crate::error::{ClusterError, GenerateError};

/// Endpoint used by generated bundles until a topology is applied.
pub const DEFAULT_ENDPOINT: &str = "127.0.0.1";

/// Client access bundle.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AccessConfig {
    /// Name of the active context.
    pub context: String,
    /// Contexts by name.
    #[serde(default)]
    pub contexts: BTreeMap<String, AccessContext>,
}

/// Connection settings for one cluster.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AccessContext {
    /// Addresses clients connect through.
    #[serde(default)]
    pub endpoints: Vec<String>,
    /// Nodes commands are targeted at.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub nodes: Vec<String>,
    /// CA certificate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ca: Option<String>,
    /// Client certificate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crt: Option<String>,
    /// Client key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
}

impl AccessConfig {
    /// Returns the context named `name`.
    #[must_use]
    pub fn context(&self, name: &str) -> Option<&AccessContext> {
        self.contexts.get(name)
    }

    /// Renders the bundle as YAML.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_yaml(&self) -> Result<String, GenerateError> {
        serde_yaml::to_string(self).map_err(|e| GenerateError::Serialize(e.to_string()))
    }
}

/// Generates an access bundle from cluster secrets.
pub trait ConfigGenerator: Send + Sync {
    /// Builds a bundle whose context is named after `cluster_name`.
    ///
    /// # Errors
    ///
    /// Returns an error if `secrets` cannot be used.
    fn generate(&self, cluster_name: &str, secrets: &[u8]) -> Result<AccessConfig, GenerateError>;
}

/// Generator that lifts the CA certificate out of a YAML secrets bundle.
///
/// Client credentials are not issued; the CA is read from `certs.os.crt`
/// when present.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultConfigGenerator;

impl ConfigGenerator for DefaultConfigGenerator {
    fn generate(&self, cluster_name: &str, secrets: &[u8]) -> Result<AccessConfig, GenerateError> {
        if secrets.iter().all(u8::is_ascii_whitespace) {
            return Err(GenerateError::EmptySecrets);
        }

        let document: serde_yaml::Value = serde_yaml::from_slice(secrets)
            .map_err(|e| GenerateError::InvalidSecrets(e.to_string()))?;
        if !document.is_mapping() {
            return Err(GenerateError::InvalidSecrets("expected a mapping".to_string()));
        }

        let ca = document
            .get("certs")
            .and_then(|certs| certs.get("os"))
            .and_then(|os| os.get("crt"))
            .and_then(serde_yaml::Value::as_str)
            .map(str::to_string);
        if ca.is_none() {
            debug!("Secrets bundle carries no CA certificate");
        }

        let context = AccessContext {
            endpoints: vec![DEFAULT_ENDPOINT.to_string()],
            ca,
            ..Default::default()
        };

        Ok(AccessConfig {
            context: cluster_name.to_string(),
            contexts: BTreeMap::from([(cluster_name.to_string(), context)]),
        })
    }
}

/// Points the `cluster_name` context at the given nodes.
///
/// # Errors
///
/// Returns [`GenerateError::MissingContext`] if the bundle has no such
/// context.
pub fn apply_topology(
    access: &mut AccessConfig,
    cluster_name: &str,
    nodes: &[NodeEntry],
) -> Result<(), GenerateError> {
    let context = access
        .contexts
        .get_mut(cluster_name)
        .ok_or_else(|| GenerateError::MissingContext(cluster_name.to_string()))?;

    if let [node] = nodes {
        context.endpoints = vec![node.endpoint().to_string()];
        context.nodes = vec![node.endpoint().to_string()];
        return Ok(());
    }

    let endpoints: Vec<String> = nodes
        .iter()
        .filter(|node| node.is_control_plane())
        .map(|node| node.endpoint().to_string())
        .collect();
    let all: Vec<String> = nodes.iter().map(|node| node.endpoint().to_string()).collect();

    if endpoints.is_empty() {
        warn!(cluster = %cluster_name, "No control plane nodes, keeping default endpoints");
    } else {
        context.endpoints = endpoints;
    }
    if !all.is_empty() {
        context.nodes = all;
    }

    Ok(())
}

/// Builds the access bundle for `cluster` from its stored secrets.
///
/// # Errors
///
/// Returns an error if the topology is invalid, no secrets are stored, or
/// the generator rejects them.
pub async fn build_access_config(
    cluster: &Cluster,
    generator: &dyn ConfigGenerator,
) -> Result<AccessConfig, ClusterError> {
    cluster.config().validate()?;

    let secrets = cluster.secrets().await?;
    let mut access = generator.generate(cluster.name(), &secrets)?;
    apply_topology(&mut access, cluster.name(), &cluster.config().nodes)?;

    Ok(access)
}
